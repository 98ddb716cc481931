//! Client-side cache for a Piwigo photo server.
//!
//! - [`CategoryRegistry`] holds the album tree and the live image stores.
//! - [`AlbumImageStore`] pages, de-duplicates and sorts the images of one
//!   album or smart album, with generation-checked reloads.
//! - [`TagDirectory`] holds the server's tags.
//! - [`UploadQueue`] sends local files one at a time, in chunks.
//! - [`PiwigoCache`] wires them to a [`NetworkClient`] for one session.
//!
//! The server is reached only through [`NetworkClient`]; [`api::PiwigoApi`]
//! implements it for the Piwigo JSON API.
#![allow(missing_docs)]

pub mod api;
pub mod cache;
pub mod error;
pub mod events;
pub mod network;
pub mod registry;
pub mod settings;
pub mod store;
pub mod tags;
pub mod upload;

pub use cache::PiwigoCache;
pub use error::{CacheError, ClientError, ClientResult, Result};
pub use events::{CacheEvent, EventBus};
pub use network::{
    AlbumMutation, ImageMutation, ImagePage, ImagePageRequest, NetworkClient, TagListing,
};
pub use registry::{CategoryRegistry, ReplaceOutcome};
pub use settings::CacheSettings;
pub use store::{AlbumImageStore, LoadOutcome, LoadProgress};
pub use tags::TagDirectory;
pub use upload::{UploadQueue, UploadStatus};

pub use piwigo_model as model;
