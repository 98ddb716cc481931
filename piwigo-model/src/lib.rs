//! Core data model definitions shared across the Piwigo cache crates.
#![allow(missing_docs)]

pub mod album;
pub mod error;
pub mod ids;
pub mod image;
pub mod prelude;
pub mod sizes;
pub mod sort;
pub mod tag;
pub mod upload;

// Intentionally curated re-exports for downstream consumers.
pub use album::AlbumRecord;
pub use error::{ModelError, Result as ModelResult};
pub use ids::{AlbumId, ImageId, ImageScope, TagId};
pub use image::{ImageEdit, ImageRecord, PrivacyLevel};
pub use sizes::{ImageSize, SizeTable, SizedUrl};
pub use sort::{ImageSort, SortAttr, SortOrder};
pub use tag::TagRecord;
pub use upload::{UploadChunk, UploadLocalId, UploadRequest, UploadState};
