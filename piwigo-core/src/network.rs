//! Port to the remote Piwigo server.
//!
//! The cache never talks HTTP itself. Everything it needs from the server goes
//! through [`NetworkClient`]; [`crate::api::PiwigoApi`] implements it on top of
//! a JSON transport, and tests plug in scripted fakes.

use async_trait::async_trait;
use piwigo_model::{
    AlbumId, AlbumRecord, ImageEdit, ImageId, ImageRecord, ImageScope, ImageSort, TagRecord,
    UploadChunk,
};

use crate::error::ClientResult;

/// One page request for an image list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePageRequest {
    pub scope: ImageScope,
    /// Zero-based page index.
    pub page: u32,
    pub per_page: u32,
    pub sort: ImageSort,
}

/// One page of an image list as returned by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImagePage {
    pub images: Vec<ImageRecord>,
    /// Server-side hint that another page exists.
    pub has_more: bool,
    /// Size of the whole list, when the server reports it.
    pub total_count: Option<u64>,
}

impl ImagePage {
    pub fn new(images: Vec<ImageRecord>, has_more: bool) -> Self {
        Self {
            images,
            has_more,
            total_count: None,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }
}

/// Album-level write operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumMutation {
    Create {
        name: String,
        parent: AlbumId,
        comment: Option<String>,
    },
    Rename {
        id: AlbumId,
        name: String,
        comment: Option<String>,
    },
    Move {
        id: AlbumId,
        new_parent: AlbumId,
    },
    Delete {
        id: AlbumId,
    },
}

/// Image-level write operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageMutation {
    SetInfo { id: ImageId, edit: ImageEdit },
    Delete { ids: Vec<ImageId> },
    /// Add the images to `album`, keeping their other memberships.
    Associate { ids: Vec<ImageId>, album: AlbumId },
    /// Remove the images from `album` only.
    Dissociate { ids: Vec<ImageId>, album: AlbumId },
    /// Move the images from `from` to `to`.
    Move {
        ids: Vec<ImageId>,
        from: AlbumId,
        to: AlbumId,
    },
}

/// Which tag list to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagListing {
    /// Tags carrying at least one image the user can see, with counts.
    #[default]
    Visible,
    /// Every tag, including unused ones, without counts. Admins only.
    Admin,
}

/// The server operations the cache depends on.
#[async_trait]
pub trait NetworkClient: Send + Sync + std::fmt::Debug {
    /// Every album visible to the current user, in server rank order.
    async fn list_albums(&self) -> ClientResult<Vec<AlbumRecord>>;

    /// One page of the images in a scope.
    async fn list_images(&self, request: &ImagePageRequest) -> ClientResult<ImagePage>;

    /// Full details of one image.
    async fn image_info(&self, id: ImageId) -> ClientResult<ImageRecord>;

    async fn list_tags(&self, listing: TagListing) -> ClientResult<Vec<TagRecord>>;

    /// Create a tag and return it as the server stored it.
    async fn create_tag(&self, name: &str) -> ClientResult<TagRecord>;

    /// Returns the resulting album, or `None` for deletions.
    async fn mutate_album(&self, mutation: &AlbumMutation) -> ClientResult<Option<AlbumRecord>>;

    /// Returns the resulting image when the operation yields one.
    async fn mutate_image(&self, mutation: &ImageMutation) -> ClientResult<Option<ImageRecord>>;

    /// Id of an image already on the server with this md5, if any.
    async fn find_image_by_checksum(&self, md5: &str) -> ClientResult<Option<ImageId>>;

    /// Send one chunk. The last chunk returns the created image.
    async fn upload_chunk(&self, chunk: &UploadChunk<'_>) -> ClientResult<Option<ImageRecord>>;
}
