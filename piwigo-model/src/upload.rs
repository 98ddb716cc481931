use std::fmt;

use crate::ids::{AlbumId, TagId};
use crate::image::PrivacyLevel;

/// Client-side identifier of a queued upload (the local asset identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UploadLocalId(pub String);

impl UploadLocalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadLocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A local file waiting to be sent to an album.
#[derive(Clone, PartialEq)]
pub struct UploadRequest {
    pub local_id: UploadLocalId,
    pub file_name: String,
    pub data: Vec<u8>,
    pub album: AlbumId,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub author: Option<String>,
    pub privacy: PrivacyLevel,
    pub tag_ids: Vec<TagId>,
}

impl UploadRequest {
    pub fn new(
        local_id: impl Into<String>,
        file_name: impl Into<String>,
        data: Vec<u8>,
        album: AlbumId,
    ) -> Self {
        Self {
            local_id: UploadLocalId::new(local_id),
            file_name: file_name.into(),
            data,
            album,
            title: None,
            comment: None,
            author: None,
            privacy: PrivacyLevel::default(),
            tag_ids: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Number of chunks of `chunk_size` bytes needed for the payload. An
    /// empty file still takes one (empty) chunk.
    pub fn chunk_count(&self, chunk_size: usize) -> usize {
        self.data.len().div_ceil(chunk_size.max(1)).max(1)
    }
}

// Payload bytes are summarized by their length.
impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("local_id", &self.local_id)
            .field("file_name", &self.file_name)
            .field("bytes", &self.data.len())
            .field("album", &self.album)
            .field("title", &self.title)
            .finish()
    }
}

/// Progress of one upload through the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UploadState {
    Waiting,
    Uploading,
    Finishing,
    Finished,
    /// Already on the server (matched by checksum); nothing was sent.
    Skipped,
    Failed { message: String, retriable: bool },
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Finished | UploadState::Skipped | UploadState::Failed { .. }
        )
    }

    pub fn is_retriable_failure(&self) -> bool {
        matches!(self, UploadState::Failed { retriable: true, .. })
    }
}

/// One slice of an upload as sent to the server.
#[derive(Debug, Clone, Copy)]
pub struct UploadChunk<'a> {
    pub request: &'a UploadRequest,
    /// Hex md5 of the whole file.
    pub original_sum: &'a str,
    pub chunk: usize,
    pub chunks: usize,
    pub data: &'a [u8],
}

impl UploadChunk<'_> {
    pub fn is_last(&self) -> bool {
        self.chunk + 1 == self.chunks
    }
}
