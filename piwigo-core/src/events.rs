use piwigo_model::{AlbumId, ImageId, ImageScope, UploadLocalId, UploadState};
use tokio::sync::broadcast;

/// Notifications for whoever renders the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// The album tree changed shape or content.
    TreeChanged,
    /// An album's image counters moved.
    AlbumCountersChanged {
        album: AlbumId,
        nb_images: u64,
        total_nb_images: u64,
    },
    AlbumRemoved {
        album: AlbumId,
        orphaned: Vec<AlbumId>,
    },
    /// The tag list was refreshed or a tag was added.
    TagsChanged,
    /// The content of a store changed (page merged, edit, removal, insert).
    ImagesChanged { scope: ImageScope },
    ImagesRemoved { ids: Vec<ImageId> },
    UploadProgress {
        local_id: UploadLocalId,
        state: UploadState,
        chunks_sent: usize,
        chunk_count: usize,
    },
    /// Everything was dropped (logout or explicit reset).
    Cleared,
}

/// Lightweight in-process fan-out of [`CacheEvent`]s. Publishing with no
/// subscriber is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: CacheEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
