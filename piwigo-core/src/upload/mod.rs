//! Sequential upload queue.
//!
//! Requests are processed strictly in FIFO order, one at a time. Before any
//! byte is sent the file's md5 is looked up on the server; a match marks the
//! request [`UploadState::Skipped`]. Otherwise the payload goes out in chunks
//! of the configured size, in order, and the image returned for the last
//! chunk is handed to the registry so the target album's store and counters
//! pick it up. A failure marks that request failed and the queue moves on.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use piwigo_model::{AlbumId, UploadChunk, UploadLocalId, UploadRequest, UploadState};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, EventBus};
use crate::network::NetworkClient;
use crate::registry::CategoryRegistry;

/// Snapshot of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadStatus {
    pub local_id: UploadLocalId,
    pub file_name: String,
    pub album: AlbumId,
    pub state: UploadState,
    pub chunks_sent: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<UploadRequest>,
    /// Failed requests kept for [`UploadQueue::retry_failed`].
    failed: HashMap<UploadLocalId, UploadRequest>,
    statuses: Vec<UploadStatus>,
}

impl QueueState {
    fn status_mut(&mut self, id: &UploadLocalId) -> Option<&mut UploadStatus> {
        self.statuses.iter_mut().find(|status| &status.local_id == id)
    }
}

#[derive(Debug)]
pub struct UploadQueue {
    client: Arc<dyn NetworkClient>,
    registry: Arc<CategoryRegistry>,
    events: EventBus,
    chunk_size: usize,
    state: Mutex<QueueState>,
    /// Held for the whole of [`UploadQueue::process`] so only one worker
    /// drains the queue.
    worker: tokio::sync::Mutex<()>,
}

impl UploadQueue {
    pub fn new(
        client: Arc<dyn NetworkClient>,
        registry: Arc<CategoryRegistry>,
        events: EventBus,
        chunk_size: usize,
    ) -> Self {
        Self {
            client,
            registry,
            events,
            chunk_size: chunk_size.max(1),
            state: Mutex::new(QueueState::default()),
            worker: tokio::sync::Mutex::new(()),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Append a request. A local id may only be queued again once its
    /// previous upload reached a terminal state.
    pub fn enqueue(&self, request: UploadRequest) -> Result<()> {
        if !request.album.is_real() {
            return Err(CacheError::invalid_state(format!(
                "cannot upload into album {}",
                request.album
            )));
        }

        let status = UploadStatus {
            local_id: request.local_id.clone(),
            file_name: request.file_name.clone(),
            album: request.album,
            state: UploadState::Waiting,
            chunks_sent: 0,
            chunk_count: request.chunk_count(self.chunk_size),
        };

        {
            let mut state = self.state.lock();
            match state.status_mut(&request.local_id) {
                Some(existing) if !existing.state.is_terminal() => {
                    return Err(CacheError::invalid_state(format!(
                        "upload {} is already queued",
                        request.local_id
                    )));
                }
                Some(existing) => *existing = status.clone(),
                None => state.statuses.push(status.clone()),
            }
            state.failed.remove(&request.local_id);
            debug!(upload = %request.local_id, chunks = status.chunk_count, "upload queued");
            state.pending.push_back(request);
        }

        self.publish(&status);
        Ok(())
    }

    /// Drain the queue. Returns the terminal state of every request handled
    /// by this call, in processing order.
    pub async fn process(&self) -> Vec<(UploadLocalId, UploadState)> {
        let _worker = self.worker.lock().await;
        let mut handled = Vec::new();

        loop {
            let next = self.state.lock().pending.pop_front();
            let Some(request) = next else {
                break;
            };
            let outcome = self.upload(&request).await;
            if matches!(outcome, UploadState::Failed { .. }) {
                self.state
                    .lock()
                    .failed
                    .insert(request.local_id.clone(), request.clone());
            }
            handled.push((request.local_id.clone(), outcome));
        }

        handled
    }

    /// Queue every retriable failure again. Returns how many were queued.
    pub fn retry_failed(&self) -> usize {
        let requeued: Vec<UploadStatus> = {
            let mut state = self.state.lock();
            let ids: Vec<UploadLocalId> = state
                .statuses
                .iter()
                .filter(|status| status.state.is_retriable_failure())
                .map(|status| status.local_id.clone())
                .collect();

            let mut requeued = Vec::new();
            for id in ids {
                let Some(request) = state.failed.remove(&id) else {
                    continue;
                };
                state.pending.push_back(request);
                if let Some(status) = state.status_mut(&id) {
                    status.state = UploadState::Waiting;
                    status.chunks_sent = 0;
                    requeued.push(status.clone());
                }
            }
            requeued
        };

        for status in &requeued {
            self.publish(status);
        }
        if !requeued.is_empty() {
            info!(count = requeued.len(), "failed uploads queued again");
        }
        requeued.len()
    }

    /// Withdraw a request that has not started. Returns `false` for unknown
    /// ids and uploads already in progress or done.
    pub fn cancel(&self, id: &UploadLocalId) -> bool {
        let mut state = self.state.lock();
        let before = state.pending.len();
        state.pending.retain(|request| &request.local_id != id);
        if state.pending.len() == before {
            return false;
        }
        state.statuses.retain(|status| &status.local_id != id);
        debug!(upload = %id, "upload cancelled");
        true
    }

    pub fn status(&self, id: &UploadLocalId) -> Option<UploadStatus> {
        self.state
            .lock()
            .statuses
            .iter()
            .find(|status| &status.local_id == id)
            .cloned()
    }

    /// Every known upload in the order it was queued.
    pub fn statuses(&self) -> Vec<UploadStatus> {
        self.state.lock().statuses.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Forget finished and skipped uploads. Failures stay visible.
    pub fn clear_completed(&self) -> usize {
        let mut state = self.state.lock();
        let before = state.statuses.len();
        state.statuses.retain(|status| {
            !matches!(status.state, UploadState::Finished | UploadState::Skipped)
        });
        before - state.statuses.len()
    }

    /// Drop everything, including failures. Does not interrupt an upload in
    /// progress.
    pub fn clear(&self) {
        *self.state.lock() = QueueState::default();
    }

    async fn upload(&self, request: &UploadRequest) -> UploadState {
        match self.send(request).await {
            Ok(state) => state,
            Err(err) => {
                warn!(upload = %request.local_id, error = %err, "upload failed");
                let state = UploadState::Failed {
                    message: err.user_message(),
                    retriable: err.is_retriable(),
                };
                self.transition(&request.local_id, state.clone(), None);
                state
            }
        }
    }

    async fn send(&self, request: &UploadRequest) -> Result<UploadState> {
        let id = &request.local_id;
        self.transition(id, UploadState::Uploading, Some(0));

        let checksum = format!("{:x}", md5::compute(&request.data));
        if let Some(existing) = self.client.find_image_by_checksum(&checksum).await? {
            info!(upload = %id, image = %existing, "already on the server, skipped");
            self.transition(id, UploadState::Skipped, None);
            return Ok(UploadState::Skipped);
        }

        let chunks = request.chunk_count(self.chunk_size);
        let mut created = None;
        for chunk in 0..chunks {
            let start = (chunk * self.chunk_size).min(request.data.len());
            let end = (start + self.chunk_size).min(request.data.len());
            let piece = UploadChunk {
                request,
                original_sum: &checksum,
                chunk,
                chunks,
                data: &request.data[start..end],
            };
            created = self.client.upload_chunk(&piece).await?;
            let next = if piece.is_last() {
                UploadState::Finishing
            } else {
                UploadState::Uploading
            };
            self.transition(id, next, Some(chunk + 1));
        }

        match created {
            Some(record) => {
                debug!(upload = %id, image = %record.id, album = %request.album, "upload created image");
                self.registry.fan_out_added(request.album, record);
            }
            None => warn!(upload = %id, "server returned no image for the last chunk"),
        }

        self.transition(id, UploadState::Finished, None);
        info!(upload = %id, chunks, "upload finished");
        Ok(UploadState::Finished)
    }

    fn transition(&self, id: &UploadLocalId, next: UploadState, chunks_sent: Option<usize>) {
        let snapshot = {
            let mut state = self.state.lock();
            let Some(status) = state.status_mut(id) else {
                return;
            };
            status.state = next;
            if let Some(sent) = chunks_sent {
                status.chunks_sent = sent;
            }
            status.clone()
        };
        self.publish(&snapshot);
    }

    fn publish(&self, status: &UploadStatus) {
        self.events.publish(CacheEvent::UploadProgress {
            local_id: status.local_id.clone(),
            state: status.state.clone(),
            chunks_sent: status.chunks_sent,
            chunk_count: status.chunk_count,
        });
    }
}
