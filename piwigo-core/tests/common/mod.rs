#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use piwigo_core::model::{
    AlbumId, AlbumRecord, ImageId, ImageRecord, ImageScope, TagId, TagRecord, UploadChunk,
};
use piwigo_core::{
    AlbumMutation, CacheSettings, ClientError, ClientResult, ImageMutation, ImagePage,
    ImagePageRequest, NetworkClient, PiwigoCache, TagListing,
};
use tokio::sync::oneshot;

/// In-memory stand-in for a Piwigo server.
///
/// Listing responses are computed when the request arrives; a queued gate
/// then holds the response back until the test releases it.
#[derive(Debug, Default)]
pub struct FakeServer {
    albums: Mutex<Vec<AlbumRecord>>,
    images: Mutex<HashMap<ImageScope, Vec<ImageRecord>>>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    failures: Mutex<VecDeque<ClientError>>,
    requests: Mutex<Vec<ImagePageRequest>>,
    album_mutations: Mutex<Vec<AlbumMutation>>,
    image_mutations: Mutex<Vec<ImageMutation>>,
    checksums: Mutex<HashMap<String, ImageId>>,
    chunks: Mutex<Vec<(String, usize, usize, usize)>>,
    failing_uploads: Mutex<HashMap<String, ClientError>>,
    tags: Mutex<Vec<TagRecord>>,
    created_tags: Mutex<Vec<String>>,
    next_id: Mutex<i64>,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        let server = Self::default();
        *server.next_id.lock() = 1000;
        Arc::new(server)
    }

    pub fn set_albums(&self, albums: Vec<AlbumRecord>) {
        *self.albums.lock() = albums;
    }

    pub fn set_images(&self, scope: ImageScope, images: Vec<ImageRecord>) {
        self.images.lock().insert(scope, images);
    }

    /// Hold back the next listing response until the sender fires.
    pub fn gate_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }

    pub fn fail_next(&self, err: ClientError) {
        self.failures.lock().push_back(err);
    }

    pub fn requests(&self) -> Vec<ImagePageRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn image_mutations(&self) -> Vec<ImageMutation> {
        self.image_mutations.lock().clone()
    }

    pub fn album_mutations(&self) -> Vec<AlbumMutation> {
        self.album_mutations.lock().clone()
    }

    pub fn known_checksum(&self, md5: &str, id: ImageId) {
        self.checksums.lock().insert(md5.to_string(), id);
    }

    /// `(file name, chunk, chunks, bytes)` in arrival order.
    pub fn chunks(&self) -> Vec<(String, usize, usize, usize)> {
        self.chunks.lock().clone()
    }

    pub fn fail_uploads_of(&self, file_name: &str, err: ClientError) {
        self.failing_uploads.lock().insert(file_name.to_string(), err);
    }

    pub fn allow_uploads_of(&self, file_name: &str) {
        self.failing_uploads.lock().remove(file_name);
    }

    pub fn set_tags(&self, tags: Vec<TagRecord>) {
        *self.tags.lock() = tags;
    }

    pub fn created_tags(&self) -> Vec<String> {
        self.created_tags.lock().clone()
    }

    pub async fn wait_for_requests(&self, count: usize) {
        while self.request_count() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl NetworkClient for FakeServer {
    async fn list_albums(&self) -> ClientResult<Vec<AlbumRecord>> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        Ok(self.albums.lock().clone())
    }

    async fn list_images(&self, request: &ImagePageRequest) -> ClientResult<ImagePage> {
        self.requests.lock().push(request.clone());

        let response = match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => {
                let mut all = self
                    .images
                    .lock()
                    .get(&request.scope)
                    .cloned()
                    .unwrap_or_default();
                if request.sort.is_deterministic() {
                    all.sort_by(|a, b| {
                        request
                            .sort
                            .compare(a, b)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });
                }
                let start = (request.page * request.per_page) as usize;
                let end = (start + request.per_page as usize).min(all.len());
                let slice = all.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
                Ok(ImagePage::new(slice, end < all.len()).with_total(all.len() as u64))
            }
        };

        let gate = self.gates.lock().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        response
    }

    async fn mutate_album(&self, mutation: &AlbumMutation) -> ClientResult<Option<AlbumRecord>> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        self.album_mutations.lock().push(mutation.clone());
        match mutation {
            AlbumMutation::Create { name, parent, .. } => {
                let id = {
                    let mut next = self.next_id.lock();
                    *next += 1;
                    *next as i32
                };
                Ok(Some(AlbumRecord::new(AlbumId(id), name.clone(), *parent)))
            }
            _ => Ok(None),
        }
    }

    async fn mutate_image(&self, mutation: &ImageMutation) -> ClientResult<Option<ImageRecord>> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        self.image_mutations.lock().push(mutation.clone());
        Ok(None)
    }

    async fn image_info(&self, id: ImageId) -> ClientResult<ImageRecord> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        self.images
            .lock()
            .values()
            .flatten()
            .find(|record| record.id == id)
            .cloned()
            .ok_or_else(|| ClientError::Server {
                code: 404,
                message: format!("image {id} not found"),
            })
    }

    async fn list_tags(&self, listing: TagListing) -> ClientResult<Vec<TagRecord>> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        let tags = self.tags.lock().clone();
        Ok(match listing {
            TagListing::Visible => tags.into_iter().filter(TagRecord::is_used).collect(),
            TagListing::Admin => tags
                .into_iter()
                .map(|mut tag| {
                    tag.image_count = None;
                    tag
                })
                .collect(),
        })
    }

    async fn create_tag(&self, name: &str) -> ClientResult<TagRecord> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        self.created_tags.lock().push(name.to_string());
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next as i32
        };
        let tag = TagRecord::new(TagId(id), name).with_image_count(0);
        self.tags.lock().push(tag.clone());
        Ok(tag)
    }

    async fn find_image_by_checksum(&self, md5: &str) -> ClientResult<Option<ImageId>> {
        Ok(self.checksums.lock().get(md5).copied())
    }

    async fn upload_chunk(&self, chunk: &UploadChunk<'_>) -> ClientResult<Option<ImageRecord>> {
        let file = chunk.request.file_name.clone();
        if let Some(err) = self.failing_uploads.lock().get(&file).cloned() {
            return Err(err);
        }
        self.chunks
            .lock()
            .push((file.clone(), chunk.chunk, chunk.chunks, chunk.data.len()));
        if !chunk.is_last() {
            return Ok(None);
        }
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        let title = chunk.request.title.clone().unwrap_or_default();
        Ok(Some(
            ImageRecord::new(ImageId(id))
                .with_title(title)
                .with_file_name(file)
                .in_album(chunk.request.album),
        ))
    }
}

pub fn image(id: i64, album: i32) -> ImageRecord {
    ImageRecord::new(ImageId(id))
        .with_title(format!("Image {id}"))
        .in_album(AlbumId(album))
}

pub fn album(id: i32, parent: i32, direct: u64, total: u64) -> AlbumRecord {
    AlbumRecord::new(AlbumId(id), format!("Album {id}"), AlbumId(parent)).with_counts(direct, total)
}

pub fn tag(id: i32, name: &str, count: u64) -> TagRecord {
    TagRecord::new(TagId(id), name).with_image_count(count)
}

pub fn ids(records: &[ImageRecord]) -> Vec<i64> {
    records.iter().map(|record| record.id.0).collect()
}

pub fn settings(page_size: u32) -> CacheSettings {
    CacheSettings {
        images_per_page: page_size,
        upload_chunk_size_kib: 1,
        ..Default::default()
    }
}

pub fn cache(server: &Arc<FakeServer>, page_size: u32) -> PiwigoCache {
    let client: Arc<dyn NetworkClient> = server.clone();
    PiwigoCache::new(client, settings(page_size)).expect("valid settings")
}
