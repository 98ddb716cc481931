//! Paginated, sorted image list for one scope.
//!
//! An [`AlbumImageStore`] owns the images of a single album or smart album.
//! Pages are fetched through the [`NetworkClient`] and merged in order; ids
//! are unique within the store. Every full reload bumps a generation counter
//! and page results tagged with an older generation are dropped, so a reload
//! started while a page is in flight always wins. Concurrent requests for
//! the next page attach to the fetch already running instead of starting a
//! second one.

mod list;

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use piwigo_model::{ImageEdit, ImageId, ImageRecord, ImageScope, ImageSort};
use tracing::{debug, info, warn};

use crate::error::{CacheError, ClientResult, Result};
use crate::events::{CacheEvent, EventBus};
use crate::network::{ImagePage, ImagePageRequest, NetworkClient};
use crate::registry::CategoryRegistry;

use list::{ImageList, Placement};

/// Result of a load request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and merged.
    Loaded {
        /// Zero-based index of the page.
        page: u32,
        /// Records that were not in the store before.
        new_images: usize,
        has_more: bool,
    },
    /// Every page is already loaded; nothing was requested.
    Exhausted,
    /// A newer reload, sort change or invalidation made the result stale.
    Superseded,
    /// The requested sort was already active.
    Unchanged,
}

/// Progress report of [`AlbumImageStore::load_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    /// Pages loaded so far.
    pub pages_loaded: u32,
    /// Expected page count, when the server reported a total.
    pub pages_known: Option<u32>,
}

type SharedFetch = Shared<BoxFuture<'static, Result<LoadOutcome>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MergeMode {
    Replace,
    Append,
}

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

struct StoreState {
    images: ImageList,
    sort: ImageSort,
    next_page: u32,
    has_more: bool,
    generation: u64,
    total_count: Option<u64>,
    in_flight: Option<InFlight>,
}

impl StoreState {
    fn new(sort: ImageSort) -> Self {
        Self {
            images: ImageList::default(),
            sort,
            next_page: 0,
            has_more: true,
            generation: 0,
            total_count: None,
            in_flight: None,
        }
    }

    fn reset_content(&mut self) {
        self.images.clear();
        self.next_page = 0;
        self.has_more = true;
        self.total_count = None;
    }

    fn current_fetch(&self) -> Option<SharedFetch> {
        self.in_flight
            .as_ref()
            .filter(|in_flight| in_flight.generation == self.generation)
            .map(|in_flight| in_flight.fetch.clone())
    }
}

struct StoreInner {
    scope: ImageScope,
    client: Arc<dyn NetworkClient>,
    registry: Weak<CategoryRegistry>,
    events: EventBus,
    page_size: u32,
    state: Mutex<StoreState>,
}

/// Cached image list of one scope. Cloning yields another handle on the
/// same store.
#[derive(Clone)]
pub struct AlbumImageStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for AlbumImageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("AlbumImageStore")
            .field("scope", &self.inner.scope)
            .field("images", &state.images.len())
            .field("sort", &state.sort)
            .field("generation", &state.generation)
            .field("has_more", &state.has_more)
            .finish()
    }
}

impl AlbumImageStore {
    pub(crate) fn new(
        scope: ImageScope,
        client: Arc<dyn NetworkClient>,
        registry: Weak<CategoryRegistry>,
        events: EventBus,
        page_size: u32,
        sort: ImageSort,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                scope,
                client,
                registry,
                events,
                page_size: page_size.max(1),
                state: Mutex::new(StoreState::new(sort)),
            }),
        }
    }

    pub fn scope(&self) -> &ImageScope {
        &self.inner.scope
    }

    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }

    pub fn sort(&self) -> ImageSort {
        self.inner.state.lock().sort
    }

    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    pub fn has_more(&self) -> bool {
        self.inner.state.lock().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().current_fetch().is_some()
    }

    /// Pages merged since the last reload.
    pub fn loaded_pages(&self) -> u32 {
        self.inner.state.lock().next_page
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().images.is_empty()
    }

    /// Total reported by the server for the whole list, adjusted by local
    /// removals and insertions.
    pub fn total_count(&self) -> Option<u64> {
        self.inner.state.lock().total_count
    }

    /// Snapshot of the records in display order.
    pub fn images(&self) -> Vec<ImageRecord> {
        self.inner.state.lock().images.records().to_vec()
    }

    pub fn image_ids(&self) -> Vec<ImageId> {
        self.inner
            .state
            .lock()
            .images
            .records()
            .iter()
            .map(|record| record.id)
            .collect()
    }

    pub fn image(&self, id: ImageId) -> Option<ImageRecord> {
        self.inner.state.lock().images.get(id).cloned()
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.inner.state.lock().images.contains(id)
    }

    /// Discard the content and fetch the first page again.
    ///
    /// On failure the previous content is left untouched. If another reload
    /// starts before this one completes, this call returns
    /// [`LoadOutcome::Superseded`] and its page is ignored.
    pub async fn reload(&self) -> Result<LoadOutcome> {
        let fetch = {
            let mut state = self.inner.state.lock();
            self.begin_reload(&mut state)
        };
        fetch.await
    }

    /// Fetch the next page and append it.
    ///
    /// Attaches to the fetch in progress when there is one, so concurrent
    /// callers trigger a single request and share its outcome.
    pub async fn load_next_page(&self) -> Result<LoadOutcome> {
        let fetch = {
            let mut state = self.inner.state.lock();
            if let Some(fetch) = state.current_fetch() {
                debug!(scope = %self.inner.scope, "joining page fetch in progress");
                fetch
            } else if !state.has_more {
                return Ok(LoadOutcome::Exhausted);
            } else {
                let page = state.next_page;
                let mode = if page == 0 {
                    MergeMode::Replace
                } else {
                    MergeMode::Append
                };
                self.start_fetch(&mut state, page, mode)
            }
        };
        fetch.await
    }

    /// Load pages until the server has no more, reporting progress after
    /// each page.
    ///
    /// Stops at the first failure; pages merged before it stay in the store.
    pub async fn load_all<F>(&self, mut progress: F) -> Result<LoadOutcome>
    where
        F: FnMut(LoadProgress) + Send,
    {
        let mut last = LoadOutcome::Exhausted;
        loop {
            match self.load_next_page().await? {
                outcome @ LoadOutcome::Loaded { has_more, .. } => {
                    progress(self.progress());
                    last = outcome;
                    if !has_more {
                        break;
                    }
                }
                LoadOutcome::Superseded => return Ok(LoadOutcome::Superseded),
                LoadOutcome::Exhausted | LoadOutcome::Unchanged => break,
            }
        }
        Ok(last)
    }

    /// Switch the sort order: the content is dropped at once and the first
    /// page is fetched under the new order.
    pub async fn change_sort(&self, sort: ImageSort) -> Result<LoadOutcome> {
        let fetch = {
            let mut state = self.inner.state.lock();
            if state.sort == sort {
                return Ok(LoadOutcome::Unchanged);
            }
            info!(scope = %self.inner.scope, from = %state.sort, to = %sort, "changing sort");
            state.sort = sort;
            state.reset_content();
            self.begin_reload(&mut state)
        };
        self.notify_changed();
        fetch.await
    }

    /// Apply a local edit. Returns `false` when the image is not here.
    pub fn apply_edit(&self, id: ImageId, edit: &ImageEdit) -> bool {
        let applied = {
            let mut state = self.inner.state.lock();
            match state.images.get_mut(id) {
                Some(record) => {
                    record.apply_edit(edit);
                    true
                }
                None => false,
            }
        };
        if applied {
            self.notify_changed();
        }
        applied
    }

    pub fn remove_image(&self, id: ImageId) -> bool {
        self.remove_images(&[id]) == 1
    }

    /// Remove images from this list and shift the album counters by the
    /// number actually removed. Ids not present are ignored.
    pub fn remove_images(&self, ids: &[ImageId]) -> usize {
        let removed = self.discard(ids);
        if removed > 0
            && let Some(album) = self.inner.scope.real_album()
            && let Some(registry) = self.inner.registry.upgrade()
        {
            registry.adjust_image_counts(album, -(removed as i64));
        }
        removed
    }

    /// Insert a record at the position the current sort gives it. A record
    /// with the same id is replaced in place. While more pages remain, a
    /// record sorting after the last loaded one is not inserted: it arrives
    /// with its page. Returns `true` when the image was new to the store;
    /// counters move in that case either way.
    pub fn add_image(&self, record: ImageRecord) -> bool {
        let inserted = self.insert(record);
        if inserted
            && let Some(album) = self.inner.scope.real_album()
            && let Some(registry) = self.inner.registry.upgrade()
        {
            registry.adjust_image_counts(album, 1);
        }
        inserted
    }

    /// Drop the content and make every pending fetch stale. The next
    /// `load_next_page` starts over from the first page.
    pub fn invalidate(&self) {
        {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.in_flight = None;
            state.reset_content();
            debug!(scope = %self.inner.scope, generation = state.generation, "store invalidated");
        }
        self.notify_changed();
    }

    /// Removal without counter bookkeeping, for changes whose counters are
    /// handled by the registry.
    pub(crate) fn discard(&self, ids: &[ImageId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let wanted: HashSet<ImageId> = ids.iter().copied().collect();
        let removed = {
            let mut state = self.inner.state.lock();
            let removed = state.images.remove(&wanted);
            if let Some(total) = state.total_count.as_mut() {
                *total = total.saturating_sub(removed.len() as u64);
            }
            removed
        };
        if !removed.is_empty() {
            debug!(scope = %self.inner.scope, removed = removed.len(), "images removed");
            self.notify_changed();
        }
        removed.len()
    }

    /// Insertion without counter bookkeeping. Returns `true` when the image
    /// is new to the list, including when it sorts past the loaded pages and
    /// is left for a later page.
    pub(crate) fn insert(&self, record: ImageRecord) -> bool {
        let id = record.id;
        let placement = {
            let mut state = self.inner.state.lock();
            let (sort, more_pages) = (state.sort, state.has_more);
            let placement = state.images.insert_sorted(record, sort, more_pages);
            if placement.is_new()
                && let Some(total) = state.total_count.as_mut()
            {
                *total += 1;
            }
            placement
        };
        match placement {
            Placement::Deferred => {
                debug!(scope = %self.inner.scope, image = %id, "image past loaded pages")
            }
            Placement::Inserted | Placement::Replaced => self.notify_changed(),
        }
        placement.is_new()
    }

    /// Overwrite the cached copy of `record`, keeping its position.
    pub(crate) fn refresh(&self, record: &ImageRecord) -> bool {
        let refreshed = {
            let mut state = self.inner.state.lock();
            match state.images.get_mut(record.id) {
                Some(existing) => {
                    existing.clone_from(record);
                    true
                }
                None => false,
            }
        };
        if refreshed {
            self.notify_changed();
        }
        refreshed
    }

    fn progress(&self) -> LoadProgress {
        let state = self.inner.state.lock();
        let page_size = u64::from(self.inner.page_size);
        LoadProgress {
            pages_loaded: state.next_page,
            pages_known: state
                .total_count
                .map(|total| u32::try_from(total.div_ceil(page_size)).unwrap_or(u32::MAX)),
        }
    }

    fn begin_reload(&self, state: &mut StoreState) -> SharedFetch {
        state.generation += 1;
        debug!(scope = %self.inner.scope, generation = state.generation, "reload started");
        self.start_fetch(state, 0, MergeMode::Replace)
    }

    fn start_fetch(&self, state: &mut StoreState, page: u32, mode: MergeMode) -> SharedFetch {
        let generation = state.generation;
        let request = ImagePageRequest {
            scope: self.inner.scope.clone(),
            page,
            per_page: self.inner.page_size,
            sort: state.sort,
        };
        let client = Arc::clone(&self.inner.client);
        let weak = Arc::downgrade(&self.inner);

        let fetch = async move {
            let result = client.list_images(&request).await;
            let Some(inner) = weak.upgrade() else {
                return Ok(LoadOutcome::Superseded);
            };
            let store = AlbumImageStore { inner };
            match store.complete_fetch(generation, mode, &request, result) {
                Err(err) if err.is_stale() => Ok(LoadOutcome::Superseded),
                other => other,
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlight {
            generation,
            fetch: fetch.clone(),
        });
        fetch
    }

    fn complete_fetch(
        &self,
        generation: u64,
        mode: MergeMode,
        request: &ImagePageRequest,
        result: ClientResult<ImagePage>,
    ) -> Result<LoadOutcome> {
        let outcome = {
            let mut state = self.inner.state.lock();
            if state.generation != generation {
                debug!(
                    scope = %self.inner.scope,
                    page = request.page,
                    stale = generation,
                    current = state.generation,
                    "dropping stale page"
                );
                return Err(CacheError::StaleOperation { generation });
            }
            state.in_flight = None;

            let page = match result {
                Ok(page) => page,
                Err(err) => {
                    warn!(scope = %self.inner.scope, page = request.page, error = %err, "page fetch failed");
                    return Err(err.into());
                }
            };

            let returned = page.images.len();
            let new_images = match mode {
                MergeMode::Replace => {
                    state.total_count = page.total_count;
                    state.images.replace(page.images)
                }
                MergeMode::Append => {
                    state.total_count = page.total_count.or(state.total_count);
                    state.images.merge(page.images)
                }
            };
            state.next_page = request.page + 1;
            state.has_more = page.has_more && returned >= request.per_page as usize;

            debug!(
                scope = %self.inner.scope,
                page = request.page,
                returned,
                new_images,
                has_more = state.has_more,
                "page merged"
            );
            LoadOutcome::Loaded {
                page: request.page,
                new_images,
                has_more: state.has_more,
            }
        };
        self.notify_changed();
        Ok(outcome)
    }

    fn notify_changed(&self) {
        self.inner.events.publish(CacheEvent::ImagesChanged {
            scope: self.inner.scope.clone(),
        });
    }
}
