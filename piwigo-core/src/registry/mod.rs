//! In-memory album tree plus the table of live image stores.
//!
//! The registry is the single owner of album metadata. Parent links are
//! resolved lazily: an album whose parent is not (yet) known is kept and
//! reported as unresolved rather than dropped. Deleting an album does not
//! cascade; its descendants stay in the registry flagged as orphaned until
//! the next full refresh.
//!
//! Image stores are owned here too, one per [`ImageScope`], so changes that
//! touch several lists (a deletion, an edit, a finished upload) can be fanned
//! out to every store that holds the image.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::{Mutex, RwLock};
use piwigo_model::{AlbumId, AlbumRecord, ImageEdit, ImageId, ImageRecord, ImageScope};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, EventBus};
use crate::store::AlbumImageStore;

/// What a full replacement did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// `false` when the new tree equals the old one in order and content.
    pub changed: bool,
    /// Albums whose parent is not in the tree.
    pub unresolved: Vec<AlbumId>,
}

#[derive(Debug, Default)]
struct RegistryState {
    albums: HashMap<AlbumId, AlbumRecord>,
    /// Ids in server rank order.
    order: Vec<AlbumId>,
    unresolved: BTreeSet<AlbumId>,
    orphaned: BTreeSet<AlbumId>,
}

impl RegistryState {
    fn parent_resolves(&self, album: &AlbumRecord) -> bool {
        album.parent_id.is_root() || self.albums.contains_key(&album.parent_id)
    }

    fn refresh_unresolved(&mut self) {
        self.unresolved = self
            .albums
            .values()
            .filter(|album| !self.parent_resolves(album))
            .map(|album| album.id)
            .collect();
    }

    /// Parent chain of `id`, nearest first. Stops at the root, at an unknown
    /// parent, or when a cycle closes.
    fn ancestor_ids(&self, id: AlbumId) -> Vec<AlbumId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.albums.get(&id).map(|album| album.parent_id);
        while let Some(parent) = current {
            if parent.is_root() || !seen.insert(parent) {
                break;
            }
            let Some(album) = self.albums.get(&parent) else {
                break;
            };
            chain.push(parent);
            current = Some(album.parent_id);
        }
        chain
    }

    fn descendant_ids(&self, id: AlbumId) -> Vec<AlbumId> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut frontier = vec![id];
        while let Some(parent) = frontier.pop() {
            for child in self.order.iter().copied() {
                let is_child = self
                    .albums
                    .get(&child)
                    .is_some_and(|album| album.parent_id == parent);
                if is_child && seen.insert(child) {
                    found.push(child);
                    frontier.push(child);
                }
            }
        }
        found
    }

    /// Would making `parent` the parent of `id` close a loop?
    fn creates_cycle(&self, id: AlbumId, parent: AlbumId) -> bool {
        parent == id || self.ancestor_ids(parent).contains(&id)
    }
}

/// Album metadata registry and owner of the image stores.
#[derive(Debug)]
pub struct CategoryRegistry {
    state: RwLock<RegistryState>,
    stores: Mutex<HashMap<ImageScope, AlbumImageStore>>,
    events: EventBus,
}

impl CategoryRegistry {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            stores: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Replace the whole tree with a fresh listing.
    ///
    /// The batch is rejected as a whole if any album names itself as parent
    /// or is not a real album. Duplicate ids keep the last record at the
    /// position of the first.
    pub fn replace_all(&self, records: Vec<AlbumRecord>) -> Result<ReplaceOutcome> {
        if let Some(bad) = records.iter().find(|album| !album.id.is_real()) {
            return Err(CacheError::invalid_state(format!(
                "album id {} is not a real album",
                bad.id
            )));
        }
        if let Some(bad) = records.iter().find(|album| album.parent_id == album.id) {
            return Err(CacheError::invalid_state(format!(
                "album {} is its own parent",
                bad.id
            )));
        }

        let mut fresh = RegistryState::default();
        for record in records {
            if !fresh.albums.contains_key(&record.id) {
                fresh.order.push(record.id);
            }
            fresh.albums.insert(record.id, record);
        }
        fresh.refresh_unresolved();

        let outcome = {
            let mut state = self.state.write();
            let changed = state.order != fresh.order
                || fresh.order.iter().any(|id| {
                    match (state.albums.get(id), fresh.albums.get(id)) {
                        (Some(old), Some(new)) => !old.same_content(new),
                        _ => true,
                    }
                });
            *state = fresh;
            ReplaceOutcome {
                changed,
                unresolved: state.unresolved.iter().copied().collect(),
            }
        };

        if !outcome.unresolved.is_empty() {
            warn!(unresolved = ?outcome.unresolved, "albums with unknown parents");
        }
        info!(changed = outcome.changed, "album tree replaced");
        if outcome.changed {
            self.events.publish(CacheEvent::TreeChanged);
        }
        Ok(outcome)
    }

    /// Insert or replace one album. Returns `true` when the registry changed.
    ///
    /// Fails with [`CacheError::InvalidState`] when `record.id` differs from
    /// `id`, when `id` is not a real album, or when the new parent link would
    /// make the album its own ancestor.
    pub fn upsert(&self, id: AlbumId, record: AlbumRecord) -> Result<bool> {
        if record.id != id {
            return Err(CacheError::invalid_state(format!(
                "record id {} does not match album {id}",
                record.id
            )));
        }
        if !id.is_real() {
            return Err(CacheError::invalid_state(format!(
                "album id {id} is not a real album"
            )));
        }

        let changed = {
            let mut state = self.state.write();
            if state.creates_cycle(id, record.parent_id) {
                return Err(CacheError::invalid_state(format!(
                    "album {id} cannot be placed under {}",
                    record.parent_id
                )));
            }

            let previous = state.albums.get(&id).map(|existing| existing.same_content(&record));
            if previous.is_none() {
                state.order.push(id);
            }
            let changed = previous != Some(true);
            if state.parent_resolves(&record) {
                state.orphaned.remove(&id);
            }
            state.albums.insert(id, record);
            state.refresh_unresolved();
            changed
        };

        if changed {
            debug!(album = %id, "album upserted");
            self.events.publish(CacheEvent::TreeChanged);
        }
        Ok(changed)
    }

    /// Remove one album. Its descendants are kept and flagged as orphaned,
    /// and its image store, if any, is dropped.
    pub fn delete(&self, id: AlbumId) -> Option<AlbumRecord> {
        let (removed, orphaned) = {
            let mut state = self.state.write();
            let orphaned = state.descendant_ids(id);
            let removed = state.albums.remove(&id)?;
            state.order.retain(|other| *other != id);
            state.orphaned.remove(&id);
            state.orphaned.extend(orphaned.iter().copied());
            if let Some(parent) = state.albums.get_mut(&removed.parent_id) {
                parent.nb_sub_albums = parent.nb_sub_albums.saturating_sub(1);
            }
            state.refresh_unresolved();
            (removed, orphaned)
        };

        let store = self.stores.lock().remove(&ImageScope::Album(id));
        if let Some(store) = store {
            store.invalidate();
        }

        info!(album = %id, orphaned = orphaned.len(), "album deleted");
        self.events.publish(CacheEvent::AlbumRemoved {
            album: id,
            orphaned,
        });
        self.events.publish(CacheEvent::TreeChanged);
        Some(removed)
    }

    pub fn get(&self, id: AlbumId) -> Option<AlbumRecord> {
        self.state.read().albums.get(&id).cloned()
    }

    pub fn contains(&self, id: AlbumId) -> bool {
        self.state.read().albums.contains_key(&id)
    }

    /// Direct children of `id` in rank order. [`AlbumId::ROOT`] lists the
    /// top-level albums.
    pub fn children_of(&self, id: AlbumId) -> Vec<AlbumRecord> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|child| state.albums.get(child))
            .filter(|album| album.parent_id == id)
            .cloned()
            .collect()
    }

    /// Ancestors of `id`, nearest first, excluding the root.
    pub fn ancestors(&self, id: AlbumId) -> Vec<AlbumRecord> {
        let state = self.state.read();
        state
            .ancestor_ids(id)
            .into_iter()
            .filter_map(|ancestor| state.albums.get(&ancestor).cloned())
            .collect()
    }

    /// Every album in rank order.
    pub fn albums(&self) -> Vec<AlbumRecord> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.albums.get(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().albums.is_empty()
    }

    pub fn unresolved(&self) -> Vec<AlbumId> {
        self.state.read().unresolved.iter().copied().collect()
    }

    pub fn is_orphaned(&self, id: AlbumId) -> bool {
        self.state.read().orphaned.contains(&id)
    }

    pub fn orphaned(&self) -> Vec<AlbumId> {
        self.state.read().orphaned.iter().copied().collect()
    }

    /// Shift the direct counter of `album` and the recursive counters of the
    /// album and all its ancestors. Unknown albums are ignored.
    pub fn adjust_image_counts(&self, album: AlbumId, delta: i64) {
        self.shift_counts(album, delta, true);
    }

    /// Shift only the recursive counters of `album` and its ancestors, for
    /// subtrees moving in or out.
    pub fn adjust_recursive_counts(&self, album: AlbumId, delta: i64) {
        self.shift_counts(album, delta, false);
    }

    pub fn adjust_sub_album_count(&self, album: AlbumId, delta: i32) {
        let mut state = self.state.write();
        if let Some(record) = state.albums.get_mut(&album) {
            record.nb_sub_albums = record.nb_sub_albums.saturating_add_signed(delta);
        }
    }

    /// Ancestor chain for an album placed under `parent`, root-most first,
    /// ending with `id`.
    pub fn upper_categories(&self, parent: AlbumId, id: AlbumId) -> Vec<AlbumId> {
        let mut chain = Vec::new();
        if !parent.is_root() {
            let state = self.state.read();
            chain = state.ancestor_ids(parent);
            chain.reverse();
            chain.push(parent);
        }
        chain.push(id);
        chain
    }

    /// Would placing `id` under `parent` make it its own ancestor?
    pub fn would_cycle(&self, id: AlbumId, parent: AlbumId) -> bool {
        self.state.read().creates_cycle(id, parent)
    }

    fn shift_counts(&self, album: AlbumId, delta: i64, direct: bool) {
        if delta == 0 {
            return;
        }
        let changed: Vec<(AlbumId, u64, u64)> = {
            let mut state = self.state.write();
            let ancestors = state.ancestor_ids(album);
            let Some(record) = state.albums.get_mut(&album) else {
                return;
            };
            if direct {
                record.adjust_direct_count(delta);
            } else {
                record.adjust_total_count(delta);
            }
            let mut changed = vec![(album, record.nb_images, record.total_nb_images)];
            for ancestor in ancestors {
                if let Some(record) = state.albums.get_mut(&ancestor) {
                    record.adjust_total_count(delta);
                    changed.push((ancestor, record.nb_images, record.total_nb_images));
                }
            }
            changed
        };

        debug!(album = %album, delta, direct, "image counters adjusted");
        for (album, nb_images, total_nb_images) in changed {
            self.events.publish(CacheEvent::AlbumCountersChanged {
                album,
                nb_images,
                total_nb_images,
            });
        }
    }

    /// The store registered for `scope`, created with `create` on first use.
    pub fn store_or_insert_with<F>(&self, scope: ImageScope, create: F) -> AlbumImageStore
    where
        F: FnOnce() -> AlbumImageStore,
    {
        self.stores.lock().entry(scope).or_insert_with(create).clone()
    }

    pub fn store(&self, scope: &ImageScope) -> Option<AlbumImageStore> {
        self.stores.lock().get(scope).cloned()
    }

    /// Forget the store of `scope`. Outstanding handles keep working but are
    /// no longer reached by fan-out.
    pub fn evict_store(&self, scope: &ImageScope) -> Option<AlbumImageStore> {
        self.stores.lock().remove(scope)
    }

    pub fn store_count(&self) -> usize {
        self.stores.lock().len()
    }

    /// Search every store for a record.
    pub fn find_image(&self, id: ImageId) -> Option<ImageRecord> {
        self.live_stores()
            .iter()
            .find_map(|store| store.image(id))
    }

    /// Remove images from every store. Counters are not touched; the caller
    /// knows which albums lost them. Returns the number of stores affected.
    pub fn fan_out_removed(&self, ids: &[ImageId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let touched = self
            .live_stores()
            .iter()
            .filter(|store| store.discard(ids) > 0)
            .count();
        self.events.publish(CacheEvent::ImagesRemoved { ids: ids.to_vec() });
        touched
    }

    /// Apply an edit in every store holding the image. Returns the number of
    /// stores affected.
    pub fn fan_out_edit(&self, id: ImageId, edit: &ImageEdit) -> usize {
        self.live_stores()
            .iter()
            .filter(|store| store.apply_edit(id, edit))
            .count()
    }

    /// Overwrite every cached copy of `record` in place. Returns the number
    /// of stores holding it.
    pub fn replace_cached(&self, record: &ImageRecord) -> usize {
        self.live_stores()
            .iter()
            .filter(|store| store.refresh(record))
            .count()
    }

    /// Record a new image in `album`: counters move once, and the album's
    /// store takes the record if it exists. Returns `true` when a store
    /// received it.
    pub fn fan_out_added(&self, album: AlbumId, record: ImageRecord) -> bool {
        let store = self.store(&ImageScope::Album(album));
        let inserted = store.is_some_and(|store| store.insert(record));
        self.adjust_image_counts(album, 1);
        inserted
    }

    /// Drop every album and every store. Live store handles are invalidated
    /// so their pending fetches resolve as superseded.
    pub fn clear_cache(&self) {
        let stores: Vec<AlbumImageStore> = self.stores.lock().drain().map(|(_, s)| s).collect();
        for store in &stores {
            store.invalidate();
        }
        *self.state.write() = RegistryState::default();
        info!(stores = stores.len(), "cache cleared");
        self.events.publish(CacheEvent::Cleared);
    }

    fn live_stores(&self) -> Vec<AlbumImageStore> {
        self.stores.lock().values().cloned().collect()
    }
}
