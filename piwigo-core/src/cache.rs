//! Composition root tying the registry, the stores and the upload queue to
//! one server session.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use piwigo_model::{
    AlbumId, AlbumRecord, ImageEdit, ImageId, ImageRecord, ImageScope, ImageSort, TagRecord,
};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, EventBus};
use crate::network::{AlbumMutation, ImageMutation, NetworkClient, TagListing};
use crate::registry::{CategoryRegistry, ReplaceOutcome};
use crate::settings::CacheSettings;
use crate::store::AlbumImageStore;
use crate::tags::TagDirectory;
use crate::upload::UploadQueue;

/// Everything cached for one logged-in session.
///
/// Writes go to the server first; local state only changes once the server
/// confirmed the operation.
#[derive(Debug)]
pub struct PiwigoCache {
    client: Arc<dyn NetworkClient>,
    settings: CacheSettings,
    events: EventBus,
    registry: Arc<CategoryRegistry>,
    tags: TagDirectory,
    uploads: UploadQueue,
}

impl PiwigoCache {
    pub fn new(client: Arc<dyn NetworkClient>, settings: CacheSettings) -> Result<Self> {
        settings.validate()?;
        let events = EventBus::new(settings.event_capacity);
        let registry = Arc::new(CategoryRegistry::new(events.clone()));
        let uploads = UploadQueue::new(
            Arc::clone(&client),
            Arc::clone(&registry),
            events.clone(),
            settings.upload_chunk_bytes(),
        );
        let tags = TagDirectory::new(events.clone());
        Ok(Self {
            client,
            settings,
            events,
            registry,
            tags,
            uploads,
        })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn uploads(&self) -> &UploadQueue {
        &self.uploads
    }

    pub fn tags(&self) -> &TagDirectory {
        &self.tags
    }

    /// First load of the album tree after construction or a cache clear.
    pub async fn init(&self) -> Result<ReplaceOutcome> {
        let outcome = self.refresh_albums().await?;
        info!(
            albums = self.registry.len(),
            unresolved = outcome.unresolved.len(),
            "album tree loaded"
        );
        Ok(outcome)
    }

    /// Fetch the album tree and replace the registry content.
    #[instrument(skip(self))]
    pub async fn refresh_albums(&self) -> Result<ReplaceOutcome> {
        let albums = self.client.list_albums().await?;
        self.registry.replace_all(albums)
    }

    /// Fetch the tag list. Admins should use [`TagListing::Admin`] to see
    /// unused tags too. Returns whether the list changed.
    #[instrument(skip(self))]
    pub async fn refresh_tags(&self, listing: TagListing) -> Result<bool> {
        let tags = self.client.list_tags(listing).await?;
        Ok(self.tags.replace_all(tags))
    }

    /// Create a tag on the server. Names are compared without regard to case;
    /// an existing tag with the same name is rejected before any request.
    pub async fn create_tag(&self, name: &str) -> Result<TagRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CacheError::invalid_state("tag name is empty"));
        }
        if let Some(existing) = self.tags.by_name(name) {
            return Err(CacheError::invalid_state(format!(
                "tag {name:?} already exists as {}",
                existing.id
            )));
        }
        let tag = self.client.create_tag(name).await?;
        self.tags.upsert(tag.clone())?;
        info!(tag = %tag.id, name = %tag.name, "tag created");
        Ok(tag)
    }

    /// Fetch one image's details and overwrite every cached copy. Returns the
    /// fresh record and the number of stores that held it.
    pub async fn refresh_image(&self, id: ImageId) -> Result<(ImageRecord, usize)> {
        let record = self.client.image_info(id).await?;
        let updated = self.registry.replace_cached(&record);
        debug!(image = %id, stores = updated, "image refreshed");
        Ok((record, updated))
    }

    /// The store for `scope`, created with the default sort on first use.
    pub fn store(&self, scope: ImageScope) -> AlbumImageStore {
        self.store_with_sort(scope, ImageSort::default())
    }

    /// The store for `scope`. `sort` only applies when the store is created;
    /// use [`AlbumImageStore::change_sort`] on an existing one.
    pub fn store_with_sort(&self, scope: ImageScope, sort: ImageSort) -> AlbumImageStore {
        self.registry.store_or_insert_with(scope.clone(), || {
            AlbumImageStore::new(
                scope,
                Arc::clone(&self.client),
                Arc::downgrade(&self.registry),
                self.events.clone(),
                self.settings.images_per_page,
                sort,
            )
        })
    }

    /// Release a store, e.g. under memory pressure.
    pub fn evict_store(&self, scope: &ImageScope) -> bool {
        self.registry.evict_store(scope).is_some()
    }

    pub async fn create_album(
        &self,
        name: &str,
        parent: AlbumId,
        comment: Option<String>,
    ) -> Result<AlbumRecord> {
        if parent.is_virtual() {
            return Err(CacheError::invalid_state(format!(
                "cannot create an album under {parent}"
            )));
        }
        let created = self
            .client
            .mutate_album(&AlbumMutation::Create {
                name: name.to_string(),
                parent,
                comment,
            })
            .await?
            .ok_or_else(|| CacheError::Decode("album creation returned no album".into()))?;

        let mut album = created;
        album.parent_id = parent;
        album.upper_categories = self.registry.upper_categories(parent, album.id);
        self.registry.upsert(album.id, album.clone())?;
        self.registry.adjust_sub_album_count(parent, 1);
        info!(album = %album.id, parent = %parent, "album created");
        Ok(album)
    }

    pub async fn rename_album(
        &self,
        id: AlbumId,
        name: &str,
        comment: Option<String>,
    ) -> Result<AlbumRecord> {
        let mut album = self.known_album(id)?;
        self.client
            .mutate_album(&AlbumMutation::Rename {
                id,
                name: name.to_string(),
                comment: comment.clone(),
            })
            .await?;

        album.name = name.to_string();
        if let Some(comment) = comment {
            album.comment = comment;
        }
        self.registry.upsert(id, album.clone())?;
        Ok(album)
    }

    /// Move an album (and its subtree) under `new_parent`.
    pub async fn move_album(&self, id: AlbumId, new_parent: AlbumId) -> Result<AlbumRecord> {
        let mut album = self.known_album(id)?;
        if new_parent.is_virtual() || self.registry.would_cycle(id, new_parent) {
            return Err(CacheError::invalid_state(format!(
                "album {id} cannot be moved under {new_parent}"
            )));
        }
        if album.parent_id == new_parent {
            return Ok(album);
        }

        self.client
            .mutate_album(&AlbumMutation::Move { id, new_parent })
            .await?;

        let old_parent = album.parent_id;
        let subtree = album.total_nb_images as i64;
        self.registry.adjust_recursive_counts(old_parent, -subtree);
        self.registry.adjust_sub_album_count(old_parent, -1);

        album.parent_id = new_parent;
        album.upper_categories = self.registry.upper_categories(new_parent, id);
        self.registry.upsert(id, album.clone())?;

        self.registry.adjust_recursive_counts(new_parent, subtree);
        self.registry.adjust_sub_album_count(new_parent, 1);
        info!(album = %id, from = %old_parent, to = %new_parent, "album moved");
        Ok(album)
    }

    /// Delete an album on the server. Images stay on the server; locally the
    /// album's sub-albums are kept as orphans until the next refresh.
    pub async fn delete_album(&self, id: AlbumId) -> Result<AlbumRecord> {
        let album = self.known_album(id)?;
        self.client
            .mutate_album(&AlbumMutation::Delete { id })
            .await?;

        self.registry
            .adjust_recursive_counts(album.parent_id, -(album.total_nb_images as i64));
        let removed = self.registry.delete(id).unwrap_or(album);
        Ok(removed)
    }

    /// Save metadata changes, then apply them to every cached copy.
    /// Returns the number of stores updated.
    pub async fn set_image_info(&self, id: ImageId, edit: ImageEdit) -> Result<usize> {
        if edit.is_empty() {
            return Ok(0);
        }
        self.client
            .mutate_image(&ImageMutation::SetInfo {
                id,
                edit: edit.clone(),
            })
            .await?;
        Ok(self.registry.fan_out_edit(id, &edit))
    }

    /// Delete images on the server and drop them from every store. Counters
    /// of the albums the cached copies belonged to go down by one per image.
    pub async fn delete_images(&self, ids: &[ImageId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.client
            .mutate_image(&ImageMutation::Delete { ids: ids.to_vec() })
            .await?;

        let known = self.cached_records(ids);
        let mut deltas: BTreeMap<AlbumId, i64> = BTreeMap::new();
        for record in &known {
            for album in &record.album_ids {
                *deltas.entry(*album).or_default() -= 1;
            }
        }
        for (album, delta) in deltas {
            self.registry.adjust_image_counts(album, delta);
        }
        self.registry.fan_out_removed(ids);
        info!(requested = ids.len(), cached = known.len(), "images deleted");
        Ok(known.len())
    }

    /// Add images to `album`, keeping their other memberships.
    pub async fn associate_images(&self, ids: &[ImageId], album: AlbumId) -> Result<usize> {
        self.require_real(album)?;
        self.client
            .mutate_image(&ImageMutation::Associate {
                ids: ids.to_vec(),
                album,
            })
            .await?;
        Ok(self.add_memberships(ids, album))
    }

    /// Remove images from `album` only. The images stay on the server.
    pub async fn dissociate_images(&self, ids: &[ImageId], album: AlbumId) -> Result<usize> {
        self.require_real(album)?;
        self.client
            .mutate_image(&ImageMutation::Dissociate {
                ids: ids.to_vec(),
                album,
            })
            .await?;
        Ok(self.drop_memberships(ids, album))
    }

    /// Move images from one album to another.
    pub async fn move_images(&self, ids: &[ImageId], from: AlbumId, to: AlbumId) -> Result<usize> {
        self.require_real(from)?;
        self.require_real(to)?;
        if from == to {
            return Ok(0);
        }
        self.client
            .mutate_image(&ImageMutation::Move {
                ids: ids.to_vec(),
                from,
                to,
            })
            .await?;
        // Membership lookups read the cached copies, so add first.
        let moved = self.add_memberships(ids, to);
        self.drop_memberships(ids, from);
        Ok(moved)
    }

    /// Drop all cached albums, tags, stores and pending uploads.
    pub fn clear_cache(&self) {
        self.uploads.clear();
        self.tags.clear();
        self.registry.clear_cache();
    }

    /// End of session. Equivalent to [`PiwigoCache::clear_cache`] but
    /// consumes the cache.
    pub fn teardown(self) {
        self.clear_cache();
        info!("cache torn down");
    }

    fn known_album(&self, id: AlbumId) -> Result<AlbumRecord> {
        self.registry
            .get(id)
            .ok_or_else(|| CacheError::invalid_state(format!("unknown album {id}")))
    }

    fn require_real(&self, album: AlbumId) -> Result<()> {
        if album.is_real() {
            Ok(())
        } else {
            Err(CacheError::invalid_state(format!(
                "album {album} cannot hold images"
            )))
        }
    }

    fn cached_records(&self, ids: &[ImageId]) -> Vec<ImageRecord> {
        let unique: HashSet<ImageId> = ids.iter().copied().collect();
        unique
            .into_iter()
            .filter_map(|id| self.registry.find_image(id))
            .collect()
    }

    /// Record the new membership on cached copies. Returns how many images
    /// were newly counted in `album`.
    fn add_memberships(&self, ids: &[ImageId], album: AlbumId) -> usize {
        let target = self.registry.store(&ImageScope::Album(album));
        let mut added = 0;
        for mut record in self.cached_records(ids) {
            if record.belongs_to(album) {
                continue;
            }
            record.album_ids.insert(album);
            if let Some(store) = &target {
                store.insert(record.clone());
            }
            self.registry.replace_cached(&record);
            added += 1;
        }
        self.registry.adjust_image_counts(album, added as i64);
        added
    }

    /// Returns how many cached images left `album`.
    fn drop_memberships(&self, ids: &[ImageId], album: AlbumId) -> usize {
        let mut removed = Vec::new();
        for mut record in self.cached_records(ids) {
            if !record.album_ids.remove(&album) {
                continue;
            }
            self.registry.replace_cached(&record);
            removed.push(record.id);
        }
        if let Some(store) = self.registry.store(&ImageScope::Album(album)) {
            store.discard(ids);
        }
        self.registry
            .adjust_image_counts(album, -(removed.len() as i64));
        removed.len()
    }
}
