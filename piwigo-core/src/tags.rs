//! Tag list of the current server.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use piwigo_model::{TagId, TagRecord};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, EventBus};

/// Known tags keyed by id. Listings replace the content wholesale, so tags
/// deleted on the server disappear on the next refresh.
#[derive(Debug)]
pub struct TagDirectory {
    tags: RwLock<BTreeMap<TagId, TagRecord>>,
    events: EventBus,
}

impl TagDirectory {
    pub fn new(events: EventBus) -> Self {
        Self {
            tags: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Take a fresh listing. Returns whether anything changed.
    pub fn replace_all(&self, records: Vec<TagRecord>) -> bool {
        let fresh: BTreeMap<TagId, TagRecord> =
            records.into_iter().map(|tag| (tag.id, tag)).collect();
        let changed = {
            let mut tags = self.tags.write();
            let changed = *tags != fresh;
            *tags = fresh;
            changed
        };
        if changed {
            debug!(count = self.len(), "tags replaced");
            self.events.publish(CacheEvent::TagsChanged);
        }
        changed
    }

    /// Add or overwrite one tag.
    pub fn upsert(&self, record: TagRecord) -> Result<()> {
        if record.name.trim().is_empty() {
            return Err(CacheError::invalid_state(format!("tag {} has no name", record.id)));
        }
        self.tags.write().insert(record.id, record);
        self.events.publish(CacheEvent::TagsChanged);
        Ok(())
    }

    pub fn get(&self, id: TagId) -> Option<TagRecord> {
        self.tags.read().get(&id).cloned()
    }

    pub fn by_name(&self, name: &str) -> Option<TagRecord> {
        self.tags.read().values().find(|tag| tag.has_name(name)).cloned()
    }

    /// Every tag, sorted by name without regard to case.
    pub fn tags(&self) -> Vec<TagRecord> {
        let mut tags: Vec<TagRecord> = self.tags.read().values().cloned().collect();
        tags.sort_by_cached_key(|tag| (tag.name.to_lowercase(), tag.id));
        tags
    }

    /// Tags with at least one image, for pickers shown to non-admins.
    pub fn used(&self) -> Vec<TagRecord> {
        let mut tags = self.tags();
        tags.retain(TagRecord::is_used);
        tags
    }

    /// Names for `ids`, skipping unknown ids.
    pub fn names(&self, ids: &[TagId]) -> Vec<String> {
        let tags = self.tags.read();
        ids.iter()
            .filter_map(|id| tags.get(id).map(|tag| tag.name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tags.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.read().is_empty()
    }

    pub fn clear(&self) {
        self.tags.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: i32, name: &str, count: Option<u64>) -> TagRecord {
        TagRecord {
            image_count: count,
            ..TagRecord::new(TagId(id), name)
        }
    }

    #[test]
    fn listing_replaces_and_reports_changes() {
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let tags = TagDirectory::new(bus);

        assert!(tags.replace_all(vec![tag(2, "sky", Some(3)), tag(1, "Sea", Some(0))]));
        assert_eq!(events.try_recv().ok(), Some(CacheEvent::TagsChanged));
        assert!(!tags.replace_all(vec![tag(1, "Sea", Some(0)), tag(2, "sky", Some(3))]));
        assert!(events.try_recv().is_err());

        let names: Vec<_> = tags.tags().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Sea", "sky"]);
        assert_eq!(tags.used().len(), 1);

        assert!(tags.replace_all(vec![tag(2, "sky", Some(3))]));
        assert!(tags.get(TagId(1)).is_none());
    }

    #[test]
    fn lookups_by_name_and_id() {
        let tags = TagDirectory::new(EventBus::default());
        tags.replace_all(vec![tag(4, "Boats", None), tag(5, "Harbour", None)]);

        assert_eq!(tags.by_name("boats").map(|t| t.id), Some(TagId(4)));
        assert_eq!(tags.names(&[TagId(5), TagId(99), TagId(4)]), vec!["Harbour", "Boats"]);
        assert!(matches!(
            tags.upsert(tag(6, "  ", None)),
            Err(CacheError::InvalidState(_))
        ));
        assert_eq!(tags.len(), 2);
    }
}
