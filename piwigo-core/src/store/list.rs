use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use piwigo_model::{ImageId, ImageRecord, ImageSort};

/// Result of [`ImageList::insert_sorted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Inserted,
    Replaced,
    /// Sorts past the loaded window; a later page will bring it.
    Deferred,
}

impl Placement {
    pub(crate) fn is_new(self) -> bool {
        matches!(self, Placement::Inserted | Placement::Deferred)
    }
}

/// Ordered image records with an id index.
///
/// Invariant: `index[records[i].id] == i` for every `i`, and ids are unique.
#[derive(Debug, Clone, Default)]
pub(crate) struct ImageList {
    records: Vec<ImageRecord>,
    index: HashMap<ImageId, usize>,
}

impl ImageList {
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub(crate) fn contains(&self, id: ImageId) -> bool {
        self.index.contains_key(&id)
    }

    pub(crate) fn get(&self, id: ImageId) -> Option<&ImageRecord> {
        self.index.get(&id).map(|&pos| &self.records[pos])
    }

    pub(crate) fn get_mut(&mut self, id: ImageId) -> Option<&mut ImageRecord> {
        self.index.get(&id).map(|&pos| &mut self.records[pos])
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// Drop everything and take `page` as the new content. Returns the
    /// number of distinct records kept.
    pub(crate) fn replace(&mut self, page: Vec<ImageRecord>) -> usize {
        self.clear();
        self.merge(page)
    }

    /// Append the records not seen yet; records already present keep their
    /// position and take the newer attributes. Returns how many were new.
    pub(crate) fn merge(&mut self, page: Vec<ImageRecord>) -> usize {
        let mut added = 0;
        for record in page {
            match self.index.get(&record.id) {
                Some(&pos) => self.records[pos] = record,
                None => {
                    self.index.insert(record.id, self.records.len());
                    self.records.push(record);
                    added += 1;
                }
            }
        }
        added
    }

    /// Remove every record whose id is in `ids`, returning the removed
    /// records in their former order.
    pub(crate) fn remove(&mut self, ids: &HashSet<ImageId>) -> Vec<ImageRecord> {
        if !ids.iter().any(|id| self.index.contains_key(id)) {
            return Vec::new();
        }

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| ids.contains(&record.id));
        self.records = kept;
        self.reindex(0);
        removed
    }

    /// Place `record` where `sort` puts it. An existing record with the same
    /// id is overwritten in place.
    ///
    /// With `more_pages` set, a record that would land after the last loaded
    /// one belongs to a page not fetched yet and is left out.
    pub(crate) fn insert_sorted(
        &mut self,
        record: ImageRecord,
        sort: ImageSort,
        more_pages: bool,
    ) -> Placement {
        if let Some(existing) = self.get_mut(record.id) {
            *existing = record;
            return Placement::Replaced;
        }

        let pos = if sort.is_deterministic() {
            self.records
                .partition_point(|existing| sort.compare(existing, &record) == Some(Ordering::Less))
        } else {
            self.records.len()
        };

        if more_pages && pos == self.records.len() {
            return Placement::Deferred;
        }

        self.records.insert(pos, record);
        self.reindex(pos);
        Placement::Inserted
    }

    fn reindex(&mut self, from: usize) {
        if from == 0 {
            self.index.clear();
        }
        for (pos, record) in self.records.iter().enumerate().skip(from) {
            self.index.insert(record.id, pos);
        }
    }
}
