use chrono::NaiveDateTime;

use crate::ids::{AlbumId, ImageId};

/// Metadata of one real album (category) in the server's tree.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlbumRecord {
    pub id: AlbumId,
    pub name: String,
    pub comment: String,
    /// [`AlbumId::ROOT`] for top-level albums.
    pub parent_id: AlbumId,
    /// Ancestor chain, root-most first, ending with the album itself.
    pub upper_categories: Vec<AlbumId>,
    /// Position in the server's global ordering, e.g. `"1.3.2"`.
    pub global_rank: Option<String>,
    pub nb_images: u64,
    pub total_nb_images: u64,
    pub nb_sub_albums: u32,
    pub thumbnail_id: Option<ImageId>,
    pub thumbnail_url: Option<String>,
    pub date_last: Option<NaiveDateTime>,
    pub can_upload: bool,
}

impl AlbumRecord {
    pub fn new(id: AlbumId, name: impl Into<String>, parent_id: AlbumId) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            upper_categories: vec![id],
            ..Default::default()
        }
    }

    pub fn with_counts(mut self, nb_images: u64, total_nb_images: u64) -> Self {
        self.nb_images = nb_images;
        self.total_nb_images = total_nb_images.max(nb_images);
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_root()
    }

    /// Ancestors listed in `upper_categories`, excluding the album itself.
    pub fn ancestor_ids(&self) -> impl Iterator<Item = AlbumId> + '_ {
        self.upper_categories
            .iter()
            .copied()
            .filter(move |id| *id != self.id)
    }

    /// Shift the direct image counter and keep the recursive counter at least
    /// as large.
    pub fn adjust_direct_count(&mut self, delta: i64) {
        self.nb_images = apply_delta(self.nb_images, delta);
        self.total_nb_images = apply_delta(self.total_nb_images, delta).max(self.nb_images);
    }

    /// Shift only the recursive counter (used on ancestors).
    pub fn adjust_total_count(&mut self, delta: i64) {
        self.total_nb_images = apply_delta(self.total_nb_images, delta).max(self.nb_images);
    }

    /// Identity plus every mutable field: a `false` result means the UI
    /// needs to redraw this album.
    pub fn same_content(&self, other: &AlbumRecord) -> bool {
        self == other
    }
}

fn apply_delta(value: u64, delta: i64) -> u64 {
    if delta.is_negative() {
        value.saturating_sub(delta.unsigned_abs())
    } else {
        value.saturating_add(delta.unsigned_abs())
    }
}
