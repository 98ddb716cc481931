use chrono::NaiveDateTime;

use crate::ids::TagId;

/// One keyword of the server's tag list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagRecord {
    pub id: TagId,
    pub name: String,
    /// Slug used in tag URLs.
    pub url_name: String,
    pub last_modified: Option<NaiveDateTime>,
    /// Images carrying the tag. The admin listing does not report it.
    pub image_count: Option<u64>,
}

impl TagRecord {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_image_count(mut self, count: u64) -> Self {
        self.image_count = Some(count);
        self
    }

    /// Whether a non-admin listing would show the tag.
    pub fn is_used(&self) -> bool {
        self.image_count != Some(0)
    }

    /// Case-insensitive name match, as the server compares tag names.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}
