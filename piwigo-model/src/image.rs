use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::error::{ModelError, Result};
use crate::ids::{AlbumId, ImageId, TagId};
use crate::sizes::{SizeTable, SizedUrl};

/// Who may see an image, as Piwigo encodes it in the `level` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrivacyLevel {
    #[default]
    Everybody,
    AdminsFamilyFriendsContacts,
    AdminsFamilyFriends,
    AdminsFamily,
    Admins,
}

impl PrivacyLevel {
    pub fn level(self) -> u8 {
        match self {
            PrivacyLevel::Everybody => 0,
            PrivacyLevel::AdminsFamilyFriendsContacts => 1,
            PrivacyLevel::AdminsFamilyFriends => 2,
            PrivacyLevel::AdminsFamily => 4,
            PrivacyLevel::Admins => 8,
        }
    }

    pub fn from_level(level: i64) -> Result<Self> {
        match level {
            0 => Ok(PrivacyLevel::Everybody),
            1 => Ok(PrivacyLevel::AdminsFamilyFriendsContacts),
            2 => Ok(PrivacyLevel::AdminsFamilyFriends),
            4 => Ok(PrivacyLevel::AdminsFamily),
            8 => Ok(PrivacyLevel::Admins),
            other => Err(ModelError::InvalidPrivacyLevel(other)),
        }
    }
}

/// Metadata of one remote image.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageRecord {
    pub id: ImageId,
    pub title: String,
    pub comment: String,
    pub author: String,
    pub file_name: String,
    pub date_created: Option<NaiveDateTime>,
    pub date_posted: Option<NaiveDateTime>,
    pub privacy: PrivacyLevel,
    pub visits: u64,
    pub rating_score: Option<f32>,
    /// File size in KiB, as reported by the server.
    pub file_size: Option<u64>,
    pub checksum: Option<String>,
    /// Manual rank inside the listed album, when the server provides it.
    pub rank: Option<i64>,
    pub sizes: SizeTable,
    pub tag_ids: Vec<TagId>,
    pub album_ids: BTreeSet<AlbumId>,
}

impl ImageRecord {
    pub fn new(id: ImageId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn in_album(mut self, album: AlbumId) -> Self {
        self.album_ids.insert(album);
        self
    }

    /// Name to show: the title, or the file name when untitled.
    pub fn display_name(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.file_name
        } else {
            &self.title
        }
    }

    pub fn full_res(&self) -> Option<&SizedUrl> {
        self.sizes.get(crate::sizes::ImageSize::FullRes)
    }

    pub fn belongs_to(&self, album: AlbumId) -> bool {
        self.album_ids.contains(&album)
    }

    /// Overwrite only the fields carried by `edit`.
    pub fn apply_edit(&mut self, edit: &ImageEdit) {
        if let Some(title) = &edit.title {
            self.title.clone_from(title);
        }
        if let Some(comment) = &edit.comment {
            self.comment.clone_from(comment);
        }
        if let Some(author) = &edit.author {
            self.author.clone_from(author);
        }
        if let Some(privacy) = edit.privacy {
            self.privacy = privacy;
        }
        if let Some(tags) = &edit.tag_ids {
            self.tag_ids.clone_from(tags);
        }
        if let Some(date) = edit.date_created {
            self.date_created = Some(date);
        }
    }
}

/// Field changes confirmed by the server for one image.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageEdit {
    pub title: Option<String>,
    pub comment: Option<String>,
    pub author: Option<String>,
    pub privacy: Option<PrivacyLevel>,
    pub tag_ids: Option<Vec<TagId>>,
    pub date_created: Option<NaiveDateTime>,
}

impl ImageEdit {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
