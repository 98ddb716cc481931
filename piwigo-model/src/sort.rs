//! Image sort keys and their server/client representations.
//!
//! The server defines the absolute order of an album's images and pagination
//! windows depend on it, so a sort key is always applied through a full
//! reload. The comparator below exists to place a single record (a fresh
//! upload) where the server would have put it.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{ModelError, Result};
use crate::image::ImageRecord;

/// Image attribute names as the server's `order` parameter spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortAttr {
    Id,
    Rank,
    Title,
    FileName,
    DateCreated,
    DatePosted,
    Rating,
    Visits,
}

impl SortAttr {
    pub fn as_str(self) -> &'static str {
        match self {
            SortAttr::Id => "id",
            SortAttr::Rank => "rank",
            SortAttr::Title => "name",
            SortAttr::FileName => "file",
            SortAttr::DateCreated => "date_creation",
            SortAttr::DatePosted => "date_available",
            SortAttr::Rating => "rating_score",
            SortAttr::Visits => "hit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Total orders available for an album's images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ImageSort {
    NameAscending,
    NameDescending,
    #[default]
    DateCreatedDescending,
    DateCreatedAscending,
    DatePostedDescending,
    DatePostedAscending,
    FileNameAscending,
    FileNameDescending,
    RatingDescending,
    RatingAscending,
    VisitsDescending,
    VisitsAscending,
    Manual,
    /// Server-side shuffle. Not reproducible across reloads and has no
    /// client comparator.
    Random,
    IdAscending,
    IdDescending,
}

impl ImageSort {
    pub const ALL: [ImageSort; 16] = [
        Self::NameAscending,
        Self::NameDescending,
        Self::DateCreatedDescending,
        Self::DateCreatedAscending,
        Self::DatePostedDescending,
        Self::DatePostedAscending,
        Self::FileNameAscending,
        Self::FileNameDescending,
        Self::RatingDescending,
        Self::RatingAscending,
        Self::VisitsDescending,
        Self::VisitsAscending,
        Self::Manual,
        Self::Random,
        Self::IdAscending,
        Self::IdDescending,
    ];

    /// Primary attribute and direction, `None` for random.
    pub fn key(self) -> Option<(SortAttr, SortOrder)> {
        use SortAttr::*;
        use SortOrder::*;
        let key = match self {
            ImageSort::NameAscending => (Title, Ascending),
            ImageSort::NameDescending => (Title, Descending),
            ImageSort::DateCreatedDescending => (DateCreated, Descending),
            ImageSort::DateCreatedAscending => (DateCreated, Ascending),
            ImageSort::DatePostedDescending => (DatePosted, Descending),
            ImageSort::DatePostedAscending => (DatePosted, Ascending),
            ImageSort::FileNameAscending => (FileName, Ascending),
            ImageSort::FileNameDescending => (FileName, Descending),
            ImageSort::RatingDescending => (Rating, Descending),
            ImageSort::RatingAscending => (Rating, Ascending),
            ImageSort::VisitsDescending => (Visits, Descending),
            ImageSort::VisitsAscending => (Visits, Ascending),
            ImageSort::Manual => (Rank, Ascending),
            ImageSort::Random => return None,
            ImageSort::IdAscending => (Id, Ascending),
            ImageSort::IdDescending => (Id, Descending),
        };
        Some(key)
    }

    pub fn is_deterministic(self) -> bool {
        self != ImageSort::Random
    }

    /// Value of the `order` request parameter. The id tie-breaker is sent
    /// explicitly so the server and [`ImageSort::compare`] agree.
    pub fn order_param(self) -> String {
        match self.key() {
            None => "random".to_string(),
            Some((SortAttr::Id, order)) => format!("id {}", order.as_str()),
            Some((attr, order)) => {
                format!("{} {}, id asc", attr.as_str(), order.as_str())
            }
        }
    }

    pub fn from_order_param(param: &str) -> Result<Self> {
        let trimmed = param.trim();
        Self::ALL
            .into_iter()
            .find(|sort| sort.order_param() == trimmed)
            .ok_or_else(|| ModelError::InvalidSortParam(param.to_string()))
    }

    /// Position of `a` relative to `b` under this key; ties fall back to
    /// ascending image id. `None` for [`ImageSort::Random`].
    pub fn compare(self, a: &ImageRecord, b: &ImageRecord) -> Option<Ordering> {
        let (attr, order) = self.key()?;
        let primary = match attr {
            SortAttr::Id => a.id.cmp(&b.id),
            SortAttr::Rank => a.rank.cmp(&b.rank),
            SortAttr::Title => cmp_text(&a.title, &b.title),
            SortAttr::FileName => cmp_text(&a.file_name, &b.file_name),
            SortAttr::DateCreated => a.date_created.cmp(&b.date_created),
            SortAttr::DatePosted => a.date_posted.cmp(&b.date_posted),
            SortAttr::Rating => cmp_rating(a.rating_score, b.rating_score),
            SortAttr::Visits => a.visits.cmp(&b.visits),
        };
        Some(order.apply(primary).then_with(|| a.id.cmp(&b.id)))
    }

    pub fn label(self) -> &'static str {
        match self {
            ImageSort::NameAscending => "Photo title, A → Z",
            ImageSort::NameDescending => "Photo title, Z → A",
            ImageSort::DateCreatedDescending => "Date created, new → old",
            ImageSort::DateCreatedAscending => "Date created, old → new",
            ImageSort::DatePostedDescending => "Date posted, new → old",
            ImageSort::DatePostedAscending => "Date posted, old → new",
            ImageSort::FileNameAscending => "File name, A → Z",
            ImageSort::FileNameDescending => "File name, Z → A",
            ImageSort::RatingDescending => "Rating score, high → low",
            ImageSort::RatingAscending => "Rating score, low → high",
            ImageSort::VisitsDescending => "Visits, high → low",
            ImageSort::VisitsAscending => "Visits, low → high",
            ImageSort::Manual => "Manual order",
            ImageSort::Random => "Random order",
            ImageSort::IdAscending => "Identifier, 1 → 9",
            ImageSort::IdDescending => "Identifier, 9 → 1",
        }
    }
}

impl fmt::Display for ImageSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn cmp_rating(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}
