use std::fmt;

/// Server-side image identifier, stable across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ImageId(pub i64);

impl ImageId {
    pub fn to_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TagId(pub i32);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Album (category) identifier.
///
/// Positive ids are real albums stored on the server. `0` is the root of the
/// album tree and the negative range is reserved for smart albums, which
/// never have a parent/child relationship. Defaults to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AlbumId(pub i32);

impl AlbumId {
    pub const ROOT: AlbumId = AlbumId(0);
    pub const SEARCH: AlbumId = AlbumId(-1);
    pub const MOST_VISITED: AlbumId = AlbumId(-2);
    pub const BEST_RATED: AlbumId = AlbumId(-3);
    pub const RECENT: AlbumId = AlbumId(-4);
    pub const FAVORITES: AlbumId = AlbumId(-6);
    /// Upper bound of the tagged-album range: tag `n` maps to `-10 - n`.
    pub const TAGGED_BASE: AlbumId = AlbumId(-10);

    /// Virtual album listing the images carrying `tag`.
    pub fn tagged(tag: TagId) -> Self {
        AlbumId(Self::TAGGED_BASE.0 - tag.0)
    }

    /// Tag behind a tagged virtual album, if this is one.
    pub fn tag(self) -> Option<TagId> {
        (self.0 < Self::TAGGED_BASE.0).then(|| TagId(Self::TAGGED_BASE.0 - self.0))
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }

    /// Smart albums (search, tags, favorites...) have no tree position.
    pub fn is_virtual(self) -> bool {
        self.0 < 0
    }

    pub fn is_real(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an image store lists: a real album or one of the smart albums.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageScope {
    Album(AlbumId),
    Search(String),
    Tagged(TagId),
    Favorites,
    BestRated,
    MostVisited,
    Recent,
}

impl ImageScope {
    pub fn album_id(&self) -> AlbumId {
        match self {
            ImageScope::Album(id) => *id,
            ImageScope::Search(_) => AlbumId::SEARCH,
            ImageScope::Tagged(tag) => AlbumId::tagged(*tag),
            ImageScope::Favorites => AlbumId::FAVORITES,
            ImageScope::BestRated => AlbumId::BEST_RATED,
            ImageScope::MostVisited => AlbumId::MOST_VISITED,
            ImageScope::Recent => AlbumId::RECENT,
        }
    }

    /// Inverse of [`ImageScope::album_id`]. Search needs its query text and
    /// is therefore not recoverable from the id alone.
    pub fn from_album_id(id: AlbumId) -> Option<Self> {
        match id {
            AlbumId::SEARCH => None,
            AlbumId::MOST_VISITED => Some(ImageScope::MostVisited),
            AlbumId::BEST_RATED => Some(ImageScope::BestRated),
            AlbumId::RECENT => Some(ImageScope::Recent),
            AlbumId::FAVORITES => Some(ImageScope::Favorites),
            other => match other.tag() {
                Some(tag) => Some(ImageScope::Tagged(tag)),
                None if other.is_real() => Some(ImageScope::Album(other)),
                None => None,
            },
        }
    }

    /// Real album backing this scope, if any. Counters only exist for these.
    pub fn real_album(&self) -> Option<AlbumId> {
        match self {
            ImageScope::Album(id) if id.is_real() => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for ImageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageScope::Album(id) => write!(f, "album:{id}"),
            ImageScope::Search(query) => write!(f, "search:{query}"),
            ImageScope::Tagged(tag) => write!(f, "tag:{tag}"),
            ImageScope::Favorites => f.write_str("favorites"),
            ImageScope::BestRated => f.write_str("best"),
            ImageScope::MostVisited => f.write_str("visits"),
            ImageScope::Recent => f.write_str("recent"),
        }
    }
}
