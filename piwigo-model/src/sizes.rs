use std::fmt::{self, Display, Formatter};

/// Derivative size classes generated by the server, plus the original file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageSize {
    Square,
    Thumb,
    XXSmall,
    XSmall,
    Small,
    Medium,
    Large,
    XLarge,
    XXLarge,
    FullRes,
}

impl ImageSize {
    pub const ALL: [ImageSize; 10] = [
        Self::Square,
        Self::Thumb,
        Self::XXSmall,
        Self::XSmall,
        Self::Small,
        Self::Medium,
        Self::Large,
        Self::XLarge,
        Self::XXLarge,
        Self::FullRes,
    ];

    /// The nine server-generated derivatives, in the server's naming.
    pub const DERIVATIVES: [ImageSize; 9] = [
        Self::Square,
        Self::Thumb,
        Self::XXSmall,
        Self::XSmall,
        Self::Small,
        Self::Medium,
        Self::Large,
        Self::XLarge,
        Self::XXLarge,
    ];

    /// Key used in the `derivatives` object of image payloads.
    pub fn wire_name(self) -> &'static str {
        match self {
            ImageSize::Square => "square",
            ImageSize::Thumb => "thumb",
            ImageSize::XXSmall => "2small",
            ImageSize::XSmall => "xsmall",
            ImageSize::Small => "small",
            ImageSize::Medium => "medium",
            ImageSize::Large => "large",
            ImageSize::XLarge => "xlarge",
            ImageSize::XXLarge => "xxlarge",
            ImageSize::FullRes => "full",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.wire_name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl Display for ImageSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// URL and pixel dimensions of one size class.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizedUrl {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl SizedUrl {
    pub fn new(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            width,
            height,
        }
    }

    pub fn longest_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// Per-size URL table of an image.
///
/// Entries are absent for sizes the server does not generate; callers must
/// treat a missing size as unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeTable {
    entries: [Option<SizedUrl>; 10],
}

impl SizeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, size: ImageSize) -> Option<&SizedUrl> {
        self.entries[size.index()].as_ref()
    }

    pub fn set(&mut self, size: ImageSize, entry: SizedUrl) {
        self.entries[size.index()] = Some(entry);
    }

    pub fn with(mut self, size: ImageSize, entry: SizedUrl) -> Self {
        self.set(size, entry);
        self
    }

    pub fn remove(&mut self, size: ImageSize) -> Option<SizedUrl> {
        self.entries[size.index()].take()
    }

    pub fn is_available(&self, size: ImageSize) -> bool {
        self.get(size).is_some()
    }

    pub fn available(&self) -> impl Iterator<Item = (ImageSize, &SizedUrl)> {
        ImageSize::ALL
            .into_iter()
            .filter_map(|size| self.get(size).map(|entry| (size, entry)))
    }

    /// Smallest present entry whose longest side covers `max_side`, or the
    /// largest present entry when none does. Only present entries count.
    pub fn best_fit(&self, max_side: u32) -> Option<(ImageSize, &SizedUrl)> {
        let mut fallback: Option<(ImageSize, &SizedUrl)> = None;
        let mut best: Option<(ImageSize, &SizedUrl)> = None;

        for (size, entry) in self.available() {
            if entry.longest_side() >= max_side {
                if best.is_none_or(|(_, b)| entry.longest_side() < b.longest_side()) {
                    best = Some((size, entry));
                }
            } else if fallback.is_none_or(|(_, f)| entry.longest_side() > f.longest_side()) {
                fallback = Some((size, entry));
            }
        }

        best.or(fallback)
    }
}
