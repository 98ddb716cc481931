pub use crate::album::AlbumRecord;
pub use crate::ids::{AlbumId, ImageId, ImageScope, TagId};
pub use crate::image::{ImageEdit, ImageRecord, PrivacyLevel};
pub use crate::sizes::{ImageSize, SizeTable, SizedUrl};
pub use crate::sort::ImageSort;
pub use crate::tag::TagRecord;
pub use crate::upload::{UploadChunk, UploadLocalId, UploadRequest, UploadState};
