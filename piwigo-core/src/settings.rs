use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Tunables shared by the stores, the upload queue and the JSON adapter.
///
/// Every field has a default so partial config files are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Page size used by every image store.
    pub images_per_page: u32,
    /// Upload chunk size in KiB.
    pub upload_chunk_size_kib: u32,
    /// Window of the "recent" smart album, in days.
    pub recent_period_days: u32,
    /// Buffer of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            images_per_page: 100,
            upload_chunk_size_kib: 500,
            recent_period_days: 7,
            event_capacity: 256,
        }
    }
}

impl CacheSettings {
    pub fn upload_chunk_bytes(&self) -> usize {
        self.upload_chunk_size_kib as usize * 1024
    }

    pub fn validate(&self) -> Result<()> {
        if self.images_per_page == 0 {
            return Err(CacheError::invalid_state("images_per_page must be positive"));
        }
        if self.upload_chunk_size_kib == 0 {
            return Err(CacheError::invalid_state(
                "upload_chunk_size_kib must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: CacheSettings =
            serde_json::from_str(r#"{"images_per_page": 20}"#).expect("parse settings");
        assert_eq!(settings.images_per_page, 20);
        assert_eq!(settings.upload_chunk_size_kib, 500);
        assert_eq!(settings.upload_chunk_bytes(), 500 * 1024);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let settings = CacheSettings {
            images_per_page: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(CacheError::InvalidState(_))
        ));
    }
}
