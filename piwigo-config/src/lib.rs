//! Settings loading and logging setup for applications embedding the Piwigo
//! cache.
//!
//! Settings are looked up in the environment first, then in well-known files,
//! and fall back to [`piwigo_core::CacheSettings::default`]. Both TOML and
//! JSON are accepted.
#![allow(missing_docs)]

pub mod logging;
pub mod settings;

pub use logging::{DEFAULT_DIRECTIVES, init_tracing};
pub use settings::{
    JSON_VAR, PATH_VAR, SettingsError, SettingsSource, load_from_env, load_from_file, load_with,
    parse_from_str, parse_json,
};

pub use piwigo_core::CacheSettings;
