use std::fmt;
use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{Context, anyhow};
use piwigo_core::CacheSettings;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming a TOML or JSON settings file.
pub const PATH_VAR: &str = "PIWIGO_CONFIG_PATH";
/// Environment variable holding inline JSON settings.
pub const JSON_VAR: &str = "PIWIGO_CONFIG_JSON";

const CANDIDATES: &[&str] = &[
    "piwigo.toml",
    "piwigo.json",
    "config/piwigo.toml",
    "config/piwigo.json",
];

/// Where the loaded settings came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SettingsSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

impl fmt::Display for SettingsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsSource::Default => f.write_str("built-in defaults"),
            SettingsSource::EnvPath(path) => write!(f, "${PATH_VAR} ({})", path.display()),
            SettingsSource::EnvInline => write!(f, "${JSON_VAR}"),
            SettingsSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid settings from {origin}: {reason}")]
    Invalid { origin: String, reason: String },
}

/// Load settings using the process environment and the working directory.
///
/// Evaluation order:
/// 1) `$PIWIGO_CONFIG_PATH` (TOML or JSON file),
/// 2) `$PIWIGO_CONFIG_JSON` (inline JSON),
/// 3) the first of `piwigo.toml`, `piwigo.json`, `config/piwigo.toml`,
///    `config/piwigo.json` that exists,
/// 4) defaults.
pub fn load_from_env() -> anyhow::Result<(CacheSettings, SettingsSource)> {
    let cwd = env::current_dir().context("failed to resolve working directory")?;
    load_with(|key| env::var(key).ok(), &cwd)
}

/// [`load_from_env`] with an explicit variable lookup and base directory.
pub fn load_with<F>(lookup: F, base_dir: &Path) -> anyhow::Result<(CacheSettings, SettingsSource)>
where
    F: Fn(&str) -> Option<String>,
{
    let (settings, source) = resolve(&lookup, base_dir)?;
    validate(&settings, &source)?;
    info!(source = %source, page_size = settings.images_per_page, "settings loaded");
    Ok((settings, source))
}

fn resolve<F>(lookup: &F, base_dir: &Path) -> anyhow::Result<(CacheSettings, SettingsSource)>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(PATH_VAR)
        && !raw.trim().is_empty()
    {
        let path = PathBuf::from(raw.trim());
        let path = if path.is_relative() {
            base_dir.join(path)
        } else {
            path
        };
        let settings = load_from_file(&path)?;
        return Ok((settings, SettingsSource::EnvPath(path)));
    }

    if let Some(raw) = lookup(JSON_VAR)
        && !raw.trim().is_empty()
    {
        let settings = parse_json(&raw).with_context(|| format!("failed to parse {JSON_VAR}"))?;
        return Ok((settings, SettingsSource::EnvInline));
    }

    if let Some(path) = find_default_file(base_dir) {
        debug!(path = %path.display(), "using settings file");
        let settings = load_from_file(&path)?;
        return Ok((settings, SettingsSource::File(path)));
    }

    Ok((CacheSettings::default(), SettingsSource::Default))
}

pub fn load_from_file(path: &Path) -> anyhow::Result<CacheSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => {
            parse_json(&contents).with_context(|| format!("invalid settings {}", path.display()))
        }
        Some("toml") => toml::from_str(&contents)
            .map_err(|err| anyhow!("invalid settings {}: {}", path.display(), err)),
        _ => parse_from_str(&contents, &path.display().to_string()),
    }
}

/// Parse TOML, falling back to JSON.
pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<CacheSettings> {
    toml::from_str(contents).or_else(|toml_err| {
        serde_json::from_str(contents).map_err(|json_err| {
            anyhow!(
                "failed to parse settings {}: toml error: {}; json error: {}",
                origin,
                toml_err,
                json_err
            )
        })
    })
}

pub fn parse_json(raw: &str) -> anyhow::Result<CacheSettings> {
    serde_json::from_str(raw).map_err(|err| anyhow!("invalid settings json: {err}"))
}

fn validate(settings: &CacheSettings, source: &SettingsSource) -> Result<(), SettingsError> {
    settings
        .validate()
        .map_err(|err| SettingsError::Invalid {
            origin: source.to_string(),
            reason: err.to_string(),
        })
}

fn find_default_file(base_dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|candidate| base_dir.join(candidate))
        .find(|path| path.exists())
}
