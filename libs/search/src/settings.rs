//! Engine settings
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. built-in defaults
//! 2. `booru-search.toml` in the working directory (optional), or an explicit file
//! 3. environment variables prefixed with `BOORU_SEARCH__`, using `__` between
//!    nested keys (e.g. `BOORU_SEARCH__CACHE__MODE=lru`)
//!
//! A `.env` file is read first when present.

use crate::cache::{CacheMode, CachePolicy};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_FILE: &str = "booru-search";
const ENV_PREFIX: &str = "BOORU_SEARCH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

/// Pagination limits enforced at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheModeSetting {
    Unbounded,
    Lru,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub mode: CacheModeSetting,
    /// Entry limit for `lru` mode.
    pub capacity: usize,
    pub ttl_seconds: Option<u64>,
    pub single_flight: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            mode: CacheModeSetting::Unbounded,
            capacity: 1024,
            ttl_seconds: None,
            single_flight: true,
        }
    }
}

impl CacheSettings {
    pub fn to_policy(&self) -> Result<CachePolicy> {
        let mode = match self.mode {
            CacheModeSetting::Unbounded => CacheMode::Unbounded,
            CacheModeSetting::Lru => CacheMode::Lru {
                capacity: NonZeroUsize::new(self.capacity).ok_or_else(|| {
                    Error::Config("cache.capacity must be greater than 0 in lru mode".to_string())
                })?,
            },
            CacheModeSetting::Disabled => CacheMode::Disabled,
        };

        Ok(CachePolicy {
            mode,
            ttl: self.ttl_seconds.map(Duration::from_secs),
            single_flight: self.single_flight,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    pub file_enabled: bool,
    pub file_directory: String,
    pub file_prefix: String,
    /// One of `daily`, `hourly`, `minutely`, `never`.
    pub file_rotation: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_enabled: false,
            file_directory: "logs".to_string(),
            file_prefix: "booru-search".to_string(),
            file_rotation: "daily".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings, reading `path` instead of the default file when given.
    /// An explicit file must exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Failed to read .env file");
            }
        }

        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text layered over the defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if search.max_page_size == 0 {
            return Err(Error::Config(
                "search.max_page_size must be greater than 0".to_string(),
            ));
        }
        if search.default_page_size == 0 || search.default_page_size > search.max_page_size {
            return Err(Error::Config(format!(
                "search.default_page_size must be between 1 and {}",
                search.max_page_size
            )));
        }

        self.cache.to_policy()?;

        if !matches!(
            self.logging.file_rotation.as_str(),
            "daily" | "hourly" | "minutely" | "never"
        ) {
            return Err(Error::Config(format!(
                "logging.file_rotation must be one of daily, hourly, minutely, never (got {:?})",
                self.logging.file_rotation
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::Config("logging.level must not be empty".to_string()));
        }

        Ok(())
    }
}
