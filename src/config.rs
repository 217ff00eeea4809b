//! Store configuration.
//!
//! The database location is resolved through a chain:
//!
//! 1. an explicit path handed in by the caller
//! 2. the `EXIMLEY_DB_PATH` environment variable
//! 3. the `path` key of a TOML config file
//! 4. [`DEFAULT_DB_PATH`] in the working directory
use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;

use super::error::ConfigError;

pub const DB_PATH_ENV: &str = "EXIMLEY_DB_PATH";
pub const DEFAULT_DB_PATH: &str = "eximley.db";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
    /// Delete the database when the handle is dropped.
    pub temporary: bool,
    pub cache_capacity: u64,
    pub flush_every_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            temporary: false,
            cache_capacity: 64 * 1024 * 1024,
            flush_every_ms: Some(500),
        }
    }
}

impl StoreConfig {
    /// A throwaway store, used by tests and demos.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::default()
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        Self::from_toml_str(&contents)
    }

    pub fn resolve(explicit: Option<&Path>, config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_file {
            Some(file) => Self::load(file)?,
            None => Self::default(),
        };

        if let Some(path) = explicit {
            config.path = Some(path.to_path_buf());
        } else if let Ok(path) = env::var(DB_PATH_ENV)
            && !path.is_empty()
        {
            config.path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }

    pub fn open(&self) -> Result<sled::Db, ConfigError> {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .flush_every_ms(self.flush_every_ms)
            .temporary(self.temporary);
        // a temporary store picks its own location unless one is given
        if !self.temporary || self.path.is_some() {
            config = config.path(self.db_path());
        }
        let db = config.open()?;
        tracing::info!(path = ?self.path, temporary = self.temporary, "opened shipment store");
        Ok(db)
    }
}
