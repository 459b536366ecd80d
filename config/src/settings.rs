//! Application settings management

use crate::{ConfigError, PathManager, SessionOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Application settings stored in settings.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Model identifier sent to the backend (e.g., "gemini-3-flash-preview")
    pub model: String,
    /// Override for the API base URL (proxies, test servers)
    pub base_url: Option<String>,
    pub session: SessionOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            session: SessionOptions::default(),
        }
    }
}

impl Settings {
    /// Load settings from the platform settings file, or return defaults if there is none
    pub fn load() -> Result<Self, ConfigError> {
        match PathManager::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from a specific file. A missing file yields defaults;
    /// an unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
