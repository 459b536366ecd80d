//! Where reverie keeps its settings file and logs
//!
//! Both live under one home directory when `REVERIE_HOME` is set or
//! `PathManager::set_home` was called; otherwise the platform config and data
//! directories are used.

use directories::BaseDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const HOME_VAR: &str = "REVERIE_HOME";

static HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

const APP_DIR: &str = "reverie";
const SETTINGS_FILE: &str = "settings.toml";
const LOG_FILE: &str = "reverie.log";

pub struct PathManager;

impl PathManager {
    /// Pin the home directory for this process. Only the first call has an effect.
    pub fn set_home(path: PathBuf) {
        let _ = HOME_OVERRIDE.set(path);
    }

    fn home() -> Option<PathBuf> {
        HOME_OVERRIDE.get().cloned().or_else(|| {
            std::env::var_os(HOME_VAR)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
    }

    pub fn config_dir() -> Option<PathBuf> {
        match Self::home() {
            Some(home) => Some(home),
            None => BaseDirs::new().map(|d| d.config_dir().join(APP_DIR)),
        }
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join(SETTINGS_FILE))
    }

    pub fn logs_dir() -> Option<PathBuf> {
        if let Some(home) = Self::home() {
            return Some(home.join("logs"));
        }
        #[cfg(target_os = "macos")]
        {
            if let Some(dirs) = directories::UserDirs::new() {
                return Some(dirs.home_dir().join("Library/Logs/Reverie"));
            }
        }
        BaseDirs::new().map(|d| d.data_dir().join(APP_DIR).join("logs"))
    }

    pub fn log_file_path() -> Option<PathBuf> {
        Self::logs_dir().map(|d| d.join(LOG_FILE))
    }
}
