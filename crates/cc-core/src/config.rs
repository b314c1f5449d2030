use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "CODECHAT_CONFIG";
pub const DATA_DIR_ENV: &str = "CODECHAT_DATA_DIR";
pub const WEB_DIST_ENV: &str = "CODECHAT_WEB_DIST";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub web_root: Option<PathBuf>,
    pub timeout_minutes: u64,
    pub disconnect_grace_ms: u64,
    pub debounce_ms: u64,
    pub retention_days: u64,
    pub open_browser: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            web_root: None,
            timeout_minutes: 30,
            disconnect_grace_ms: 5_000,
            debounce_ms: 300,
            retention_days: 30,
            open_browser: true,
        }
    }
}

impl Settings {
    /// Reads the config file (if any) and applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        if let Some(dir) = env_path(DATA_DIR_ENV) {
            settings.data_dir = Some(dir);
        }
        if let Some(dir) = env_path(WEB_DIST_ENV) {
            settings.web_root = Some(dir);
        }
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        toml::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Directory holding session files: explicit setting, then
    /// `$XDG_DATA_HOME/codechat/sessions`, then `~/.local/share/codechat/sessions`.
    pub fn sessions_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Some(dir.clone());
        }
        let base = env_path("XDG_DATA_HOME")
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))?;
        Some(base.join("codechat").join("sessions"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_millis(self.disconnect_grace_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60))
    }
}

fn config_path() -> Option<PathBuf> {
    env_path(CONFIG_ENV)
        .or_else(|| dirs::config_dir().map(|dir| dir.join("codechat").join("config.toml")))
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
