//! Read-only configuration for Tether.
//!
//! Loaded once at startup from `~/.tether/config.toml` (or `TETHER_CONFIG`).
//! A missing file is not an error: every field has a default.
//!
//! ```toml
//! [notify]
//! interactive = true
//! diagnostic_threshold = "warning"
//! capture_backtrace = true
//!
//! [loop]
//! tick_ms = 8
//! contain_panics = true
//!
//! [log]
//! filter = "info"
//! ```

use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use tether_types::{DisplayMode, Severity};

const TETHER_CONFIG: &str = "TETHER_CONFIG";
const TETHER_INTERACTIVE: &str = "TETHER_INTERACTIVE";

// Default value functions for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

const fn default_tick_ms() -> u64 {
    8
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TetherConfig {
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default, rename = "loop")]
    pub event_loop: LoopConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// How faults reach the user.
#[derive(Debug, Deserialize)]
pub struct NotifyConfig {
    /// Show blocking dialogs. When false, faults are only recorded.
    #[serde(default = "default_true")]
    pub interactive: bool,
    /// Minimum severity at which a `tracing` event becomes a dialog.
    #[serde(default)]
    pub diagnostic_threshold: Severity,
    /// Attach a stack backtrace to panic reports.
    #[serde(default = "default_true")]
    pub capture_backtrace: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            interactive: true,
            diagnostic_threshold: Severity::default(),
            capture_backtrace: true,
        }
    }
}

impl NotifyConfig {
    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        DisplayMode::from_interactive(self.interactive)
    }
}

/// Host loop pacing.
#[derive(Debug, Deserialize)]
pub struct LoopConfig {
    /// How long the host loop parks when the queue is idle.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Keep the loop alive when a scheduled callback panics.
    #[serde(default = "default_true")]
    pub contain_panics: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            contain_panics: true,
        }
    }
}

impl LoopConfig {
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl TetherConfig {
    /// Load the config from its default location.
    ///
    /// Returns `Ok(None)` when no config file exists. Environment overrides
    /// are applied on top of whatever was loaded.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Load the config from its default location, or defaults if there is none; then apply
    /// environment overrides.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let mut config = Self::load()?.unwrap_or_default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = env::var(TETHER_INTERACTIVE) {
            match parse_switch(&raw) {
                Some(interactive) => self.notify.interactive = interactive,
                None => tracing::warn!(
                    env_var = TETHER_INTERACTIVE,
                    value = %raw,
                    "Ignoring unrecognised override"
                ),
            }
        }
    }
}

/// `TETHER_CONFIG` if set, otherwise `~/.tether/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os(TETHER_CONFIG)
        && !explicit.is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    dirs::home_dir().map(|home| home.join(".tether").join("config.toml"))
}

/// Directory that holds the config file and the `logs/` folder.
pub fn data_dir() -> Option<PathBuf> {
    config_path().and_then(|path| path.parent().map(Path::to_path_buf))
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
