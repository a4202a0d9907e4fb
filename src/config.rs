//! Configuration management for gtk-bookmarks-automount
//!
//! Handles loading configuration from ~/.config/gtk-bookmarks-automount/config.toml.
//! Every key is optional; a missing file reproduces the built-in defaults.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Application name for config directory
pub const APP_NAME: &str = "gtk-bookmarks-automount";

/// Lock file name, placed in the user's home directory
const LOCK_FILE: &str = ".gtk-bookmarks-automount.lock";

/// Legacy GTK 2 bookmarks file, relative to the home directory
const LEGACY_BOOKMARKS: &str = ".gtk-bookmarks";

/// GTK 3 bookmarks file, relative to the config directory
const GTK3_BOOKMARKS: &str = "gtk-3.0/bookmarks";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Whether the daemon registers with the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRegistration {
    /// Never register.
    Disabled,
    /// Register only when launched with an autostart id; failures are logged.
    #[default]
    Auto,
    /// Abort startup unless registration succeeds.
    Required,
}

impl std::fmt::Display for SessionRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionRegistration::Disabled => "disabled",
            SessionRegistration::Auto => "auto",
            SessionRegistration::Required => "required",
        };
        f.write_str(s)
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// URI prefixes of bookmarks that should be mounted
    pub watched_protocols: Vec<String>,

    /// Bookmarks file to read; resolved from the GTK defaults when unset
    pub bookmarks_file: Option<PathBuf>,

    /// Single-instance lock file; defaults to ~/.gtk-bookmarks-automount.lock
    pub lock_file: Option<PathBuf>,

    /// Mount program and leading arguments; the share URI is appended
    pub mount_command: Vec<String>,

    /// Session manager registration policy
    pub session_registration: SessionRegistration,

    /// Application id sent with RegisterClient
    pub app_id: String,

    /// How long to wait for in-flight mount results after the loop stops
    pub shutdown_grace_secs: u64,

    /// Optional log file in addition to the system journal
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watched_protocols: vec!["smb://".to_string()],
            bookmarks_file: None,
            lock_file: None,
            mount_command: vec!["gvfs-mount".to_string()],
            session_registration: SessionRegistration::default(),
            app_id: APP_NAME.to_string(),
            shutdown_grace_secs: 10,
            log_file: None,
        }
    }
}

impl Config {
    /// Get the config file path
    ///
    /// Returns ~/.config/gtk-bookmarks-automount/config.toml on Linux
    pub fn config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Load configuration from the default location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    ///
    /// Returns default config if file doesn't exist
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the bookmarks file.
    ///
    /// An explicit setting wins. Otherwise the GTK 3 file is used when it
    /// exists, falling back to the legacy ~/.gtk-bookmarks.
    pub fn bookmarks_path(&self) -> ConfigResult<PathBuf> {
        if let Some(ref path) = self.bookmarks_file {
            return Ok(path.clone());
        }

        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        let legacy = home.join(LEGACY_BOOKMARKS);
        let gtk3 = dirs::config_dir().map(|dir| dir.join(GTK3_BOOKMARKS));

        Ok(match gtk3 {
            Some(path) if path.exists() => path,
            _ => legacy,
        })
    }

    /// Resolve the lock file path
    pub fn lock_path(&self) -> ConfigResult<PathBuf> {
        if let Some(ref path) = self.lock_file {
            return Ok(path.clone());
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(LOCK_FILE))
    }

    /// Grace period for logging in-flight mount results at shutdown
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Format the configuration for display
pub fn format_config(config: &Config) -> String {
    let mut lines = Vec::new();

    lines.push("Current configuration:".to_string());
    lines.push(String::new());

    let protocols: Vec<String> = config
        .watched_protocols
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect();
    lines.push(format!("  watched_protocols = [{}]", protocols.join(", ")));

    match config.bookmarks_path() {
        Ok(path) if config.bookmarks_file.is_some() => {
            lines.push(format!("  bookmarks_file = \"{}\"", path.display()))
        }
        Ok(path) => lines.push(format!(
            "  bookmarks_file = (not set, using {})",
            path.display()
        )),
        Err(e) => lines.push(format!("  bookmarks_file = (unresolved: {})", e)),
    }

    match config.lock_path() {
        Ok(path) if config.lock_file.is_some() => {
            lines.push(format!("  lock_file = \"{}\"", path.display()))
        }
        Ok(path) => lines.push(format!("  lock_file = (not set, using {})", path.display())),
        Err(e) => lines.push(format!("  lock_file = (unresolved: {})", e)),
    }

    lines.push(format!(
        "  mount_command = \"{}\"",
        config.mount_command.join(" ")
    ));
    lines.push(format!(
        "  session_registration = \"{}\"",
        config.session_registration
    ));
    lines.push(format!("  app_id = \"{}\"", config.app_id));
    lines.push(format!(
        "  shutdown_grace_secs = {}",
        config.shutdown_grace_secs
    ));

    if let Some(ref log_file) = config.log_file {
        lines.push(format!("  log_file = \"{}\"", log_file));
    } else {
        lines.push("  log_file = (not set)".to_string());
    }

    lines.join("\n")
}
