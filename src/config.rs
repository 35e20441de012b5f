//! # Configuration Module
//!
//! Handles Herald's runtime configuration and data directory setup.
//! The configuration lives in a single JSON file in the platform-standard
//! data directory, next to the status cache and the log file:
//!
//! - Linux: `~/.local/share/herald/`
//! - macOS: `~/Library/Application Support/herald/`
//! - Windows: `%APPDATA%\herald\`
//!
//! Every field is individually defaulted, so a partial config file (or an
//! empty `{}`) loads cleanly. A *missing* file is created with defaults on
//! first run; a file that exists but cannot be parsed is a fatal startup
//! error — Herald refuses to guess at a config the user has actually
//! written.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Returns the platform-appropriate data directory for Herald.
///
/// Creates the `herald` subdirectory if it doesn't exist, so callers can
/// assume the returned path is usable.
///
/// # Errors
///
/// Returns an error if the system data directory cannot be determined or
/// the subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let herald_dir = data_dir.join("herald");
    fs::create_dir_all(&herald_dir).with_context(|| {
        format!(
            "Failed to create Herald data directory at {}. Please check file permissions.",
            herald_dir.display()
        )
    })?;

    Ok(herald_dir)
}

/// Path to the JSON configuration file.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("config.json"))
}

/// Path to the status cache record.
pub fn get_cache_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("cache.json"))
}

/// Path to the log file.
pub fn get_log_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("herald.log"))
}

/// Path to the watch-mode PID file.
pub fn get_pid_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("herald-watch.pid"))
}

fn default_status_emoji() -> String {
    ":headphones:".to_string()
}

fn default_status_emoji_unicode() -> String {
    "🎧".to_string()
}

fn default_status_ttl_seconds() -> u64 {
    120
}

fn default_poll_interval_seconds() -> u64 {
    30
}

fn default_player_app() -> String {
    "Music".to_string()
}

fn default_log_max_lines() -> usize {
    2000
}

fn default_server_bind() -> String {
    "127.0.0.1:48632".to_string()
}

/// Runtime configuration, loaded once at process start and never mutated.
///
/// The `require_two_empty_reads_before_override` /
/// `empty_read_confirm_window_seconds` pair is declared and persisted but
/// not consulted by the reconciler; the override gate currently acts on a
/// single read. Enabling the two-read guard is a pending product decision,
/// so the knobs are carried without effect rather than dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// API token for the chat service. Registered as a log secret at startup.
    pub slack_token: String,

    /// Sentinel emoji in code form, written with every status update.
    pub status_emoji: String,

    /// Sentinel emoji as a literal glyph, for servers that echo Unicode back.
    pub status_emoji_unicode: String,

    /// Seconds until a status Herald sets expires on its own.
    pub status_ttl_seconds: u64,

    /// Overwrite foreign statuses too, not just empty/owned ones.
    pub always_override: bool,

    /// Declared but unwired: see the struct-level note.
    pub require_two_empty_reads_before_override: bool,

    /// Declared but unwired: see the struct-level note.
    pub empty_read_confirm_window_seconds: u64,

    /// Seconds between reconciliation passes in watch mode.
    pub poll_interval_seconds: u64,

    /// Name of the media player application to query (e.g. "Music", "Spotify").
    pub player_app: String,

    /// Words masked out of the track label before it is published.
    pub censored_words: Vec<String>,

    /// Tail-truncate the log file to this many lines after each pass.
    pub log_max_lines: usize,

    /// Bind address for the local config/log web service.
    pub server_bind: String,

    /// Basic-Auth username for the web service. Empty disables auth.
    pub server_username: String,

    /// Basic-Auth password for the web service.
    pub server_password: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            slack_token: String::new(),
            status_emoji: default_status_emoji(),
            status_emoji_unicode: default_status_emoji_unicode(),
            status_ttl_seconds: default_status_ttl_seconds(),
            always_override: false,
            require_two_empty_reads_before_override: false,
            empty_read_confirm_window_seconds: 90,
            poll_interval_seconds: default_poll_interval_seconds(),
            player_app: default_player_app(),
            censored_words: Vec::new(),
            log_max_lines: default_log_max_lines(),
            server_bind: default_server_bind(),
            server_username: String::new(),
            server_password: String::new(),
        }
    }
}

impl RuntimeConfig {
    /// Load the configuration from the default location.
    ///
    /// A missing file is written out with defaults and returned; any other
    /// failure (unreadable file, invalid JSON, failed validation) is an
    /// error the caller should treat as fatal.
    pub fn load() -> Result<Self> {
        let path = get_config_path()?;
        Self::load_from(&path)
    }

    /// Load the configuration from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path).with_context(|| {
                format!("Failed to write default config to {}", path.display())
            })?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Persist the configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = get_config_path()?;
        self.save_to(&path)
    }

    /// Persist the configuration to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Check internal consistency of the configuration.
    ///
    /// Called after every load and before every save triggered by the web
    /// service, so an invalid config never reaches disk through Herald.
    pub fn validate(&self) -> Result<()> {
        if self.status_emoji.trim().is_empty() && self.status_emoji_unicode.trim().is_empty() {
            anyhow::bail!("At least one of status_emoji / status_emoji_unicode must be set");
        }
        if self.poll_interval_seconds == 0 {
            anyhow::bail!("poll_interval_seconds must be greater than zero");
        }
        if self.player_app.trim().is_empty() {
            anyhow::bail!("player_app must not be empty");
        }
        self.server_bind
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("server_bind is not a valid address: {}", self.server_bind))?;
        Ok(())
    }
}
