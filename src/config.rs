//! Configuration file parser for ~/.config/rill/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! most likely typos.
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::pagination::ListingMode;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid server URL {url:?}: {source}")]
    ServerUrl {
        url: String,
        source: url::ParseError,
    },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Client configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the feed server, e.g. `http://127.0.0.1:7070/`.
    pub server_url: String,

    /// How the server pages item lists.
    pub listing_mode: ListingMode,

    /// Delay between status polls while a server refresh is running.
    pub poll_interval_ms: u64,

    /// Quiet window for search text before the list is refetched.
    pub search_debounce_ms: u64,

    /// Quiet window for list width changes before they are persisted.
    pub layout_debounce_ms: u64,

    /// Remaining scroll distance (at font scale 1.0) that triggers a
    /// load-more.
    pub near_bottom_px: f64,

    /// Per-request timeout for the HTTP backend. 0 disables it.
    pub request_timeout_secs: u64,

    /// Keybinding overrides. Keys are action names, values are key strings.
    pub keybindings: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:7070/".to_string(),
            listing_mode: ListingMode::Cursor,
            poll_interval_ms: 500,
            search_debounce_ms: 500,
            layout_debounce_ms: 1000,
            near_bottom_px: 70.0,
            request_timeout_secs: 30,
            keybindings: HashMap::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "server_url",
        "listing_mode",
        "poll_interval_ms",
        "search_debounce_ms",
        "layout_debounce_ms",
        "near_bottom_px",
        "request_timeout_secs",
        "keybindings",
    ];

    /// `~/.config/rill/config.toml`, or `None` when `HOME` is unset.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("rill")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Unparseable `server_url` → `Err(ConfigError::ServerUrl)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            server = %config.server_url,
            mode = ?config.listing_mode,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration text. Blank text yields the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.server_base()?;
        Ok(config)
    }

    /// The server URL with a trailing slash, so relative API paths join
    /// underneath it instead of replacing its last segment.
    pub fn server_base(&self) -> Result<url::Url, ConfigError> {
        let mut raw = self.server_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        url::Url::parse(&raw).map_err(|source| ConfigError::ServerUrl {
            url: self.server_url.clone(),
            source,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn layout_debounce(&self) -> Duration {
        Duration::from_millis(self.layout_debounce_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

// ============================================================================
// Tests
// ============================================================================
