//! Configuration file parser for ~/.config/websub-subscriber/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as warnings, since they are usually
//! typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Overrides `host` when set; deployments usually know their public URL only
/// at runtime.
pub const HOST_ENV: &str = "WEBSUB_HOST";

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
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level subscriber configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Public scheme and authority hubs use to reach us, e.g.
    /// `https://sub.example.net`.
    pub host: String,

    /// Mount path of the HTTP routes, e.g. `/websub`. Empty mounts at root.
    pub path_prefix: String,

    /// Socket address the HTTP server binds.
    pub listen_addr: String,

    /// SQLite database file. `None` uses `subscriptions.db` in the config
    /// directory.
    pub database_path: Option<PathBuf>,

    /// Timeout for topic discovery and hub requests.
    pub request_timeout_secs: u64,

    /// Cap on topic bodies read during discovery and on notification bodies.
    pub max_body_bytes: usize,

    /// Permit topics and hubs on loopback or private networks.
    pub allow_private_networks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "http://localhost:8080".to_string(),
            path_prefix: "/websub".to_string(),
            listen_addr: "127.0.0.1:8080".to_string(),
            database_path: None,
            request_timeout_secs: 10,
            max_body_bytes: 5 * 1024 * 1024,
            allow_private_networks: false,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "host",
        "path_prefix",
        "listen_addr",
        "database_path",
        "request_timeout_secs",
        "max_body_bytes",
        "allow_private_networks",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
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
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), host = %config.host, "Loaded configuration");
        Ok(config)
    }

    /// Applies `WEBSUB_HOST` if it is set and non-empty.
    pub fn with_env_overrides(self) -> Self {
        self.with_host_override(std::env::var(HOST_ENV).ok())
    }

    fn with_host_override(mut self, host: Option<String>) -> Self {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            tracing::debug!(host = %host, "Host overridden from environment");
            self.host = host;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `database_path`, or `subscriptions.db` under `config_dir`.
    pub fn database_path_in(&self, config_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| config_dir.join("subscriptions.db"))
    }
}

// ============================================================================
// Tests
// ============================================================================
