//! Application configuration.
//!
//! Settings load in three layers: built-in defaults, an optional
//! TOML or JSON file, then `ABACUS_*` environment variables. Later
//! layers win.
//!
//! # Environment variables
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `ABACUS_HTTP_ADDR` | `server.http_addr` |
//! | `ABACUS_SHUTDOWN_TIMEOUT` | `server.shutdown_timeout_secs` |
//! | `ABACUS_REQUEST_TIMEOUT` | `server.request_timeout_secs` |
//! | `ABACUS_LOG_LEVEL` | `logging.level` |
//! | `ABACUS_LOG_FORMAT` | `logging.json_format` (`json` or `pretty`) |
//! | `ABACUS_STORE_MAX_CACHE_ENTRIES` | `store.max_cache_entries` |
//! | `ABACUS_STORE_MAX_RETRIES` | `store.max_retries` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use abacus_store::StoreConfig;

use crate::logging::LogConfig;
use crate::server::{
    ServerConfig, DEFAULT_HTTP_ADDR, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {}: {}", .path.display(), .source)]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file contents did not parse.
    #[error("failed to parse config file {}: {}", .path.display(), .message)]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Parser diagnostics.
        message: String,
    },

    /// The file extension is not a supported format.
    #[error("unsupported config format: {}", .path.display())]
    UnsupportedFormat {
        /// Path with the unrecognized extension.
        path: PathBuf,
    },

    /// A setting failed validation.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What was rejected and why.
        message: String,
    },
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerSettings,

    /// Logging settings.
    pub logging: LogSettings,

    /// Store settings.
    pub store: StoreSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address, e.g. `127.0.0.1:8080`.
    pub http_addr: String,

    /// Seconds to wait for in-flight requests during shutdown.
    pub shutdown_timeout_secs: u64,

    /// Seconds to wait for a request body before giving up.
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Level filter directive.
    pub level: String,

    /// Whether to emit JSON lines instead of human-readable output.
    pub json_format: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
        }
    }
}

/// Store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Cache entries buffered before a flush to the backend.
    pub max_cache_entries: usize,

    /// Backend read attempts before degrading to a cache miss.
    pub max_retries: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_cache_entries: 64,
            max_retries: 3,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML or JSON file.
    ///
    /// The format is chosen by file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read,
    /// [`ConfigError::Parse`] when its contents do not parse, and
    /// [`ConfigError::UnsupportedFormat`] for unknown extensions.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path,
                message: e.to_string(),
            }),
            Some("json") => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path,
                message: e.to_string(),
            }),
            _ => Err(ConfigError::UnsupportedFormat { path }),
        }
    }

    /// Applies `ABACUS_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(addr) = std::env::var("ABACUS_HTTP_ADDR") {
            self.server.http_addr = addr;
        }
        if let Ok(secs) = std::env::var("ABACUS_SHUTDOWN_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                self.server.shutdown_timeout_secs = secs;
            }
        }
        if let Ok(secs) = std::env::var("ABACUS_REQUEST_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                self.server.request_timeout_secs = secs;
            }
        }
        if let Ok(level) = std::env::var("ABACUS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ABACUS_LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }
        if let Ok(entries) = std::env::var("ABACUS_STORE_MAX_CACHE_ENTRIES") {
            if let Ok(entries) = entries.parse() {
                self.store.max_cache_entries = entries;
            }
        }
        if let Ok(retries) = std::env::var("ABACUS_STORE_MAX_RETRIES") {
            if let Ok(retries) = retries.parse() {
                self.store.max_retries = retries;
            }
        }
        self
    }

    /// Validates the assembled configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first rejected
    /// setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "http_addr '{}' is not a valid socket address",
                    self.server.http_addr
                ),
            });
        }
        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "shutdown_timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "request_timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.logging.level.is_empty() {
            return Err(ConfigError::Invalid {
                message: "logging level must not be empty".to_string(),
            });
        }
        if self.store.max_cache_entries == 0 {
            return Err(ConfigError::Invalid {
                message: "max_cache_entries must be greater than zero".to_string(),
            });
        }
        if self.store.max_retries == 0 {
            return Err(ConfigError::Invalid {
                message: "max_retries must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the HTTP server configuration.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::builder()
            .http_addr(&self.server.http_addr)
            .shutdown_timeout(Duration::from_secs(self.server.shutdown_timeout_secs))
            .request_timeout(Duration::from_secs(self.server.request_timeout_secs))
            .build()
    }

    /// Builds the logging configuration.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.logging.level.clone(),
            json_format: self.logging.json_format,
            span_events: false,
        }
    }

    /// Builds the store configuration.
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_cache_entries: self.store.max_cache_entries,
            max_retries: self.store.max_retries,
        }
    }
}
