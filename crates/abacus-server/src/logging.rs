//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` pipeline: JSON lines for
//! production, a pretty format for development. `RUST_LOG` overrides
//! the configured level when set.
//!
//! # Example
//!
//! ```rust,ignore
//! use abacus_server::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::info!(request_id = %id, "Request completed");
//! ```

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level filter directive, e.g. `info` or `abacus_server=debug`.
    pub level: String,

    /// Whether to emit JSON lines instead of human-readable output.
    pub json_format: bool,

    /// Whether to include span open/close events.
    pub span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true, // JSON by default for production
            span_events: false,
        }
    }
}

impl LogConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
        }
    }
}

/// Errors from logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The configured level filter did not parse.
    #[error("invalid log level '{level}': {message}")]
    InvalidLevel {
        /// The rejected filter directive.
        level: String,
        /// Parser diagnostics.
        message: String,
    },

    /// A global subscriber is already installed.
    #[error("failed to install logging subscriber: {message}")]
    InitFailed {
        /// Description of the failure.
        message: String,
    },
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns [`LoggingError::InvalidLevel`] when the configured filter
/// does not parse, [`LoggingError::InitFailed`] when a subscriber is
/// already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| parse_filter(&config.level))?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LoggingError::InitFailed {
                message: e.to_string(),
            })?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LoggingError::InitFailed {
                message: e.to_string(),
            })?;
    }

    Ok(())
}

fn parse_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidLevel {
        level: level.to_string(),
        message: e.to_string(),
    })
}

/// Standard log field names.
///
/// Use these names for consistency across log statements.
pub mod fields {
    /// Request ID field name.
    pub const REQUEST_ID: &str = "request_id";

    /// API method field name.
    pub const METHOD: &str = "method";

    /// HTTP status code field name.
    pub const HTTP_STATUS: &str = "http.status_code";

    /// Duration field name (in milliseconds).
    pub const DURATION_MS: &str = "duration_ms";
}
