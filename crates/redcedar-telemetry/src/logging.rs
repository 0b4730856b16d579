//! Structured logging for Redcedar.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either
//! JSON or human-readable output.
//!
//! # Example
//!
//! ```rust,ignore
//! use redcedar_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::production())?;
//!
//! tracing::info!(middleware = "dbAuth", "Session decoded");
//! ```

use serde::Deserialize;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Environment variable overriding [`LogConfig::level`].
pub const LOG_LEVEL_VAR: &str = "REDCEDAR_LOG";

/// Environment variable selecting the output format (`json` or `pretty`).
pub const LOG_FORMAT_VAR: &str = "REDCEDAR_LOG_FORMAT";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(TelemetryError::InvalidConfig(format!(
                "unknown log format `{other}`, expected `json` or `pretty`"
            ))),
        }
    }
}

/// Logging configuration.
///
/// Deserializes from a `[logging]` table; missing keys take the
/// [`Default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directives (e.g. `"info"`, `"redcedar_auth=debug,hyper=warn"`).
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Whether to emit span open/close events.
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Whether to include the target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at `debug`, with span events and source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            span_events: true,
            file_line_info: true,
            thread_ids: false,
            include_target: true,
        }
    }

    /// JSON output at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            span_events: false,
            file_line_info: false,
            thread_ids: false,
            include_target: true,
        }
    }

    /// Starts from [`production`](Self::production) and applies
    /// `REDCEDAR_LOG` and `REDCEDAR_LOG_FORMAT` from the environment or `.env`.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidConfig`] for an unknown format.
    pub fn from_env() -> TelemetryResult<Self> {
        let mut config = Self::production();
        if let Ok(level) = dotenvy::var(LOG_LEVEL_VAR) {
            config.level = level;
        }
        if let Ok(format) = dotenvy::var(LOG_FORMAT_VAR) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// Sets the filter directives.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Initializes the global subscriber.
///
/// `RUST_LOG` takes precedence over [`LogConfig::level`] when set.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for bad directives and
/// [`TelemetryError::LoggingInit`] if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => create_env_filter(&directives)?,
        _ => create_env_filter(&config.level)?,
    };

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_thread_ids(config.thread_ids)
        .with_target(config.include_target);

    let layer = match config.format {
        LogFormat::Json => fmt_layer.json().with_filter(filter).boxed(),
        LogFormat::Pretty => fmt_layer.pretty().with_filter(filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Parses filter directives.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the string does not parse.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

/// Standard log field names.
pub mod fields {
    /// Request ID.
    pub const REQUEST_ID: &str = "request_id";

    /// Middleware name.
    pub const MIDDLEWARE: &str = "middleware";

    /// Auth provider tag.
    pub const AUTH_PROVIDER: &str = "auth_provider";

    /// dbAuth verb.
    pub const DBAUTH_VERB: &str = "verb";

    /// Cookie name. Values are never logged.
    pub const COOKIE_NAME: &str = "cookie";

    /// HTTP method.
    pub const HTTP_METHOD: &str = "http.method";

    /// HTTP path.
    pub const HTTP_PATH: &str = "http.path";

    /// HTTP status code.
    pub const HTTP_STATUS: &str = "http.status_code";

    /// Duration in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Error.
    pub const ERROR: &str = "error";
}
