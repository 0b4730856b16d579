//! Server configuration types.
//!
//! Configuration comes from code (the builder), the environment, or a TOML
//! file:
//!
//! ```toml
//! http_addr = "0.0.0.0:8910"
//! request_timeout_secs = 30
//! shutdown_timeout_secs = 10
//! ```
//!
//! # Example
//!
//! ```rust
//! use redcedar_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .http_addr("127.0.0.1:8910")
//!     .request_timeout(Duration::from_secs(5))
//!     .build();
//!
//! assert_eq!(config.http_addr(), "127.0.0.1:8910");
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ServerError, ServerResult};

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8910";

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default shutdown drain timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Environment variable overriding the bind address.
pub const HTTP_ADDR_VAR: &str = "REDCEDAR_HTTP_ADDR";

/// Environment variable overriding the request timeout (seconds).
pub const REQUEST_TIMEOUT_VAR: &str = "REDCEDAR_REQUEST_TIMEOUT_SECS";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    http_addr: String,
    request_timeout: Duration,
    shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Creates a builder with default values.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Reads overrides from the environment (and `.env`) on top of the defaults.
    pub fn from_env() -> ServerResult<Self> {
        let mut builder = Self::builder();

        if let Ok(addr) = dotenvy::var(HTTP_ADDR_VAR) {
            builder = builder.http_addr(addr);
        }
        if let Ok(secs) = dotenvy::var(REQUEST_TIMEOUT_VAR) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ServerError::config(format!("{REQUEST_TIMEOUT_VAR} must be a whole number of seconds"))
            })?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> ServerResult<Self> {
        let file: ConfigFile =
            toml::from_str(source).map_err(|e| ServerError::config(e.to_string()))?;

        let mut builder = Self::builder();
        if let Some(addr) = file.http_addr {
            builder = builder.http_addr(addr);
        }
        if let Some(secs) = file.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = file.shutdown_timeout_secs {
            builder = builder.shutdown_timeout(Duration::from_secs(secs));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Returns the HTTP bind address.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Parses the bind address.
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        self.http_addr
            .parse()
            .map_err(|e| ServerError::config(format!("invalid address '{}': {e}", self.http_addr)))
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns how long shutdown waits for open connections.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    fn validate(&self) -> ServerResult<()> {
        self.socket_addr()?;
        if self.request_timeout.is_zero() {
            return Err(ServerError::config("request timeout must be positive"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    http_addr: Option<String>,
    request_timeout_secs: Option<u64>,
    shutdown_timeout_secs: Option<u64>,
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    http_addr: String,
    request_timeout: Duration,
    shutdown_timeout: Duration,
}

impl ServerConfigBuilder {
    /// Creates a builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }

    /// Sets the HTTP bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = addr.into();
        self
    }

    /// Sets the per-request timeout.
    ///
    /// Covers body collection, middleware and rendering; expiry yields `504`.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the shutdown drain timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            http_addr: self.http_addr,
            request_timeout: self.request_timeout,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.http_addr(), DEFAULT_HTTP_ADDR);
        assert_eq!(
            config.request_timeout(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(
            config.shutdown_timeout(),
            Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig::builder().http_addr("127.0.0.1:8911").build();
        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.port(), 8911);

        let invalid = ServerConfig::builder().http_addr("not-an-address").build();
        assert!(invalid.socket_addr().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = ServerConfig::from_toml_str(
            r#"
            http_addr = "127.0.0.1:9000"
            request_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.http_addr(), "127.0.0.1:9000");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.shutdown_timeout(),
            Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(ServerConfig::from_toml_str("unknown = 1").is_err());
        assert!(ServerConfig::from_toml_str("request_timeout_secs = 0").is_err());
        assert!(ServerConfig::from_toml_str(r#"http_addr = "nope""#).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "shutdown_timeout_secs = 3").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(3));

        assert!(matches!(
            ServerConfig::from_file("/definitely/missing.toml"),
            Err(ServerError::Io(_))
        ));
    }
}
