//! Server error types.

use std::net::SocketAddr;

use thiserror::Error;

/// Boxed error returned by renderers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised while configuring or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error outside of binding.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is invalid.
    #[error("invalid server configuration: {reason}")]
    Config {
        /// What was wrong.
        reason: String,
    },
}

impl ServerError {
    /// Creates a [`ServerError::Config`].
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ServerError::config("bad address");
        assert_eq!(err.to_string(), "invalid server configuration: bad address");

        let err = ServerError::Bind {
            addr: "127.0.0.1:80".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("failed to bind 127.0.0.1:80"));
    }
}
