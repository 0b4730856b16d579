//! Auth error types and the collaborator outcome.

use serde_json::Value;
use thiserror::Error;

/// Boxed error returned by application collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using [`ConfigurationError`].
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// A session token could not be turned into claims.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The provider's session cookie is not in the request.
    #[error("session cookie '{cookie}' is missing")]
    MissingSession {
        /// The expected cookie name.
        cookie: String,
    },

    /// The token is structurally invalid.
    #[error("malformed session token: {reason}")]
    Malformed {
        /// What was wrong with the token.
        reason: String,
    },

    /// The token is past its expiry.
    #[error("session token has expired")]
    Expired,

    /// The token signature does not match.
    #[error("session token signature mismatch")]
    SignatureMismatch,

    /// The encrypted session could not be decrypted.
    #[error("session decryption failed")]
    Decryption,
}

impl DecodeError {
    /// Creates a [`DecodeError::Malformed`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// An application collaborator failed.
///
/// Raised by current-user resolvers and dbAuth handlers. The auth
/// middleware treats it like a decode failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UpstreamError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl UpstreamError {
    /// Wraps an underlying error.
    pub fn new(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Provider configuration is missing or invalid.
///
/// Raised while building a middleware, never per request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A required environment variable is not set.
    #[error("missing required environment variable: {var}")]
    MissingVar {
        /// The variable name.
        var: String,
    },

    /// A configuration value is unusable.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a [`ConfigurationError::MissingVar`].
    pub fn missing_var(var: impl Into<String>) -> Self {
        Self::MissingVar { var: var.into() }
    }

    /// Creates a [`ConfigurationError::InvalidValue`].
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// What happened when the middleware asked its collaborators for a user.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The session decoded and the user was resolved.
    Authenticated {
        /// Decoded token claims.
        claims: Value,
        /// The resolved user.
        current_user: Value,
    },
    /// The session token could not be decoded.
    DecodeFailed(DecodeError),
    /// The current-user lookup failed.
    UpstreamFailed(UpstreamError),
}

impl AuthOutcome {
    /// Returns `true` for [`AuthOutcome::Authenticated`].
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}
