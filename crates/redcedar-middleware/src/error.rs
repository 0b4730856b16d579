//! Middleware error types.

use thiserror::Error;

/// Result type alias using [`MiddlewareError`].
pub type MiddlewareResult<T> = Result<T, MiddlewareError>;

/// Errors raised while building middleware responses or route tables.
#[derive(Debug, Error)]
pub enum MiddlewareError {
    /// A redirect target cannot be encoded as a `Location` header.
    #[error("invalid redirect location: {location}")]
    InvalidLocation {
        /// The rejected location.
        location: String,
    },

    /// A header name is not a valid HTTP token.
    #[error("invalid header name: {name}")]
    InvalidHeaderName {
        /// The rejected name.
        name: String,
    },

    /// A header value contains bytes that cannot be sent on the wire.
    #[error("invalid value for header {name}")]
    InvalidHeaderValue {
        /// The header the value was meant for.
        name: String,
    },

    /// A route pattern could not be registered.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidRoute {
        /// The rejected pattern.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MiddlewareError::InvalidRoute {
            pattern: "users".to_string(),
            reason: "must start with '/'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid route pattern 'users': must start with '/'"
        );

        let err = MiddlewareError::InvalidHeaderValue {
            name: "location".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value for header location");
    }
}
