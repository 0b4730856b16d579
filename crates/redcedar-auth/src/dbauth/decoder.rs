//! Decoder for encrypted dbAuth session cookies.

use serde_json::Value;

use redcedar_middleware::{BoxFuture, CookieJar};

use super::session::decrypt_session;
use super::PROVIDER_TAG;
use crate::config::DbAuthConfig;
use crate::decoder::AuthDecoder;
use crate::error::{ConfigResult, DecodeError};

/// Decrypts the dbAuth session cookie into claims.
///
/// A `Cookie` header without the session cookie decodes to `null` claims;
/// the current-user resolver decides what that means.
#[derive(Clone)]
pub struct DbAuthDecoder {
    cookie_name: String,
    key: [u8; 32],
}

impl DbAuthDecoder {
    /// Creates a decoder from the provider configuration.
    pub fn new(config: &DbAuthConfig) -> ConfigResult<Self> {
        Ok(Self {
            cookie_name: config.resolved_cookie_name(),
            key: config.session_key()?,
        })
    }

    /// Returns the session cookie this decoder reads.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn decode_sync(&self, cookie_header: &str) -> Result<Value, DecodeError> {
        let jar = CookieJar::parse(cookie_header);
        let Some(value) = jar.get(&self.cookie_name) else {
            return Ok(Value::Null);
        };

        let session = decrypt_session(value, &self.key)?;
        serde_json::from_str(&session.data)
            .map_err(|e| DecodeError::malformed(format!("session payload is not JSON: {e}")))
    }
}

impl AuthDecoder for DbAuthDecoder {
    fn decode<'a>(
        &'a self,
        cookie_header: &'a str,
        provider: &'a str,
    ) -> BoxFuture<'a, Result<Value, DecodeError>> {
        let result = if provider == PROVIDER_TAG {
            self.decode_sync(cookie_header)
        } else {
            Err(DecodeError::malformed(format!(
                "dbAuth decoder cannot decode '{provider}' sessions"
            )))
        };
        Box::pin(async move { result })
    }
}

impl std::fmt::Debug for DbAuthDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbAuthDecoder")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}
