//! Decoder for Supabase session cookies.
//!
//! The Supabase client stores its session in `sb-<ref>-auth-token`, split
//! into `.0`, `.1`, ... chunks when it is too large for one cookie. The
//! stored value is JSON, optionally percent-encoded and optionally written
//! as `base64-<base64url>`. Its `access_token` is an HS256 JWT.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use percent_encoding::percent_decode_str;
use serde_json::Value;

use redcedar_middleware::{BoxFuture, CookieJar};

use super::PROVIDER_TAG;
use crate::config::{SupabaseConfig, SUPABASE_JWT_SECRET_VAR};
use crate::decoder::AuthDecoder;
use crate::error::{ConfigResult, ConfigurationError, DecodeError};

const BASE64_PREFIX: &str = "base64-";

/// Reassembles a possibly chunked session cookie.
///
/// Returns `None` when neither the whole cookie nor a first chunk exists.
pub fn assemble_session_cookie(jar: &CookieJar, name: &str) -> Option<String> {
    if let Some(value) = jar.get(name) {
        return Some(value.to_string());
    }

    let chunks: Vec<&str> = (0..)
        .map_while(|index| jar.get(&format!("{name}.{index}")))
        .collect();

    (!chunks.is_empty()).then(|| chunks.concat())
}

/// Extracts the access token from a stored session value.
pub fn access_token(raw: &str) -> Result<String, DecodeError> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| DecodeError::malformed("session cookie is not UTF-8"))?;

    let session = match decoded.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = URL_SAFE_NO_PAD
                .decode(encoded.trim_end_matches('='))
                .map_err(|_| DecodeError::malformed("session cookie is not base64url"))?;
            String::from_utf8(bytes)
                .map_err(|_| DecodeError::malformed("session cookie is not UTF-8"))?
        }
        None => decoded.into_owned(),
    };

    match serde_json::from_str::<Value>(&session) {
        Ok(Value::Object(map)) => map
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DecodeError::malformed("session has no access_token")),
        Ok(Value::Array(items)) => items
            .first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DecodeError::malformed("session array has no access token")),
        Ok(_) => Err(DecodeError::malformed("unexpected session shape")),
        Err(_) if session.split('.').count() == 3 => Ok(session),
        Err(_) => Err(DecodeError::malformed("session cookie is not JSON")),
    }
}

/// Verifies Supabase access tokens taken from the session cookie.
#[derive(Clone)]
pub struct SupabaseDecoder {
    cookie_name: String,
    key: DecodingKey,
    validation: Validation,
}

impl SupabaseDecoder {
    /// Creates a decoder from the provider configuration.
    pub fn new(config: &SupabaseConfig) -> ConfigResult<Self> {
        let secret = config
            .jwt_secret
            .as_deref()
            .ok_or_else(|| ConfigurationError::missing_var(SUPABASE_JWT_SECRET_VAR))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.as_str()]);

        Ok(Self {
            cookie_name: config.session_cookie_name()?,
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Returns the session cookie this decoder reads.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Verifies a raw access token and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Value, DecodeError> {
        jsonwebtoken::decode::<Value>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => DecodeError::Expired,
                ErrorKind::InvalidSignature => DecodeError::SignatureMismatch,
                _ => DecodeError::malformed(err.to_string()),
            })
    }

    fn decode_sync(&self, cookie_header: &str) -> Result<Value, DecodeError> {
        let jar = CookieJar::parse(cookie_header);
        let raw = assemble_session_cookie(&jar, &self.cookie_name).ok_or_else(|| {
            DecodeError::MissingSession {
                cookie: self.cookie_name.clone(),
            }
        })?;

        self.verify(&access_token(&raw)?)
    }
}

impl AuthDecoder for SupabaseDecoder {
    fn decode<'a>(
        &'a self,
        cookie_header: &'a str,
        provider: &'a str,
    ) -> BoxFuture<'a, Result<Value, DecodeError>> {
        let result = if provider == PROVIDER_TAG {
            self.decode_sync(cookie_header)
        } else {
            Err(DecodeError::malformed(format!(
                "Supabase decoder cannot decode '{provider}' sessions"
            )))
        };
        Box::pin(async move { result })
    }
}

impl std::fmt::Debug for SupabaseDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseDecoder")
            .field("cookie_name", &self.cookie_name)
            .field("audience", &self.validation.aud)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters-long";

    fn config() -> SupabaseConfig {
        SupabaseConfig::builder("https://example.supabase.co")
            .unwrap()
            .jwt_secret(SECRET)
            .build()
            .unwrap()
    }

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn token(claims: &Value, secret: &str) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims() -> Value {
        json!({ "sub": "abc123", "aud": "authenticated", "exp": now() + 3600 })
    }

    #[test]
    fn test_assemble_chunks() {
        let jar = CookieJar::parse("sb-example-auth-token.0=abc; sb-example-auth-token.1=def; sb-example-auth-token.3=zzz");
        assert_eq!(
            assemble_session_cookie(&jar, "sb-example-auth-token").as_deref(),
            Some("abcdef")
        );

        let whole = CookieJar::parse("sb-example-auth-token=whole; sb-example-auth-token.0=chunk");
        assert_eq!(
            assemble_session_cookie(&whole, "sb-example-auth-token").as_deref(),
            Some("whole")
        );

        assert!(assemble_session_cookie(&CookieJar::new(), "sb-example-auth-token").is_none());
    }

    #[test]
    fn test_access_token_formats() {
        let json = r#"{"access_token":"a.b.c","refresh_token":"r"}"#;
        assert_eq!(access_token(json).unwrap(), "a.b.c");

        let encoded = format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(json));
        assert_eq!(access_token(&encoded).unwrap(), "a.b.c");

        let percent = "%7B%22access_token%22%3A%22a.b.c%22%7D";
        assert_eq!(access_token(percent).unwrap(), "a.b.c");

        assert_eq!(access_token(r#"["a.b.c","refresh"]"#).unwrap(), "a.b.c");
        assert_eq!(access_token("a.b.c").unwrap(), "a.b.c");

        assert!(access_token("dummy_access_token").is_err());
        assert!(access_token(r#"{"refresh_token":"r"}"#).is_err());
    }

    #[tokio::test]
    async fn test_decodes_valid_session() {
        let decoder = SupabaseDecoder::new(&config()).unwrap();
        let session = json!({ "access_token": token(&valid_claims(), SECRET) }).to_string();
        let header = format!("auth-provider=supabase;sb-example-auth-token={session}");

        let claims = decoder.decode(&header, PROVIDER_TAG).await.unwrap();
        assert_eq!(claims["sub"], "abc123");
    }

    #[test]
    fn test_verify_errors() {
        let decoder = SupabaseDecoder::new(&config()).unwrap();

        let forged = token(&valid_claims(), "another-secret-that-is-also-long-enough");
        assert_eq!(decoder.verify(&forged), Err(DecodeError::SignatureMismatch));

        let expired = token(
            &json!({ "sub": "abc123", "aud": "authenticated", "exp": now() - 3600 }),
            SECRET,
        );
        assert_eq!(decoder.verify(&expired), Err(DecodeError::Expired));

        let wrong_audience = token(
            &json!({ "sub": "abc123", "aud": "anon", "exp": now() + 3600 }),
            SECRET,
        );
        assert!(matches!(
            decoder.verify(&wrong_audience),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_session() {
        let decoder = SupabaseDecoder::new(&config()).unwrap();
        let err = decoder
            .decode("auth-provider=supabase", PROVIDER_TAG)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DecodeError::MissingSession {
                cookie: "sb-example-auth-token".to_string()
            }
        );
    }

    #[test]
    fn test_requires_jwt_secret() {
        let config = SupabaseConfig::builder("https://example.supabase.co")
            .unwrap()
            .build()
            .unwrap();
        assert!(SupabaseDecoder::new(&config).is_err());
    }
}
