//! The auth decoder contract.

use serde_json::Value;

use redcedar_middleware::BoxFuture;

use crate::error::DecodeError;

/// Turns a request's `Cookie` header into token claims.
///
/// `provider` is the tag of the provider asking (`"dbAuth"`, `"supabase"`).
/// Provider options are captured by the decoder when it is built.
///
/// Plain closures implement this trait, which keeps test doubles short:
///
/// ```
/// use redcedar_auth::{AuthDecoder, DecodeError};
/// use serde_json::json;
///
/// let decoder = |_cookie: &str, _provider: &str| Ok::<_, DecodeError>(json!({ "sub": "abc123" }));
///
/// let claims = tokio_test::block_on(decoder.decode("auth-provider=supabase", "supabase"));
/// assert_eq!(claims.unwrap()["sub"], "abc123");
/// ```
pub trait AuthDecoder: Send + Sync + 'static {
    /// Decodes the session carried by `cookie_header`.
    fn decode<'a>(
        &'a self,
        cookie_header: &'a str,
        provider: &'a str,
    ) -> BoxFuture<'a, Result<Value, DecodeError>>;
}

impl<F> AuthDecoder for F
where
    F: Fn(&str, &str) -> Result<Value, DecodeError> + Send + Sync + 'static,
{
    fn decode<'a>(
        &'a self,
        cookie_header: &'a str,
        provider: &'a str,
    ) -> BoxFuture<'a, Result<Value, DecodeError>> {
        let result = self(cookie_header, provider);
        Box::pin(async move { result })
    }
}
