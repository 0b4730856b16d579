//! Supabase session auth.
//!
//! A request is handled only when its `auth-provider` cookie is
//! `supabase`. The session cookie `sb-<project_ref>-auth-token` (possibly
//! chunked) carries the access token; a failed decode expires the
//! `auth-provider` cookie, the session cookie and any chunks the request
//! sent.
//!
//! ```rust,ignore
//! let middleware = SupabaseAuthMiddleware::builder(SupabaseConfig::from_env()?)
//!     .current_user(|claims: Value| async move { load_user(claims).await })
//!     .build()?;
//! ```

mod decoder;

use std::sync::Arc;

use serde_json::Value;

use redcedar_middleware::MiddlewareRequest;

pub use decoder::{access_token, assemble_session_cookie, SupabaseDecoder};

use crate::collaborators::{CurrentUserResolver, RolesExtractor};
use crate::config::{SupabaseConfig, AUTH_PROVIDER_COOKIE};
use crate::decoder::AuthDecoder;
use crate::error::{ConfigResult, ConfigurationError};
use crate::provider::{AuthMiddleware, AuthProvider};

/// Provider tag for Supabase.
pub const PROVIDER_TAG: &str = "supabase";

/// The Supabase provider capabilities.
#[derive(Debug, Clone)]
pub struct SupabaseProvider {
    config: SupabaseConfig,
    cookie_name: String,
}

impl SupabaseProvider {
    /// Creates the provider from its configuration.
    pub fn new(config: SupabaseConfig) -> ConfigResult<Self> {
        let cookie_name = config.session_cookie_name()?;
        Ok(Self {
            config,
            cookie_name,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Returns the base session cookie name.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }
}

impl AuthProvider for SupabaseProvider {
    fn tag(&self) -> &'static str {
        PROVIDER_TAG
    }

    fn middleware_name(&self) -> &'static str {
        "supabase"
    }

    fn endpoint_prefix(&self) -> &str {
        &self.config.endpoint_prefix
    }

    fn is_relevant(&self, request: &MiddlewareRequest) -> bool {
        request
            .cookies()
            .get(AUTH_PROVIDER_COOKIE)
            .is_some_and(|tag| tag.eq_ignore_ascii_case(PROVIDER_TAG))
    }

    fn cookies_to_clear(&self, request: &MiddlewareRequest) -> Vec<String> {
        let mut names = vec![AUTH_PROVIDER_COOKIE.to_string(), self.cookie_name.clone()];

        let jar = request.cookies();
        names.extend(
            (0..)
                .map(|index| format!("{}.{index}", self.cookie_name))
                .take_while(|chunk| jar.has(chunk)),
        );
        names
    }

    fn user_metadata(&self, current_user: &Value) -> Option<Value> {
        current_user.get("user_metadata").cloned()
    }
}

/// Supabase auth middleware.
pub type SupabaseAuthMiddleware = AuthMiddleware<SupabaseProvider>;

impl SupabaseAuthMiddleware {
    /// Starts building a middleware for `config`.
    #[must_use]
    pub fn builder(config: SupabaseConfig) -> SupabaseAuthMiddlewareBuilder {
        SupabaseAuthMiddlewareBuilder {
            config,
            current_user: None,
            decoder: None,
            roles: None,
        }
    }
}

/// Builder for [`SupabaseAuthMiddleware`].
pub struct SupabaseAuthMiddlewareBuilder {
    config: SupabaseConfig,
    current_user: Option<Arc<dyn CurrentUserResolver>>,
    decoder: Option<Arc<dyn AuthDecoder>>,
    roles: Option<Arc<dyn RolesExtractor>>,
}

impl SupabaseAuthMiddlewareBuilder {
    /// Sets the current-user resolver (required).
    #[must_use]
    pub fn current_user(mut self, resolver: impl CurrentUserResolver) -> Self {
        self.current_user = Some(Arc::new(resolver));
        self
    }

    /// Replaces the token decoder.
    ///
    /// Without one, a [`SupabaseDecoder`] is built from the JWT secret.
    #[must_use]
    pub fn decoder(mut self, decoder: impl AuthDecoder) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Populates roles from the decoded claims.
    #[must_use]
    pub fn roles(mut self, roles: impl RolesExtractor) -> Self {
        self.roles = Some(Arc::new(roles));
        self
    }

    /// Builds the middleware.
    pub fn build(self) -> ConfigResult<SupabaseAuthMiddleware> {
        let resolver = self.current_user.ok_or_else(|| {
            ConfigurationError::invalid_value("current_user", "a current-user resolver is required")
        })?;
        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => Arc::new(SupabaseDecoder::new(&self.config)?),
        };

        let mut middleware = AuthMiddleware::new(SupabaseProvider::new(self.config)?, decoder, resolver);
        if let Some(roles) = self.roles {
            middleware = middleware.with_roles(roles);
        }
        Ok(middleware)
    }
}

impl std::fmt::Debug for SupabaseAuthMiddlewareBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseAuthMiddlewareBuilder")
            .field("config", &self.config)
            .field("current_user", &self.current_user.is_some())
            .field("decoder", &self.decoder.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, UpstreamError};
    use bytes::Bytes;
    use serde_json::json;

    fn config() -> SupabaseConfig {
        SupabaseConfig::builder("https://example.supabase.co")
            .unwrap()
            .jwt_secret("fake-jwt-secret")
            .build()
            .unwrap()
    }

    fn request(cookie: &str) -> MiddlewareRequest {
        MiddlewareRequest::new(
            http::Request::builder()
                .uri("/")
                .header("cookie", cookie)
                .body(Bytes::new())
                .unwrap(),
        )
    }

    #[test]
    fn test_relevance() {
        let provider = SupabaseProvider::new(config()).unwrap();

        assert!(provider.is_relevant(&request("auth-provider=supabase")));
        assert!(provider.is_relevant(&request("auth-provider=Supabase")));
        assert!(!provider.is_relevant(&request("auth-provider=dbAuth")));
        assert!(!provider.is_relevant(&request("sb-example-auth-token=abc")));
    }

    #[test]
    fn test_cookies_to_clear_includes_chunks() {
        let provider = SupabaseProvider::new(config()).unwrap();

        assert_eq!(
            provider.cookies_to_clear(&request("auth-provider=supabase")),
            vec!["auth-provider", "sb-example-auth-token"]
        );
        assert_eq!(
            provider.cookies_to_clear(&request(
                "auth-provider=supabase; sb-example-auth-token.0=a; sb-example-auth-token.1=b"
            )),
            vec![
                "auth-provider",
                "sb-example-auth-token",
                "sb-example-auth-token.0",
                "sb-example-auth-token.1",
            ]
        );
    }

    #[test]
    fn test_user_metadata() {
        let provider = SupabaseProvider::new(config()).unwrap();
        let user = json!({ "id": 1, "user_metadata": { "favoriteColor": "yellow" } });

        assert_eq!(
            provider.user_metadata(&user),
            Some(json!({ "favoriteColor": "yellow" }))
        );
        assert_eq!(provider.user_metadata(&json!({ "id": 1 })), None);
    }

    #[test]
    fn test_builder() {
        let built = SupabaseAuthMiddleware::builder(config())
            .current_user(|_claims: Value| async { Ok::<_, UpstreamError>(Value::Null) })
            .decoder(|_cookie: &str, _provider: &str| Ok::<_, DecodeError>(Value::Null))
            .build()
            .unwrap();
        assert_eq!(built.provider().cookie_name(), "sb-example-auth-token");

        let missing_user = SupabaseAuthMiddleware::builder(config()).build();
        assert!(missing_user.is_err());

        let no_secret = SupabaseConfig::builder("https://example.supabase.co")
            .unwrap()
            .build()
            .unwrap();
        let missing_secret = SupabaseAuthMiddleware::builder(no_secret)
            .current_user(|_claims: Value| async { Ok::<_, UpstreamError>(Value::Null) })
            .build();
        assert!(matches!(missing_secret, Err(ConfigurationError::MissingVar { .. })));
    }
}
