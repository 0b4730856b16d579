//! # Redcedar Auth
//!
//! Session-cookie authentication middleware for Redcedar.
//!
//! Two providers share one decode flow ([`AuthMiddleware`]):
//!
//! | Provider | Relevant when | Session cookie | Clears on failure |
//! |----------|---------------|----------------|-------------------|
//! | [`dbauth`] | a `Cookie` header is present and `auth-provider` is absent or `dbAuth` | `session_%port%` (AES-256-CBC) | session, `auth-provider` |
//! | [`supabase`] | `auth-provider=supabase` | `sb-<ref>-auth-token[.N]` (HS256 JWT) | `auth-provider`, session, chunks |
//!
//! The application supplies the parts that touch its data:
//!
//! - [`CurrentUserResolver`]: turns decoded claims into the current user
//! - [`DbAuthHandler`]: serves dbAuth verbs (`login`, `logout`, ...)
//! - [`RolesExtractor`]: optional, fills `roles` in the auth state
//!
//! Decoders ([`AuthDecoder`]) are built from configuration by default and
//! can be replaced for tests or custom session formats.
//!
//! ## Example
//!
//! ```rust,ignore
//! use redcedar_auth::{DbAuthConfig, DbAuthMiddleware, DbAuthHandlerOutput};
//!
//! let middleware = DbAuthMiddleware::builder(DbAuthConfig::from_env()?)
//!     .current_user(|claims: Value| async move { users.find(claims["id"].as_i64()).await })
//!     .handler(|request: &Request| {
//!         let request = request.clone();
//!         async move { auth_handler.invoke(request).await }
//!     })
//!     .build()?;
//! ```

#![doc(html_root_url = "https://docs.rs/redcedar-auth/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod collaborators;
pub mod config;
pub mod dbauth;
pub mod decoder;
pub mod error;
pub mod provider;
pub mod supabase;

pub use collaborators::{
    ClaimRoles, CurrentUserResolver, DbAuthHandler, DbAuthHandlerOutput, HeaderEntry,
    RolesExtractor,
};
pub use config::{DbAuthConfig, DbAuthConfigBuilder, SupabaseConfig, SupabaseConfigBuilder, AUTH_PROVIDER_COOKIE};
pub use dbauth::{DbAuthDecoder, DbAuthMiddleware, DbAuthMiddlewareBuilder, DbAuthProvider, DbAuthVerb};
pub use decoder::AuthDecoder;
pub use error::{AuthOutcome, BoxError, ConfigResult, ConfigurationError, DecodeError, UpstreamError};
pub use provider::{AuthMiddleware, AuthProvider, CURRENT_USER_PATH};
pub use supabase::{SupabaseAuthMiddleware, SupabaseAuthMiddlewareBuilder, SupabaseDecoder, SupabaseProvider};
