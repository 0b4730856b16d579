//! # Redcedar
//!
//! Server-side middleware and authentication for Redcedar apps.
//!
//! This is the facade crate. It re-exports:
//!
//! | Module | Crate | Contents |
//! |--------|-------|----------|
//! | [`middleware`] | `redcedar-middleware` | cookie jar, request/response, invocation pipeline, route table |
//! | [`auth`] | `redcedar-auth` | dbAuth and Supabase auth middleware |
//! | [`server`] | `redcedar-server` | hyper host with GET rendering and graceful shutdown |
//! | [`telemetry`] | `redcedar-telemetry` | logging setup |
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use redcedar::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(&LogConfig::from_env()?)?;
//!
//!     let auth = DbAuthMiddleware::builder(DbAuthConfig::from_env()?)
//!         .current_user(current_user)
//!         .handler(db_auth_handler)
//!         .build()?;
//!
//!     let mut routes = MiddlewareRoutes::new();
//!     routes.route("/*", Arc::new(auth))?;
//!
//!     Server::builder()
//!         .config(ServerConfig::from_env()?)
//!         .router(routes)
//!         .renderer(render_page)
//!         .build()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/redcedar/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use redcedar_auth as auth;
pub use redcedar_middleware as middleware;
pub use redcedar_server as server;
pub use redcedar_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use redcedar::prelude::*;
/// ```
pub mod prelude {
    pub use redcedar_middleware::{
        invoke, invoke_with_response, CookieJar, CookieOptions, FnMiddleware, InvocationContext,
        Middleware, MiddlewareRequest, MiddlewareResponse, MiddlewareRouter, MiddlewareRoutes,
        Params, RedirectKind, SameSite, ServerAuthState,
    };

    pub use redcedar_auth::{
        AuthDecoder, AuthMiddleware, AuthProvider, CurrentUserResolver, DbAuthConfig,
        DbAuthHandler, DbAuthHandlerOutput, DbAuthMiddleware, DecodeError, SupabaseAuthMiddleware,
        SupabaseConfig, UpstreamError,
    };

    pub use redcedar_server::{RenderRequest, Renderer, Server, ServerConfig, ShutdownSignal};

    pub use redcedar_telemetry::{init_logging, LogConfig};
}
