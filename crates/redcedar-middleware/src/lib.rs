//! # Redcedar Middleware
//!
//! Request/response model and invocation pipeline for Redcedar middleware.
//!
//! Every server-rendered request and every non-GET call passes through one
//! resolved middleware before anything else happens:
//!
//! ```text
//! wire request ─► MiddlewareRouter::find ─► invoke ─► Middleware::invoke
//!                                              │
//!       (MiddlewareResponse, auth state) ◄─────┘
//! ```
//!
//! | Type | Role |
//! |------|------|
//! | [`MiddlewareRequest`] | read-only view of the wire request, its cookies, and the auth slot |
//! | [`MiddlewareResponse`] | status, headers, outbound [`CookieJar`](cookie::CookieJar) and optional body |
//! | [`ServerAuthContext`] | per-request slot written by auth middleware |
//! | [`InvocationContext`] | request id, route params and typed extensions |
//! | [`invoke`] | runs a middleware and returns the response with the decoded auth state |
//!
//! A response without a body means "keep going and render"; a body or a
//! redirect ends the request with the middleware's response.
//!
//! ## Example
//!
//! ```
//! use bytes::Bytes;
//! use redcedar_middleware::{invoke, FnMiddleware, InvocationContext, MiddlewareResponse};
//! use redcedar_middleware::cookie::CookieOptions;
//!
//! # tokio_test::block_on(async {
//! let mw = FnMiddleware::new("greeter", |req, mut res, _ctx| {
//!     Box::pin(async move {
//!         if req.cookies().get("seen").is_none() {
//!             res.cookies_mut().set("seen", "1", CookieOptions::new().path("/"));
//!         }
//!         res
//!     })
//! });
//!
//! let request = http::Request::builder().uri("/").body(Bytes::new()).unwrap();
//! let (response, _auth) = invoke(request, Some(&mw), &InvocationContext::new()).await;
//!
//! assert!(!response.has_body());
//! assert_eq!(response.set_cookie_headers(), vec!["seen=1; Path=/"]);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/redcedar-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth_state;
pub mod context;
pub mod cookie;
pub mod error;
pub mod invoke;
pub mod middleware;
pub mod request;
pub mod response;
pub mod router;
pub mod types;

pub use auth_state::{AuthContextEntry, ServerAuthContext, ServerAuthState};
pub use context::InvocationContext;
pub use cookie::{Cookie, CookieJar, CookieOptions, SameSite};
pub use error::{MiddlewareError, MiddlewareResult};
pub use invoke::{invoke, invoke_with_response, run, Invocation};
pub use middleware::{BoxFuture, FnMiddleware, Middleware};
pub use request::MiddlewareRequest;
pub use response::{MiddlewareResponse, RedirectKind};
pub use router::{MiddlewareRouter, MiddlewareRoutes, Params, RouteMatch};
pub use types::{Request, Response, ResponseExt};
