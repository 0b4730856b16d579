//! The middleware trait.
//!
//! A middleware receives the wrapped request, the response under
//! construction, and the invocation context. It returns the response that
//! should continue through the pipeline. Returning the response it was given
//! untouched is the pass-through: ownership moves in and back out, so the
//! caller receives the very same value without a copy.
//!
//! # Example
//!
//! ```
//! use redcedar_middleware::{
//!     BoxFuture, InvocationContext, Middleware, MiddlewareRequest, MiddlewareResponse,
//! };
//!
//! struct Maintenance;
//!
//! impl Middleware for Maintenance {
//!     fn name(&self) -> &'static str {
//!         "maintenance"
//!     }
//!
//!     fn invoke<'a>(
//!         &'a self,
//!         request: &'a mut MiddlewareRequest,
//!         response: MiddlewareResponse,
//!         _ctx: &'a InvocationContext,
//!     ) -> BoxFuture<'a, MiddlewareResponse> {
//!         Box::pin(async move {
//!             if request.path().starts_with("/admin") {
//!                 MiddlewareResponse::with_body("Down for maintenance")
//!             } else {
//!                 response
//!             }
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::InvocationContext;
use crate::request::MiddlewareRequest;
use crate::response::MiddlewareResponse;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request-scoped middleware.
///
/// Implementations may write the request's
/// [`ServerAuthContext`](crate::ServerAuthContext) and must not spawn
/// detached work that outlives the returned future; everything a middleware
/// does is visible to the caller once the future resolves.
pub trait Middleware: Send + Sync + 'static {
    /// Returns a short name used in logs and spans.
    fn name(&self) -> &'static str;

    /// Runs the middleware.
    fn invoke<'a>(
        &'a self,
        request: &'a mut MiddlewareRequest,
        response: MiddlewareResponse,
        ctx: &'a InvocationContext,
    ) -> BoxFuture<'a, MiddlewareResponse>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn invoke<'a>(
        &'a self,
        request: &'a mut MiddlewareRequest,
        response: MiddlewareResponse,
        ctx: &'a InvocationContext,
    ) -> BoxFuture<'a, MiddlewareResponse> {
        (**self).invoke(request, response, ctx)
    }
}

/// A middleware backed by a closure.
///
/// ```
/// use redcedar_middleware::{FnMiddleware, MiddlewareResponse, RedirectKind};
///
/// let mw = FnMiddleware::new("legacy-redirect", |request, response, _ctx| {
///     Box::pin(async move {
///         if request.path() == "/old" {
///             MiddlewareResponse::redirect("/new", RedirectKind::Permanent).unwrap_or(response)
///         } else {
///             response
///         }
///     })
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(
            &'a mut MiddlewareRequest,
            MiddlewareResponse,
            &'a InvocationContext,
        ) -> BoxFuture<'a, MiddlewareResponse>
        + Send
        + Sync
        + 'static,
{
    /// Wraps a closure as a middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(
            &'a mut MiddlewareRequest,
            MiddlewareResponse,
            &'a InvocationContext,
        ) -> BoxFuture<'a, MiddlewareResponse>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn invoke<'a>(
        &'a self,
        request: &'a mut MiddlewareRequest,
        response: MiddlewareResponse,
        ctx: &'a InvocationContext,
    ) -> BoxFuture<'a, MiddlewareResponse> {
        (self.func)(request, response, ctx)
    }
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_state::ServerAuthState;
    use bytes::Bytes;
    use http::StatusCode;

    fn request(uri: &str) -> MiddlewareRequest {
        MiddlewareRequest::new(http::Request::builder().uri(uri).body(Bytes::new()).unwrap())
    }

    struct Teapot;

    impl Middleware for Teapot {
        fn name(&self) -> &'static str {
            "teapot"
        }

        fn invoke<'a>(
            &'a self,
            _request: &'a mut MiddlewareRequest,
            response: MiddlewareResponse,
            _ctx: &'a InvocationContext,
        ) -> BoxFuture<'a, MiddlewareResponse> {
            Box::pin(async move { response.with_status(StatusCode::IM_A_TEAPOT) })
        }
    }

    #[tokio::test]
    async fn test_trait_object_invocation() {
        let mw: Arc<dyn Middleware> = Arc::new(Teapot);
        let ctx = InvocationContext::new();
        let mut req = request("/");

        let res = mw.invoke(&mut req, MiddlewareResponse::next(), &ctx).await;
        assert_eq!(mw.name(), "teapot");
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_fn_middleware_can_write_auth_context() {
        let mw = FnMiddleware::new("auth-stub", |request, response, _ctx| {
            Box::pin(async move {
                request
                    .server_auth_context_mut()
                    .set(ServerAuthState::unauthenticated());
                response
            })
        });

        let ctx = InvocationContext::new();
        let mut req = request("/");
        let res = mw.invoke(&mut req, MiddlewareResponse::next(), &ctx).await;

        assert_eq!(res, MiddlewareResponse::next());
        assert!(req.server_auth_context().is_set());
        assert!(format!("{mw:?}").contains("auth-stub"));
    }
}
