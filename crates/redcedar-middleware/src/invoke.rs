//! The middleware invocation pipeline.
//!
//! [`invoke`] wraps a wire request, runs the resolved middleware (if any)
//! and returns the response together with the auth state the middleware
//! decoded. Everything the middleware does has completed by the time the
//! returned future resolves.

use tracing::Instrument;

use crate::auth_state::ServerAuthState;
use crate::context::InvocationContext;
use crate::middleware::Middleware;
use crate::request::MiddlewareRequest;
use crate::response::MiddlewareResponse;
use crate::types::Request;

/// Result of one pipeline run.
///
/// The auth state is `None` when decoding was attempted and failed, and the
/// unauthenticated default when no middleware wrote the slot.
pub type Invocation = (MiddlewareResponse, Option<ServerAuthState>);

/// Runs `middleware` against `request`, starting from a pass-through response.
///
/// Without a middleware this is a pure pass-through: the request is wrapped,
/// no decoding happens, and the default auth state is returned.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use redcedar_middleware::{invoke, InvocationContext, MiddlewareResponse, ServerAuthState};
///
/// # tokio_test::block_on(async {
/// let request = http::Request::builder().uri("/").body(Bytes::new()).unwrap();
/// let (response, auth) = invoke(request, None, &InvocationContext::new()).await;
///
/// assert_eq!(response, MiddlewareResponse::next());
/// assert_eq!(auth, Some(ServerAuthState::unauthenticated()));
/// # });
/// ```
pub async fn invoke(
    request: Request,
    middleware: Option<&dyn Middleware>,
    ctx: &InvocationContext,
) -> Invocation {
    invoke_with_response(request, middleware, MiddlewareResponse::next(), ctx).await
}

/// Runs `middleware` against `request`, starting from a caller-supplied response.
///
/// If the middleware passes the response through, the caller gets the
/// supplied value back unchanged.
pub async fn invoke_with_response(
    request: Request,
    middleware: Option<&dyn Middleware>,
    initial: MiddlewareResponse,
    ctx: &InvocationContext,
) -> Invocation {
    let mut mw_request = MiddlewareRequest::new(request);
    run(&mut mw_request, middleware, initial, ctx).await
}

/// Runs `middleware` against an already wrapped request.
///
/// The auth context written by the middleware stays readable on `request`
/// after the call.
pub async fn run(
    request: &mut MiddlewareRequest,
    middleware: Option<&dyn Middleware>,
    initial: MiddlewareResponse,
    ctx: &InvocationContext,
) -> Invocation {
    let Some(middleware) = middleware else {
        return (initial, Some(ServerAuthState::unauthenticated()));
    };

    let span = tracing::info_span!(
        "middleware.invoke",
        middleware = middleware.name(),
        http.method = %request.method(),
        http.path = %request.path(),
        request_id = %ctx.request_id(),
    );

    async {
        let response = middleware.invoke(request, initial, ctx).await;
        let auth_state = request.server_auth_context().clone().into_auth_state();

        tracing::debug!(
            status = response.status().as_u16(),
            redirect = response.is_redirect(),
            has_body = response.has_body(),
            auth_decoded = auth_state.is_some(),
            elapsed_us = u64::try_from(ctx.elapsed().as_micros()).unwrap_or(u64::MAX),
            "Middleware completed"
        );

        (response, auth_state)
    }
    .instrument(span)
    .await
}
