//! The page renderer contract.
//!
//! GET requests that no middleware ended are handed to a [`Renderer`].
//! The renderer receives the wire request, the route params matched for the
//! middleware, and the auth state the middleware decoded.

use std::future::Future;

use uuid::Uuid;

use redcedar_middleware::{BoxFuture, Params, Request, Response, ServerAuthState};

use crate::error::BoxError;

/// Everything a renderer needs for one page.
#[derive(Debug)]
pub struct RenderRequest {
    /// The original request.
    pub request: Request,
    /// Route params from the middleware route table.
    pub params: Params,
    /// Decoded auth state; `None` when decoding failed.
    pub auth_state: Option<ServerAuthState>,
    /// Request id of the invocation.
    pub request_id: Uuid,
}

impl RenderRequest {
    /// Returns the request path.
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Returns `true` if an authenticated user is present.
    pub fn is_authenticated(&self) -> bool {
        self.auth_state
            .as_ref()
            .is_some_and(|state| state.is_authenticated)
    }
}

/// Produces the response for a page.
pub trait Renderer: Send + Sync + 'static {
    /// Renders the page for `request`.
    fn render(&self, request: RenderRequest) -> BoxFuture<'_, Result<Response, BoxError>>;
}

impl<F, Fut> Renderer for F
where
    F: Fn(RenderRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    fn render(&self, request: RenderRequest) -> BoxFuture<'_, Result<Response, BoxError>> {
        Box::pin(self(request))
    }
}
