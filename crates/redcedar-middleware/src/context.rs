//! Per-invocation context handed to middleware alongside the request.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::router::Params;

/// Header carrying a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Context that travels with a single middleware invocation.
///
/// Holds the request id, the route parameters captured by the
/// [`MiddlewareRouter`](crate::MiddlewareRouter), and a typed extension map
/// for data the host wants to share with middleware (a database pool, a
/// feature flag set, ...).
///
/// # Example
///
/// ```
/// use redcedar_middleware::InvocationContext;
///
/// #[derive(Clone)]
/// struct WebPort(u16);
///
/// let mut ctx = InvocationContext::new();
/// ctx.set_extension(WebPort(8910));
///
/// assert_eq!(ctx.get_extension::<WebPort>().unwrap().0, 8910);
/// ```
#[derive(Debug)]
pub struct InvocationContext {
    request_id: Uuid,
    params: Params,
    route: Option<String>,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl InvocationContext {
    /// Creates a context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(Uuid::now_v7())
    }

    /// Creates a context with a specific request id.
    #[must_use]
    pub fn with_request_id(request_id: Uuid) -> Self {
        Self {
            request_id,
            params: Params::new(),
            route: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Creates a context for an inbound request.
    ///
    /// Reuses a valid UUID from the `x-request-id` header, otherwise a new
    /// one is generated.
    #[must_use]
    pub fn for_request<B>(request: &http::Request<B>) -> Self {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .unwrap_or_else(Uuid::now_v7);

        Self::with_request_id(request_id)
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Returns the captured route parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Replaces the route parameters.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Returns a single route parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Returns the matched route pattern, if any.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Records the matched route pattern.
    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = Some(route.into());
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value, replacing any previous value of that type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Returns `true` if an extension of type `T` is stored.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}
