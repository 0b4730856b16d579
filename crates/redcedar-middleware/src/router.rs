//! Resolving a middleware for a request.
//!
//! The host only depends on the [`MiddlewareRouter`] contract. A small
//! ordered route table, [`MiddlewareRoutes`], is provided for applications
//! that do not bring their own matcher.
//!
//! ```rust
//! use std::sync::Arc;
//! use http::Method;
//! use redcedar_middleware::{FnMiddleware, MiddlewareRouter, MiddlewareRoutes};
//!
//! let noop = Arc::new(FnMiddleware::new("noop", |_req, res, _ctx| Box::pin(async move { res })));
//!
//! let mut routes = MiddlewareRoutes::new();
//! routes.route("/users/:id", noop.clone()).unwrap();
//! routes.route_method(Method::POST, "/middleware/*", noop).unwrap();
//!
//! let found = routes.find(&Method::GET, "http://localhost:8910/users/42?tab=posts").unwrap();
//! assert_eq!(found.params.get("id"), Some("42"));
//! assert_eq!(found.pattern, "/users/:id");
//!
//! assert!(routes.find(&Method::GET, "/middleware/dbauth").is_none());
//! ```

use std::fmt;
use std::sync::Arc;

use http::{Method, Uri};

use crate::error::{MiddlewareError, MiddlewareResult};
use crate::middleware::Middleware;

/// Name under which a trailing wildcard capture is stored.
pub const WILDCARD_PARAM: &str = "*";

/// Path parameters captured by a route match, in pattern order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: Vec<(String, String)>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter, replacing an existing value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.inner.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.inner.push((name, value)),
        }
    }

    /// Returns the value for a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// A resolved middleware and the parameters captured for it.
#[derive(Clone)]
pub struct RouteMatch {
    /// The middleware to invoke.
    pub handler: Arc<dyn Middleware>,
    /// Captured path parameters.
    pub params: Params,
    /// The pattern that matched.
    pub pattern: String,
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("handler", &self.handler.name())
            .field("params", &self.params)
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// Maps a method and URL to a middleware.
///
/// `url` may be an absolute URL or an origin-form path; any query string is
/// ignored for matching. `None` is a routing miss, not an error.
pub trait MiddlewareRouter: Send + Sync + 'static {
    /// Finds the middleware for a request.
    fn find(&self, method: &Method, url: &str) -> Option<RouteMatch>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

struct Route {
    method: Option<Method>,
    pattern: String,
    segments: Vec<Segment>,
    handler: Arc<dyn Middleware>,
}

impl Route {
    fn matches(&self, method: &Method, path: &[&str]) -> Option<Params> {
        if self.method.as_ref().is_some_and(|m| m != method) {
            return None;
        }

        let mut params = Params::new();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard => {
                    params.insert(WILDCARD_PARAM, path.get(index..)?.join("/"));
                    return Some(params);
                }
                Segment::Literal(literal) => {
                    if *path.get(index)? != literal.as_str() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), *path.get(index)?);
                }
            }
        }

        (path.len() == self.segments.len()).then_some(params)
    }
}

/// An ordered middleware route table.
///
/// Patterns are made of literal segments, `:name` parameters and an
/// optional trailing `*` that matches the rest of the path (including
/// nothing). Routes are tried in registration order and the first match
/// wins.
#[derive(Default)]
pub struct MiddlewareRoutes {
    routes: Vec<Route>,
}

impl MiddlewareRoutes {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a middleware for every method.
    pub fn route(
        &mut self,
        pattern: &str,
        handler: Arc<dyn Middleware>,
    ) -> MiddlewareResult<&mut Self> {
        self.push(None, pattern, handler)
    }

    /// Registers a middleware for a single method.
    pub fn route_method(
        &mut self,
        method: Method,
        pattern: &str,
        handler: Arc<dyn Middleware>,
    ) -> MiddlewareResult<&mut Self> {
        self.push(Some(method), pattern, handler)
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn push(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: Arc<dyn Middleware>,
    ) -> MiddlewareResult<&mut Self> {
        let segments = parse_pattern(pattern)?;
        tracing::debug!(
            pattern,
            method = method.as_ref().map_or("*", Method::as_str),
            middleware = handler.name(),
            "Registered middleware route"
        );
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments,
            handler,
        });
        Ok(self)
    }
}

impl MiddlewareRouter for MiddlewareRoutes {
    fn find(&self, method: &Method, url: &str) -> Option<RouteMatch> {
        let path = path_of(url);
        let segments = split_path(&path);

        self.routes.iter().find_map(|route| {
            route.matches(method, &segments).map(|params| RouteMatch {
                handler: Arc::clone(&route.handler),
                params,
                pattern: route.pattern.clone(),
            })
        })
    }
}

impl fmt::Debug for MiddlewareRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| &r.pattern))
            .finish()
    }
}

fn parse_pattern(pattern: &str) -> MiddlewareResult<Vec<Segment>> {
    let invalid = |reason: &str| MiddlewareError::InvalidRoute {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if !pattern.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let raw = split_path(pattern);
    let mut segments = Vec::with_capacity(raw.len());

    for (index, part) in raw.iter().enumerate() {
        let segment = if *part == "*" {
            if index + 1 != raw.len() {
                return Err(invalid("'*' is only allowed as the last segment"));
            }
            Segment::Wildcard
        } else if let Some(name) = part.strip_prefix(':') {
            if name.is_empty() {
                return Err(invalid("parameter name is empty"));
            }
            if segments.contains(&Segment::Param(name.to_string())) {
                return Err(invalid("duplicate parameter name"));
            }
            Segment::Param(name.to_string())
        } else {
            Segment::Literal((*part).to_string())
        };
        segments.push(segment);
    }

    Ok(segments)
}

fn path_of(url: &str) -> String {
    match url.parse::<Uri>() {
        Ok(uri) => uri.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
