//! The request view handed to middleware.

use bytes::Bytes;
use http::header::COOKIE;
use http::{HeaderMap, Method, Uri};

use crate::auth_state::ServerAuthContext;
use crate::cookie::CookieJar;
use crate::types::Request;

/// Wraps an inbound wire request for middleware.
///
/// The wire request is immutable once wrapped. Cookies are parsed once from
/// the `Cookie` header into a read-only jar, and the only mutable part is the
/// [`ServerAuthContext`] slot.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use redcedar_middleware::MiddlewareRequest;
///
/// let request = http::Request::builder()
///     .uri("http://localhost:8911/middleware/dbauth/auth?method=login")
///     .header("cookie", "auth-provider=dbAuth")
///     .body(Bytes::new())
///     .unwrap();
///
/// let request = MiddlewareRequest::new(request);
/// assert_eq!(request.path(), "/middleware/dbauth/auth");
/// assert_eq!(request.query_param("method").as_deref(), Some("login"));
/// assert_eq!(request.cookies().get("auth-provider"), Some("dbAuth"));
/// ```
#[derive(Debug)]
pub struct MiddlewareRequest {
    inner: Request,
    cookies: CookieJar,
    server_auth_context: ServerAuthContext,
}

impl MiddlewareRequest {
    /// Wraps a wire request.
    #[must_use]
    pub fn new(request: Request) -> Self {
        let cookies = join_cookie_headers(request.headers())
            .map(|header| CookieJar::parse(&header))
            .unwrap_or_default();

        Self {
            inner: request,
            cookies,
            server_auth_context: ServerAuthContext::new(),
        }
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request URL as a string.
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.uri().to_string()
    }

    /// Returns the URL path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    /// Looks up a decoded query-string parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.inner.uri().query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)?.to_str().ok()
    }

    /// Returns the raw `Cookie` header.
    ///
    /// Multiple `Cookie` headers are joined with `"; "`.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        join_cookie_headers(self.inner.headers())
    }

    /// Returns the buffered request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    /// Returns the cookies sent with the request.
    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Returns the auth context slot.
    #[must_use]
    pub fn server_auth_context(&self) -> &ServerAuthContext {
        &self.server_auth_context
    }

    /// Returns the auth context slot for writing.
    pub fn server_auth_context_mut(&mut self) -> &mut ServerAuthContext {
        &mut self.server_auth_context
    }

    /// Returns the untouched wire request.
    #[must_use]
    pub fn inner(&self) -> &Request {
        &self.inner
    }

    /// Splits into the wire request and the auth context.
    #[must_use]
    pub fn into_parts(self) -> (Request, ServerAuthContext) {
        (self.inner, self.server_auth_context)
    }
}

impl From<Request> for MiddlewareRequest {
    fn from(request: Request) -> Self {
        Self::new(request)
    }
}

fn join_cookie_headers(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}
