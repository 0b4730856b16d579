//! The response under construction by middleware.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION, SET_COOKIE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

use crate::cookie::CookieJar;
use crate::error::{MiddlewareError, MiddlewareResult};
use crate::types::Response;

/// Status codes treated as redirects.
const REDIRECT_STATUSES: [StatusCode; 4] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

/// Redirect flavour for [`MiddlewareResponse::redirect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectKind {
    /// `302 Found`.
    #[default]
    Temporary,
    /// `301 Moved Permanently`.
    Permanent,
}

impl RedirectKind {
    /// Returns the status code emitted for this kind.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Temporary => StatusCode::FOUND,
            Self::Permanent => StatusCode::MOVED_PERMANENTLY,
        }
    }
}

/// An outbound response assembled by middleware.
///
/// A response without a body means "render downstream, I only contribute
/// headers and cookies". Cookies set on [`cookies_mut`](Self::cookies_mut)
/// become `Set-Cookie` lines when the response is converted with
/// [`to_response`](Self::to_response).
///
/// # Example
///
/// ```rust
/// use redcedar_middleware::{MiddlewareResponse, RedirectKind, ResponseExt};
/// use redcedar_middleware::cookie::CookieOptions;
///
/// let mut res = MiddlewareResponse::next();
/// res.cookies_mut().set("monster", "nomnomnom", CookieOptions::new().domain("example.com"));
///
/// let wire = res.to_response();
/// assert_eq!(wire.status(), 200);
/// assert_eq!(wire.set_cookies(), vec!["monster=nomnomnom; Domain=example.com"]);
///
/// let redirect = MiddlewareResponse::redirect("/bye", RedirectKind::Permanent).unwrap();
/// assert!(redirect.is_redirect());
/// assert_eq!(redirect.status(), 301);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MiddlewareResponse {
    status: StatusCode,
    headers: HeaderMap,
    cookies: CookieJar,
    body: Option<String>,
}

impl MiddlewareResponse {
    /// Creates an empty `200` response without a body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: CookieJar::new(),
            body: None,
        }
    }

    /// The pass-through response: status `200`, no headers, no body.
    #[must_use]
    pub fn next() -> Self {
        Self::new()
    }

    /// Creates a `200` response with a terminal body.
    #[must_use]
    pub fn with_body(body: impl Into<String>) -> Self {
        let mut response = Self::new();
        response.body = Some(body.into());
        response
    }

    /// Creates a JSON response from a serializable value.
    #[must_use]
    pub fn json(value: &serde_json::Value) -> Self {
        let mut response = Self::with_body(value.to_string());
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    /// Creates a redirect to `location`.
    pub fn redirect(location: &str, kind: RedirectKind) -> MiddlewareResult<Self> {
        let value = HeaderValue::from_str(location).map_err(|_| MiddlewareError::InvalidLocation {
            location: location.to_string(),
        })?;

        let mut response = Self::new();
        response.status = kind.status();
        response.headers.insert(LOCATION, value);
        Ok(response)
    }

    /// Sets the status code.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Adds a header, keeping existing values of the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> MiddlewareResult<Self> {
        self.append_header(name, value)?;
        Ok(self)
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Replaces the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the headers (excluding cookies held in the jar).
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Appends a header from string parts.
    ///
    /// Header names are normalised to lowercase.
    pub fn append_header(&mut self, name: &str, value: &str) -> MiddlewareResult<()> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| MiddlewareError::InvalidHeaderName {
                name: name.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| MiddlewareError::InvalidHeaderValue {
                name: name.to_string(),
            })?;
        self.headers.append(header_name, header_value);
        Ok(())
    }

    /// Appends a pre-serialized `Set-Cookie` line verbatim.
    pub fn append_set_cookie(&mut self, line: &str) -> MiddlewareResult<()> {
        self.append_header(SET_COOKIE.as_str(), line)
    }

    /// Returns the outbound cookie jar.
    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Returns the outbound cookie jar for modification.
    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// Returns the body, if one was set.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Option<String>) {
        self.body = body;
    }

    /// Returns `true` for a redirect status with a `Location` header.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUSES.contains(&self.status) && self.headers.contains_key(LOCATION)
    }

    /// Returns `true` if the response carries a terminal body.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// All `Set-Cookie` lines the wire response will carry.
    ///
    /// Raw lines appended to the headers come first, followed by the jar
    /// in insertion order.
    #[must_use]
    pub fn set_cookie_headers(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        lines.extend(self.cookies.to_set_cookie_headers());
        lines
    }

    /// Builds the wire response.
    ///
    /// The jar is appended as `Set-Cookie` lines without touching any other
    /// header. Calling this repeatedly yields equivalent responses.
    #[must_use]
    pub fn to_response(&self) -> Response {
        let mut headers = self.headers.clone();
        self.append_jar(&mut headers);

        let body = self.body.clone().map(Bytes::from).unwrap_or_default();
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }

    /// Merges headers and cookies into a response produced elsewhere.
    ///
    /// Headers already present on `response` win, except `Set-Cookie`,
    /// which is always appended.
    pub fn apply_to(&self, response: &mut Response) {
        let target = response.headers_mut();

        for name in self.headers.keys() {
            if name == SET_COOKIE {
                for value in self.headers.get_all(name) {
                    target.append(SET_COOKIE, value.clone());
                }
            } else if !target.contains_key(name) {
                for value in self.headers.get_all(name) {
                    target.append(name.clone(), value.clone());
                }
            }
        }

        self.append_jar(target);
    }

    fn append_jar(&self, headers: &mut HeaderMap) {
        for cookie in &self.cookies {
            match HeaderValue::from_str(&cookie.to_header_value()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(_) => {
                    tracing::warn!(cookie = cookie.name(), "Dropping cookie with invalid header bytes");
                }
            }
        }
    }
}

impl Default for MiddlewareResponse {
    fn default() -> Self {
        Self::new()
    }
}
