//! Cookie parsing and `Set-Cookie` serialization.
//!
//! A [`CookieJar`] is used in two roles:
//!
//! - **Inbound**: parsed from a request's `Cookie` header and exposed
//!   read-only through [`MiddlewareRequest::cookies`](crate::MiddlewareRequest::cookies).
//! - **Outbound**: owned by a [`MiddlewareResponse`](crate::MiddlewareResponse)
//!   and serialized to one `Set-Cookie` line per cookie when the response is
//!   converted to its wire form.
//!
//! # Example
//!
//! ```rust
//! use redcedar_middleware::cookie::{CookieJar, CookieOptions};
//!
//! let mut jar = CookieJar::new();
//! jar.set("token", "hunter2", CookieOptions::new().domain("example.com").path("/").http_only(true));
//! jar.unset("legacy", CookieOptions::new());
//!
//! assert_eq!(
//!     jar.to_set_cookie_headers(),
//!     vec![
//!         "token=hunter2; Domain=example.com; Path=/; HttpOnly".to_string(),
//!         "legacy=; Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
//!     ]
//! );
//! ```

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Last second `httpdate` can format (9999-12-31T23:59:59Z).
const MAX_HTTP_DATE_SECS: u64 = 253_402_300_799;

/// Formats `time` as an IMF-fixdate, clamped to the representable range.
fn http_date(time: SystemTime) -> String {
    let latest = UNIX_EPOCH + Duration::from_secs(MAX_HTTP_DATE_SECS);
    httpdate::fmt_http_date(time.clamp(UNIX_EPOCH, latest))
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SameSite {
    /// Cookie is only sent with same-site requests.
    Strict,
    /// Cookie is sent with same-site requests and top-level navigations.
    Lax,
    /// Cookie is sent with cross-site requests (requires `Secure`).
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "Strict"),
            Self::Lax => write!(f, "Lax"),
            Self::None => write!(f, "None"),
        }
    }
}

/// Attributes attached to an outbound cookie.
///
/// Built with chained setters:
///
/// ```rust
/// use redcedar_middleware::cookie::{CookieOptions, SameSite};
///
/// let options = CookieOptions::new()
///     .path("/")
///     .http_only(true)
///     .secure(true)
///     .same_site(SameSite::Lax);
///
/// assert!(options.http_only);
/// assert_eq!(options.path.as_deref(), Some("/"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// `Domain` attribute.
    pub domain: Option<String>,
    /// `Path` attribute.
    pub path: Option<String>,
    /// `Expires` attribute, serialized as an IMF-fixdate.
    pub expires: Option<SystemTime>,
    /// `Max-Age` attribute, serialized in whole seconds.
    pub max_age: Option<Duration>,
    /// Emits the bare `HttpOnly` token.
    pub http_only: bool,
    /// Emits the bare `Secure` token.
    pub secure: bool,
    /// `SameSite` attribute.
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    /// Creates an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `Domain` attribute.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the `Path` attribute.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the `Expires` attribute.
    #[must_use]
    pub fn expires(mut self, expires: SystemTime) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Sets the `Max-Age` attribute.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Sets the `HttpOnly` flag.
    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets the `Secure` flag.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the `SameSite` attribute.
    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// A single named cookie with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    options: CookieOptions,
}

impl Cookie {
    /// Creates a cookie.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options,
        }
    }

    /// Returns the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the cookie attributes.
    #[must_use]
    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    /// Returns `true` if this cookie instructs the browser to delete it.
    #[must_use]
    pub fn is_expired_marker(&self) -> bool {
        self.value.is_empty() && self.options.expires == Some(UNIX_EPOCH)
    }

    /// Serializes the cookie as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];
        let options = &self.options;

        if let Some(ref domain) = options.domain {
            parts.push(format!("Domain={domain}"));
        }

        if let Some(ref path) = options.path {
            parts.push(format!("Path={path}"));
        }

        if let Some(expires) = options.expires {
            parts.push(format!("Expires={}", http_date(expires)));
        }

        if let Some(max_age) = options.max_age {
            parts.push(format!("Max-Age={}", max_age.as_secs()));
        }

        if options.http_only {
            parts.push("HttpOnly".to_string());
        }

        if options.secure {
            parts.push("Secure".to_string());
        }

        if let Some(same_site) = options.same_site {
            parts.push(format!("SameSite={same_site}"));
        }

        parts.join("; ")
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// Collection of cookies keyed by name, preserving insertion order.
///
/// Overwriting an existing name keeps its original position, so the order
/// of emitted `Set-Cookie` lines always follows first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<Cookie>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a request `Cookie` header.
    ///
    /// Pairs are separated by `;` and split on the first `=`, so values
    /// containing `=` survive intact. Surrounding double quotes are
    /// stripped and pairs without `=` are ignored.
    ///
    /// ```rust
    /// use redcedar_middleware::cookie::CookieJar;
    ///
    /// let jar = CookieJar::parse("session=abc|def==;auth-provider=dbAuth");
    /// assert_eq!(jar.get("session"), Some("abc|def=="));
    /// assert_eq!(jar.get("auth-provider"), Some("dbAuth"));
    /// ```
    #[must_use]
    pub fn parse(header_value: &str) -> Self {
        let mut jar = Self::new();

        for pair in header_value.split(';') {
            let pair = pair.trim();
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim().trim_matches('"');
                jar.set(name, value, CookieOptions::default());
            }
        }

        jar
    }

    /// Inserts or overwrites a cookie.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>, options: CookieOptions) {
        let cookie = Cookie::new(name, value, options);
        match self.entries.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => self.entries.push(cookie),
        }
    }

    /// Returns the raw value of a cookie.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_with_options(name).map(Cookie::value)
    }

    /// Returns a cookie together with its attributes.
    #[must_use]
    pub fn get_with_options(&self, name: &str) -> Option<&Cookie> {
        self.entries.iter().find(|c| c.name == name)
    }

    /// Marks a cookie for deletion.
    ///
    /// Equivalent to setting an empty value with `Expires` at the Unix
    /// epoch. Any domain or path in `options` is kept so the deletion
    /// targets the same scope as the original cookie.
    pub fn unset(&mut self, name: impl Into<String>, options: CookieOptions) {
        self.set(name, "", options.expires(UNIX_EPOCH));
    }

    /// Removes an entry from the jar without emitting a deletion.
    pub fn clear(&mut self, name: &str) -> Option<Cookie> {
        let index = self.entries.iter().position(|c| c.name == name)?;
        Some(self.entries.remove(index))
    }

    /// Returns `true` if a cookie with this name exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|c| c.name == name)
    }

    /// Returns cookie names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Cookie::name)
    }

    /// Iterates cookies in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.entries.iter()
    }

    /// Returns the number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes every cookie to a `Set-Cookie` value, in insertion order.
    #[must_use]
    pub fn to_set_cookie_headers(&self) -> Vec<String> {
        self.entries.iter().map(Cookie::to_header_value).collect()
    }
}

impl<'a> IntoIterator for &'a CookieJar {
    type Item = &'a Cookie;
    type IntoIter = std::slice::Iter<'a, Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
