//! Application-supplied collaborators called by the auth middleware.
//!
//! | Trait | Called with | Returns |
//! |-------|-------------|---------|
//! | [`CurrentUserResolver`] | decoded claims | the user object |
//! | [`DbAuthHandler`] | the untouched wire request | [`DbAuthHandlerOutput`] |
//! | [`RolesExtractor`] | decoded claims | role names |
//!
//! Each trait is implemented for matching closures.

use std::future::Future;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use redcedar_middleware::{BoxFuture, Request};

use crate::error::UpstreamError;

/// Looks up the current user from decoded claims.
///
/// ```
/// use redcedar_auth::{CurrentUserResolver, UpstreamError};
/// use serde_json::{json, Value};
///
/// let resolver = |claims: Value| async move {
///     Ok::<_, UpstreamError>(json!({ "id": claims["sub"], "email": "user-1@example.com" }))
/// };
///
/// let user = tokio_test::block_on(resolver.current_user(json!({ "sub": "abc123" }))).unwrap();
/// assert_eq!(user["id"], "abc123");
/// ```
pub trait CurrentUserResolver: Send + Sync + 'static {
    /// Resolves the user for `claims`.
    fn current_user(&self, claims: Value) -> BoxFuture<'_, Result<Value, UpstreamError>>;
}

impl<F, Fut> CurrentUserResolver for F
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, UpstreamError>> + Send + 'static,
{
    fn current_user(&self, claims: Value) -> BoxFuture<'_, Result<Value, UpstreamError>> {
        Box::pin(self(claims))
    }
}

/// A single header value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderEntry {
    /// One value.
    Single(String),
    /// Several values for the same name.
    Multi(Vec<String>),
}

impl HeaderEntry {
    /// Iterates over the values.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multi(values) => values,
        };
        values.iter().map(String::as_str)
    }
}

impl From<&str> for HeaderEntry {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for HeaderEntry {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for HeaderEntry {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

/// What a dbAuth handler produced for one verb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAuthHandlerOutput {
    /// Response body.
    pub body: String,
    /// Response headers, in the order the handler produced them.
    #[serde(default)]
    pub headers: IndexMap<String, HeaderEntry>,
    /// Numeric HTTP status.
    pub status_code: u16,
}

impl DbAuthHandlerOutput {
    /// Creates an output with no headers.
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: IndexMap::new(),
            status_code,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<HeaderEntry>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Performs dbAuth verbs (login, logout, signup, ...).
///
/// Receives the original wire request unchanged.
pub trait DbAuthHandler: Send + Sync + 'static {
    /// Handles one verb request.
    fn handle<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<DbAuthHandlerOutput, UpstreamError>>;
}

impl<F, Fut> DbAuthHandler for F
where
    F: Fn(&Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<DbAuthHandlerOutput, UpstreamError>> + Send + 'static,
{
    fn handle<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<DbAuthHandlerOutput, UpstreamError>> {
        Box::pin(self(request))
    }
}

/// Extracts role names from decoded claims.
pub trait RolesExtractor: Send + Sync + 'static {
    /// Returns the roles carried by `claims`.
    fn roles(&self, claims: &Value) -> Vec<String>;
}

impl<F> RolesExtractor for F
where
    F: Fn(&Value) -> Vec<String> + Send + Sync + 'static,
{
    fn roles(&self, claims: &Value) -> Vec<String> {
        self(claims)
    }
}

/// Reads roles from a claim member holding a string or an array of strings.
#[derive(Debug, Clone)]
pub struct ClaimRoles {
    member: String,
}

impl ClaimRoles {
    /// Reads roles from `member`.
    pub fn new(member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
        }
    }
}

impl Default for ClaimRoles {
    fn default() -> Self {
        Self::new("roles")
    }
}

impl RolesExtractor for ClaimRoles {
    fn roles(&self, claims: &Value) -> Vec<String> {
        match claims.get(&self.member) {
            Some(Value::String(role)) => vec![role.clone()],
            Some(Value::Array(roles)) => roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}
