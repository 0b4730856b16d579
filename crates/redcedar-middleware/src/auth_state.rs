//! Decoded authentication state attached to a single request.
//!
//! The auth middleware writes into a request's [`ServerAuthContext`]; the
//! invocation pipeline reads it back and hands the result to downstream
//! rendering. Three outcomes are kept distinct:
//!
//! | Entry | Meaning |
//! |-------|---------|
//! | [`AuthContextEntry::Unset`] | no auth middleware touched the request |
//! | [`AuthContextEntry::Failed`] | decoding was attempted and failed |
//! | [`AuthContextEntry::Decoded`] | a state was set (possibly the unauthenticated default) |

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authentication state as seen by server-side rendering.
///
/// Serializes with camelCase keys so it can be embedded into rendered
/// documents as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerAuthState {
    /// Whether a current user was resolved.
    pub is_authenticated: bool,
    /// Whether resolving the state reported an error.
    pub has_error: bool,
    /// Always `false` on the server; the state is final once rendered.
    pub loading: bool,
    /// The resolved user, as returned by the application.
    pub current_user: Option<Value>,
    /// Provider-specific user metadata.
    pub user_metadata: Option<Value>,
    /// The `Cookie` header the state was decoded from.
    pub cookie_header: Option<String>,
    /// Roles extracted from the decoded claims.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl ServerAuthState {
    /// The default state for requests that carry no session.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            is_authenticated: false,
            has_error: false,
            loading: false,
            current_user: None,
            user_metadata: None,
            cookie_header: None,
            roles: Vec::new(),
        }
    }

    /// A state for a successfully resolved user.
    #[must_use]
    pub fn authenticated(
        current_user: Value,
        user_metadata: Option<Value>,
        cookie_header: impl Into<String>,
    ) -> Self {
        Self {
            is_authenticated: true,
            has_error: false,
            loading: false,
            current_user: Some(current_user),
            user_metadata,
            cookie_header: Some(cookie_header.into()),
            roles: Vec::new(),
        }
    }

    /// Attaches roles to the state.
    #[must_use]
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }
}

impl Default for ServerAuthState {
    fn default() -> Self {
        Self::unauthenticated()
    }
}

/// The value currently held by a [`ServerAuthContext`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthContextEntry {
    /// Never written.
    #[default]
    Unset,
    /// Decoding was attempted and failed.
    Failed,
    /// A state was written.
    Decoded(ServerAuthState),
}

/// Per-request slot holding the decoded auth state.
///
/// Owned by the [`MiddlewareRequest`](crate::MiddlewareRequest); written
/// through `&mut` by auth middleware only, read any number of times after.
#[derive(Debug, Clone, Default)]
pub struct ServerAuthContext {
    entry: AuthContextEntry,
}

impl ServerAuthContext {
    /// Creates an unset context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a decoded state, replacing any previous value.
    pub fn set(&mut self, state: ServerAuthState) {
        self.entry = AuthContextEntry::Decoded(state);
    }

    /// Records that decoding failed.
    pub fn set_failed(&mut self) {
        self.entry = AuthContextEntry::Failed;
    }

    /// Returns the current entry.
    #[must_use]
    pub fn get(&self) -> &AuthContextEntry {
        &self.entry
    }

    /// Returns the stored state, if one was decoded.
    #[must_use]
    pub fn state(&self) -> Option<&ServerAuthState> {
        match &self.entry {
            AuthContextEntry::Decoded(state) => Some(state),
            _ => None,
        }
    }

    /// Returns `true` once anything was written.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(self.entry, AuthContextEntry::Unset)
    }

    /// Resolves the slot into the state propagated downstream.
    ///
    /// An unset slot becomes the unauthenticated default; a failed decode
    /// becomes `None`.
    #[must_use]
    pub fn into_auth_state(self) -> Option<ServerAuthState> {
        match self.entry {
            AuthContextEntry::Unset => Some(ServerAuthState::unauthenticated()),
            AuthContextEntry::Failed => None,
            AuthContextEntry::Decoded(state) => Some(state),
        }
    }
}
