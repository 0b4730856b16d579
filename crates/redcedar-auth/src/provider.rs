//! The provider capability trait and the generic auth middleware.
//!
//! Every provider goes through the same per-request state machine:
//!
//! 1. The auth slot is set to the unauthenticated default.
//! 2. If the request carries nothing the provider recognises, the response
//!    passes through untouched.
//! 3. Otherwise the session is decoded and the current user resolved. On
//!    success the slot holds the authenticated state; on any failure the
//!    slot is marked failed and the provider's cookies are expired on the
//!    response.
//!
//! `GET <prefix>/currentUser` is answered directly with a JSON body.

use std::sync::Arc;

use http::Method;
use serde_json::{json, Value};

use redcedar_middleware::cookie::CookieOptions;
use redcedar_middleware::{
    BoxFuture, InvocationContext, Middleware, MiddlewareRequest, MiddlewareResponse,
    ServerAuthState,
};

use crate::collaborators::{CurrentUserResolver, RolesExtractor};
use crate::decoder::AuthDecoder;
use crate::error::AuthOutcome;

/// Path segment of the current-user endpoint, below the provider prefix.
pub const CURRENT_USER_PATH: &str = "currentUser";

/// What a provider contributes to the generic auth flow.
pub trait AuthProvider: Send + Sync + 'static {
    /// Tag passed to the decoder and stored in the `auth-provider` cookie.
    fn tag(&self) -> &'static str;

    /// Name used for the middleware in logs.
    fn middleware_name(&self) -> &'static str;

    /// Path prefix of the provider's endpoints.
    fn endpoint_prefix(&self) -> &str;

    /// Returns `true` if the request carries something this provider decodes.
    ///
    /// The `auth-provider` cookie is compared to [`tag`](Self::tag) ignoring
    /// ASCII case.
    fn is_relevant(&self, request: &MiddlewareRequest) -> bool;

    /// Cookies to expire when decoding fails, in emission order.
    fn cookies_to_clear(&self, request: &MiddlewareRequest) -> Vec<String>;

    /// Extracts user metadata from the resolved user.
    fn user_metadata(&self, current_user: &Value) -> Option<Value>;
}

/// Auth middleware generic over the provider.
pub struct AuthMiddleware<P> {
    provider: P,
    decoder: Arc<dyn AuthDecoder>,
    resolver: Arc<dyn CurrentUserResolver>,
    roles: Option<Arc<dyn RolesExtractor>>,
}

impl<P: AuthProvider> AuthMiddleware<P> {
    /// Assembles a middleware from a provider and its collaborators.
    pub fn new(
        provider: P,
        decoder: Arc<dyn AuthDecoder>,
        resolver: Arc<dyn CurrentUserResolver>,
    ) -> Self {
        Self {
            provider,
            decoder,
            resolver,
            roles: None,
        }
    }

    /// Populates `roles` in the auth state from the decoded claims.
    #[must_use]
    pub fn with_roles(mut self, roles: Arc<dyn RolesExtractor>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Returns the provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Decodes `cookie_header` and resolves the current user.
    pub async fn resolve(&self, cookie_header: &str) -> AuthOutcome {
        let claims = match self.decoder.decode(cookie_header, self.provider.tag()).await {
            Ok(claims) => claims,
            Err(err) => return AuthOutcome::DecodeFailed(err),
        };

        match self.resolver.current_user(claims.clone()).await {
            Ok(current_user) => AuthOutcome::Authenticated {
                claims,
                current_user,
            },
            Err(err) => AuthOutcome::UpstreamFailed(err),
        }
    }

    /// Runs the generic decode flow and writes the auth slot.
    pub async fn authenticate(
        &self,
        request: &mut MiddlewareRequest,
        response: MiddlewareResponse,
    ) -> MiddlewareResponse {
        request
            .server_auth_context_mut()
            .set(ServerAuthState::unauthenticated());

        let Some(cookie_header) = self.relevant_cookie_header(request) else {
            return response;
        };

        match self.resolve(&cookie_header).await {
            AuthOutcome::Authenticated {
                claims,
                current_user,
            } => {
                let roles = self
                    .roles
                    .as_ref()
                    .map(|extractor| extractor.roles(&claims))
                    .unwrap_or_default();
                let user_metadata = self.provider.user_metadata(&current_user);
                let state = ServerAuthState::authenticated(current_user, user_metadata, cookie_header)
                    .with_roles(roles);

                tracing::debug!(provider = self.provider.tag(), "Session decoded");
                request.server_auth_context_mut().set(state);
                response
            }
            outcome => self.fail(request, response, &outcome),
        }
    }

    /// Answers the current-user endpoint.
    ///
    /// The auth slot keeps the unauthenticated default; the user is only
    /// reported in the body.
    pub async fn current_user_response(
        &self,
        request: &mut MiddlewareRequest,
        response: MiddlewareResponse,
    ) -> MiddlewareResponse {
        request
            .server_auth_context_mut()
            .set(ServerAuthState::unauthenticated());

        let Some(cookie_header) = self.relevant_cookie_header(request) else {
            return with_json(response, &json!({ "currentUser": null }));
        };

        match self.resolve(&cookie_header).await {
            AuthOutcome::Authenticated { current_user, .. } => {
                with_json(response, &json!({ "currentUser": current_user }))
            }
            outcome => {
                let response = self.fail(request, response, &outcome);
                with_json(response, &json!({ "currentUser": null }))
            }
        }
    }

    /// Returns `true` for `GET <prefix>/currentUser`.
    pub fn is_current_user_request(&self, request: &MiddlewareRequest) -> bool {
        request.method() == Method::GET
            && request
                .path()
                .strip_prefix(self.provider.endpoint_prefix())
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|rest| rest.trim_end_matches('/') == CURRENT_USER_PATH)
    }

    /// Returns `true` if the request path is under the provider prefix.
    pub fn is_provider_path(&self, request: &MiddlewareRequest) -> bool {
        let prefix = self.provider.endpoint_prefix();
        request
            .path()
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Marks the auth slot failed and expires the provider's cookies.
    pub fn fail(
        &self,
        request: &mut MiddlewareRequest,
        mut response: MiddlewareResponse,
        outcome: &AuthOutcome,
    ) -> MiddlewareResponse {
        match outcome {
            AuthOutcome::DecodeFailed(err) => {
                tracing::warn!(provider = self.provider.tag(), error = %err, "Session decode failed");
            }
            AuthOutcome::UpstreamFailed(err) => {
                tracing::warn!(provider = self.provider.tag(), error = %err, "Current user lookup failed");
            }
            AuthOutcome::Authenticated { .. } => {}
        }

        request.server_auth_context_mut().set_failed();

        let names = self.provider.cookies_to_clear(request);
        tracing::debug!(cookies = ?names, "Clearing auth cookies");
        for name in names {
            response.cookies_mut().unset(name, CookieOptions::new());
        }
        response
    }

    fn relevant_cookie_header(&self, request: &MiddlewareRequest) -> Option<String> {
        if !self.provider.is_relevant(request) {
            tracing::trace!(provider = self.provider.tag(), "No session for provider");
            return None;
        }
        request.cookie_header()
    }
}

fn with_json(mut response: MiddlewareResponse, value: &Value) -> MiddlewareResponse {
    let json = MiddlewareResponse::json(value);
    response.set_body(json.body().map(str::to_string));
    for (name, value) in json.headers() {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    response
}

impl<P: AuthProvider> Middleware for AuthMiddleware<P> {
    fn name(&self) -> &'static str {
        self.provider.middleware_name()
    }

    fn invoke<'a>(
        &'a self,
        request: &'a mut MiddlewareRequest,
        response: MiddlewareResponse,
        _ctx: &'a InvocationContext,
    ) -> BoxFuture<'a, MiddlewareResponse> {
        Box::pin(async move {
            if self.is_current_user_request(request) {
                self.current_user_response(request, response).await
            } else {
                self.authenticate(request, response).await
            }
        })
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for AuthMiddleware<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMiddleware")
            .field("provider", &self.provider)
            .field("roles", &self.roles.is_some())
            .finish_non_exhaustive()
    }
}
