//! Database-backed session auth.
//!
//! [`DbAuthMiddleware`] runs the generic decode flow for every request and
//! additionally serves the dbAuth endpoint: a request under the configured
//! prefix whose `method` query parameter names a [`DbAuthVerb`] is handed,
//! unchanged, to the application's [`DbAuthHandler`], and the handler's
//! output becomes the response.
//!
//! ```text
//! POST /middleware/dbauth/auth?method=login   -> DbAuthHandler
//! GET  /middleware/dbauth/auth?method=getToken -> decode, then DbAuthHandler
//! GET  /middleware/dbauth/currentUser          -> {"currentUser": ...}
//! any other request                            -> decode, pass through
//! ```

mod decoder;
pub mod session;
mod verb;

use std::collections::HashSet;
use std::sync::Arc;

use http::{Method, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;

use redcedar_middleware::{
    BoxFuture, InvocationContext, Middleware, MiddlewareRequest, MiddlewareResponse,
    ServerAuthState,
};

pub use decoder::DbAuthDecoder;
pub use session::{decrypt_session, encrypt_session, SessionData};
pub use verb::{DbAuthVerb, UnknownVerb};

use crate::collaborators::{
    CurrentUserResolver, DbAuthHandler, DbAuthHandlerOutput, HeaderEntry, RolesExtractor,
};
use crate::config::{DbAuthConfig, AUTH_PROVIDER_COOKIE};
use crate::decoder::AuthDecoder;
use crate::error::{AuthOutcome, ConfigResult, ConfigurationError};
use crate::provider::{AuthMiddleware, AuthProvider};

/// Provider tag for dbAuth.
pub const PROVIDER_TAG: &str = "dbAuth";

/// Query parameter selecting the verb.
pub const VERB_PARAM: &str = "method";

/// The dbAuth provider capabilities.
#[derive(Debug, Clone)]
pub struct DbAuthProvider {
    config: DbAuthConfig,
    cookie_name: String,
}

impl DbAuthProvider {
    /// Creates the provider from its configuration.
    #[must_use]
    pub fn new(config: DbAuthConfig) -> Self {
        let cookie_name = config.resolved_cookie_name();
        Self {
            config,
            cookie_name,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DbAuthConfig {
        &self.config
    }

    /// Returns the resolved session cookie name.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }
}

impl AuthProvider for DbAuthProvider {
    fn tag(&self) -> &'static str {
        PROVIDER_TAG
    }

    fn middleware_name(&self) -> &'static str {
        "dbauth"
    }

    fn endpoint_prefix(&self) -> &str {
        &self.config.endpoint_prefix
    }

    /// Any `Cookie` header is decoded unless another provider claims it.
    fn is_relevant(&self, request: &MiddlewareRequest) -> bool {
        if request.cookie_header().is_none() {
            return false;
        }
        request
            .cookies()
            .get(AUTH_PROVIDER_COOKIE)
            .map_or(true, |tag| tag.eq_ignore_ascii_case(PROVIDER_TAG))
    }

    fn cookies_to_clear(&self, _request: &MiddlewareRequest) -> Vec<String> {
        vec![self.cookie_name.clone(), AUTH_PROVIDER_COOKIE.to_string()]
    }

    fn user_metadata(&self, current_user: &Value) -> Option<Value> {
        Some(current_user.clone())
    }
}

/// dbAuth middleware with verb dispatch.
pub struct DbAuthMiddleware {
    auth: AuthMiddleware<DbAuthProvider>,
    handler: Arc<dyn DbAuthHandler>,
    verbs: HashSet<DbAuthVerb>,
}

impl DbAuthMiddleware {
    /// Starts building a middleware for `config`.
    #[must_use]
    pub fn builder(config: DbAuthConfig) -> DbAuthMiddlewareBuilder {
        DbAuthMiddlewareBuilder {
            config,
            current_user: None,
            handler: None,
            decoder: None,
            roles: None,
            verbs: DbAuthVerb::ALL.into_iter().collect(),
        }
    }

    /// Returns the generic auth flow.
    pub fn auth(&self) -> &AuthMiddleware<DbAuthProvider> {
        &self.auth
    }

    /// Returns the verb a request asks for, if it targets the dbAuth endpoint.
    pub fn verb_for(&self, request: &MiddlewareRequest) -> Option<DbAuthVerb> {
        if !self.auth.is_provider_path(request) {
            return None;
        }

        let raw = request.query_param(VERB_PARAM)?;
        match raw.parse::<DbAuthVerb>() {
            Ok(verb) if self.verbs.contains(&verb) => Some(verb),
            Ok(verb) => {
                tracing::debug!(verb = %verb, "dbAuth verb disabled, falling through");
                None
            }
            Err(err) => {
                tracing::debug!(error = %err, "Unsupported dbAuth verb, falling through");
                None
            }
        }
    }

    async fn dispatch(
        &self,
        verb: DbAuthVerb,
        request: &mut MiddlewareRequest,
        response: MiddlewareResponse,
    ) -> MiddlewareResponse {
        if request.method() != verb.http_method() {
            tracing::debug!(
                verb = %verb,
                expected = %verb.http_method(),
                actual = %request.method(),
                "dbAuth verb called with unexpected method"
            );
        }

        let mut response = if verb.reads_session() {
            self.auth.authenticate(request, response).await
        } else {
            request
                .server_auth_context_mut()
                .set(ServerAuthState::unauthenticated());
            response
        };

        tracing::debug!(verb = %verb, "Dispatching dbAuth verb");

        match self.handler.handle(request.inner()).await {
            Ok(output) => {
                response.set_status(status_from(output.status_code));
                response.set_body(Some(output.body));
                merge_headers(&mut response, &output.headers);
                response
            }
            Err(err) => {
                tracing::warn!(verb = %verb, error = %err, "dbAuth handler failed");
                let outcome = AuthOutcome::UpstreamFailed(err);
                self.auth.fail(request, response, &outcome)
            }
        }
    }

    /// Generic flow for requests that are not verbs.
    ///
    /// A POST under the dbAuth prefix still reaches the handler so that the
    /// headers it produces travel with the pass-through response.
    async fn fall_through(
        &self,
        request: &mut MiddlewareRequest,
        response: MiddlewareResponse,
    ) -> MiddlewareResponse {
        let mut response = self.auth.authenticate(request, response).await;

        if request.method() == Method::POST && self.auth.is_provider_path(request) {
            match self.handler.handle(request.inner()).await {
                Ok(output) => merge_headers(&mut response, &output.headers),
                Err(err) => {
                    tracing::warn!(error = %err, "dbAuth handler failed for unsupported request");
                    return self.auth.fail(request, response, &AuthOutcome::UpstreamFailed(err));
                }
            }
        }

        response
    }
}

impl Middleware for DbAuthMiddleware {
    fn name(&self) -> &'static str {
        self.auth.provider().middleware_name()
    }

    fn invoke<'a>(
        &'a self,
        request: &'a mut MiddlewareRequest,
        response: MiddlewareResponse,
        _ctx: &'a InvocationContext,
    ) -> BoxFuture<'a, MiddlewareResponse> {
        Box::pin(async move {
            if let Some(verb) = self.verb_for(request) {
                return self.dispatch(verb, request, response).await;
            }
            if self.auth.is_current_user_request(request) {
                return self.auth.current_user_response(request, response).await;
            }
            self.fall_through(request, response).await
        })
    }
}

impl std::fmt::Debug for DbAuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbAuthMiddleware")
            .field("auth", &self.auth)
            .field("verbs", &self.verbs.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`DbAuthMiddleware`].
pub struct DbAuthMiddlewareBuilder {
    config: DbAuthConfig,
    current_user: Option<Arc<dyn CurrentUserResolver>>,
    handler: Option<Arc<dyn DbAuthHandler>>,
    decoder: Option<Arc<dyn AuthDecoder>>,
    roles: Option<Arc<dyn RolesExtractor>>,
    verbs: HashSet<DbAuthVerb>,
}

impl DbAuthMiddlewareBuilder {
    /// Sets the current-user resolver (required).
    #[must_use]
    pub fn current_user(mut self, resolver: impl CurrentUserResolver) -> Self {
        self.current_user = Some(Arc::new(resolver));
        self
    }

    /// Sets the verb handler (required).
    #[must_use]
    pub fn handler(mut self, handler: impl DbAuthHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Replaces the session decoder.
    ///
    /// Without one, a [`DbAuthDecoder`] is built from the session secret.
    #[must_use]
    pub fn decoder(mut self, decoder: impl AuthDecoder) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Populates roles from the decoded claims.
    #[must_use]
    pub fn roles(mut self, roles: impl RolesExtractor) -> Self {
        self.roles = Some(Arc::new(roles));
        self
    }

    /// Restricts dispatch to the given verbs; others fall through.
    #[must_use]
    pub fn verbs(mut self, verbs: impl IntoIterator<Item = DbAuthVerb>) -> Self {
        self.verbs = verbs.into_iter().collect();
        self
    }

    /// Builds the middleware.
    pub fn build(self) -> ConfigResult<DbAuthMiddleware> {
        let resolver = self.current_user.ok_or_else(|| {
            ConfigurationError::invalid_value("current_user", "a current-user resolver is required")
        })?;
        let handler = self.handler.ok_or_else(|| {
            ConfigurationError::invalid_value("handler", "a dbAuth handler is required")
        })?;
        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => Arc::new(DbAuthDecoder::new(&self.config)?),
        };

        let mut auth = AuthMiddleware::new(DbAuthProvider::new(self.config), decoder, resolver);
        if let Some(roles) = self.roles {
            auth = auth.with_roles(roles);
        }

        Ok(DbAuthMiddleware {
            auth,
            handler,
            verbs: self.verbs,
        })
    }
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or_else(|_| {
        tracing::warn!(status = code, "dbAuth handler returned an invalid status");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Copies handler headers onto the response.
///
/// `Set-Cookie` and `Cookie` entries are emitted verbatim as `Set-Cookie`
/// lines; everything else is appended under its own name.
fn merge_headers(response: &mut MiddlewareResponse, headers: &IndexMap<String, HeaderEntry>) {
    for (name, entry) in headers {
        let is_cookie =
            name.eq_ignore_ascii_case("set-cookie") || name.eq_ignore_ascii_case("cookie");

        for value in entry.values() {
            let result = if is_cookie {
                response.append_set_cookie(value)
            } else {
                response.append_header(name, value)
            };
            if let Err(err) = result {
                tracing::warn!(header = %name, error = %err, "Skipping dbAuth handler header");
            }
        }
    }
}

impl From<DbAuthHandlerOutput> for MiddlewareResponse {
    fn from(output: DbAuthHandlerOutput) -> Self {
        let mut response =
            MiddlewareResponse::with_body(output.body).with_status(status_from(output.status_code));
        merge_headers(&mut response, &output.headers);
        response
    }
}
