//! HTTP server host.
//!
//! The server buffers each request, resolves a middleware through the
//! configured [`MiddlewareRouter`], and then:
//!
//! | Method | Middleware result | Response |
//! |--------|-------------------|----------|
//! | GET | redirect or body | the middleware response |
//! | GET | pass-through | rendered page with middleware headers and cookies merged in |
//! | GET | pass-through, no renderer | `404` |
//! | other | no middleware matched | `404 No middleware found` |
//! | other | any | the middleware response |
//!
//! Everything from body collection to the final response runs under the
//! configured request timeout (`504` on expiry).
//!
//! # Example
//!
//! ```rust,ignore
//! use redcedar_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .config(ServerConfig::from_env()?)
//!         .router(routes)
//!         .renderer(render_page)
//!         .build();
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::HeaderValue;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use redcedar_middleware::context::REQUEST_ID_HEADER;
use redcedar_middleware::{
    run, InvocationContext, Middleware, MiddlewareRequest, MiddlewareResponse, MiddlewareRouter,
    Request, Response, ResponseExt, RouteMatch,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::render::{RenderRequest, Renderer};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Body of the `404` returned for non-GET requests without a middleware.
pub const NO_MIDDLEWARE_MESSAGE: &str = "No middleware found";

/// The Redcedar HTTP server.
pub struct Server {
    config: ServerConfig,
    router: Option<Arc<dyn MiddlewareRouter>>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl Server {
    /// Creates a server without middleware or renderer.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: None,
            renderer: None,
        }
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> ServerResult<()> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> ServerResult<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                tracing::error!(remote = %remote_addr, error = %e, "Connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },

                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        let drain_timeout = server.config.shutdown_timeout();
        tracing::info!(
            active = tracker.active_connections(),
            timeout_ms = u64::try_from(drain_timeout.as_millis()).unwrap_or(u64::MAX),
            "Draining connections"
        );

        tokio::select! {
            () = tracker.wait_for_drain() => {
                tracing::info!("All connections closed");
            }
            () = tokio::time::sleep(drain_timeout) => {
                tracing::warn!(active = tracker.active_connections(), "Drain timeout reached");
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(req).await) }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                tracing::debug!(remote = %remote_addr, "Closing connection for shutdown");
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(&self, req: http::Request<Incoming>) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let work = async {
            let (parts, body) = req.into_parts();
            match body.collect().await {
                Ok(collected) => {
                    self.dispatch(Request::from_parts(parts, collected.to_bytes()))
                        .await
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read request body");
                    Response::text(StatusCode::BAD_REQUEST, "Failed to read request body")
                }
            }
        };

        match tokio::time::timeout(self.config.request_timeout(), work).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(http.method = %method, http.path = %path, "Request timed out");
                Response::text(StatusCode::GATEWAY_TIMEOUT, "Request timed out")
            }
        }
    }

    /// Handles one buffered request.
    ///
    /// This is the whole request path minus the socket; tests drive the
    /// server through it directly.
    pub async fn dispatch(&self, request: Request) -> Response {
        let mut ctx = InvocationContext::for_request(&request);
        let span = tracing::info_span!(
            "http.request",
            http.method = %request.method(),
            http.path = %request.uri().path(),
            request_id = %ctx.request_id(),
        );

        async move {
            let route = self.find_route(&request);
            if let Some(route) = &route {
                ctx.set_params(route.params.clone());
                ctx.set_route(route.pattern.clone());
            }

            let mut response = if request.method() == Method::GET {
                self.handle_get(request, route, &ctx).await
            } else {
                self.handle_other(request, route, &ctx).await
            };

            if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
                response
                    .headers_mut()
                    .entry(REQUEST_ID_HEADER)
                    .or_insert(value);
            }

            tracing::debug!(
                status = response.status().as_u16(),
                route = ctx.route().unwrap_or("-"),
                "Request completed"
            );
            response
        }
        .instrument(span)
        .await
    }

    fn find_route(&self, request: &Request) -> Option<RouteMatch> {
        let router = self.router.as_ref()?;
        router.find(request.method(), &request.uri().to_string())
    }

    async fn handle_get(
        &self,
        request: Request,
        route: Option<RouteMatch>,
        ctx: &InvocationContext,
    ) -> Response {
        let middleware = route.as_ref().map(|m| &*m.handler as &dyn Middleware);
        let mut mw_request = MiddlewareRequest::new(request);
        let (mw_response, auth_state) =
            run(&mut mw_request, middleware, MiddlewareResponse::next(), ctx).await;

        if mw_response.is_redirect() || mw_response.has_body() {
            tracing::debug!(redirect = mw_response.is_redirect(), "Middleware ended the request");
            return mw_response.to_response();
        }

        let Some(renderer) = &self.renderer else {
            return Response::text(StatusCode::NOT_FOUND, "Not Found");
        };

        let (request, _) = mw_request.into_parts();
        let render_request = RenderRequest {
            request,
            params: ctx.params().clone(),
            auth_state,
            request_id: ctx.request_id(),
        };

        match renderer.render(render_request).await {
            Ok(mut rendered) => {
                mw_response.apply_to(&mut rendered);
                rendered
            }
            Err(e) => {
                tracing::error!(error = %e, "Render failed");
                internal_error()
            }
        }
    }

    async fn handle_other(
        &self,
        request: Request,
        route: Option<RouteMatch>,
        ctx: &InvocationContext,
    ) -> Response {
        let Some(route) = route else {
            tracing::debug!("No middleware matched");
            return Response::text(StatusCode::NOT_FOUND, NO_MIDDLEWARE_MESSAGE);
        };

        let mut mw_request = MiddlewareRequest::new(request);
        let (mw_response, _) = run(
            &mut mw_request,
            Some(&*route.handler),
            MiddlewareResponse::next(),
            ctx,
        )
        .await;

        mw_response.to_response()
    }
}

fn internal_error() -> Response {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("router", &self.router.is_some())
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

/// Builder for [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    config: Option<ServerConfig>,
    router: Option<Arc<dyn MiddlewareRouter>>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl ServerBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the middleware router.
    #[must_use]
    pub fn router(mut self, router: impl MiddlewareRouter) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    /// Sets the page renderer.
    #[must_use]
    pub fn renderer(mut self, renderer: impl Renderer) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config.unwrap_or_default(),
            router: self.router,
            renderer: self.renderer,
        }
    }
}
