//! End-to-end tests for routing and invoking middleware.

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use redcedar_middleware::cookie::CookieOptions;
use redcedar_middleware::{
    invoke, invoke_with_response, BoxFuture, InvocationContext, Middleware, MiddlewareRequest,
    MiddlewareResponse, MiddlewareRouter, MiddlewareRoutes, RedirectKind, ResponseExt,
    ServerAuthState,
};

struct SessionGate;

impl Middleware for SessionGate {
    fn name(&self) -> &'static str {
        "session-gate"
    }

    fn invoke<'a>(
        &'a self,
        request: &'a mut MiddlewareRequest,
        mut response: MiddlewareResponse,
        ctx: &'a InvocationContext,
    ) -> BoxFuture<'a, MiddlewareResponse> {
        Box::pin(async move {
            let session = request.cookies().get("session").map(str::to_string);
            match session.as_deref() {
                None if ctx.param("area") == Some("admin") => {
                    MiddlewareResponse::redirect("/login", RedirectKind::Temporary)
                        .unwrap_or(response)
                }
                None => response,
                Some("bad") => {
                    request.server_auth_context_mut().set_failed();
                    response.cookies_mut().unset("session", CookieOptions::new().path("/"));
                    response
                }
                Some(user) => {
                    let state = ServerAuthState::authenticated(
                        serde_json::json!({ "id": user }),
                        None,
                        request.cookie_header().unwrap_or_default(),
                    );
                    request.server_auth_context_mut().set(state);
                    response
                }
            }
        })
    }
}

fn routes() -> MiddlewareRoutes {
    let mut routes = MiddlewareRoutes::new();
    routes.route("/:area/*", Arc::new(SessionGate)).unwrap();
    routes
}

fn request(method: Method, uri: &str, cookie: Option<&str>) -> http::Request<Bytes> {
    let mut builder = http::Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Bytes::new()).unwrap()
}

async fn dispatch(
    method: Method,
    uri: &str,
    cookie: Option<&str>,
) -> (MiddlewareResponse, Option<ServerAuthState>) {
    let routes = routes();
    let wire = request(method.clone(), uri, cookie);
    let mut ctx = InvocationContext::for_request(&wire);

    match routes.find(&method, uri) {
        Some(found) => {
            ctx.set_params(found.params);
            ctx.set_route(found.pattern);
            invoke(wire, Some(found.handler.as_ref()), &ctx).await
        }
        None => invoke(wire, None, &ctx).await,
    }
}

#[tokio::test]
async fn test_unrouted_request_passes_through() {
    let (response, auth) = dispatch(Method::GET, "/", None).await;

    assert_eq!(response, MiddlewareResponse::next());
    assert_eq!(auth, Some(ServerAuthState::unauthenticated()));
}

#[tokio::test]
async fn test_redirect_short_circuits() {
    let (response, auth) = dispatch(Method::GET, "/admin/users", None).await;

    assert!(response.is_redirect());
    let wire = response.to_response();
    assert_eq!(wire.status(), StatusCode::FOUND);
    assert_eq!(wire.headers().get("location").unwrap(), "/login");
    assert_eq!(auth, Some(ServerAuthState::unauthenticated()));
}

#[tokio::test]
async fn test_decoded_state_is_returned() {
    let (response, auth) = dispatch(Method::GET, "/app/home", Some("session=alice")).await;

    assert!(!response.has_body());
    let auth = auth.unwrap();
    assert!(auth.is_authenticated);
    assert_eq!(auth.current_user, Some(serde_json::json!({ "id": "alice" })));
    assert_eq!(auth.cookie_header.as_deref(), Some("session=alice"));
}

#[tokio::test]
async fn test_failed_decode_clears_cookie() {
    let (response, auth) = dispatch(Method::POST, "/app/save", Some("session=bad")).await;

    assert_eq!(auth, None);
    assert_eq!(
        response.to_response().set_cookies(),
        vec!["session=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT"]
    );
}

#[tokio::test]
async fn test_supplied_response_is_returned_unchanged() {
    let supplied = MiddlewareResponse::with_body("from upstream")
        .with_status(StatusCode::ACCEPTED)
        .with_header("x-upstream", "1")
        .unwrap();

    let wire = request(Method::GET, "/app/home", None);
    let (response, _) = invoke_with_response(
        wire,
        Some(&SessionGate),
        supplied.clone(),
        &InvocationContext::new(),
    )
    .await;

    assert_eq!(response, supplied);

    let body = response.to_response().into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"from upstream");
}
