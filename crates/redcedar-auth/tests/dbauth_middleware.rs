//! dbAuth middleware behaviour through the invocation pipeline.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::{json, Value};

use redcedar_auth::dbauth::encrypt_session;
use redcedar_auth::{
    ClaimRoles, DbAuthConfig, DbAuthHandlerOutput, DbAuthMiddleware, DbAuthVerb, DecodeError,
    UpstreamError,
};
use redcedar_middleware::{
    invoke, InvocationContext, MiddlewareResponse, Request, ResponseExt, ServerAuthState,
};

const SECRET: &str = "QKxN2vFSHAf94XYynK8LUALfDuDSdFowG6evfkFX8uszh4YZqhTiqEdshrhWbwbw";
const EXPIRED: &str = "Expires=Thu, 01 Jan 1970 00:00:00 GMT";

fn config() -> DbAuthConfig {
    DbAuthConfig::builder().session_secret(SECRET).build().unwrap()
}

fn key() -> [u8; 32] {
    config().session_key().unwrap()
}

fn request(method: Method, uri: &str, cookie: Option<&str>) -> Request {
    let mut builder = http::Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Bytes::new()).unwrap()
}

/// Handler answering every verb and recording the request URIs it saw.
fn recording_handler(
    seen: Arc<Mutex<Vec<String>>>,
) -> impl Fn(&Request) -> std::future::Ready<Result<DbAuthHandlerOutput, UpstreamError>> + Send + Sync + 'static
{
    move |request: &Request| {
        seen.lock().unwrap().push(request.uri().to_string());

        let verb = request
            .uri()
            .query()
            .and_then(|q| q.split('&').find_map(|p| p.strip_prefix("method=")))
            .unwrap_or("")
            .to_ascii_lowercase();

        let output = match verb.as_str() {
            "login" => DbAuthHandlerOutput::new(200, r#"{"id":"mocked-login-id"}"#)
                .header("Set-Cookie", "session_8911=encrypted-login; Path=/; HttpOnly")
                .header("auth-provider", "dbAuth"),
            "logout" => DbAuthHandlerOutput::new(200, "")
                .header("Set-Cookie", vec![
                    format!("session_8911=; {EXPIRED}"),
                    format!("auth-provider=; {EXPIRED}"),
                ]),
            "signup" => DbAuthHandlerOutput::new(201, r#"{"id":"new-user"}"#),
            "forgotpassword" => DbAuthHandlerOutput::new(200, r#"{"id":"reset"}"#),
            "gettoken" => DbAuthHandlerOutput::new(200, "user-token"),
            "validateresettoken" => DbAuthHandlerOutput::new(200, r#"{"valid":true}"#),
            "webauthnregoptions" => DbAuthHandlerOutput::new(200, r#"{"challenge":"abc"}"#),
            _ => DbAuthHandlerOutput::new(400, "").header("x-unsupported", "true"),
        };
        std::future::ready(Ok(output))
    }
}

fn resolver(claims: Value) -> std::future::Ready<Result<Value, UpstreamError>> {
    std::future::ready(Ok(json!({ "id": claims["id"], "email": "user-1@example.com" })))
}

fn middleware_with(seen: Arc<Mutex<Vec<String>>>) -> DbAuthMiddleware {
    DbAuthMiddleware::builder(config())
        .current_user(resolver)
        .handler(recording_handler(seen))
        .build()
        .unwrap()
}

fn middleware() -> DbAuthMiddleware {
    middleware_with(Arc::default())
}

fn session_cookie(data: &Value) -> String {
    format!(
        "session_8911={};auth-provider=dbAuth",
        encrypt_session(&data.to_string(), "csrf-token", &key())
    )
}

#[tokio::test]
async fn test_no_cookie_passes_through_with_default_state() {
    let mw = middleware();
    let (response, auth) = invoke(
        request(Method::GET, "http://localhost:8910/page", None),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert_eq!(response, MiddlewareResponse::next());
    assert_eq!(auth, Some(ServerAuthState::unauthenticated()));
}

#[tokio::test]
async fn test_decodes_session_cookie() {
    let mw = middleware();
    let cookie = session_cookie(&json!({ "id": 1 }));

    let (response, auth) = invoke(
        request(Method::GET, "http://localhost:8910/page", Some(&cookie)),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert!(!response.has_body());
    let auth = auth.unwrap();
    assert!(auth.is_authenticated);
    assert!(!auth.has_error);
    assert_eq!(
        auth.current_user,
        Some(json!({ "id": 1, "email": "user-1@example.com" }))
    );
    assert_eq!(auth.user_metadata, auth.current_user);
    assert_eq!(auth.cookie_header.as_deref(), Some(cookie.as_str()));
}

#[tokio::test]
async fn test_stub_decoder_is_used() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);

    let mw = DbAuthMiddleware::builder(DbAuthConfig::default())
        .current_user(resolver)
        .handler(recording_handler(Arc::default()))
        .decoder(move |cookie: &str, provider: &str| {
            recorded
                .lock()
                .unwrap()
                .push((cookie.to_string(), provider.to_string()));
            Ok::<_, DecodeError>(json!({ "id": 42 }))
        })
        .roles(ClaimRoles::default())
        .build()
        .unwrap();

    let (_, auth) = invoke(
        request(Method::GET, "/", Some("session=anything")),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert_eq!(auth.unwrap().current_user.unwrap()["id"], 42);
    assert_eq!(
        *calls.lock().unwrap(),
        vec![("session=anything".to_string(), "dbAuth".to_string())]
    );
}

#[tokio::test]
async fn test_login_returns_handler_output() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mw = middleware_with(Arc::clone(&seen));

    let (response, auth) = invoke(
        request(
            Method::POST,
            "http://localhost:8911/middleware/dbauth?method=login",
            None,
        ),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), Some(r#"{"id":"mocked-login-id"}"#));
    assert_eq!(response.headers().get("auth-provider").unwrap(), "dbAuth");
    assert_eq!(
        response.to_response().set_cookies(),
        vec!["session_8911=encrypted-login; Path=/; HttpOnly"]
    );
    assert_eq!(auth, Some(ServerAuthState::unauthenticated()));
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["http://localhost:8911/middleware/dbauth?method=login"]
    );
}

#[tokio::test]
async fn test_logout_expires_cookies() {
    let mw = middleware();
    let cookie = session_cookie(&json!({ "id": 1 }));

    let (response, _) = invoke(
        request(Method::POST, "/middleware/dbauth?method=logout", Some(&cookie)),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert_eq!(
        response.to_response().set_cookies(),
        vec![
            format!("session_8911=; {EXPIRED}"),
            format!("auth-provider=; {EXPIRED}"),
        ]
    );
}

#[tokio::test]
async fn test_verbs_are_case_insensitive() {
    let mw = middleware();

    let (signup, _) = invoke(
        request(Method::POST, "/middleware/dbauth?method=signUp", None),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;
    assert_eq!(signup.status(), StatusCode::CREATED);
    assert_eq!(signup.body(), Some(r#"{"id":"new-user"}"#));

    let (forgot, _) = invoke(
        request(Method::POST, "/middleware/dbauth?method=forgotPassword", None),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;
    assert_eq!(forgot.body(), Some(r#"{"id":"reset"}"#));

    let (validate, _) = invoke(
        request(Method::POST, "/middleware/dbauth?method=validateResetToken", None),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;
    assert_eq!(validate.body(), Some(r#"{"valid":true}"#));
}

#[tokio::test]
async fn test_get_token_decodes_session_first() {
    let mw = middleware();
    let cookie = session_cookie(&json!({ "id": 7 }));

    let (response, auth) = invoke(
        request(Method::GET, "/middleware/dbauth?method=getToken", Some(&cookie)),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert_eq!(response.body(), Some("user-token"));
    assert_eq!(auth.unwrap().current_user.unwrap()["id"], 7);

    let (options, _) = invoke(
        request(Method::GET, "/middleware/dbauth?method=webAuthnRegOptions", Some(&cookie)),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;
    assert_eq!(options.body(), Some(r#"{"challenge":"abc"}"#));
}

#[tokio::test]
async fn test_current_user_endpoint() {
    let mw = middleware();
    let cookie = session_cookie(&json!({ "id": 3 }));

    let (response, auth) = invoke(
        request(Method::GET, "/middleware/dbauth/currentUser", Some(&cookie)),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    let body: Value = serde_json::from_str(response.body().unwrap()).unwrap();
    assert_eq!(
        body,
        json!({ "currentUser": { "id": 3, "email": "user-1@example.com" } })
    );
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(auth, Some(ServerAuthState::unauthenticated()));

    let (anonymous, _) = invoke(
        request(Method::GET, "/middleware/dbauth/currentUser", None),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;
    let body: Value = serde_json::from_str(anonymous.body().unwrap()).unwrap();
    assert_eq!(body, json!({ "currentUser": null }));
}

#[tokio::test]
async fn test_unsupported_verb_falls_through_with_handler_headers() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mw = middleware_with(Arc::clone(&seen));

    let (response, auth) = invoke(
        request(Method::POST, "/middleware/dbauth?method=unsupportedVerb", None),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert!(!response.has_body());
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-unsupported").unwrap(), "true");
    assert_eq!(auth, Some(ServerAuthState::unauthenticated()));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_disabled_verb_falls_through() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mw = DbAuthMiddleware::builder(config())
        .current_user(resolver)
        .handler(recording_handler(Arc::clone(&seen)))
        .verbs([DbAuthVerb::Login])
        .build()
        .unwrap();

    let (response, _) = invoke(
        request(Method::GET, "/middleware/dbauth?method=getToken", None),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert!(!response.has_body());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_session_clears_cookies() {
    let mw = middleware();

    let (response, auth) = invoke(
        request(
            Method::GET,
            "/page",
            Some("session_8911=some-bad-encrypted-cookie;auth-provider=dbAuth"),
        ),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert_eq!(auth, None);
    assert!(!response.has_body());
    assert_eq!(
        response.to_response().set_cookies(),
        vec![
            format!("session_8911=; {EXPIRED}"),
            format!("auth-provider=; {EXPIRED}"),
        ]
    );
}

#[tokio::test]
async fn test_handler_error_clears_cookies() {
    let mw = DbAuthMiddleware::builder(config())
        .current_user(resolver)
        .handler(|_request: &Request| {
            std::future::ready(Err::<DbAuthHandlerOutput, _>(UpstreamError::msg(
                "database unavailable",
            )))
        })
        .build()
        .unwrap();

    let (response, auth) = invoke(
        request(Method::POST, "/middleware/dbauth?method=login", None),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert_eq!(auth, None);
    assert_eq!(response.cookies().len(), 2);
    assert!(response.cookies().iter().all(|c| c.is_expired_marker()));
}

#[tokio::test]
async fn test_handler_error_on_unsupported_post_clears_cookies() {
    let mw = DbAuthMiddleware::builder(config())
        .current_user(resolver)
        .handler(|_request: &Request| {
            std::future::ready(Err::<DbAuthHandlerOutput, _>(UpstreamError::msg("db down")))
        })
        .build()
        .unwrap();

    let (response, auth) = invoke(
        request(Method::POST, "/middleware/dbauth?method=unsupportedVerb", None),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert_eq!(auth, None);
    assert!(!response.has_body());
    assert_eq!(
        response.to_response().set_cookies(),
        vec![
            format!("session_8911=; {EXPIRED}"),
            format!("auth-provider=; {EXPIRED}"),
        ]
    );
}

#[tokio::test]
async fn test_foreign_session_cookie_resolves_with_null_claims() {
    let claims_seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&claims_seen);
    let mw = DbAuthMiddleware::builder(config())
        .current_user(move |claims: Value| {
            recorded.lock().unwrap().push(claims);
            std::future::ready(Ok::<_, UpstreamError>(json!({ "id": "mocked-current-user-1" })))
        })
        .handler(recording_handler(Arc::default()))
        .build()
        .unwrap();

    let cookie = "session=ko6iXKV11DSjb6kFJ4iwcf1FEqa5wPpbL1sdtKiV51Y=|cQaYkOPG/r3ILxWiFiz90w==";
    let (response, auth) = invoke(
        request(Method::GET, "http://localhost:8910/page", Some(cookie)),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert!(!response.has_body());
    assert!(response.cookies().is_empty());

    let auth = auth.unwrap();
    assert!(auth.is_authenticated);
    assert!(!auth.has_error);
    assert_eq!(auth.current_user, Some(json!({ "id": "mocked-current-user-1" })));
    assert_eq!(auth.user_metadata, Some(json!({ "id": "mocked-current-user-1" })));
    assert_eq!(auth.cookie_header.as_deref(), Some(cookie));
    assert_eq!(*claims_seen.lock().unwrap(), vec![Value::Null]);
}

#[tokio::test]
async fn test_other_provider_is_ignored() {
    let mw = middleware();

    let (response, auth) = invoke(
        request(Method::GET, "/page", Some("auth-provider=supabase;sb-example-auth-token=x")),
        Some(&mw),
        &InvocationContext::new(),
    )
    .await;

    assert!(response.cookies().is_empty());
    assert_eq!(auth, Some(ServerAuthState::unauthenticated()));
}
