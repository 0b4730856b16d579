//! Wire-level request and response types.
//!
//! Request bodies are fully buffered before middleware runs, so the wire
//! request carries plain [`Bytes`]. Responses use a `Full<Bytes>` body that
//! hyper can serve directly.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::StatusCode;
use http_body_util::Full;

/// The inbound HTTP request type seen by middleware.
pub type Request = http::Request<Bytes>;

/// The outbound HTTP response type.
pub type Response = http::Response<Full<Bytes>>;

/// Convenience helpers on [`Response`].
pub trait ResponseExt {
    /// Creates a plain-text response with the given status.
    fn text(status: StatusCode, message: &str) -> Response;

    /// Returns every `Set-Cookie` header value, in emission order.
    fn set_cookies(&self) -> Vec<String>;
}

impl ResponseExt for Response {
    fn text(status: StatusCode, message: &str) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::from(message.to_string())));
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    fn set_cookies(&self) -> Vec<String> {
        self.headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }
}
