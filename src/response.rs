//! Small response builders shared by the handling strategies.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Plain-text error: `message` plus a newline, never sniffed as HTML.
#[must_use]
pub fn plain_error(status: StatusCode, message: &str) -> Response {
    let mut response = (status, format!("{message}\n")).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

#[must_use]
pub fn not_found() -> Response {
    plain_error(StatusCode::NOT_FOUND, "404 page not found")
}

#[must_use]
pub fn forbidden() -> Response {
    plain_error(StatusCode::FORBIDDEN, "403 Forbidden")
}

#[must_use]
pub fn method_not_allowed() -> Response {
    plain_error(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed")
}

#[must_use]
pub fn internal_error() -> Response {
    plain_error(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
}

/// 301 to `location`. Falls back to a 500 if the location is not a valid
/// header value, which cannot happen for locations built from a parsed URI.
#[must_use]
pub fn moved_permanently(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => Response::builder()
            .status(StatusCode::MOVED_PERMANENTLY)
            .header(header::LOCATION, value)
            .body(Body::empty())
            .unwrap_or_else(|_| internal_error()),
        Err(_) => internal_error(),
    }
}
