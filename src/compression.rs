//! Gzip for textual responses.
//!
//! Applied after a strategy has produced its response: the client's
//! `Accept-Encoding` decides whether gzip is used at all, and
//! [`TextualContent`] restricts it to `text/*` bodies.

use std::convert::Infallible;

use axum::body::{Body, HttpBody};
use axum::http::{header, HeaderMap, Request};
use axum::response::Response;
use tower::{Layer, ServiceExt};
use tower_http::compression::{CompressionLayer, Predicate};

use crate::response::internal_error;

/// Compress only responses whose content type is `text/*`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualContent;

impl TextualContent {
    #[must_use]
    pub fn is_textual(headers: &HeaderMap) -> bool {
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/"))
    }
}

impl Predicate for TextualContent {
    fn should_compress<B>(&self, response: &axum::http::Response<B>) -> bool
    where
        B: HttpBody,
    {
        Self::is_textual(response.headers()) && response.body().size_hint().exact() != Some(0)
    }
}

/// Gzip `response` if the request headers accept it and the body is text.
pub async fn gzip_textual(request_headers: &HeaderMap, response: Response) -> Response {
    if !TextualContent::is_textual(response.headers()) {
        return response;
    }

    let mut request = Request::new(());
    for value in request_headers.get_all(header::ACCEPT_ENCODING) {
        request
            .headers_mut()
            .append(header::ACCEPT_ENCODING, value.clone());
    }

    let mut ready = Some(response);
    let inner = tower::service_fn(move |_: Request<()>| {
        let response = ready.take().unwrap_or_else(internal_error);
        async move { Ok::<_, Infallible>(response) }
    });

    let service = CompressionLayer::new()
        .gzip(true)
        .compress_when(TextualContent)
        .layer(inner);

    match service.oneshot(request).await {
        Ok(compressed) => compressed.map(Body::new),
        Err(never) => match never {},
    }
}
