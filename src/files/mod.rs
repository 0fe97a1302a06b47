//! Serve-files handling strategy.
//!
//! Maps the request path below the route's prefix onto a root directory.
//! `.shtml` documents go through [`ssi::expand`], everything else is served
//! by `tower-http`'s [`ServeFile`]. Directories follow a fixed policy:
//! redirect to the slash form, then `index.shtml`, then `index.html`, then
//! either 403 or a listing.

pub mod listing;
pub mod ssi;

use std::borrow::Cow;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::response::{forbidden, internal_error, moved_permanently, not_found};

pub const CACHE_CONTROL: &str = "max-age=3600";
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone)]
pub struct FilesStrategy {
    root: PathBuf,
    prefix: String,
    show_index: bool,
}

impl FilesStrategy {
    #[must_use]
    pub fn new(root: PathBuf, prefix: &str, show_index: bool) -> Self {
        Self {
            root,
            prefix: prefix.to_string(),
            show_index,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub const fn show_index(&self) -> bool {
        self.show_index
    }

    /// Request path below the prefix. The prefix's trailing `/` is kept, so
    /// the result always starts with `/`.
    #[must_use]
    pub fn relative_path<'a>(&self, path: &'a str) -> Cow<'a, str> {
        let cut = self.prefix.len().saturating_sub(1);
        let rest = path.get(cut..).unwrap_or_default();
        if rest.starts_with('/') {
            Cow::Borrowed(rest)
        } else {
            Cow::Owned(format!("/{rest}"))
        }
    }

    /// Filesystem target for a request path, or `None` when the path does
    /// not decode or tries to climb out of the root.
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = self.relative_path(request_path);
        let decoded = percent_decode_str(&relative).decode_utf8().ok()?;

        let mut target = self.root.clone();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => return None,
                s if s.contains('\0') => return None,
                s => target.push(s),
            }
        }
        Some(target)
    }

    pub async fn serve(&self, req: Request) -> Response {
        let mut response = self.serve_uncached(req).await;
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
        response
    }

    async fn serve_uncached(&self, req: Request) -> Response {
        let uri = req.uri().clone();
        let Some(target) = self.resolve(uri.path()) else {
            tracing::debug!(path = uri.path(), "rejected file path");
            return not_found();
        };
        let Ok(meta) = tokio::fs::metadata(&target).await else {
            return not_found();
        };

        if meta.is_dir() {
            if !uri.path().ends_with('/') {
                let location = match uri.query() {
                    Some(q) => format!("{}/?{q}", uri.path()),
                    None => format!("{}/", uri.path()),
                };
                return moved_permanently(&location);
            }
            return self.serve_directory(&target, req).await;
        }

        if ssi::is_include_document(&target) {
            return self.serve_include(&target, &meta, req.headers()).await;
        }
        serve_file(&target, req).await
    }

    async fn serve_directory(&self, dir: &Path, req: Request) -> Response {
        let shtml = dir.join("index.shtml");
        if let Ok(meta) = tokio::fs::metadata(&shtml).await {
            if meta.is_file() {
                return self.serve_include(&shtml, &meta, req.headers()).await;
            }
        }

        let html = dir.join("index.html");
        if tokio::fs::metadata(&html).await.is_ok_and(|m| m.is_file()) {
            return serve_file(&html, req).await;
        }

        if !self.show_index {
            return forbidden();
        }
        listing::render(dir).await
    }

    async fn serve_include(&self, path: &Path, meta: &Metadata, headers: &HeaderMap) -> Response {
        let modified = meta.modified().ok().map(DateTime::<Utc>::from);

        let body = match ssi::expand(&self.root, path).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(document = %path.display(), error = %e, "failed to expand include document");
                return internal_error();
            }
        };

        // Only a readable document can be reported as unchanged.
        if let (Some(mtime), Some(since)) = (modified, if_modified_since(headers)) {
            if mtime.timestamp() <= since.timestamp() {
                return StatusCode::NOT_MODIFIED.into_response();
            }
        }

        let mut response = body.into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        if let Some(mtime) = modified {
            if let Ok(value) = HeaderValue::from_str(&mtime.format(HTTP_DATE).to_string()) {
                headers.insert(header::LAST_MODIFIED, value);
            }
        }
        response
    }
}

async fn serve_file(path: &Path, req: Request) -> Response {
    match ServeFile::new(path).oneshot(req).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

fn if_modified_since(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(header::IF_MODIFIED_SINCE)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn relative_path_keeps_leading_slash() {
        let files = FilesStrategy::new("/www".into(), "/static/", false);
        assert_eq!(files.relative_path("/static/app.css"), "/app.css");
        assert_eq!(files.relative_path("/static/"), "/");
        assert_eq!(files.relative_path("/st"), "/");

        let root = FilesStrategy::new("/www".into(), "/", false);
        assert_eq!(root.relative_path("/a/b"), "/a/b");
    }

    #[test]
    fn resolve_decodes_and_joins() {
        let files = FilesStrategy::new("/www".into(), "/", false);
        assert_eq!(
            files.resolve("/docs/my%20file.txt"),
            Some(PathBuf::from("/www/docs/my file.txt"))
        );
        assert_eq!(files.resolve("/./a//b"), Some(PathBuf::from("/www/a/b")));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let files = FilesStrategy::new("/www".into(), "/", false);
        assert_eq!(files.resolve("/../etc/passwd"), None);
        assert_eq!(files.resolve("/a/%2e%2e/%2e%2e/etc/passwd"), None);
        assert_eq!(files.resolve("/%ff"), None);
    }

    #[tokio::test]
    async fn serves_plain_file_with_cache_header() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi there").unwrap();
        let files = FilesStrategy::new(dir.path().to_path_buf(), "/", false);

        let resp = files.serve(get("/hello.txt")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], CACHE_CONTROL);
        assert_eq!(body_string(resp).await, "hi there");
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let files = FilesStrategy::new(dir.path().to_path_buf(), "/", false);
        let resp = files.serve(get("/nope.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(resp).await, "404 page not found\n");
    }

    #[tokio::test]
    async fn directory_without_slash_redirects_with_query() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        let files = FilesStrategy::new(dir.path().to_path_buf(), "/", false);

        let resp = files.serve(get("/docs?x=1")).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[header::LOCATION], "/docs/?x=1");
    }

    #[tokio::test]
    async fn redirect_uses_original_path_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        let files = FilesStrategy::new(dir.path().to_path_buf(), "/site/", false);

        let resp = files.serve(get("/site/docs")).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[header::LOCATION], "/site/docs/");
    }

    #[tokio::test]
    async fn index_shtml_wins_over_index_html() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nav.html"), "NAV").unwrap();
        std::fs::write(
            dir.path().join("index.shtml"),
            "<!--#include virtual=\"/nav.html\"--> body",
        )
        .unwrap();
        std::fs::write(dir.path().join("index.html"), "static").unwrap();
        let files = FilesStrategy::new(dir.path().to_path_buf(), "/", false);

        let resp = files.serve(get("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert!(resp.headers().contains_key(header::LAST_MODIFIED));
        assert_eq!(body_string(resp).await, "NAV body");
    }

    #[tokio::test]
    async fn index_html_served_when_no_shtml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "static").unwrap();
        let files = FilesStrategy::new(dir.path().to_path_buf(), "/", false);
        let resp = files.serve(get("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "static");
    }

    #[tokio::test]
    async fn directory_without_index_is_forbidden_or_listed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();

        let hidden = FilesStrategy::new(dir.path().to_path_buf(), "/", false);
        let resp = hidden.serve(get("/")).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_string(resp).await, "403 Forbidden\n");

        let listed = FilesStrategy::new(dir.path().to_path_buf(), "/", true);
        let resp = listed.serve(get("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.contains("<a href=\"a.txt\">a.txt</a>"));
    }

    #[tokio::test]
    async fn include_document_honours_if_modified_since() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.shtml"), "x").unwrap();
        let files = FilesStrategy::new(dir.path().to_path_buf(), "/", false);

        let first = files.serve(get("/page.shtml")).await;
        let last_modified = first.headers()[header::LAST_MODIFIED].clone();

        let req = Request::builder()
            .uri("/page.shtml")
            .header(header::IF_MODIFIED_SINCE, last_modified)
            .body(Body::empty())
            .unwrap();
        let resp = files.serve(req).await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn unreadable_include_document_is_500_even_when_conditional() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page.shtml");
        std::fs::write(&page, "x").unwrap();
        let meta = std::fs::metadata(&page).unwrap();
        // Gone between the stat and the read.
        std::fs::remove_file(&page).unwrap();
        let files = FilesStrategy::new(dir.path().to_path_buf(), "/", false);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Fri, 01 Jan 2100 00:00:00 GMT"),
        );
        let resp = files.serve_include(&page, &meta, &headers).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
