//! Integration tests for serve-files routes through a running server.

use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use frontdoor::access_log::{AccessLog, AccessLogWriter, MemorySink};
use frontdoor::dispatch::Dispatcher;
use frontdoor::files::FilesStrategy;
use frontdoor::routing::{FixedError, HostMatch, PathMatch, RouteEntry, RouteTable, Strategy};
use frontdoor::server::{self, ServerSettings};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

struct TestServer {
    addr: SocketAddr,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
    writer: AccessLogWriter,
    sink: MemorySink,
}

impl TestServer {
    async fn stop(self) -> Vec<String> {
        let _ = self.shutdown.send(());
        self.handle.await.unwrap();
        self.writer.finish().await;
        self.sink.lines()
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

async fn start_test_server(entries: Vec<RouteEntry>) -> TestServer {
    let sink = MemorySink::new();
    let (log, writer) = AccessLog::start(Box::new(sink.clone()), 64, Duration::from_millis(50));
    let table = RouteTable::new(entries, "/nonexistent-frontdoor-root".into());
    let dispatcher = Arc::new(Dispatcher::new(table, server::build_http_client(), log));
    let router = server::build_router(dispatcher);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        server::serve(listener, router, ServerSettings::default(), async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    TestServer {
        addr,
        shutdown,
        handle,
        writer,
        sink,
    }
}

fn files_entry(path: &str, root: &Path, prefix: &str, show_index: bool) -> RouteEntry {
    RouteEntry::new(
        HostMatch::Any,
        PathMatch::new(path).unwrap(),
        Strategy::Files(FilesStrategy::new(root.to_path_buf(), prefix, show_index)),
    )
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// A small site:
///
/// ```text
/// hello.txt
/// notes.shtml          includes /inc/header.html and missing.html
/// inc/header.html
/// plain/index.html
/// ssi/index.shtml      includes ../inc/header.html
/// ssi/index.html       shadowed by index.shtml
/// bare/a.txt
/// bare/sub/
/// ```
fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("inc")).unwrap();
    std::fs::create_dir_all(root.join("plain")).unwrap();
    std::fs::create_dir_all(root.join("ssi")).unwrap();
    std::fs::create_dir_all(root.join("bare/sub")).unwrap();

    std::fs::write(root.join("hello.txt"), "hello, world\n".repeat(40)).unwrap();
    std::fs::write(root.join("inc/header.html"), "<h1>Site</h1>").unwrap();
    std::fs::write(
        root.join("notes.shtml"),
        "<!--#include virtual=\"/inc/header.html\"-->\n<p>notes</p>\n<!--#include virtual=\"missing.html\"-->",
    )
    .unwrap();
    std::fs::write(root.join("plain/index.html"), "<p>plain index</p>").unwrap();
    std::fs::write(
        root.join("ssi/index.shtml"),
        "<!--#include virtual=\"../inc/header.html\"--><p>ssi index</p>",
    )
    .unwrap();
    std::fs::write(root.join("ssi/index.html"), "<p>not me</p>").unwrap();
    std::fs::write(root.join("bare/a.txt"), "a").unwrap();
    dir
}

#[tokio::test]
async fn serves_file_with_cache_control() {
    let dir = site();
    let server = start_test_server(vec![files_entry("", dir.path(), "/", false)]).await;

    let resp = client().get(server.url("/hello.txt")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "max-age=3600");
    let body = resp.text().await.unwrap();
    assert_eq!(body, "hello, world\n".repeat(40));

    let lines = server.stop().await;
    assert_eq!(lines.len(), 1);
    assert!(
        lines[0].contains(&format!("\"GET /hello.txt HTTP/1.1\" 200 {} ", body.len())),
        "{}",
        lines[0]
    );
}

#[tokio::test]
async fn directory_without_slash_redirects_keeping_query() {
    let dir = site();
    let server = start_test_server(vec![files_entry("", dir.path(), "/", false)]).await;

    let resp = client().get(server.url("/plain?page=2")).send().await.unwrap();
    assert_eq!(resp.status(), 301);
    assert_eq!(resp.headers()[header::LOCATION], "/plain/?page=2");

    server.stop().await;
}

#[tokio::test]
async fn directory_index_order() {
    let dir = site();
    let server = start_test_server(vec![files_entry("", dir.path(), "/", false)]).await;

    let resp = client().get(server.url("/ssi/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "<h1>Site</h1><p>ssi index</p>");

    let resp = client().get(server.url("/plain/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "<p>plain index</p>");

    let resp = client().get(server.url("/bare/")).send().await.unwrap();
    assert_eq!(resp.status(), 403);

    server.stop().await;
}

#[tokio::test]
async fn listing_when_enabled() {
    let dir = site();
    let server = start_test_server(vec![files_entry("", dir.path(), "/", true)]).await;

    let resp = client().get(server.url("/bare/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<a href=\"a.txt\">a.txt</a>"), "{body}");
    assert!(body.contains("<a href=\"sub/\">sub/</a>"), "{body}");

    server.stop().await;
}

#[tokio::test]
async fn include_document_expands_and_reports_failures_inline() {
    let dir = site();
    let server = start_test_server(vec![files_entry("", dir.path(), "/", false)]).await;

    let resp = client().get(server.url("/notes.shtml")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<h1>Site</h1>\n<p>notes</p>\n"), "{body}");
    assert!(body.contains("Error including "), "{body}");
    assert!(!body.contains("<!--#include"), "{body}");

    server.stop().await;
}

#[tokio::test]
async fn prefix_is_removed_before_mapping() {
    let dir = site();
    let server = start_test_server(vec![files_entry(
        "^/static/",
        dir.path(),
        "/static/",
        false,
    )])
    .await;

    let resp = client()
        .get(server.url("/static/plain/index.html"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "<p>plain index</p>");

    // Unmatched paths go to the fallback root, which does not exist.
    let resp = client().get(server.url("/hello.txt")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn textual_files_are_gzipped_when_accepted() {
    let dir = site();
    let server = start_test_server(vec![files_entry("", dir.path(), "/", false)]).await;

    let resp = client()
        .get(server.url("/hello.txt"))
        .header(header::ACCEPT_ENCODING, "gzip")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()[header::CONTENT_ENCODING], "gzip");
    let compressed = resp.bytes().await.unwrap();
    let mut decoded = String::new();
    flate2::read::GzDecoder::new(&compressed[..])
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, "hello, world\n".repeat(40));

    let lines = server.stop().await;
    assert!(
        lines[0].contains(&format!("\" 200 {} ", compressed.len())),
        "{}",
        lines[0]
    );
}

#[tokio::test]
async fn missing_file_is_404() {
    let dir = site();
    let server = start_test_server(vec![files_entry("", dir.path(), "/", false)]).await;

    let resp = client().get(server.url("/nope.html")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let lines = server.stop().await;
    assert!(lines[0].contains("\"GET /nope.html HTTP/1.1\" 404 "), "{}", lines[0]);
}

#[tokio::test]
async fn parent_segments_never_escape_root() {
    let outer = tempfile::tempdir().unwrap();
    std::fs::write(outer.path().join("secret.txt"), "secret").unwrap();
    let root = outer.path().join("www");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(root.join("index.html"), "public").unwrap();
    let server = start_test_server(vec![files_entry("", &root, "/", false)]).await;

    // Raw request line; HTTP clients normalise dot segments away.
    for target in ["/../secret.txt", "/%2e%2e/secret.txt", "/a/..%2f..%2fsecret.txt"] {
        let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
        let request = format!("GET {target} HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 404"), "{target}: {response}");
        assert!(!response.contains("secret\r\n") && !response.ends_with("secret"));
    }

    server.stop().await;
}

#[tokio::test]
async fn escaped_path_cannot_skip_an_earlier_route() {
    let dir = site();
    std::fs::create_dir(dir.path().join("private")).unwrap();
    std::fs::write(dir.path().join("private/secret.txt"), "TOP SECRET").unwrap();
    let server = start_test_server(vec![
        RouteEntry::new(
            HostMatch::Any,
            PathMatch::new("^/private/").unwrap(),
            Strategy::Error(FixedError::new(StatusCode::GONE, None)),
        ),
        files_entry("", dir.path(), "/", false),
    ])
    .await;

    for target in ["/private/secret.txt", "/%70rivate/secret.txt", "/private%2Fsecret.txt"] {
        let resp = client().get(server.url(target)).send().await.unwrap();
        assert_eq!(resp.status(), 410, "{target}");
        assert_eq!(resp.text().await.unwrap(), "410 Gone\n", "{target}");
    }

    let lines = server.stop().await;
    // The log keeps the path exactly as the client sent it.
    assert!(
        lines[1].contains("\"GET /%70rivate/secret.txt HTTP/1.1\" 410 "),
        "{}",
        lines[1]
    );
}
