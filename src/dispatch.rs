//! Per-request dispatch: route, handle, log.
//!
//! [`dispatch`] is the router's only handler. It snapshots the request line
//! before anything can rewrite it, picks a route from the [`RouteTable`],
//! runs the route's strategy and wraps the response body in a
//! [`CountingBody`]. The access-log record is queued when that body
//! finishes or is dropped, so every request is logged with the bytes that
//! actually went out.

use std::fmt;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use axum::body::{Body, HttpBody};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use chrono::{DateTime, Local};
use hyper::body::{Frame, SizeHint};
use percent_encoding::percent_decode_str;
use tracing::Instrument;
use uuid::Uuid;

use crate::access_log::{AccessLog, AccessLogRecord, LogSlot};
use crate::error::FrontdoorError;
use crate::compression::gzip_textual;
use crate::routing::{RouteTable, Strategy};
use crate::server::HttpClient;

/// Shared state behind every request.
#[derive(Debug)]
pub struct Dispatcher {
    pub table: RouteTable,
    pub http_client: HttpClient,
    pub access_log: AccessLog,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(table: RouteTable, http_client: HttpClient, access_log: AccessLog) -> Self {
        Self {
            table,
            http_client,
            access_log,
        }
    }

    /// Run the matching strategy. The response is not yet wrapped for logging.
    pub async fn handle(&self, client_ip: IpAddr, host: &str, req: Request) -> Response {
        // Match on the path as the files strategy will read it, so an
        // escaped character cannot step around an earlier route.
        let path = percent_decode_str(req.uri().path()).decode_utf8_lossy();
        let entry = self.table.match_route(host, &path);
        tracing::debug!(strategy = entry.strategy.kind(), "route matched");

        match entry.strategy {
            Strategy::Files(ref files) => {
                let accept = accept_encoding(req.headers());
                let response = files.serve(req).await;
                gzip_textual(&accept, response).await
            }
            Strategy::Proxy(ref proxy) if proxy.gzip() => {
                let accept = accept_encoding(req.headers());
                let response = proxy.forward(&self.http_client, client_ip, req).await;
                gzip_textual(&accept, response).await
            }
            Strategy::Proxy(ref proxy) => proxy.forward(&self.http_client, client_ip, req).await,
            Strategy::Error(ref fixed) => fixed.respond(),
        }
    }
}

/// Router fallback handling every request.
pub async fn dispatch(State(dispatcher): State<Arc<Dispatcher>>, req: Request) -> Response {
    let received = Local::now();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = peer.map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |addr| addr.ip());
    let host = request_host(&req);

    let mut pending = PendingRecord {
        log: dispatcher.access_log.clone(),
        timestamp: received,
        client_ip: peer.map_or_else(|| "-".to_string(), |addr| addr.ip().to_string()),
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
        query: req.uri().query().unwrap_or_default().to_string(),
        protocol: format!("{:?}", req.version()),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        host: host.clone(),
        status: StatusCode::OK,
    };

    let span = tracing::info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %pending.method,
        path = %pending.path,
        host = %host,
    );
    let response = dispatcher
        .handle(client_ip, &host, req)
        .instrument(span)
        .await;

    pending.status = response.status();
    response.map(|body| Body::new(CountingBody::new(body, pending)))
}

fn request_host(req: &Request) -> String {
    req.headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default()
        .to_string()
}

fn accept_encoding(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for value in headers.get_all(header::ACCEPT_ENCODING) {
        out.append(header::ACCEPT_ENCODING, value.clone());
    }
    out
}

/// Everything about a request except its byte count.
#[derive(Debug)]
struct PendingRecord {
    log: AccessLog,
    timestamp: DateTime<Local>,
    client_ip: String,
    method: String,
    path: String,
    query: String,
    protocol: String,
    status: StatusCode,
    user_agent: String,
    host: String,
}

impl PendingRecord {
    fn into_record(self, bytes: u64) -> (AccessLog, AccessLogRecord) {
        let record = AccessLogRecord {
            timestamp: self.timestamp,
            client_ip: self.client_ip,
            method: self.method,
            path: self.path,
            query: self.query,
            protocol: self.protocol,
            status: self.status.as_u16(),
            bytes,
            user_agent: self.user_agent,
            host: self.host,
        };
        (self.log, record)
    }
}

type Reserving = Pin<Box<dyn Future<Output = Result<LogSlot, FrontdoorError>> + Send>>;

/// Response body that counts the data bytes it yields and logs the request
/// when it ends.
///
/// The end of the body is held back until the access log has room for the
/// record, so a full log queue slows responses down instead of growing
/// without bound. A body dropped before its end (client gone, connection
/// aborted) logs through [`AccessLog::submit`] instead.
pub struct CountingBody {
    inner: Body,
    bytes: u64,
    pending: Option<PendingRecord>,
    reserving: Option<Reserving>,
}

impl CountingBody {
    fn new(inner: Body, pending: PendingRecord) -> Self {
        Self {
            inner,
            bytes: 0,
            pending: Some(pending),
            reserving: None,
        }
    }
}

impl fmt::Debug for CountingBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingBody")
            .field("bytes", &self.bytes)
            .field("pending", &self.pending)
            .field("reserving", &self.reserving.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpBody for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if this.reserving.is_none() {
            match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
                Some(Ok(frame)) => {
                    if let Some(data) = frame.data_ref() {
                        this.bytes += data.len() as u64;
                    }
                    return Poll::Ready(Some(Ok(frame)));
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {
                    let Some(ref pending) = this.pending else {
                        return Poll::Ready(None);
                    };
                    let log = pending.log.clone();
                    this.reserving = Some(Box::pin(async move { log.reserve().await }));
                }
            }
        }

        let Some(ref mut reserving) = this.reserving else {
            return Poll::Ready(None);
        };
        let slot = ready!(reserving.as_mut().poll(cx));
        this.reserving = None;

        if let Some(pending) = this.pending.take() {
            let (_, record) = pending.into_record(this.bytes);
            match slot {
                Ok(slot) => slot.send(record),
                Err(e) => tracing::warn!(error = %e, "access log record lost"),
            }
        }
        Poll::Ready(None)
    }

    fn is_end_stream(&self) -> bool {
        self.pending.is_none() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            let (log, record) = pending.into_record(self.bytes);
            log.submit(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_log::{MemorySink, DEFAULT_FLUSH_INTERVAL};
    use crate::routing::{FixedError, HostMatch, PathMatch, RouteEntry};
    use crate::server::build_http_client;
    use http_body_util::BodyExt;

    fn table() -> RouteTable {
        RouteTable::new(
            vec![RouteEntry::new(
                HostMatch::new("old.example.com"),
                PathMatch::new("").unwrap(),
                Strategy::Error(FixedError::new(StatusCode::GONE, Some("gone for good"))),
            )],
            "/nonexistent-frontdoor-root".into(),
        )
    }

    #[tokio::test]
    async fn logs_original_request_with_body_bytes() {
        let sink = MemorySink::new();
        let (log, writer) = AccessLog::start(Box::new(sink.clone()), 16, DEFAULT_FLUSH_INTERVAL);
        let dispatcher = Arc::new(Dispatcher::new(table(), build_http_client(), log));

        let mut req = Request::builder()
            .uri("/old/page?x=1")
            .header(header::HOST, "old.example.com")
            .header(header::USER_AGENT, "test-agent")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 1, 2, 3], 5555))));

        let resp = dispatch(State(dispatcher), req).await;
        assert_eq!(resp.status(), StatusCode::GONE);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"gone for good\n");

        writer.finish().await;
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.starts_with("10.1.2.3 - - ["), "{line}");
        assert!(
            line.ends_with("\"GET /old/page?x=1 HTTP/1.1\" 410 14 \"-\" \"test-agent\" old.example.com"),
            "{line}"
        );
    }

    #[tokio::test]
    async fn dropped_body_is_still_logged() {
        let sink = MemorySink::new();
        let (log, writer) = AccessLog::start(Box::new(sink.clone()), 16, DEFAULT_FLUSH_INTERVAL);
        let dispatcher = Arc::new(Dispatcher::new(table(), build_http_client(), log));

        let req = Request::builder()
            .uri("/missing")
            .header(header::HOST, "other.example.com")
            .body(Body::empty())
            .unwrap();
        let resp = dispatch(State(dispatcher), req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        drop(resp);

        writer.finish().await;
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("- - - ["), "{}", lines[0]);
        assert!(lines[0].contains("\" 404 0 \""), "{}", lines[0]);
    }
}
