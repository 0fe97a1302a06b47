//! Header construction for proxied requests and relayed responses.
//!
//! [`build_forwarded_headers`] clones the client's headers, strips
//! hop-by-hop headers, rewrites `Host` to the upstream authority and
//! appends the client address to `X-Forwarded-For`.
//! [`strip_hop_by_hop`] is applied to upstream responses before they are
//! streamed back.

use std::net::IpAddr;
use std::sync::LazyLock;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| name.trim().parse::<HeaderName>().ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: IpAddr,
    upstream_authority: &str,
) -> HeaderMap {
    let mut headers = original.clone();
    strip_hop_by_hop(&mut headers);

    match HeaderValue::from_str(upstream_authority) {
        Ok(val) => {
            headers.insert(header::HOST, val);
        }
        Err(_) => {
            tracing::warn!(authority = %upstream_authority, "upstream authority is not a valid Host header");
        }
    }

    // X-Forwarded-For: append to chain
    let client_ip = client_ip.to_string();
    let xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.clone(),
            |existing| format!("{existing}, {client_ip}"),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    headers
}
