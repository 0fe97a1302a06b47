//! Outbound URL construction for proxied routes.
//!
//! The upstream URL takes its scheme and authority from the destination,
//! its path from the destination path followed by the inbound path with a
//! fixed number of leading characters removed, and its query from both
//! sides joined with `&`. Everything here is pure string work so it can
//! be tested without a network.

use std::fmt;

use axum::http::uri::{PathAndQuery, Uri};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRewrite {
    pub scheme: String,
    /// `host[:port]`, also sent upstream as the `Host` header.
    pub authority: String,
    pub path: String,
    pub query: String,
}

impl ProxyRewrite {
    pub fn to_uri(&self) -> Result<Uri, axum::http::Error> {
        let mut path_and_query = String::with_capacity(self.path.len() + self.query.len() + 2);
        if !self.path.starts_with('/') {
            path_and_query.push('/');
        }
        path_and_query.push_str(&self.path);
        if !self.query.is_empty() {
            path_and_query.push('?');
            path_and_query.push_str(&self.query);
        }
        let path_and_query = PathAndQuery::try_from(path_and_query.as_str())?;

        Uri::builder()
            .scheme(self.scheme.as_str())
            .authority(self.authority.as_str())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for ProxyRewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}

/// Remove the first `count` bytes of `path`. A count longer than the path
/// (or one that would split a character) removes nothing.
#[must_use]
pub fn strip_leading(path: &str, count: usize) -> &str {
    if count > path.len() {
        return path;
    }
    path.get(count..).unwrap_or(path)
}

/// Join the destination's fixed query with the inbound query.
#[must_use]
pub fn merge_query(destination: &str, inbound: &str) -> String {
    match (destination.is_empty(), inbound.is_empty()) {
        (true, _) => inbound.to_string(),
        (_, true) => destination.to_string(),
        (false, false) => format!("{destination}&{inbound}"),
    }
}

/// `host[:port]` of a destination; the port is omitted when it is the
/// scheme default.
#[must_use]
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    url.port()
        .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"))
}

/// Path prefix as written in the destination. `Url` reports `/` for both
/// `http://eve` and `http://eve/`; only the second one has a path.
#[must_use]
pub fn destination_path(raw: &str, url: &Url) -> String {
    let without_query = raw.split(['?', '#']).next().unwrap_or(raw);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    if after_scheme.contains('/') {
        url.path().to_string()
    } else {
        String::new()
    }
}

#[must_use]
pub fn rewrite(
    destination: &Url,
    path_prefix: &str,
    strip_prefix: &str,
    path: &str,
    query: &str,
) -> ProxyRewrite {
    let rest = strip_leading(path, strip_prefix.len());
    ProxyRewrite {
        scheme: destination.scheme().to_string(),
        authority: authority(destination),
        path: format!("{path_prefix}{rest}"),
        query: merge_query(destination.query().unwrap_or_default(), query),
    }
}
