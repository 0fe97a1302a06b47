//! Ordered host + path route table.
//!
//! [`RouteTable::match_route`] walks the entries in declaration order and
//! returns the first one whose host matcher and path matcher both accept
//! the request. There is no best-match scoring: order is priority, and a
//! broad entry placed early shadows narrower ones after it. When nothing
//! matches, a built-in entry serving the configured fallback directory is
//! returned and the gap is logged.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::Response;
use regex::Regex;

use crate::config::model::{Config, ErrorConfig, RouteConfig};
use crate::error::FrontdoorError;
use crate::files::FilesStrategy;
use crate::proxy::ProxyStrategy;
use crate::response::plain_error;

#[derive(Debug, Clone)]
pub enum HostMatch {
    Any,
    Exact(String),
}

impl HostMatch {
    #[must_use]
    pub fn new(host: &str) -> Self {
        if host.is_empty() {
            Self::Any
        } else {
            Self::Exact(host.to_string())
        }
    }

    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == host,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PathMatch {
    Any,
    Pattern(Regex),
}

impl PathMatch {
    pub fn new(pattern: &str) -> Result<Self, FrontdoorError> {
        if pattern.is_empty() {
            return Ok(Self::Any);
        }
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|source| FrontdoorError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Pattern(re) => re.is_match(path),
        }
    }
}

/// A literal status and message, written without touching any file or upstream.
#[derive(Debug, Clone)]
pub struct FixedError {
    pub status: StatusCode,
    pub message: String,
}

impl FixedError {
    #[must_use]
    pub fn new(status: StatusCode, message: Option<&str>) -> Self {
        let message = message.map_or_else(|| status_line(status), str::to_string);
        Self { status, message }
    }

    #[must_use]
    pub fn respond(&self) -> Response {
        plain_error(self.status, &self.message)
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

#[derive(Debug, Clone)]
pub enum Strategy {
    Files(FilesStrategy),
    Proxy(ProxyStrategy),
    Error(FixedError),
}

impl Strategy {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Files(_) => "files",
            Self::Proxy(_) => "proxy",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub host: HostMatch,
    pub path: PathMatch,
    pub strategy: Strategy,
}

impl RouteEntry {
    #[must_use]
    pub fn new(host: HostMatch, path: PathMatch, strategy: Strategy) -> Self {
        Self {
            host,
            path,
            strategy,
        }
    }

    #[must_use]
    pub fn matches(&self, host: &str, path: &str) -> bool {
        self.host.matches(host) && self.path.matches(path)
    }

    pub fn from_config(route: &RouteConfig) -> Result<Self, FrontdoorError> {
        let strategy = if let Some(ref files) = route.files {
            Strategy::Files(FilesStrategy::new(
                files.root.clone(),
                &files.prefix,
                files.index,
            ))
        } else if let Some(ref proxy) = route.proxy {
            Strategy::Proxy(ProxyStrategy::from_config(proxy)?)
        } else if let Some(ErrorConfig { status, ref message }) = route.error {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Strategy::Error(FixedError::new(status, message.as_deref()))
        } else {
            // validate() rejects handler-less routes before we get here
            Strategy::Error(FixedError::new(StatusCode::NOT_FOUND, None))
        };

        Ok(Self::new(
            HostMatch::new(&route.host),
            PathMatch::new(&route.path)?,
            strategy,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    fallback: RouteEntry,
}

impl RouteTable {
    #[must_use]
    pub fn new(entries: Vec<RouteEntry>, fallback_root: PathBuf) -> Self {
        Self {
            entries,
            fallback: RouteEntry::new(
                HostMatch::Any,
                PathMatch::Any,
                Strategy::Files(FilesStrategy::new(fallback_root, "/", false)),
            ),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, FrontdoorError> {
        let entries = config
            .routes
            .iter()
            .map(RouteEntry::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries, config.defaults.fallback_root.clone()))
    }

    /// First entry accepting `host` and `path`, with its position.
    #[must_use]
    pub fn find(&self, host: &str, path: &str) -> Option<(usize, &RouteEntry)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.matches(host, path))
    }

    /// Like [`find`](Self::find), but never fails: falls back to the
    /// built-in entry and reports the configuration gap.
    #[must_use]
    pub fn match_route(&self, host: &str, path: &str) -> &RouteEntry {
        if let Some((_, entry)) = self.find(host, path) {
            return entry;
        }
        tracing::warn!(host = %host, path = %path, "no route matched, using default handler");
        &self.fallback
    }

    #[must_use]
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
