//! Serde data structures for the frontdoor configuration file.
//!
//! Contains [`Config`] (the root), [`RouteConfig`] and the three strategy
//! blocks [`FilesConfig`], [`ProxyConfig`] and [`ErrorConfig`]. All types
//! derive `Serialize` and `Deserialize` with `deny_unknown_fields` for
//! strict parsing. Route order in the file is route priority.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_fallback_root() -> PathBuf {
    PathBuf::from("/var/www")
}

fn default_prefix() -> String {
    "/".to_string()
}

fn is_default_prefix(v: &str) -> bool {
    v == "/"
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_default_defaults(v: &Defaults) -> bool {
    v.fallback_root == default_fallback_root()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "is_default_defaults")]
    pub defaults: Defaults,

    pub routes: Vec<RouteConfig>,
}

impl Config {
    #[must_use]
    pub fn proxy_routes(&self) -> usize {
        self.routes.iter().filter(|r| r.proxy.is_some()).count()
    }

    /// Whether the last route matches every host and every path.
    #[must_use]
    pub fn has_catch_all(&self) -> bool {
        self.routes.last().is_some_and(RouteConfig::is_catch_all)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Directory served when no route matches at all.
    #[serde(default = "default_fallback_root")]
    pub fallback_root: PathBuf,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            fallback_root: default_fallback_root(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Exact `Host` value; empty matches any host.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    /// Regular expression searched in the request path; empty matches any path.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<FilesConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorConfig>,
}

impl RouteConfig {
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.host.is_empty() && self.path.is_empty()
    }

    /// Human-readable identifier used in validation messages and logs.
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        match (self.host.is_empty(), self.path.is_empty()) {
            (true, true) => format!("routes[{index}] (*)"),
            (false, true) => format!("routes[{index}] ({})", self.host),
            (true, false) => format!("routes[{index}] ({})", self.path),
            (false, false) => format!("routes[{index}] ({} {})", self.host, self.path),
        }
    }

    /// Number of strategy blocks present; a valid route has exactly one.
    #[must_use]
    pub fn strategy_count(&self) -> usize {
        usize::from(self.files.is_some())
            + usize::from(self.proxy.is_some())
            + usize::from(self.error.is_some())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilesConfig {
    pub root: PathBuf,

    /// Leading part of the request path that maps onto `root`.
    #[serde(default = "default_prefix", skip_serializing_if = "is_default_prefix")]
    pub prefix: String,

    /// Generate a listing for directories without an index document.
    #[serde(default, skip_serializing_if = "is_false")]
    pub index: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Destination base URL, e.g. `http://backend:8080/app/?key=v`.
    pub to: String,

    /// Number of leading path characters (the length of this string) removed
    /// before appending the path to the destination.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub strip_prefix: String,

    /// Allowed methods; empty allows every method.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,

    /// Gzip upstream responses for clients that accept it.
    #[serde(default, skip_serializing_if = "is_false")]
    pub gzip: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorConfig {
    pub status: u16,

    /// Response body; defaults to the canonical status line, e.g. `410 Gone`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
