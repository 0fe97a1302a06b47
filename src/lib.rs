//! Frontdoor is a host and path routed HTTP front door.
//!
//! Each request is matched against an ordered route table on its `Host`
//! header and path. The first matching route decides how it is handled:
//! files are served from disk (with server-side includes for `.shtml`),
//! the request is proxied to an upstream, or a fixed error is returned.
//! Every request is written to a common-log-format access log through a
//! bounded queue and a single writer task.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate).
//! - [`config`] -- Route file loading and validation.
//! - [`routing`] -- The ordered host + path [`RouteTable`](routing::RouteTable).
//! - [`files`] -- Static files, include expansion and directory listings.
//! - [`proxy`] -- Reverse proxying: URL rewriting and header handling.
//! - [`compression`] -- Gzip for textual responses.
//! - [`dispatch`] -- Per-request routing, handling and byte counting.
//! - [`access_log`] -- The asynchronous access log and its sinks.
//! - [`response`] -- Shared response builders.
//! - [`server`] -- Listener, HTTP client and graceful shutdown.
//! - [`logging`] -- Operational tracing setup with JSON and pretty output.
//! - [`error`] -- Unified error types using `thiserror`.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML route file support _(enabled by default)_ |
//! | `json` | JSON route file support |
//! | `toml` | TOML route file support |
//! | `file-backends` | All route file formats |

// Binary crate; public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod access_log;
pub mod cli;
pub mod cmd;
pub mod compression;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod files;
pub mod logging;
pub mod proxy;
pub mod response;
pub mod routing;
pub mod server;
