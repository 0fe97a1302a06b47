//! `frontdoor run`: start serving.
//!
//! Loads and validates the route file, opens the access log (failure is
//! fatal), binds the listener and serves until SIGTERM or Ctrl+C. On the
//! way out it waits for open connections and then for the access log to
//! drain and close.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::access_log::{AccessLog, FileSink};
use crate::cli::RunArgs;
use crate::config;
use crate::dispatch::Dispatcher;
use crate::error::FrontdoorError;
use crate::logging;
use crate::routing::RouteTable;
use crate::server::{self, ServerSettings};

const CONFIG_CANDIDATES: [&str; 4] = [
    "frontdoor.yaml",
    "frontdoor.yml",
    "frontdoor.json",
    "frontdoor.toml",
];

pub async fn execute(args: RunArgs) -> Result<(), FrontdoorError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let config_path = resolve_config_path(args.config.as_deref()).await?;
    let (config, version) = config::load(&config_path).await?;
    let table = RouteTable::from_config(&config)?;
    if !config.has_catch_all() {
        tracing::warn!("route table has no catch-all, unmatched requests use the fallback root");
    }

    let addr: SocketAddr = args.listen.parse()?;

    let sink = FileSink::open(&args.access_log).await?;
    let (access_log, log_writer) = AccessLog::start(
        Box::new(sink),
        args.log_queue,
        Duration::from_millis(args.log_flush_ms),
    );

    let dispatcher = Arc::new(Dispatcher::new(
        table,
        server::build_http_client(),
        access_log,
    ));
    let router = server::build_router(dispatcher);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        config = %config_path.display(),
        version = version.short(),
        routes = config.routes.len(),
        access_log = %args.access_log.display(),
        "frontdoor started"
    );

    let settings = ServerSettings {
        header_read_timeout: Duration::from_secs(args.header_timeout),
        drain_timeout: Duration::from_secs(args.drain_timeout),
    };
    let served = server::serve(listener, router, settings, server::shutdown_signal()).await;

    // The router held the last producer handle; the writer now drains.
    log_writer.finish().await;

    tracing::info!("frontdoor stopped");
    served
}

async fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, FrontdoorError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    for name in CONFIG_CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected route file");
            return Ok(path);
        }
    }

    Err(FrontdoorError::ConfigFileNotFound {
        path: PathBuf::from(CONFIG_CANDIDATES[0]),
    })
}
