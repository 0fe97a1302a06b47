//! Operational logging setup using the `tracing` ecosystem.
//!
//! This is the process log (startup, routing gaps, upstream failures),
//! separate from the access log. Output is JSON for production or
//! pretty-printed for a terminal. The format is auto-detected from stdout
//! but can be forced with `--json` or `--pretty`.

use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Level filter for `level`. Connection-level chatter from hyper stays at
/// `warn` unless tracing everything.
#[must_use]
pub fn filter(level: &LogLevel) -> Targets {
    let tracing_level = level.to_tracing_level();
    let library_level = if matches!(level, LogLevel::Trace) {
        tracing::Level::TRACE
    } else {
        tracing::Level::WARN
    };
    Targets::new()
        .with_default(tracing_level)
        .with_target("hyper", library_level)
        .with_target("hyper_util", library_level)
        .with_target("rustls", library_level)
}

pub fn init(level: &LogLevel, format: LogFormat) {
    let filter = filter(level);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_wins() {
        assert_eq!(resolve_format(true, true), LogFormat::Json);
        assert_eq!(resolve_format(false, true), LogFormat::Json);
    }

    #[test]
    fn pretty_flag_forces_pretty() {
        assert_eq!(resolve_format(true, false), LogFormat::Pretty);
    }

    #[test]
    fn libraries_are_quiet_below_trace() {
        let targets = filter(&LogLevel::Debug);
        assert!(targets.would_enable("frontdoor::dispatch", &tracing::Level::DEBUG));
        assert!(!targets.would_enable("hyper::proto", &tracing::Level::INFO));

        let everything = filter(&LogLevel::Trace);
        assert!(everything.would_enable("hyper::proto", &tracing::Level::TRACE));
    }
}
