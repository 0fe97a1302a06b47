//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, init, validate), and their associated argument
//! structs. Every `run` flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "frontdoor",
    version,
    about = "Host and path routed HTTP front door",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        frontdoor init                       Create a starter route file\n  \
        frontdoor run                        Start with ./frontdoor.yaml\n  \
        frontdoor run -c routes.yaml         Start with a specific route file"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start serving
    Run(Box<RunArgs>),

    /// Generate a starter route file
    Init(InitArgs),

    /// Validate a route file without starting
    Validate(ValidateArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        frontdoor run                                       Auto-detect route file\n  \
        frontdoor run -c routes.yaml --listen 0.0.0.0:80    Serve on port 80\n  \
        frontdoor run --access-log /var/log/frontdoor.log   Custom access log")]
pub struct RunArgs {
    /// Route file path (.yaml, .json, .toml)
    #[arg(short, long, env = "FRONTDOOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'L', long, env = "FRONTDOOR_LISTEN", default_value = "0.0.0.0:4984")]
    pub listen: String,

    /// Access log file, opened for append
    #[arg(long, env = "FRONTDOOR_ACCESS_LOG", default_value = "access.log")]
    pub access_log: PathBuf,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Seconds a client has to send its request headers
    #[arg(
        long,
        env = "FRONTDOOR_HEADER_TIMEOUT",
        default_value_t = 30,
        help_heading = "Tuning"
    )]
    pub header_timeout: u64,

    /// Seconds shutdown waits for open connections
    #[arg(
        long,
        env = "FRONTDOOR_DRAIN_TIMEOUT",
        default_value_t = 30,
        help_heading = "Tuning"
    )]
    pub drain_timeout: u64,

    /// Access log queue capacity
    #[arg(
        long,
        env = "FRONTDOOR_LOG_QUEUE",
        default_value_t = 10_000,
        help_heading = "Tuning"
    )]
    pub log_queue: usize,

    /// Access log sync interval in milliseconds
    #[arg(
        long,
        env = "FRONTDOOR_LOG_FLUSH_MS",
        default_value_t = 1000,
        help_heading = "Tuning"
    )]
    pub log_flush_ms: u64,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        frontdoor init                          Starter route file (yaml)\n  \
        frontdoor init -f toml -o routes.toml   TOML format")]
pub struct InitArgs {
    /// Output format
    #[arg(short, long, default_value = "yaml")]
    pub format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Route file to validate
    #[arg(default_value = "frontdoor.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
