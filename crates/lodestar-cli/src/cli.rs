use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// How much of the bridge's traffic to log on stderr.
///
/// Nothing in lodestar logs at error level, so there is no separate
/// `error` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    /// Failed fan-out sends, handler errors and invalid configs
    Warn,
    /// Plus readiness broadcasts and bridge teardown
    Info,
    /// Plus each request, its timeout and every fan-out
    Debug,
    /// Plus every routed envelope and hub delivery
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser)]
#[command(name = "lodestar")]
#[command(about = "lodestar - host/plugin bridge playground")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, warn, info, debug, trace)
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/lodestar/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Request timeout in milliseconds (overrides config file)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

impl Cli {
    /// Effective log level: explicit flag, then --verbose, then warnings only.
    pub fn effective_log_level(&self) -> LogLevel {
        match (self.log_level, self.verbose) {
            (Some(level), _) => level,
            (None, true) => LogLevel::Debug,
            (None, false) => LogLevel::Warn,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a host with in-process plugins and drive every facade once
    Demo {
        /// Plugin ids to mount (overrides config file)
        #[arg(short, long, value_delimiter = ',')]
        plugins: Vec<String>,

        /// Leave GET_CAMERA unanswered to show a request timing out
        #[arg(long)]
        drop_camera: bool,
    },

    /// List every command and event in the catalog
    Catalog {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Print the effective configuration as TOML
    Config,
}
