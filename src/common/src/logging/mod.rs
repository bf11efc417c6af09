//! Logging bootstrap shared by snapper binaries.

use crate::cli::CommonArgs;
use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Log level implied by the CLI flags and configuration.
///
/// `--quiet` wins over `--verbose`; either wins over the configured verbosity.
pub fn level_for(args: &CommonArgs, config: &LoggingConfig) -> &'static str {
    if args.quiet {
        "warn"
    } else if args.verbose || config.verbose {
        "debug"
    } else {
        "info"
    }
}

/// Opens `path` for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the level derived from flags and
/// configuration. Logs go to `logging.log_to` when set, stdout otherwise.
pub fn init_logging(args: &CommonArgs, config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(args, config)));

    let result = match &config.log_to {
        Some(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
