//! Diagnostic logging for Clickstream
//!
//! Two outputs: a console layer at the level the user asked for, and a file
//! layer that records everything down to kernel resumptions. Diagnostics are
//! separate from the simulated event log and never touch the RNG stream.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::ClickstreamError;

/// File name of the full-detail log, overwritten by every run.
pub const LAST_RUN_LOG: &str = "clickstream-last-run.log";

/// Installs the global subscriber and returns the path of the detail log.
///
/// `RUST_LOG` overrides `console_level` for the console layer only.
///
/// # Errors
///
/// - `ClickstreamError::Io` - If the logs directory or file cannot be created
/// - `ClickstreamError::Logging` - If a global subscriber is already installed
pub fn init_tracing(
    console_level: CliLogLevel,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, ClickstreamError> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LAST_RUN_LOG);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ClickstreamError::Logging {
            reason: e.to_string(),
        })?;

    tracing::info!(
        console = %console_level,
        detail_log = %log_file_path.display(),
        "Tracing initialized"
    );

    Ok(log_file_path)
}

/// Picks the console level: an explicit CLI choice wins over the configured one.
///
/// # Errors
///
/// - `ClickstreamError::Logging` - If the configured level name is not recognized
pub fn resolve_console_level(
    cli_level: Option<CliLogLevel>,
    configured: &str,
) -> Result<CliLogLevel, ClickstreamError> {
    match cli_level {
        Some(level) => Ok(level),
        None => configured
            .parse()
            .map_err(|reason| ClickstreamError::Logging { reason }),
    }
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Run lifecycle and flushes
    Info,
    /// Per-intent and per-session decisions
    Debug,
    /// Every kernel resumption
    Trace,
}

impl CliLogLevel {
    /// Converts to the matching `tracing` level.
    ///
    /// # Examples
    /// ```
    /// use clickstream_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Debug.as_tracing_level(), tracing::Level::DEBUG);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::str::FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(CliLogLevel::Error),
            "warn" | "warning" => Ok(CliLogLevel::Warn),
            "info" => Ok(CliLogLevel::Info),
            "debug" => Ok(CliLogLevel::Debug),
            "trace" => Ok(CliLogLevel::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names_round_trip() {
        for level in [
            CliLogLevel::Error,
            CliLogLevel::Warn,
            CliLogLevel::Info,
            CliLogLevel::Debug,
            CliLogLevel::Trace,
        ] {
            assert_eq!(level.to_string().parse::<CliLogLevel>().unwrap(), level);
        }
        assert_eq!("WARNING".parse::<CliLogLevel>().unwrap(), CliLogLevel::Warn);
    }

    #[test]
    fn test_cli_level_overrides_config() {
        let level = resolve_console_level(Some(CliLogLevel::Trace), "info").unwrap();
        assert_eq!(level, CliLogLevel::Trace);

        let level = resolve_console_level(None, "debug").unwrap();
        assert_eq!(level, CliLogLevel::Debug);

        assert!(matches!(
            resolve_console_level(None, "chatty"),
            Err(ClickstreamError::Logging { .. })
        ));
    }
}
