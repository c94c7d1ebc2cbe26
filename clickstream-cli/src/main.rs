//! Clickstream CLI - Command-line interface
//!
//! Runs simulations and inspects their configuration.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clickstream_core::ClickstreamError;
use clickstream_core::tracing_setup::CliLogLevel;

/// Exit status for configuration mistakes
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "clickstream")]
#[command(about = "Deterministic website session event-log simulator")]
struct Cli {
    /// Console log level; defaults to `logging.level` from the configuration
    #[arg(long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Directory for the detailed run log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = commands::GlobalOptions {
        log_level: cli.log_level,
        logs_dir: cli.logs_dir,
    };
    match commands::handle_command(cli.command, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", describe(&error));
            ExitCode::from(exit_status(&error))
        }
    }
}

fn exit_status(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<ClickstreamError>() {
        Some(e) if e.is_user_error() => EXIT_USAGE,
        _ => 1,
    }
}

/// Short message for user mistakes, full cause chain otherwise.
fn describe(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ClickstreamError>() {
        Some(e) if e.is_user_error() => format!("Error: {}", e.user_message()),
        Some(e) => format!("Error: {}\n  {error:#}", e.user_message()),
        None => format!("Error: {error:#}"),
    }
}
