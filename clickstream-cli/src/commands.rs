//! CLI command implementations

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use clickstream_core::tracing_setup::{CliLogLevel, init_tracing, resolve_console_level};
use clickstream_core::{ClickstreamError, MemoryEventStore, SimulationConfig, SqliteEventStore};
use clickstream_sim::{RunSummary, run_simulation, run_with_sink};

const DEFAULT_CONFIG: &str = "config/simulation.toml";

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a simulation and write its event log
    Run {
        /// Path to the TOML configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
        /// Keep events in memory instead of writing the store
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the run id a configuration resolves to
    RunId {
        /// Path to the TOML configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// Check a configuration without running it
    Validate {
        /// Path to the TOML configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

/// Flags shared by every command.
pub struct GlobalOptions {
    pub log_level: Option<CliLogLevel>,
    pub logs_dir: Option<PathBuf>,
}

/// Handle the CLI command
///
/// # Errors
/// Returns the first configuration, logging, storage or simulation failure
pub fn handle_command(command: Commands, options: &GlobalOptions) -> anyhow::Result<()> {
    match command {
        Commands::Run { config, dry_run } => run(&config, dry_run, options),
        Commands::RunId { config } => print_run_id(&config),
        Commands::Validate { config } => validate(&config),
    }
}

fn load(path: &Path) -> anyhow::Result<SimulationConfig> {
    read_config(path).with_context(|| format!("Failed to load configuration {}", path.display()))
}

fn read_config(path: &Path) -> clickstream_core::Result<SimulationConfig> {
    Ok(SimulationConfig::load(path)?)
}

fn stored_rows(config: &SimulationConfig, run_id: &str) -> clickstream_core::Result<u64> {
    Ok(SqliteEventStore::new(&config.storage.path, false).count_events(run_id)?)
}

/// Run the configured simulation
///
/// # Errors
/// - `ConfigError` - Configuration could not be loaded or validated
/// - `SimulationError` - The run failed
pub fn run(path: &Path, dry_run: bool, options: &GlobalOptions) -> anyhow::Result<()> {
    let config = load(path)?;
    let level = resolve_console_level(options.log_level, &config.logging.level)?;
    let detail_log = init_tracing(level, options.logs_dir.as_deref())?;

    let (summary, store) = if dry_run {
        let summary = run_with_sink(&config, Box::new(MemoryEventStore::new()))
            .context("Simulation failed")?;
        print_summary(&summary);
        (summary, "memory".to_string())
    } else {
        let summary = run_simulation(&config).context("Simulation failed")?;
        print_summary(&summary);
        let rows = stored_rows(&config, &summary.run_id)
            .context("Failed to read back the event store")?;
        println!("  Rows stored for run: {rows}");
        (summary, config.storage.path.display().to_string())
    };

    println!("detail_log={}", detail_log.display());
    println!("run_id={} store={store}", summary.run_id);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Simulated {:.0}s", summary.horizon);
    println!("  Events written: {}", summary.events_written);
    println!("  Users: {}", summary.users);
    println!(
        "  Intents: {} published, {} resolved, {} discarded",
        summary.intents_published, summary.intents_resolved, summary.intents_discarded
    );
    println!("  Sessions started: {}", summary.sessions_started);
    for (reason, count) in &summary.sessions_ended {
        println!("    ended by {reason}: {count}");
    }
    for (reason, count) in &summary.flushes.flushes {
        println!("  Flushes ({reason}): {count}");
    }
}

/// Print the resolved run id
///
/// # Errors
/// - `ConfigError` - Configuration could not be loaded or validated
pub fn print_run_id(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    println!("{}", config.resolve_run_id());
    Ok(())
}

/// Validate a configuration file
///
/// # Errors
/// - `ConfigError` - Configuration could not be loaded or validated
pub fn validate(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    config
        .run
        .start_datetime()
        .map_err(ClickstreamError::from)
        .context("Invalid run.start_date")?;

    println!("Configuration {} is valid", path.display());
    println!("  run_id: {}", config.resolve_run_id());
    println!("  days: {}", config.run.num_days);
    println!(
        "  sessions: {}",
        if config.sessions_enabled() {
            "site graph"
        } else {
            "close immediately"
        }
    );
    Ok(())
}
