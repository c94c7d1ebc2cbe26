//! Run bootstrap: builds every component from configuration, drives the
//! scheduler to the horizon and closes the event log.

use std::collections::BTreeMap;

use clickstream_core::{EventDraft, EventSink, EventType, IdService, SimulationConfig, SqliteEventStore};

use crate::arrivals::BaselineArrivals;
use crate::conversion::ConversionModel;
use crate::deterministic::{KernelStats, Scheduler, SimRng, SimulationError};
use crate::intents::IntentQueue;
use crate::persistence::{FlushReason, FlushStats, PeriodicFlush, PersistenceBuffer};
use crate::resolver::IntentResolver;
use crate::sessions::{GraphSessionRunner, NoopSessionRunner, SessionRules, SessionRunner};
use crate::site_graph::SiteGraph;
use crate::users::UserStateStore;
use crate::world::{RunContext, RunStats, SimWorld};

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub horizon: f64,
    pub events_written: u64,
    pub users: usize,
    pub intents_published: u64,
    pub intents_resolved: u64,
    pub intents_discarded: u64,
    pub sessions_started: u64,
    /// Ended sessions keyed by terminal reason
    pub sessions_ended: BTreeMap<String, u64>,
    pub flushes: FlushStats,
    pub kernel: KernelStats,
}

impl RunSummary {
    fn collect(world: &SimWorld, horizon: f64, kernel: KernelStats) -> Self {
        let RunStats {
            intents_published,
            intents_resolved,
            intents_discarded,
            sessions_started,
            sessions_ended,
        } = world.stats.clone();
        let flushes = world.persistence.stats().clone();

        Self {
            run_id: world.run.run_id.clone(),
            horizon,
            events_written: flushes.events_written,
            users: world.users.len(),
            intents_published,
            intents_resolved,
            intents_discarded,
            sessions_started,
            sessions_ended,
            flushes,
            kernel,
        }
    }
}

/// Runs the configured simulation into the SQLite store named by `storage.path`.
///
/// # Errors
///
/// See [`run_with_sink`].
pub fn run_simulation(config: &SimulationConfig) -> Result<RunSummary, SimulationError> {
    let store = SqliteEventStore::new(&config.storage.path, config.storage.clean_slate);
    run_with_sink(config, Box::new(store))
}

/// Runs the configured simulation into `sink`.
///
/// Every component is built before simulated time advances, so configuration
/// problems abort the run without writing anything. The sink is closed on
/// every path once it has been opened.
///
/// # Errors
///
/// - `SimulationError::Config` - If the configuration is invalid
/// - `SimulationError::InvalidModel` - If a component rejects its parameters
/// - `SimulationError::ProcessFailed` - If any process failed during the run
/// - `SimulationError::Storage` - If the event log could not be written
pub fn run_with_sink(
    config: &SimulationConfig,
    sink: Box<dyn EventSink>,
) -> Result<RunSummary, SimulationError> {
    config.validate()?;
    let run = RunContext {
        run_id: config.resolve_run_id(),
        seed: config.run.seed,
        start: config.run.start_datetime()?,
    };
    let horizon = config.horizon_seconds();

    let resolver_config = config.intent_resolver.clone().unwrap_or_default();
    let runner = build_session_runner(config)?;
    let arrivals = config
        .arrivals
        .as_ref()
        .and_then(|arrivals| arrivals.baseline_arrivals.as_ref())
        .map(|baseline| BaselineArrivals::from_config(baseline, config.run.num_days))
        .transpose()?;

    let world = SimWorld {
        rng: Box::new(SimRng::from_seed(run.seed)),
        ids: Box::new(IdService::new(run.run_id.as_str())),
        users: UserStateStore::new(config.users.clone().unwrap_or_default()),
        intents: IntentQueue::new(resolver_config.queue_capacity),
        persistence: PersistenceBuffer::new(sink, config.storage.flush.every_n_events),
        stats: RunStats::default(),
        run,
    };
    let mut scheduler = Scheduler::new(world);

    scheduler.spawn(PeriodicFlush::new(config.storage.flush.or_every_seconds))?;
    scheduler.spawn(IntentResolver::new(resolver_config.enabled, runner))?;
    if let Some(arrivals) = arrivals {
        scheduler.spawn(arrivals)?;
    }

    scheduler.world_mut().persistence.open()?;
    let outcome = drive(&mut scheduler, horizon);
    let closed = scheduler.world_mut().persistence.close();
    let kernel = outcome?;
    closed?;

    let summary = RunSummary::collect(scheduler.world(), horizon, kernel);
    tracing::info!(
        run_id = %summary.run_id,
        events = summary.events_written,
        users = summary.users,
        sessions = summary.sessions_started,
        flushes = summary.flushes.total(),
        "Run finished"
    );
    Ok(summary)
}

fn build_session_runner(config: &SimulationConfig) -> Result<Box<dyn SessionRunner>, SimulationError> {
    let (Some(graph), Some(sessions)) = (&config.site_graph, &config.sessions) else {
        tracing::info!("No site graph or session rules configured, sessions close immediately");
        return Ok(Box::new(NoopSessionRunner));
    };

    let graph = SiteGraph::from_config(graph)?;
    let rules = SessionRules::from_config(sessions)?;
    let conversion = config
        .conversion
        .as_ref()
        .map(ConversionModel::from_config)
        .transpose()?;
    tracing::debug!(
        pages = graph.len(),
        entry_page = %rules.entry_page,
        conversion = conversion.is_some(),
        "Built session runner"
    );
    Ok(Box::new(GraphSessionRunner::new(graph, rules, conversion)))
}

/// Emits the lifecycle bracket around the scheduled run.
fn drive(scheduler: &mut Scheduler<SimWorld>, horizon: f64) -> Result<KernelStats, SimulationError> {
    let world = scheduler.world_mut();
    tracing::info!(
        run_id = %world.run.run_id,
        seed = world.run.seed,
        horizon_s = horizon,
        "Starting simulation"
    );
    let started = EventDraft::new(EventType::RunStarted).with("seed", world.run.seed);
    world.emit(0.0, started)?;

    let report = scheduler.run_until(horizon)?;
    tracing::debug!(
        resumptions = report.resumptions,
        live_processes = report.live_processes,
        "Reached horizon"
    );

    let world = scheduler.world_mut();
    world.emit(horizon, EventDraft::new(EventType::RunFinished))?;
    world.persistence.flush(FlushReason::Finish)?;
    Ok(report.stats)
}
