//! Clickstream Simulation - deterministic website session event logs.

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! This crate hosts every simulated actor of a run on a single cooperative
//! scheduler driven by logical time and one seeded random stream, so the
//! same seed and configuration always produce the same event log.
//!
//! # Example
//!
//! ```rust,no_run
//! use clickstream_core::{MemoryEventStore, SimulationConfig};
//! use clickstream_sim::run_with_sink;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SimulationConfig::load("config/simulation.toml".as_ref())?;
//! let store = MemoryEventStore::new();
//!
//! let summary = run_with_sink(&config, Box::new(store.clone()))?;
//! println!("run {} wrote {} events", summary.run_id, summary.events_written);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Deterministic kernel**: logical clock, agenda, wait channels, seeded RNG
//! - **Arrivals**: NHPP baseline intents sampled by thinning
//! - **Intent resolver**: maps intents to users and sessions
//! - **Session engine**: per-session walk through the site graph
//! - **Persistence buffer**: batches events into cold storage

pub mod arrivals;
pub mod conversion;
pub mod deterministic;
pub mod distributions;
pub mod intents;
pub mod persistence;
pub mod resolver;
pub mod runner;
pub mod sessions;
pub mod site_graph;
pub mod users;
pub mod world;

// Re-export main types for convenient access
pub use arrivals::{BaselineArrivals, IntradayShape, NhppArrivals};
pub use conversion::ConversionModel;
pub use deterministic::{
    ChannelId, Process, ProcessContext, ProcessId, RandomSource, RunReport, Scheduler, SimRng,
    SimulationError, Suspend,
};
pub use intents::{IntentQueue, SessionIntent};
pub use persistence::{FlushReason, FlushStats, PeriodicFlush, PersistenceBuffer};
pub use resolver::IntentResolver;
pub use runner::{RunSummary, run_simulation, run_with_sink};
pub use sessions::{
    GraphSessionRunner, NoopSessionRunner, SessionEndReason, SessionEngine, SessionRules,
    SessionRunner, SessionTicket,
};
pub use site_graph::{Page, PageGraph, SiteGraph};
pub use users::{UserState, UserStateStore};
pub use world::{RunContext, RunStats, SimWorld};
