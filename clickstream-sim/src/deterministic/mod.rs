//! Deterministic simulation kernel.
//!
//! Logical clock, the seeded random source shared by a run, and the
//! cooperative scheduler that hosts every simulation process.

mod clock;
mod events;
mod scheduler;
#[cfg(test)]
pub(crate) mod scripted;

// Re-export core types for public API
pub use clock::{RandomSource, SimClock, SimRng, weighted_choice, weighted_choices};
pub use events::{ChannelId, ProcessId, Wakeup};
pub use scheduler::{
    KernelStats, Process, ProcessContext, RunReport, Scheduler, SimulationError, Suspend,
};

#[cfg(test)]
mod tests;
