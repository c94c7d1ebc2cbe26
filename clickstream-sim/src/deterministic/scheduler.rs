//! Cooperative discrete-event scheduler.
//!
//! Processes are explicit state machines. Each resumption runs one step to
//! completion and returns how the process wants to suspend: for a delay,
//! until an absolute time, on a wait channel, or not at all because it has
//! finished. The agenda is a min-heap ordered by due time and then by
//! scheduling sequence, so processes due at the same instant resume in the
//! order they were scheduled.

use std::collections::{BinaryHeap, HashMap, VecDeque};

use clickstream_core::{ConfigError, StorageError};
use thiserror::Error;

use super::clock::SimClock;
use super::events::{ChannelId, ProcessId, Wakeup};

/// Maximum number of pending wakeups.
const MAX_AGENDA_SIZE: usize = 1_000_000;

/// Errors that can occur during simulation.
///
/// Every variant is fatal: a process that returns one aborts the run.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Pending wakeups exceeded capacity
    #[error("Agenda overflow: {count} wakeups scheduled")]
    AgendaOverflow {
        /// Number of wakeups that caused overflow
        count: usize,
    },

    /// Clock was asked to move backwards or to a non-finite time
    #[error("Cannot move simulation time from {now} to {target}")]
    TimeReversal {
        /// Current simulation time
        now: f64,
        /// Requested time
        target: f64,
    },

    /// Process requested a negative or non-finite delay
    #[error("Process {process} requested invalid delay {delay}")]
    InvalidDelay {
        /// Name of the process
        process: String,
        /// Requested delay in seconds
        delay: f64,
    },

    /// Wakeup refers to a process the scheduler no longer hosts
    #[error("No process registered for {pid}")]
    MissingProcess {
        /// Handle of the missing process
        pid: ProcessId,
    },

    /// A process step failed
    #[error("Process {name} failed at t={at}s: {source}")]
    ProcessFailed {
        /// Name of the failing process
        name: String,
        /// Simulation time of the failure
        at: f64,
        /// Underlying failure
        #[source]
        source: Box<SimulationError>,
    },

    /// Lookup of a user id that was never created
    #[error("Unknown user_id {user_id}")]
    UnknownUser {
        /// Requested user id
        user_id: String,
    },

    /// A model cannot be built from its configuration
    #[error("Invalid {component} model: {reason}")]
    InvalidModel {
        /// Component being built
        component: &'static str,
        /// Why construction failed
        reason: String,
    },

    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Event storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// How a process suspends after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Suspend {
    /// Resume after this many seconds
    After(f64),
    /// Resume at this absolute time
    Until(f64),
    /// Resume when another process notifies the channel
    Wait(ChannelId),
    /// Process is done and is dropped
    Finished,
}

/// A cooperative unit of control hosted by the scheduler.
pub trait Process<W> {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Runs one step.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole run.
    fn resume(&mut self, ctx: &mut ProcessContext<'_, W>) -> Result<Suspend, SimulationError>;
}

/// Counters describing a scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelStats {
    pub resumptions: u64,
    pub spawned: u64,
    pub finished: u64,
}

/// Outcome of `run_until`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Clock reading after the run
    pub horizon: f64,
    /// Resumptions performed by this call
    pub resumptions: u64,
    /// Lifetime counters
    pub stats: KernelStats,
    /// Processes still scheduled or waiting
    pub live_processes: usize,
}

struct Kernel<W> {
    clock: SimClock,
    agenda: BinaryHeap<Wakeup>,
    next_seq: u64,
    next_pid: u64,
    processes: HashMap<ProcessId, Box<dyn Process<W>>>,
    waiters: HashMap<ChannelId, VecDeque<ProcessId>>,
    stats: KernelStats,
}

impl<W> Kernel<W> {
    fn new() -> Self {
        Self {
            clock: SimClock::new(),
            agenda: BinaryHeap::new(),
            next_seq: 0,
            next_pid: 0,
            processes: HashMap::new(),
            waiters: HashMap::new(),
            stats: KernelStats::default(),
        }
    }

    fn schedule(&mut self, pid: ProcessId, due: f64) -> Result<(), SimulationError> {
        if self.agenda.len() >= MAX_AGENDA_SIZE {
            return Err(SimulationError::AgendaOverflow {
                count: self.agenda.len(),
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.agenda.push(Wakeup { due, seq, pid });
        Ok(())
    }

    fn spawn(&mut self, process: Box<dyn Process<W>>) -> Result<ProcessId, SimulationError> {
        let pid = ProcessId(self.next_pid);
        self.next_pid += 1;

        tracing::trace!(%pid, process = process.name(), now = self.clock.now(), "Spawned process");
        self.processes.insert(pid, process);
        self.stats.spawned += 1;
        self.schedule(pid, self.clock.now())?;
        Ok(pid)
    }

    fn notify(&mut self, channel: ChannelId) -> Result<bool, SimulationError> {
        let Some(pid) = self
            .waiters
            .get_mut(&channel)
            .and_then(VecDeque::pop_front)
        else {
            return Ok(false);
        };
        self.schedule(pid, self.clock.now())?;
        Ok(true)
    }
}

/// Access a running process has to the world and the kernel.
pub struct ProcessContext<'a, W> {
    /// Shared simulation state
    pub world: &'a mut W,
    kernel: &'a mut Kernel<W>,
    pid: ProcessId,
}

impl<W> ProcessContext<'_, W> {
    /// Current simulation time.
    pub fn now(&self) -> f64 {
        self.kernel.clock.now()
    }

    /// Handle of the running process.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Starts a new process that first runs at the current time, after
    /// everything already due now.
    ///
    /// # Errors
    ///
    /// - `SimulationError::AgendaOverflow` - If the agenda is full
    pub fn spawn<P>(&mut self, process: P) -> Result<ProcessId, SimulationError>
    where
        P: Process<W> + 'static,
    {
        self.kernel.spawn(Box::new(process))
    }

    /// Wakes the longest-waiting process on `channel`. Returns whether one was woken.
    ///
    /// # Errors
    ///
    /// - `SimulationError::AgendaOverflow` - If the agenda is full
    pub fn notify(&mut self, channel: ChannelId) -> Result<bool, SimulationError> {
        self.kernel.notify(channel)
    }
}

/// Deterministic scheduler owning the simulation world.
pub struct Scheduler<W> {
    world: W,
    kernel: Kernel<W>,
}

impl<W> Scheduler<W> {
    /// Creates a scheduler at time zero.
    pub fn new(world: W) -> Self {
        Self {
            world,
            kernel: Kernel::new(),
        }
    }

    /// Returns current simulation time.
    pub fn now(&self) -> f64 {
        self.kernel.clock.now()
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn into_world(self) -> W {
        self.world
    }

    pub fn stats(&self) -> KernelStats {
        self.kernel.stats
    }

    /// Processes that are scheduled or waiting.
    pub fn live_processes(&self) -> usize {
        self.kernel.processes.len()
    }

    /// Starts a process that first runs at the current time.
    ///
    /// # Errors
    ///
    /// - `SimulationError::AgendaOverflow` - If the agenda is full
    pub fn spawn<P>(&mut self, process: P) -> Result<ProcessId, SimulationError>
    where
        P: Process<W> + 'static,
    {
        self.kernel.spawn(Box::new(process))
    }

    /// Resumes due processes in order until none is due at or before
    /// `horizon`, then sets the clock to `horizon`.
    ///
    /// # Errors
    ///
    /// - `SimulationError::TimeReversal` - If horizon is before the current time
    /// - `SimulationError::ProcessFailed` - If any process step failed
    /// - `SimulationError::InvalidDelay` - If a process asked to resume in the past
    pub fn run_until(&mut self, horizon: f64) -> Result<RunReport, SimulationError> {
        if !horizon.is_finite() || horizon < self.now() {
            return Err(SimulationError::TimeReversal {
                now: self.now(),
                target: horizon,
            });
        }

        let resumptions_before = self.kernel.stats.resumptions;
        while self
            .kernel
            .agenda
            .peek()
            .is_some_and(|next| next.due <= horizon)
        {
            let Some(wakeup) = self.kernel.agenda.pop() else {
                break;
            };
            self.kernel.clock.advance_to(wakeup.due)?;
            self.resume(wakeup.pid)?;
        }
        self.kernel.clock.advance_to(horizon)?;

        Ok(RunReport {
            horizon,
            resumptions: self.kernel.stats.resumptions - resumptions_before,
            stats: self.kernel.stats,
            live_processes: self.kernel.processes.len(),
        })
    }

    fn resume(&mut self, pid: ProcessId) -> Result<(), SimulationError> {
        let mut process = self
            .kernel
            .processes
            .remove(&pid)
            .ok_or(SimulationError::MissingProcess { pid })?;
        let now = self.kernel.clock.now();
        self.kernel.stats.resumptions += 1;
        tracing::trace!(%pid, process = process.name(), now, "Resuming process");

        let outcome = {
            let mut ctx = ProcessContext {
                world: &mut self.world,
                kernel: &mut self.kernel,
                pid,
            };
            process.resume(&mut ctx)
        };

        let suspend = outcome.map_err(|source| {
            tracing::error!(%pid, process = process.name(), now, error = %source, "Process failed");
            SimulationError::ProcessFailed {
                name: process.name().to_string(),
                at: now,
                source: Box::new(source),
            }
        })?;

        match suspend {
            Suspend::After(delay) => {
                if !delay.is_finite() || delay < 0.0 {
                    return Err(SimulationError::InvalidDelay {
                        process: process.name().to_string(),
                        delay,
                    });
                }
                self.kernel.schedule(pid, now + delay)?;
            }
            Suspend::Until(due) => {
                if !due.is_finite() || due < now {
                    return Err(SimulationError::InvalidDelay {
                        process: process.name().to_string(),
                        delay: due - now,
                    });
                }
                self.kernel.schedule(pid, due)?;
            }
            Suspend::Wait(channel) => {
                self.kernel.waiters.entry(channel).or_default().push_back(pid);
            }
            Suspend::Finished => {
                self.kernel.stats.finished += 1;
                tracing::trace!(%pid, process = process.name(), now, "Process finished");
                return Ok(());
            }
        }

        self.kernel.processes.insert(pid, process);
        Ok(())
    }
}
