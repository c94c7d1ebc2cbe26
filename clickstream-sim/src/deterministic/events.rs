//! Agenda entries and handles for deterministic scheduling.

use std::cmp::Ordering;
use std::fmt;

/// Handle of a process hosted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Named condition a process can block on until another process notifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub &'static str);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A pending resumption of one process.
#[derive(Debug, Clone)]
pub struct Wakeup {
    /// Logical time the process resumes at
    pub due: f64,
    /// Scheduling sequence, unique per run
    pub seq: u64,
    /// Process to resume
    pub pid: ProcessId,
}

impl Eq for Wakeup {}

impl PartialEq for Wakeup {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Ord for Wakeup {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier due time first, then FIFO by sequence; reversed for min-heap
        self.due
            .total_cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
            .reverse()
    }
}

impl PartialOrd for Wakeup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
