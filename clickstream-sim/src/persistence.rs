//! In-memory event buffer in front of cold storage.
//!
//! Events accumulate until either the count threshold is reached or the
//! periodic flush process fires, whichever comes first. Every flush hands
//! the whole buffer to the sink in a single write.

use std::collections::BTreeMap;
use std::fmt;

use clickstream_core::{Event, EventSink, StorageError, WriteReport};

use crate::deterministic::{Process, ProcessContext, SimulationError, Suspend};
use crate::world::SimWorld;

/// Why a flush happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlushReason {
    /// Buffer reached `every_n_events`
    Count,
    /// Periodic logical-time flush
    Timer,
    /// Explicit flush once the horizon is reached
    Finish,
    /// Final flush performed by `close`
    Shutdown,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Count => "count",
            FlushReason::Timer => "timer",
            FlushReason::Finish => "finish",
            FlushReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flush counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Non-empty flushes keyed by reason
    pub flushes: BTreeMap<FlushReason, u64>,
    pub events_written: u64,
}

impl FlushStats {
    pub fn count(&self, reason: FlushReason) -> u64 {
        self.flushes.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.flushes.values().sum()
    }
}

/// Buffers events and writes them to an [`EventSink`] in batches.
pub struct PersistenceBuffer {
    sink: Box<dyn EventSink>,
    buffer: Vec<Event>,
    every_n_events: usize,
    open: bool,
    stats: FlushStats,
}

impl PersistenceBuffer {
    /// Wraps `sink`. An `every_n_events` of zero disables the count trigger.
    pub fn new(sink: Box<dyn EventSink>, every_n_events: usize) -> Self {
        Self {
            sink,
            buffer: Vec::new(),
            every_n_events,
            open: false,
            stats: FlushStats::default(),
        }
    }

    /// Opens the underlying sink.
    ///
    /// # Errors
    ///
    /// - `StorageError` - If the sink could not be opened
    pub fn open(&mut self) -> Result<(), StorageError> {
        self.sink.open()?;
        self.open = true;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Events waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &FlushStats {
        &self.stats
    }

    /// Appends an event, flushing when the count threshold is reached.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotOpen` - If the buffer is not open
    /// - `StorageError` - If a count-triggered flush failed
    pub fn emit(&mut self, event: Event) -> Result<(), StorageError> {
        if !self.open {
            return Err(StorageError::NotOpen {
                target: "persistence buffer".to_string(),
            });
        }
        self.buffer.push(event);
        if self.every_n_events > 0 && self.buffer.len() >= self.every_n_events {
            self.flush(FlushReason::Count)?;
        }
        Ok(())
    }

    /// Writes every buffered event in one batch. Empty buffers are a no-op.
    ///
    /// # Errors
    ///
    /// - `StorageError` - If the sink rejected the batch; the batch stays buffered
    pub fn flush(&mut self, reason: FlushReason) -> Result<Option<WriteReport>, StorageError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let report = self.sink.write_batch(&self.buffer)?;
        self.buffer.clear();
        *self.stats.flushes.entry(reason).or_default() += 1;
        self.stats.events_written += report.num_events as u64;

        tracing::info!(
            reason = %reason,
            events = report.num_events,
            duration_ms = report.duration.as_millis() as u64,
            "Flushed events"
        );
        Ok(Some(report))
    }

    /// Flushes what is left and releases the sink. Closing twice is a no-op.
    ///
    /// The sink is released even when the final flush fails; the flush error
    /// wins over a close error.
    ///
    /// # Errors
    ///
    /// - `StorageError` - If the final flush or the sink close failed
    pub fn close(&mut self) -> Result<(), StorageError> {
        if !self.open {
            return Ok(());
        }
        let flushed = self.flush(FlushReason::Shutdown);
        self.open = false;
        let closed = self.sink.close();
        if let Err(e) = &flushed {
            tracing::warn!(error = %e, dropped = self.buffer.len(), "Final flush failed");
        }
        flushed?;
        closed
    }
}

/// Process that flushes the buffer every `interval` logical seconds.
#[derive(Debug, Clone)]
pub struct PeriodicFlush {
    interval: f64,
    armed: bool,
}

impl PeriodicFlush {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            armed: false,
        }
    }
}

impl Process<SimWorld> for PeriodicFlush {
    fn name(&self) -> &str {
        "periodic_flush"
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_, SimWorld>) -> Result<Suspend, SimulationError> {
        if self.interval.is_nan() || self.interval <= 0.0 {
            return Ok(Suspend::Finished);
        }
        if self.armed {
            ctx.world.persistence.flush(FlushReason::Timer)?;
        }
        self.armed = true;
        Ok(Suspend::After(self.interval))
    }
}
