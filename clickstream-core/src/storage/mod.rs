//! Cold storage for the event log.
//!
//! Defines the sink interface the persistence buffer flushes into, with a
//! SQLite implementation for real runs and an in-memory one for tests and
//! dry runs.

pub mod memory;
pub mod sqlite;

use std::time::Duration;

pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;

use crate::event::Event;

/// Batch-oriented destination for events.
///
/// A sink is opened once, receives any number of batches, and is closed
/// once. Each `write_batch` call is a single write: either every event in
/// the batch is stored or the call fails.
pub trait EventSink {
    /// Acquires the underlying storage handle.
    ///
    /// # Errors
    ///
    /// - `StorageError::Io` - If prior storage could not be removed or directories created
    /// - `StorageError::Sqlite` - If the database could not be opened or initialized
    fn open(&mut self) -> Result<(), StorageError>;

    /// Writes every event of `events` in one call.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotOpen` - If called before `open` or after `close`
    /// - `StorageError::Sqlite` - If the write failed
    fn write_batch(&mut self, events: &[Event]) -> Result<WriteReport, StorageError>;

    /// Releases the storage handle. Closing a closed sink is a no-op.
    ///
    /// # Errors
    ///
    /// - `StorageError::Sqlite` - If pending data could not be committed
    fn close(&mut self) -> Result<(), StorageError>;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn open(&mut self) -> Result<(), StorageError> {
        (**self).open()
    }

    fn write_batch(&mut self, events: &[Event]) -> Result<WriteReport, StorageError> {
        (**self).write_batch(events)
    }

    fn close(&mut self) -> Result<(), StorageError> {
        (**self).close()
    }
}

/// Outcome of a single batch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub num_events: usize,
    /// Wall-clock time spent writing
    pub duration: Duration,
}

/// Errors that occur while writing the event log.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Sink used before `open` or after `close`
    #[error("Event store {target} is not open")]
    NotOpen {
        /// Description of the store, usually its path
        target: String,
    },

    /// Database operation failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Standard I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
