//! Clickstream Core - configuration, identifiers, event records and cold storage
//!
//! This crate provides the building blocks shared by the simulation and the
//! command-line interface: the parsed run configuration and its validation,
//! deterministic identifier allocation, the fixed-shape event record and its
//! deterministic payload encoding, and the cold-storage sinks events are
//! flushed into.

pub mod canonical;
pub mod config;
pub mod event;
pub mod ids;
pub mod storage;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{ConfigError, SimulationConfig};
pub use event::{Event, EventDraft, EventType, Payload};
pub use ids::{IdAllocator, IdService};
pub use storage::{EventSink, MemoryEventStore, SqliteEventStore, StorageError, WriteReport};

/// Errors that can bubble up from any Clickstream subsystem outside the
/// simulation kernel.
#[derive(Debug, thiserror::Error)]
pub enum ClickstreamError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {reason}")]
    Logging { reason: String },
}

impl ClickstreamError {
    /// Returns a short message suitable for display on the command line.
    pub fn user_message(&self) -> String {
        match self {
            ClickstreamError::Config(e) => format!("Invalid configuration: {e}"),
            ClickstreamError::Storage(_) => "Event storage error occurred".to_string(),
            ClickstreamError::Io(_) => "File system error occurred".to_string(),
            ClickstreamError::Logging { reason } => format!("Could not set up logging: {reason}"),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ClickstreamError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, ClickstreamError>;
