//! In-memory event store.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use super::{EventSink, StorageError, WriteReport};
use crate::event::{Event, EventType};

#[derive(Debug, Default)]
struct MemoryState {
    batches: Vec<Vec<Event>>,
    open: bool,
    closed: bool,
}

/// Event store that keeps every batch in memory.
///
/// Clones share the same storage, so a test can hand one handle to the
/// simulation and inspect what was written through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored events in write order.
    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().batches.iter().flatten().cloned().collect()
    }

    /// Stored events of one type in write order.
    pub fn events_of(&self, event_type: EventType) -> Vec<Event> {
        self.state
            .borrow()
            .batches
            .iter()
            .flatten()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Size of every batch written so far.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.borrow().batches.iter().map(Vec::len).collect()
    }

    pub fn write_calls(&self) -> usize {
        self.state.borrow().batches.len()
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

impl EventSink for MemoryEventStore {
    fn open(&mut self) -> Result<(), StorageError> {
        let mut state = self.state.borrow_mut();
        state.open = true;
        state.closed = false;
        Ok(())
    }

    fn write_batch(&mut self, events: &[Event]) -> Result<WriteReport, StorageError> {
        let started = Instant::now();
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(StorageError::NotOpen {
                target: "memory".to_string(),
            });
        }
        state.batches.push(events.to_vec());
        Ok(WriteReport {
            num_events: events.len(),
            duration: started.elapsed(),
        })
    }

    fn close(&mut self) -> Result<(), StorageError> {
        let mut state = self.state.borrow_mut();
        if state.open {
            state.open = false;
            state.closed = true;
        }
        Ok(())
    }
}
