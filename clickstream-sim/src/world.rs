//! Shared state every simulation process operates on.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use clickstream_core::{Event, EventDraft, IdAllocator};

use crate::deterministic::{RandomSource, SimulationError};
use crate::intents::IntentQueue;
use crate::persistence::PersistenceBuffer;
use crate::users::UserStateStore;

/// Identity of the run being simulated.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub run_id: String,
    pub seed: u64,
    /// Wall-clock instant that simulation time zero maps to
    pub start: DateTime<Utc>,
}

impl RunContext {
    /// UTC timestamp for a simulation time, at microsecond resolution.
    pub fn timestamp_at(&self, sim_time_s: f64) -> DateTime<Utc> {
        let micros = (sim_time_s * 1_000_000.0).round() as i64;
        self.start + Duration::microseconds(micros)
    }
}

/// Counters collected while the run progresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub intents_published: u64,
    pub intents_resolved: u64,
    /// Intents drained while resolution was disabled
    pub intents_discarded: u64,
    pub sessions_started: u64,
    /// Ended sessions keyed by terminal reason
    pub sessions_ended: BTreeMap<String, u64>,
}

impl RunStats {
    pub fn sessions_ended_total(&self) -> u64 {
        self.sessions_ended.values().sum()
    }
}

/// Single shared instance of every run-scoped service.
///
/// Only the running process touches it, so plain `&mut` access is enough.
pub struct SimWorld {
    pub run: RunContext,
    pub rng: Box<dyn RandomSource>,
    pub ids: Box<dyn IdAllocator>,
    pub users: UserStateStore,
    pub intents: IntentQueue,
    pub persistence: PersistenceBuffer,
    pub stats: RunStats,
}

impl SimWorld {
    /// Stamps `draft` with identity and time and hands it to the persistence buffer.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Storage` - If the buffer is closed or a count flush failed
    pub fn emit(&mut self, now: f64, draft: EventDraft) -> Result<(), SimulationError> {
        let event_id = self.ids.next_id("evt");
        let event = Event::from_draft(
            draft,
            self.run.run_id.as_str(),
            event_id,
            self.run.timestamp_at(now),
            now,
        );
        self.persistence.emit(event)?;
        Ok(())
    }
}

#[cfg(test)]
impl SimWorld {
    /// World with default users, an unbounded queue and an open buffer over `store`
    /// that only flushes when asked.
    pub(crate) fn for_tests(rng: Box<dyn RandomSource>, store: &clickstream_core::MemoryEventStore) -> Self {
        use chrono::TimeZone;
        use clickstream_core::IdService;
        use clickstream_core::config::UsersConfig;

        let mut persistence = PersistenceBuffer::new(Box::new(store.clone()), 0);
        persistence.open().unwrap();
        Self {
            run: RunContext {
                run_id: "test".to_string(),
                seed: 0,
                start: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            },
            rng,
            ids: Box::new(IdService::new("test")),
            users: UserStateStore::new(UsersConfig::default()),
            intents: IntentQueue::new(None),
            persistence,
            stats: RunStats::default(),
        }
    }
}
