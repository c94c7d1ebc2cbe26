//! Deterministic identifier allocation.

use std::collections::HashMap;

/// Allocates run-scoped identifiers from named counters.
pub trait IdAllocator {
    /// Returns the next identifier for `prefix`.
    fn next_id(&mut self, prefix: &str) -> String;
}

/// Per-prefix counters producing `"{prefix}_{run_id}_{n:08}"`.
///
/// Each prefix counts independently from 1. Counters are never reset or
/// reused within a run.
#[derive(Debug, Clone)]
pub struct IdService {
    run_id: String,
    counters: HashMap<String, u64>,
}

impl IdService {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            counters: HashMap::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Number of identifiers issued so far for `prefix`.
    pub fn issued(&self, prefix: &str) -> u64 {
        self.counters.get(prefix).copied().unwrap_or(0)
    }
}

impl IdAllocator for IdService {
    fn next_id(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        format!("{prefix}_{}_{:08}", self.run_id, *counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_sequence() {
        let mut ids = IdService::new("abc123");
        assert_eq!(ids.next_id("session"), "session_abc123_00000001");
        assert_eq!(ids.next_id("session"), "session_abc123_00000002");
        assert_eq!(ids.issued("session"), 2);
    }

    #[test]
    fn test_prefixes_count_independently() {
        let mut ids = IdService::new("r");
        assert_eq!(ids.next_id("intent"), "intent_r_00000001");
        assert_eq!(ids.next_id("evt"), "evt_r_00000001");
        assert_eq!(ids.next_id("intent"), "intent_r_00000002");
        assert_eq!(ids.issued("missing"), 0);
    }

    #[test]
    fn test_counter_widens_past_eight_digits() {
        let mut ids = IdService::new("r");
        ids.counters.insert("evt".to_string(), 99_999_999);
        assert_eq!(ids.next_id("evt"), "evt_r_100000000");
    }
}
