//! Flush triggers observed through the sink's batches.

use clickstream_core::MemoryEventStore;
use clickstream_sim::{FlushReason, run_with_sink};

use crate::common::{SHOP, config_with, run_in_memory};

fn flush_policy(every_n: usize, every_seconds: f64) -> String {
    format!("[storage.flush]\nevery_n_events = {every_n}\nor_every_seconds = {every_seconds:?}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_trigger_flushes_full_batches() {
        let config = config_with(&flush_policy(2, 1.0e9));
        let store = MemoryEventStore::new();
        let summary = run_with_sink(&config, Box::new(store.clone())).unwrap();

        assert_eq!(store.batch_sizes(), vec![2]);
        assert_eq!(summary.flushes.count(FlushReason::Count), 1);
        assert_eq!(summary.flushes.count(FlushReason::Finish), 0);
        assert!(store.is_closed());
    }

    #[test]
    fn test_timer_and_finish_flushes() {
        let config = config_with(&flush_policy(1000, 60.0));
        let store = MemoryEventStore::new();
        let summary = run_with_sink(&config, Box::new(store.clone())).unwrap();

        assert_eq!(store.batch_sizes(), vec![1, 1]);
        assert_eq!(summary.flushes.count(FlushReason::Timer), 1);
        assert_eq!(summary.flushes.count(FlushReason::Finish), 1);
        assert_eq!(summary.flushes.count(FlushReason::Shutdown), 0);
        assert_eq!(summary.flushes.total(), 2);
    }

    #[test]
    fn test_timer_flushes_lose_no_events() {
        let config = config_with(&format!("{}\n{SHOP}", flush_policy(100_000, 30.0)));
        let (summary, events) = run_in_memory(&config);

        assert_eq!(summary.events_written, events.len() as u64);
        assert!(summary.flushes.count(FlushReason::Timer) > 0);
        assert_eq!(summary.flushes.count(FlushReason::Count), 0);
    }

    #[test]
    fn test_count_flushes_stay_within_threshold() {
        let config = config_with(&format!("{}\n{SHOP}", flush_policy(16, 1.0e9)));
        let store = MemoryEventStore::new();
        let summary = run_with_sink(&config, Box::new(store.clone())).unwrap();

        let sizes = store.batch_sizes();
        assert!(sizes.iter().all(|&size| size > 0 && size <= 16), "{sizes:?}");
        assert_eq!(sizes.iter().sum::<usize>(), store.events().len());
        assert_eq!(summary.events_written, store.events().len() as u64);
        assert_eq!(summary.flushes.count(FlushReason::Timer), 0);
        assert_eq!(
            summary.flushes.count(FlushReason::Count) as usize,
            store.events().len() / 16
        );
    }
}
