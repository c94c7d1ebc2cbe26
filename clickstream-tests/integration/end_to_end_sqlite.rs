//! Full runs into an on-disk SQLite event store.

use std::path::Path;

use clickstream_core::canonical::canonical_json;
use clickstream_core::{SimulationConfig, SqliteEventStore};
use clickstream_sim::run_simulation;
use rusqlite::Connection;
use tempfile::TempDir;

use crate::common::{SHOP, config_with};

fn config_at(path: &Path, clean_slate: bool) -> SimulationConfig {
    let mut config = config_with(SHOP);
    config.storage.path = path.to_path_buf();
    config.storage.clean_slate = clean_slate;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_persists_every_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("events.sqlite");
        let summary = run_simulation(&config_at(&path, true)).unwrap();

        let store = SqliteEventStore::new(&path, false);
        assert_eq!(store.count_events("itest").unwrap(), summary.events_written);
        assert!(summary.events_written > 2);
    }

    #[test]
    fn test_stored_rows_are_canonical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.sqlite");
        run_simulation(&config_at(&path, true)).unwrap();

        let conn = Connection::open(&path).unwrap();
        let mut stmt = conn
            .prepare("SELECT event_type, ts_utc, payload_json FROM events ORDER BY rowid")
            .unwrap();
        let rows: Vec<(String, String, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows[0].0, "run_started");
        assert_eq!(rows[0].1, "2026-03-01T00:00:00.000000Z");
        assert_eq!(rows[0].2.as_deref(), Some(r#"{"seed":1234}"#));
        assert_eq!(rows.last().unwrap().0, "run_finished");

        for (_, ts, payload) in &rows {
            assert!(ts.ends_with('Z'), "{ts}");
            if let Some(payload) = payload {
                let value: serde_json::Value = serde_json::from_str(payload).unwrap();
                assert_eq!(&canonical_json(&value), payload);
            }
        }
    }

    #[test]
    fn test_clean_slate_replaces_prior_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.sqlite");

        let first = run_simulation(&config_at(&path, true)).unwrap();
        let second = run_simulation(&config_at(&path, true)).unwrap();
        assert_eq!(first.events_written, second.events_written);

        let store = SqliteEventStore::new(&path, false);
        assert_eq!(store.count_events("itest").unwrap(), second.events_written);
    }

    #[test]
    fn test_without_clean_slate_rows_accumulate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.sqlite");

        let first = run_simulation(&config_at(&path, true)).unwrap();
        run_simulation(&config_at(&path, false)).unwrap();

        let store = SqliteEventStore::new(&path, false);
        assert_eq!(store.count_events("itest").unwrap(), 2 * first.events_written);
    }
}
