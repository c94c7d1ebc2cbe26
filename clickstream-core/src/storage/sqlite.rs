//! SQLite-backed event store.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::{Connection, params};

use super::{EventSink, StorageError, WriteReport};
use crate::event::Event;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    run_id        TEXT NOT NULL,
    event_id      TEXT NOT NULL,
    ts_utc        TEXT NOT NULL,
    sim_time_s    REAL NOT NULL,
    user_id       TEXT,
    session_id    TEXT,
    event_type    TEXT NOT NULL,
    intent_source TEXT,
    channel       TEXT,
    page          TEXT,
    value_num     REAL,
    value_str     TEXT,
    payload_json  TEXT
);
CREATE INDEX IF NOT EXISTS idx_events_run_id ON events (run_id);
CREATE INDEX IF NOT EXISTS idx_events_event_type ON events (event_type);
CREATE INDEX IF NOT EXISTS idx_events_ts_utc ON events (ts_utc);
";

const INSERT: &str = "
INSERT INTO events (
    run_id, event_id, ts_utc, sim_time_s, user_id, session_id, event_type,
    intent_source, channel, page, value_num, value_str, payload_json
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
";

/// Event store writing a single `events` table in a SQLite file.
pub struct SqliteEventStore {
    path: PathBuf,
    clean_slate: bool,
    conn: Option<Connection>,
    opened_before: bool,
}

impl SqliteEventStore {
    /// Creates a store for `path`. Nothing touches the disk until `open`.
    pub fn new(path: impl Into<PathBuf>, clean_slate: bool) -> Self {
        Self {
            path: path.into(),
            clean_slate,
            conn: None,
            opened_before: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Counts stored events for `run_id`, opening a short-lived connection
    /// when the store is closed.
    ///
    /// # Errors
    ///
    /// - `StorageError::Sqlite` - If the query failed
    pub fn count_events(&self, run_id: &str) -> Result<u64, StorageError> {
        let sql = "SELECT COUNT(*) FROM events WHERE run_id = ?1";
        let count: i64 = match &self.conn {
            Some(conn) => conn.query_row(sql, params![run_id], |row| row.get(0))?,
            None => Connection::open(&self.path)?.query_row(sql, params![run_id], |row| row.get(0))?,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn remove_prior_storage(&self) -> Result<(), StorageError> {
        let mut targets = vec![self.path.clone()];
        for suffix in ["-wal", "-shm", "-journal"] {
            let mut name = self.path.clone().into_os_string();
            name.push(suffix);
            targets.push(PathBuf::from(name));
        }

        for target in targets {
            match std::fs::remove_file(&target) {
                Ok(()) => tracing::debug!(path = %target.display(), "Removed prior event store file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl EventSink for SqliteEventStore {
    fn open(&mut self) -> Result<(), StorageError> {
        if self.conn.is_some() {
            return Ok(());
        }

        if self.clean_slate && !self.opened_before {
            self.remove_prior_storage()?;
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&self.path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path = %self.path.display(), "Opened event store");

        self.conn = Some(conn);
        self.opened_before = true;
        Ok(())
    }

    fn write_batch(&mut self, events: &[Event]) -> Result<WriteReport, StorageError> {
        let conn = self.conn.as_mut().ok_or_else(|| StorageError::NotOpen {
            target: self.path.display().to_string(),
        })?;
        let started = Instant::now();

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT)?;
            for event in events {
                stmt.execute(params![
                    event.run_id,
                    event.event_id,
                    event.ts_utc_text(),
                    event.sim_time_s,
                    event.user_id,
                    event.session_id,
                    event.event_type.as_str(),
                    event.intent_source,
                    event.channel,
                    event.page,
                    event.value_num,
                    event.value_str,
                    event.payload_json(),
                ])?;
            }
        }
        tx.commit()?;

        Ok(WriteReport {
            num_events: events.len(),
            duration: started.elapsed(),
        })
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
            tracing::info!(path = %self.path.display(), "Closed event store");
        }
        Ok(())
    }
}
