//! SQLite measurement store.
//!
//! Targets are never deleted here: configuration controls what is actively
//! probed, the store is an append-only history.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult};
use thiserror::Error;

use super::models::*;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("schema error: {0}")]
    Schema(String),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS targets (
    id TEXT PRIMARY KEY,
    addr TEXT NOT NULL,
    description TEXT NOT NULL,
    hide_addr BOOLEAN DEFAULT FALSE,
    dns_server TEXT DEFAULT '',
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS measurements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_id TEXT NOT NULL,
    latency REAL NOT NULL,
    success BOOLEAN NOT NULL,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (target_id) REFERENCES targets(id)
);
CREATE INDEX IF NOT EXISTS idx_target_timestamp ON measurements(target_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_timestamp ON measurements(timestamp);
";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Thread-safe database store. The mutex serializes concurrent appends from
/// probe tasks that complete at nearly the same instant.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| DbError::Schema(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // --- Targets ---

    /// Insert or replace a target. Identity is the fingerprint id, so a
    /// replace only ever refreshes timestamps for the same tuple.
    pub fn save_target(&self, target: &Target) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO targets (id, addr, description, hide_addr, dns_server, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                target.id,
                target.address,
                target.description,
                target.hide_address,
                target.dns_server,
                target.created_at.format(TIME_FORMAT).to_string(),
                target.updated_at.format(TIME_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// Load every persisted target, keyed by id.
    pub fn load_targets(&self) -> Result<TargetSet, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, addr, description, hide_addr, dns_server, created_at, updated_at FROM targets",
        )?;

        let targets = stmt
            .query_map([], |row| {
                let created: String = row.get(5)?;
                let updated: String = row.get(6)?;
                Ok(Target {
                    id: row.get(0)?,
                    address: row.get(1)?,
                    description: row.get(2)?,
                    hide_address: row.get(3)?,
                    dns_server: row.get(4)?,
                    created_at: parse_db_time(&created).unwrap_or_else(Utc::now),
                    updated_at: parse_db_time(&updated).unwrap_or_else(Utc::now),
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(targets.into_iter().map(|t| (t.id.clone(), t)).collect())
    }

    // --- Measurements ---

    /// Append one measurement.
    pub fn add_measurement(&self, m: &Measurement) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO measurements (target_id, latency, success, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                m.target_id,
                m.latency_ms,
                m.success,
                m.timestamp.format(TIME_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// Measurements for one target since a cutoff, oldest first, joined with
    /// the target's metadata.
    pub fn measurements_since(
        &self,
        target_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MeasurementRow>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.target_id, t.addr, t.description, t.hide_addr, m.latency, m.success, m.timestamp
             FROM measurements m
             JOIN targets t ON m.target_id = t.id
             WHERE m.target_id = ?1 AND m.timestamp > ?2
             ORDER BY m.timestamp ASC",
        )?;

        let rows = stmt
            .query_map(
                params![target_id, since.format(TIME_FORMAT).to_string()],
                map_measurement_row,
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// The most recent measurement per target, joined with target metadata.
    pub fn latest_measurements(&self) -> Result<Vec<MeasurementRow>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.target_id, t.addr, t.description, t.hide_addr, m.latency, m.success, m.timestamp
             FROM measurements m
             JOIN targets t ON m.target_id = t.id
             WHERE (m.target_id, m.timestamp) IN (
                 SELECT target_id, MAX(timestamp) FROM measurements GROUP BY target_id
             )",
        )?;

        let rows = stmt
            .query_map([], map_measurement_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(rows)
    }
}

fn map_measurement_row(row: &rusqlite::Row<'_>) -> SqlResult<MeasurementRow> {
    let ts: String = row.get(6)?;
    Ok(MeasurementRow {
        target_id: row.get(0)?,
        addr: row.get(1)?,
        description: row.get(2)?,
        hide_addr: row.get(3)?,
        latency: row.get(4)?,
        success: row.get(5)?,
        timestamp: parse_db_time(&ts).unwrap_or_else(Utc::now),
    })
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        "%Y-%m-%d %H:%M:%S%.9f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.9fZ",
        "%Y-%m-%dT%H:%M:%SZ",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
