// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Run ledger: durable record of placements, runs and per-file run details
//!
//! Every write is its own committed transaction on a connection opened with
//! `synchronous = FULL`, so a call that returns `Ok` is on disk.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::classify::ClassificationResult;
use crate::{Result, SortdeskError};

/// Ledger handle (single owned connection)
#[derive(Clone)]
pub struct RunLedger {
    conn: Arc<Mutex<Connection>>,
}

/// Identifies an open run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub id: i64,
    pub run_number: i64,
}

/// Aggregate counts of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub total: u64,
    pub moved: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Current placement of a filename (one live record per name)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFileRecord {
    pub filename: String,
    pub category: String,
    pub confidence: f64,
    pub source_path: String,
    pub destination_path: String,
    pub status: String,
    pub file_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub moved_at: Option<DateTime<Utc>>,
}

/// Input for [`RunLedger::record_placement`]
#[derive(Debug, Clone)]
pub struct NewPlacement<'a> {
    pub filename: &'a str,
    pub category: &'a str,
    pub confidence: f64,
    pub source_path: &'a str,
    pub destination_path: &'a str,
    pub status: &'a str,
    pub file_hash: Option<&'a str>,
}

/// A run; `totals` and `closed_at` are set once the run is closed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub run_number: i64,
    pub timestamp: DateTime<Utc>,
    pub totals: Option<RunTotals>,
    pub notes: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// One file's entry within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDetailRecord {
    pub id: i64,
    pub run_id: i64,
    pub filename: String,
    pub classification: serde_json::Value,
    pub action: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Ledger statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStats {
    pub file_count: i64,
    pub run_count: i64,
    pub detail_count: i64,
    pub by_category: Vec<(String, i64)>,
}

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, s)).transpose()
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl RunLedger {
    /// Open or create the ledger
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory ledger (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        ledger.initialize()?;
        Ok(ledger)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SortdeskError::Persistence("Ledger lock poisoned".to_string()))
    }

    /// Initialize ledger schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS processed_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT UNIQUE NOT NULL,
                category TEXT NOT NULL,
                confidence REAL,
                source_path TEXT,
                destination_path TEXT,
                status TEXT,
                file_hash TEXT,
                created_at TEXT NOT NULL,
                moved_at TEXT
            );

            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_number INTEGER NOT NULL UNIQUE,
                run_timestamp TEXT NOT NULL,
                total_files INTEGER,
                successful_moves INTEGER,
                failed_moves INTEGER,
                skipped_files INTEGER,
                notes TEXT,
                closed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS run_details (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL REFERENCES runs(id),
                filename TEXT NOT NULL,
                classification_result TEXT,
                action_taken TEXT,
                action_status TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_processed_category ON processed_files(category);
            CREATE INDEX IF NOT EXISTS idx_details_run ON run_details(run_id);
        "#)?;
        Ok(())
    }

    /// Open a new run with the next run number
    pub fn start_run(&self) -> Result<RunHandle> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let run_number: i64 = tx.query_row(
            "SELECT COALESCE(MAX(run_number), 0) + 1 FROM runs",
            [],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO runs (run_number, run_timestamp) VALUES (?1, ?2)",
            params![run_number, now()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(RunHandle { id, run_number })
    }

    /// Upsert the current placement of a filename.
    ///
    /// The first `created_at` survives; `moved_at` only advances when the
    /// new status is `moved`. An `already_placed` update keeps the recorded
    /// source path so the original location stays restorable.
    pub fn record_placement(&self, placement: &NewPlacement<'_>) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let stamp = now();
        let moved_at = (placement.status == "moved").then(|| stamp.clone());

        tx.execute(
            r#"INSERT INTO processed_files
                   (filename, category, confidence, source_path, destination_path, status, file_hash, created_at, moved_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
               ON CONFLICT(filename) DO UPDATE SET
                   category = excluded.category,
                   confidence = excluded.confidence,
                   source_path = CASE WHEN excluded.status = 'already_placed'
                       THEN processed_files.source_path ELSE excluded.source_path END,
                   destination_path = excluded.destination_path,
                   status = excluded.status,
                   file_hash = excluded.file_hash,
                   moved_at = COALESCE(excluded.moved_at, processed_files.moved_at)"#,
            params![
                placement.filename,
                placement.category,
                placement.confidence,
                placement.source_path,
                placement.destination_path,
                placement.status,
                placement.file_hash,
                stamp,
                moved_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Append a per-file entry to an open run
    pub fn record_run_detail(
        &self,
        run_id: i64,
        filename: &str,
        classification: &ClassificationResult,
        action: &str,
        status: &str,
    ) -> Result<()> {
        let classification_json = serde_json::to_string(classification)?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        Self::ensure_open(&tx, run_id)?;
        tx.execute(
            r#"INSERT INTO run_details (run_id, filename, classification_result, action_taken, action_status, timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![run_id, filename, classification_json, action, status, now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Close a run with its totals; closed runs never change again
    pub fn end_run(&self, run_id: i64, totals: &RunTotals, notes: &str) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        Self::ensure_open(&tx, run_id)?;
        tx.execute(
            r#"UPDATE runs
               SET total_files = ?1, successful_moves = ?2, failed_moves = ?3, skipped_files = ?4,
                   notes = ?5, closed_at = ?6
               WHERE id = ?7"#,
            params![
                totals.total as i64,
                totals.moved as i64,
                totals.failed as i64,
                totals.skipped as i64,
                notes,
                now(),
                run_id,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn ensure_open(conn: &Connection, run_id: i64) -> Result<()> {
        let closed: Option<Option<String>> = conn.query_row(
            "SELECT closed_at FROM runs WHERE id = ?1",
            params![run_id],
            |row| row.get(0),
        ).optional()?;

        match closed {
            None => Err(SortdeskError::Persistence(format!("Unknown run id {}", run_id))),
            Some(Some(_)) => Err(SortdeskError::Persistence(format!("Run {} is already closed", run_id))),
            Some(None) => Ok(()),
        }
    }

    /// All current placements, by filename
    pub fn processed_files(&self) -> Result<Vec<ProcessedFileRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT filename, category, confidence, source_path, destination_path, status, file_hash, created_at, moved_at
               FROM processed_files ORDER BY filename"#
        )?;
        let files = stmt.query_map([], Self::map_processed)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Current placement of one filename
    pub fn processed_file(&self, filename: &str) -> Result<Option<ProcessedFileRecord>> {
        let conn = self.lock_conn()?;
        let record = conn.query_row(
            r#"SELECT filename, category, confidence, source_path, destination_path, status, file_hash, created_at, moved_at
               FROM processed_files WHERE filename = ?1"#,
            params![filename],
            Self::map_processed,
        ).optional()?;
        Ok(record)
    }

    fn map_processed(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcessedFileRecord> {
        Ok(ProcessedFileRecord {
            filename: row.get(0)?,
            category: row.get(1)?,
            confidence: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            source_path: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            destination_path: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            status: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            file_hash: row.get(6)?,
            created_at: parse_ts(7, row.get(7)?)?,
            moved_at: parse_opt_ts(8, row.get(8)?)?,
        })
    }

    /// All runs, oldest first
    pub fn runs(&self) -> Result<Vec<RunRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, run_number, run_timestamp, total_files, successful_moves, failed_moves, skipped_files, notes, closed_at
               FROM runs ORDER BY run_number"#
        )?;
        let runs = stmt.query_map([], Self::map_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    /// Look a run up by its number
    pub fn run(&self, run_number: i64) -> Result<Option<RunRecord>> {
        let conn = self.lock_conn()?;
        let run = conn.query_row(
            r#"SELECT id, run_number, run_timestamp, total_files, successful_moves, failed_moves, skipped_files, notes, closed_at
               FROM runs WHERE run_number = ?1"#,
            params![run_number],
            Self::map_run,
        ).optional()?;
        Ok(run)
    }

    fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
        let total: Option<i64> = row.get(3)?;
        let moved: Option<i64> = row.get(4)?;
        let failed: Option<i64> = row.get(5)?;
        let skipped: Option<i64> = row.get(6)?;

        let totals = match (total, moved, failed, skipped) {
            (Some(total), Some(moved), Some(failed), Some(skipped)) => Some(RunTotals {
                total: total as u64,
                moved: moved as u64,
                skipped: skipped as u64,
                failed: failed as u64,
            }),
            _ => None,
        };

        Ok(RunRecord {
            id: row.get(0)?,
            run_number: row.get(1)?,
            timestamp: parse_ts(2, row.get(2)?)?,
            totals,
            notes: row.get(7)?,
            closed_at: parse_opt_ts(8, row.get(8)?)?,
        })
    }

    /// Per-file entries of a run, in insertion order
    pub fn run_details(&self, run_id: i64) -> Result<Vec<RunDetailRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, run_id, filename, classification_result, action_taken, action_status, timestamp
               FROM run_details WHERE run_id = ?1 ORDER BY id"#
        )?;
        let details = stmt.query_map(params![run_id], |row| {
            let raw: Option<String> = row.get(3)?;
            Ok(RunDetailRecord {
                id: row.get(0)?,
                run_id: row.get(1)?,
                filename: row.get(2)?,
                classification: raw
                    .and_then(|s| serde_json::from_str(&s).ok())
                    .unwrap_or(serde_json::Value::Null),
                action: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                status: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                timestamp: parse_ts(6, row.get(6)?)?,
            })
        })?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(details)
    }

    /// Get ledger statistics
    pub fn stats(&self) -> Result<LedgerStats> {
        let conn = self.lock_conn()?;
        let file_count: i64 = conn.query_row("SELECT COUNT(*) FROM processed_files", [], |row| row.get(0))?;
        let run_count: i64 = conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        let detail_count: i64 = conn.query_row("SELECT COUNT(*) FROM run_details", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM processed_files GROUP BY category ORDER BY category"
        )?;
        let by_category = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?.collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(LedgerStats { file_count, run_count, detail_count, by_category })
    }

    /// Delete every record; run numbering starts over at 1
    pub fn reset(&self) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        tx.execute_batch(r#"
            DELETE FROM run_details;
            DELETE FROM runs;
            DELETE FROM processed_files;
        "#)?;
        tx.commit()?;
        Ok(())
    }
}
