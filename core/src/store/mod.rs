//! SQLite persistence layer for settings, model artifacts and the
//! analysis history.
//!
//! RULE: Only the store talks to the database.
//! Callers use store methods and never execute SQL directly.

use crate::error::PipelineResult;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

mod runs;
mod settings;

pub struct SettingsStore {
    conn: Connection,
    path: Option<String>, // None for :memory:
}

/// A stored model or scaler file.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRow {
    pub kind: String,
    pub name: String,
    pub model_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

/// One completed analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub run_id: String,
    pub file_name: String,
    pub source: String,
    pub total_records: u64,
    pub anomalies_detected: u64,
    pub anomaly_rate: f64,
    pub threshold: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl SettingsStore {
    /// Open (or create) the settings database at `path`.
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    /// Open and migrate in one step.
    pub fn open_migrated(path: &str) -> PipelineResult<Self> {
        let store = if path == ":memory:" {
            Self::in_memory()?
        } else {
            Self::open(path)?
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_settings.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_analysis_runs.sql"))?;
        Ok(())
    }
}

fn parse_timestamp(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
