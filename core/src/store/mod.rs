//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Models never see a connection; the engine loads one snapshot through
//! the store and hands each model's batch back to it for writing.

mod prediction;
mod run;
mod source;

pub use run::{PredictionRun, RunStatus};

use crate::{
    error::PipelineResult,
    snapshot::DataSnapshot,
};
use chrono::NaiveDate;
use rusqlite::{types::Type, Connection, Row};
use serde::de::DeserializeOwned;
use std::str::FromStr;

pub struct PipelineStore {
    conn: Connection,
}

impl PipelineStore {
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_predictions.sql"))?;
        Ok(())
    }

    /// Run raw SQL against the database. Tooling and tests only.
    pub fn execute_batch(&self, sql: &str) -> PipelineResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    // ── Snapshot ───────────────────────────────────────────────

    /// Bulk-read every source table into one immutable snapshot.
    pub fn load_snapshot(&self, as_of: NaiveDate) -> PipelineResult<DataSnapshot> {
        Ok(DataSnapshot {
            as_of,
            transactions: self.transactions()?,
            customers:    self.customers()?,
            products:     self.products()?,
            inventory:    self.inventory()?,
        })
    }
}

/// Read a text column and parse it. Parse failures surface as column
/// conversion errors so they can be raised inside `query_map`.
fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a JSON text column.
fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
