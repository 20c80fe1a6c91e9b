use super::{parsed_column, PipelineStore};
use crate::{
    error::{PipelineError, PipelineResult},
    event::{PipelineEvent, RunEventEntry},
    types::RunId,
};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running   => "running",
            Self::Completed => "completed",
            Self::Failed    => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running"   => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed"    => Ok(Self::Failed),
            _ => Err(PipelineError::UnknownVariant { kind: "run status", value: s.to_string() }),
        }
    }
}

/// One row of `prediction_run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRun {
    pub run_id:             RunId,
    pub model_version:      String,
    pub horizon_months:     usize,
    pub status:             RunStatus,
    pub total_predictions:  usize,
    pub average_confidence: Option<f64>,
    pub error_message:      Option<String>,
    pub started_at:         String,
    pub completed_at:       Option<String>,
}

const RUN_COLUMNS: &str = "run_id, model_version, horizon_months, status, total_predictions,
                           average_confidence, error_message, started_at, completed_at";

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PredictionRun> {
    Ok(PredictionRun {
        run_id:             row.get(0)?,
        model_version:      row.get(1)?,
        horizon_months:     row.get::<_, i64>(2)? as usize,
        status:             parsed_column(row, 3)?,
        total_predictions:  row.get::<_, i64>(4)? as usize,
        average_confidence: row.get(5)?,
        error_message:      row.get(6)?,
        started_at:         row.get(7)?,
        completed_at:       row.get(8)?,
    })
}

impl PipelineStore {
    // ── Prediction run ─────────────────────────────────────────

    pub fn insert_prediction_run(
        &self,
        run_id: &str,
        model_version: &str,
        horizon_months: usize,
        started_at: &str,
    ) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO prediction_run (run_id, model_version, horizon_months, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                model_version,
                horizon_months as i64,
                RunStatus::Running.as_str(),
                started_at
            ],
        )?;
        Ok(())
    }

    /// Close a run. Only `running` runs can be finalized; a finished run is
    /// never rewritten.
    pub fn finalize_prediction_run(
        &self,
        run_id: &str,
        status: RunStatus,
        total_predictions: usize,
        average_confidence: Option<f64>,
        error_message: Option<&str>,
        completed_at: &str,
    ) -> PipelineResult<()> {
        let updated = self.conn.execute(
            "UPDATE prediction_run
             SET status = ?1, total_predictions = ?2, average_confidence = ?3,
                 error_message = ?4, completed_at = ?5
             WHERE run_id = ?6 AND status = 'running'",
            params![
                status.as_str(),
                total_predictions as i64,
                average_confidence,
                error_message,
                completed_at,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(PipelineError::RunNotFound { run_id: run_id.to_string() });
        }
        Ok(())
    }

    pub fn get_prediction_run(&self, run_id: &str) -> PipelineResult<Option<PredictionRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM prediction_run WHERE run_id = ?1"
        ))?;
        let run = stmt.query_row(params![run_id], run_from_row).optional()?;
        Ok(run)
    }

    /// All runs, oldest first.
    pub fn list_prediction_runs(&self) -> PipelineResult<Vec<PredictionRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM prediction_run ORDER BY started_at ASC, rowid ASC"
        ))?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    pub fn latest_completed_run(&self) -> PipelineResult<Option<PredictionRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM prediction_run
             WHERE status = 'completed'
             ORDER BY started_at DESC, rowid DESC LIMIT 1"
        ))?;
        let run = stmt.query_row([], run_from_row).optional()?;
        Ok(run)
    }

    // ── Run event log ──────────────────────────────────────────

    pub fn append_run_event(&self, run_id: &str, event: &PipelineEvent) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO run_event (run_id, event_type, payload) VALUES (?1, ?2, ?3)",
            params![run_id, event.event_type(), serde_json::to_string(event)?],
        )?;
        Ok(())
    }

    pub fn run_events(&self, run_id: &str) -> PipelineResult<Vec<RunEventEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, event_type, payload
             FROM run_event WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(RunEventEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    event_type: row.get(2)?,
                    payload:    row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
