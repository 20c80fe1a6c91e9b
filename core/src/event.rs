//! Run event log: the audit trail of a single pipeline execution.
//!
//! RULE: Events are append-only. A run's event log is never rewritten,
//! even when the run is retried under a new run id.

use crate::types::RunId;
use serde::{Deserialize, Serialize};

/// Every event recorded while a run executes.
/// Variants may be added, never removed or renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        run_id:        RunId,
        model_version: String,
    },
    SnapshotLoaded {
        transactions: usize,
        customers:    usize,
        products:     usize,
        inventory:    usize,
    },
    ModelCompleted {
        model: String,
        rows:  usize,
    },
    ModelFailed {
        model: String,
        error: String,
    },
    ModelWriteFailed {
        model: String,
        error: String,
    },
    RunCompleted {
        total_predictions:  usize,
        average_confidence: Option<f64>,
    },
    RunFailed {
        reason: String,
    },
}

impl PipelineEvent {
    /// Stable name stored in the `event_type` column.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. }       => "run_started",
            Self::SnapshotLoaded { .. }   => "snapshot_loaded",
            Self::ModelCompleted { .. }   => "model_completed",
            Self::ModelFailed { .. }      => "model_failed",
            Self::ModelWriteFailed { .. } => "model_write_failed",
            Self::RunCompleted { .. }     => "run_completed",
            Self::RunFailed { .. }        => "run_failed",
        }
    }
}

/// One persisted row of the `run_event` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEventEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    pub event_type: String,
    pub payload:    String,
}
