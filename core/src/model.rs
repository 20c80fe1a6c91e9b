//! Prediction model trait and the batch type every model emits.
//!
//! RULE: Every model implements PredictionModel.
//! A model is a pure function of the snapshot: it never touches the store,
//! never reads another model's output, and never mutates its input.
//! The engine owns persistence and tags each batch with the run id.

use crate::{
    cash_flow_model::CashFlowForecast,
    error::PipelineResult,
    inventory_model::InventoryForecast,
    risk_scoring_model::CustomerRiskScore,
    sales_forecast_model::SalesForecast,
    snapshot::DataSnapshot,
};
use serde::{Deserialize, Serialize};

/// The contract every prediction model must fulfill.
pub trait PredictionModel: Send {
    /// Unique stable name for this model. Used in logs and the run event log.
    fn name(&self) -> &'static str;

    /// Compute this model's rows for one snapshot.
    fn predict(&self, snapshot: &DataSnapshot) -> PipelineResult<PredictionBatch>;
}

/// One model's output for one run. Rows are not yet tagged with a run id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum PredictionBatch {
    Sales(Vec<SalesForecast>),
    Risk(Vec<CustomerRiskScore>),
    CashFlow(Vec<CashFlowForecast>),
    Inventory(Vec<InventoryForecast>),
}

impl PredictionBatch {
    pub fn len(&self) -> usize {
        match self {
            Self::Sales(rows)     => rows.len(),
            Self::Risk(rows)      => rows.len(),
            Self::CashFlow(rows)  => rows.len(),
            Self::Inventory(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Confidence scores that feed the run-level average.
    /// Risk scores carry no confidence and contribute nothing.
    pub fn confidences(&self) -> Vec<f64> {
        match self {
            Self::Sales(rows)     => rows.iter().map(|r| r.confidence).collect(),
            Self::Risk(_)         => Vec::new(),
            Self::CashFlow(rows)  => rows.iter().map(|r| r.confidence).collect(),
            Self::Inventory(rows) => rows.iter().map(|r| r.confidence).collect(),
        }
    }
}
