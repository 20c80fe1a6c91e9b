//! The prediction engine: one pipeline run, end to end.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Create the prediction_run record (status = running)
//!   2. Load the snapshot                 (fatal on failure)
//!   3. Sales forecast
//!   4. Risk scoring
//!   5. Cash flow
//!   6. Inventory
//!   7. Finalize the run record
//!
//! RULES:
//!   - Models are independent; none reads another's output.
//!   - Every model sees the same snapshot, fetched once.
//!   - Each batch is written on its own. A failed write is logged and
//!     reported but never rolls back or blocks another model's batch.
//!   - Past runs are never touched; every run writes a fresh batch.

use crate::{
    cash_flow_model::CashFlowModel,
    config::PipelineConfig,
    error::PipelineResult,
    event::PipelineEvent,
    inventory_model::InventoryModel,
    model::PredictionModel,
    risk_scoring_model::RiskScoringModel,
    sales_forecast_model::SalesForecastModel,
    snapshot::DataSnapshot,
    stats,
    store::{PipelineStore, RunStatus},
    types::RunId,
};
use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Rows written by one model in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutcome {
    pub model: String,
    pub rows:  usize,
    /// `None` when the batch was computed and written.
    pub error: Option<String>,
}

/// What a caller gets back from `PredictionEngine::run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id:             RunId,
    pub status:             RunStatus,
    pub models:             Vec<ModelOutcome>,
    pub total_predictions:  usize,
    pub average_confidence: Option<f64>,
}

impl RunSummary {
    pub fn failed_models(&self) -> Vec<&str> {
        self.models
            .iter()
            .filter(|m| m.error.is_some())
            .map(|m| m.model.as_str())
            .collect()
    }

    pub fn rows_for(&self, model: &str) -> usize {
        self.models.iter().find(|m| m.model == model).map_or(0, |m| m.rows)
    }
}

pub struct PredictionEngine {
    pub store: PipelineStore,
    config:    PipelineConfig,
    models:    Vec<Box<dyn PredictionModel>>,
}

impl PredictionEngine {
    pub fn new(config: PipelineConfig, store: PipelineStore) -> Self {
        Self { store, config, models: Vec::new() }
    }

    /// Build a fully wired engine with all four models registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build(config: PipelineConfig, store: PipelineStore) -> Self {
        let horizon = config.horizon_months;
        let mut engine = PredictionEngine::new(config.clone(), store);

        // Fixed execution order.
        engine.register(Box::new(SalesForecastModel::new(config.sales, horizon)));
        engine.register(Box::new(RiskScoringModel::new(config.risk)));
        engine.register(Box::new(CashFlowModel::new(config.cash_flow, horizon)));
        engine.register(Box::new(InventoryModel::new(config.inventory)));
        engine
    }

    /// Build on a migrated in-memory store with default config (tests).
    pub fn build_test() -> PipelineResult<Self> {
        let store = PipelineStore::in_memory()?;
        store.migrate()?;
        Ok(Self::build(PipelineConfig::default(), store))
    }

    /// Register a model. Call in the documented execution order.
    pub fn register(&mut self, model: Box<dyn PredictionModel>) {
        self.models.push(model);
    }

    /// Execute one pipeline run under a fresh run id.
    pub fn run(&self, as_of: NaiveDate) -> PipelineResult<RunSummary> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.run_with_id(&run_id, as_of)
    }

    /// Execute one pipeline run under `run_id`.
    ///
    /// Returns `Err` only when the run could not start or its snapshot could
    /// not be loaded; per-model failures are reported in the summary.
    pub fn run_with_id(&self, run_id: &str, as_of: NaiveDate) -> PipelineResult<RunSummary> {
        self.store.insert_prediction_run(
            run_id,
            &self.config.model_version,
            self.config.horizon_months,
            &now_timestamp(),
        )?;
        self.record(run_id, PipelineEvent::RunStarted {
            run_id:        run_id.to_string(),
            model_version: self.config.model_version.clone(),
        });
        log::info!("run={run_id} started (as_of={as_of}, models={})", self.models.len());

        let snapshot = match self.store.load_snapshot(as_of) {
            Ok(s) => s,
            Err(e) => {
                log::error!("run={run_id} snapshot load failed: {e}");
                let reason = format!("snapshot load failed: {e}");
                self.record(run_id, PipelineEvent::RunFailed { reason: reason.clone() });
                if let Err(fe) = self.store.finalize_prediction_run(
                    run_id,
                    RunStatus::Failed,
                    0,
                    None,
                    Some(&reason),
                    &now_timestamp(),
                ) {
                    log::error!("run={run_id} could not be marked failed: {fe}");
                }
                return Err(e);
            }
        };
        self.record(run_id, PipelineEvent::SnapshotLoaded {
            transactions: snapshot.transactions.len(),
            customers:    snapshot.customers.len(),
            products:     snapshot.products.len(),
            inventory:    snapshot.inventory.len(),
        });

        let mut outcomes = Vec::with_capacity(self.models.len());
        let mut confidences = Vec::new();
        for model in &self.models {
            let outcome = self.run_model(run_id, model.as_ref(), &snapshot, &mut confidences);
            outcomes.push(outcome);
        }

        let total_predictions: usize = outcomes.iter().map(|o| o.rows).sum();
        let average_confidence = if confidences.is_empty() {
            None
        } else {
            Some(stats::mean(&confidences))
        };
        let failures: Vec<String> = outcomes
            .iter()
            .filter_map(|o| o.error.as_ref().map(|e| format!("{}: {e}", o.model)))
            .collect();
        let status = if failures.is_empty() { RunStatus::Completed } else { RunStatus::Failed };
        let error_message = (!failures.is_empty()).then(|| failures.join("; "));

        self.store.finalize_prediction_run(
            run_id,
            status,
            total_predictions,
            average_confidence,
            error_message.as_deref(),
            &now_timestamp(),
        )?;
        self.record(
            run_id,
            match &error_message {
                None => PipelineEvent::RunCompleted { total_predictions, average_confidence },
                Some(reason) => PipelineEvent::RunFailed { reason: reason.clone() },
            },
        );

        log::info!(
            "run={run_id} {}: {total_predictions} prediction(s), avg confidence {}",
            status.as_str(),
            average_confidence.map_or_else(|| "n/a".to_string(), |c| format!("{c:.2}")),
        );

        Ok(RunSummary {
            run_id: run_id.to_string(),
            status,
            models: outcomes,
            total_predictions,
            average_confidence,
        })
    }

    /// Compute and persist one model's batch. Never fails the run.
    fn run_model(
        &self,
        run_id: &str,
        model: &dyn PredictionModel,
        snapshot: &DataSnapshot,
        confidences: &mut Vec<f64>,
    ) -> ModelOutcome {
        let name = model.name().to_string();

        let batch = match model.predict(snapshot) {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("run={run_id} {name}: prediction failed: {e}");
                self.record(run_id, PipelineEvent::ModelFailed {
                    model: name.clone(),
                    error: e.to_string(),
                });
                return ModelOutcome { model: name, rows: 0, error: Some(e.to_string()) };
            }
        };

        match self.store.insert_batch(run_id, &batch) {
            Ok(rows) => {
                confidences.extend(batch.confidences());
                self.record(run_id, PipelineEvent::ModelCompleted { model: name.clone(), rows });
                log::info!("run={run_id} {name}: {rows} row(s)");
                ModelOutcome { model: name, rows, error: None }
            }
            Err(e) => {
                log::error!("run={run_id} {name}: write of {} row(s) failed: {e}", batch.len());
                self.record(run_id, PipelineEvent::ModelWriteFailed {
                    model: name.clone(),
                    error: e.to_string(),
                });
                ModelOutcome { model: name, rows: 0, error: Some(e.to_string()) }
            }
        }
    }

    /// Append to the run's event log. The audit trail never fails a run.
    fn record(&self, run_id: &str, event: PipelineEvent) {
        if let Err(e) = self.store.append_run_event(run_id, &event) {
            log::warn!("run={run_id} could not record {}: {e}", event.event_type());
        }
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
