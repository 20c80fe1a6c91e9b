//! End-to-end pipeline runs: run records, batch isolation, failure handling.

use chrono::NaiveDate;
use insight_core::{
    calendar::{parse_date, MonthKey},
    config::PipelineConfig,
    demo,
    engine::PredictionEngine,
    error::{PipelineError, PipelineResult},
    model::{PredictionBatch, PredictionModel},
    sales_forecast_model::{SalesForecast, Trend},
    snapshot::DataSnapshot,
    store::{PipelineStore, RunStatus},
};

fn as_of() -> NaiveDate {
    parse_date("2024-07-15").unwrap()
}

fn seeded_engine(seed: u64) -> PredictionEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = PredictionEngine::build_test().unwrap();
    demo::seed_demo_dataset(&engine.store, seed, 12, as_of()).unwrap();
    engine
}

/// Emits one forecast for a product that is not in the catalog.
struct GhostProductModel;

impl PredictionModel for GhostProductModel {
    fn name(&self) -> &'static str { "ghost_sales" }

    fn predict(&self, _snapshot: &DataSnapshot) -> PipelineResult<PredictionBatch> {
        Ok(PredictionBatch::Sales(vec![SalesForecast {
            product_id:         "p-does-not-exist".into(),
            forecast_month:     MonthKey::new(2024, 8),
            predicted_quantity: 1.0,
            predicted_revenue:  1.0,
            confidence:         0.5,
            trend:              Trend::Stable,
            growth_rate:        0.0,
            slope:              0.0,
            intercept:          1.0,
            months_observed:    3,
        }]))
    }
}

/// Fails before producing anything.
struct BrokenModel;

impl PredictionModel for BrokenModel {
    fn name(&self) -> &'static str { "broken" }

    fn predict(&self, _snapshot: &DataSnapshot) -> PipelineResult<PredictionBatch> {
        Err(PipelineError::InvalidConfig("broken on purpose".into()))
    }
}

fn event_types(engine: &PredictionEngine, run_id: &str) -> Vec<String> {
    engine
        .store
        .run_events(run_id)
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

#[test]
fn demo_run_completes_and_records_every_batch() {
    let engine = seeded_engine(42);
    let summary = engine.run_with_id("run-full", as_of()).unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert!(summary.failed_models().is_empty(), "failed: {:?}", summary.failed_models());
    assert!(summary.rows_for("sales_forecast") > 0, "no sales rows");
    assert!(summary.rows_for("risk_scoring") > 0, "no risk rows");
    assert_eq!(summary.rows_for("cash_flow"), 3);
    assert!(summary.rows_for("inventory") > 0, "no inventory rows");

    let stored = engine.store.prediction_count("run-full").unwrap();
    assert_eq!(stored as usize, summary.total_predictions);

    let run = engine.store.get_prediction_run("run-full").unwrap().expect("run record");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.total_predictions, summary.total_predictions);
    assert_eq!(run.horizon_months, 3);
    assert_eq!(run.model_version, PipelineConfig::default().model_version);
    assert!(run.completed_at.is_some());
    assert!(run.error_message.is_none());
}

#[test]
fn models_run_in_the_documented_order() {
    let engine = seeded_engine(1);
    let summary = engine.run(as_of()).unwrap();
    let names: Vec<&str> = summary.models.iter().map(|m| m.model.as_str()).collect();
    assert_eq!(names, ["sales_forecast", "risk_scoring", "cash_flow", "inventory"]);
}

#[test]
fn event_log_brackets_the_run() {
    let engine = seeded_engine(3);
    engine.run_with_id("run-events", as_of()).unwrap();

    let types = event_types(&engine, "run-events");
    assert_eq!(types.first().map(String::as_str), Some("run_started"));
    assert_eq!(types.get(1).map(String::as_str), Some("snapshot_loaded"));
    assert_eq!(types.last().map(String::as_str), Some("run_completed"));
    assert_eq!(types.iter().filter(|t| *t == "model_completed").count(), 4);
}

#[test]
fn average_confidence_excludes_risk_rows() {
    let engine = seeded_engine(8);
    let summary = engine.run_with_id("run-conf", as_of()).unwrap();

    let mut confidences: Vec<f64> = Vec::new();
    confidences.extend(engine.store.sales_forecasts_for_run("run-conf").unwrap().iter().map(|r| r.confidence));
    confidences.extend(engine.store.cash_flow_forecasts_for_run("run-conf").unwrap().iter().map(|r| r.confidence));
    confidences.extend(engine.store.inventory_forecasts_for_run("run-conf").unwrap().iter().map(|r| r.confidence));
    let expected = confidences.iter().sum::<f64>() / confidences.len() as f64;

    let actual = summary.average_confidence.expect("average confidence");
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");

    let run = engine.store.get_prediction_run("run-conf").unwrap().unwrap();
    let stored = run.average_confidence.expect("stored average");
    assert!((stored - expected).abs() < 1e-9);
}

#[test]
fn rows_are_partitioned_by_run_and_history_is_kept() {
    let engine = seeded_engine(21);
    let first = engine.run_with_id("run-a", as_of()).unwrap();
    let second = engine.run_with_id("run-b", as_of()).unwrap();

    assert_eq!(engine.store.prediction_count("run-a").unwrap() as usize, first.total_predictions);
    assert_eq!(engine.store.prediction_count("run-b").unwrap() as usize, second.total_predictions);
    assert_eq!(engine.store.list_prediction_runs().unwrap().len(), 2);

    // Same snapshot, same models: the second run repeats the first.
    let a = engine.store.sales_forecasts_for_run("run-a").unwrap();
    let b = engine.store.sales_forecasts_for_run("run-b").unwrap();
    assert_eq!(a, b);

    let risk_a = engine.store.risk_scores_for_run("run-a").unwrap();
    assert_eq!(risk_a.len(), first.rows_for("risk_scoring"));
}

#[test]
fn failed_write_is_isolated_and_fails_the_run() {
    let mut engine = seeded_engine(42);
    engine.register(Box::new(GhostProductModel));

    let summary = engine.run_with_id("run-partial", as_of()).unwrap();
    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.failed_models(), ["ghost_sales"]);
    assert_eq!(summary.rows_for("ghost_sales"), 0);

    // Every other batch landed.
    assert!(summary.rows_for("sales_forecast") > 0);
    assert_eq!(summary.rows_for("cash_flow"), 3);
    let stored = engine.store.prediction_count("run-partial").unwrap() as usize;
    assert_eq!(stored, summary.total_predictions);
    assert!(
        engine
            .store
            .sales_forecasts_for_run("run-partial")
            .unwrap()
            .iter()
            .all(|r| r.product_id != "p-does-not-exist"),
        "Rejected batch must leave no rows behind"
    );

    let run = engine.store.get_prediction_run("run-partial").unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    let message = run.error_message.expect("error message");
    assert!(message.contains("ghost_sales"), "message was '{message}'");

    let types = event_types(&engine, "run-partial");
    assert!(types.contains(&"model_write_failed".to_string()));
    assert_eq!(types.last().map(String::as_str), Some("run_failed"));
}

#[test]
fn model_error_is_reported_without_stopping_the_others() {
    let mut engine = PredictionEngine::new(PipelineConfig::default(), PipelineStore::in_memory().unwrap());
    engine.store.migrate().unwrap();
    demo::seed_demo_dataset(&engine.store, 4, 6, as_of()).unwrap();
    engine.register(Box::new(BrokenModel));
    engine.register(Box::new(insight_core::cash_flow_model::CashFlowModel::new(
        Default::default(),
        3,
    )));

    let summary = engine.run_with_id("run-broken", as_of()).unwrap();
    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.failed_models(), ["broken"]);
    assert_eq!(summary.rows_for("cash_flow"), 3);
    assert!(event_types(&engine, "run-broken").contains(&"model_failed".to_string()));
}

#[test]
fn unreadable_snapshot_aborts_the_run() {
    let engine = PredictionEngine::build_test().unwrap();
    engine
        .store
        .execute_batch(
            "INSERT INTO product (product_id, name, category, cost_price, selling_price)
                 VALUES ('p-1', 'Widget', 'Office', 1.0, 2.0);
             INSERT INTO customer (customer_id, name, credit_limit, region)
                 VALUES ('c-1', 'Acme', NULL, NULL);
             INSERT INTO sales_transaction (
                 transaction_id, product_id, customer_id, txn_date, quantity, unit_price,
                 total_amount, payment_status, due_date, received_date, outstanding_amount
             ) VALUES ('t-1', 'p-1', 'c-1', 'last tuesday', 1, 2.0, 2.0, 'paid', NULL, NULL, 0);",
        )
        .unwrap();

    let err = engine.run_with_id("run-bad-load", as_of()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidDate { .. }), "unexpected error: {err}");

    let run = engine.store.get_prediction_run("run-bad-load").unwrap().expect("run record");
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.total_predictions, 0);
    assert!(run.error_message.unwrap_or_default().contains("snapshot"));
    assert_eq!(engine.store.prediction_count("run-bad-load").unwrap(), 0);
    assert_eq!(event_types(&engine, "run-bad-load"), ["run_started", "run_failed"]);
}

#[test]
fn snapshot_error_survives_a_failed_finalize() {
    let engine = PredictionEngine::build_test().unwrap();
    engine
        .store
        .execute_batch(
            "INSERT INTO product (product_id, name, category, cost_price, selling_price)
                 VALUES ('p-1', 'Widget', 'Office', 1.0, 2.0);
             INSERT INTO customer (customer_id, name, credit_limit, region)
                 VALUES ('c-1', 'Acme', NULL, NULL);
             INSERT INTO sales_transaction (
                 transaction_id, product_id, customer_id, txn_date, quantity, unit_price,
                 total_amount, payment_status, due_date, received_date, outstanding_amount
             ) VALUES ('t-1', 'p-1', 'c-1', 'not a date', 1, 2.0, 2.0, 'paid', NULL, NULL, 0);
             CREATE TRIGGER freeze_runs BEFORE UPDATE ON prediction_run
             BEGIN SELECT RAISE(ABORT, 'runs are frozen'); END;",
        )
        .unwrap();

    let err = engine.run_with_id("run-frozen", as_of()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidDate { .. }), "unexpected error: {err}");

    let run = engine.store.get_prediction_run("run-frozen").unwrap().expect("run record");
    assert_eq!(run.status, RunStatus::Running);
}

#[test]
fn empty_database_completes_with_nothing_to_average() {
    let engine = PredictionEngine::build_test().unwrap();
    let summary = engine.run(as_of()).unwrap();
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.total_predictions, 0);
    assert_eq!(summary.average_confidence, None);
}

#[test]
fn finished_runs_cannot_be_finalized_again() {
    let engine = seeded_engine(5);
    engine.run_with_id("run-once", as_of()).unwrap();
    let err = engine
        .store
        .finalize_prediction_run("run-once", RunStatus::Failed, 0, None, None, "2024-07-15T00:00:00Z")
        .unwrap_err();
    assert!(matches!(err, PipelineError::RunNotFound { .. }));
    assert_eq!(engine.store.latest_completed_run().unwrap().map(|r| r.run_id), Some("run-once".to_string()));
}

#[test]
fn duplicate_run_id_is_rejected() {
    let engine = seeded_engine(6);
    engine.run_with_id("run-dup", as_of()).unwrap();
    assert!(engine.run_with_id("run-dup", as_of()).is_err());
}
