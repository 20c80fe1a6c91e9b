//! predict-runner: headless batch runner for the prediction pipeline.
//!
//! Usage:
//!   predict-runner --db bi.db
//!   predict-runner --db bi.db --as-of 2024-07-01 --json
//!   predict-runner --seed-demo --seed 7 --months 18
//!   predict-runner --db bi.db --interval-secs 3600

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use insight_core::{
    calendar::parse_date,
    config::PipelineConfig,
    demo,
    engine::{PredictionEngine, RunSummary},
    store::PipelineStore,
};
use std::env;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let months = parse_arg(&args, "--months", 12u32);
    let interval_secs = parse_arg(&args, "--interval-secs", 0u64);
    let seed_demo = args.iter().any(|a| a == "--seed-demo");
    let json = args.iter().any(|a| a == "--json");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let as_of = match flag_value(&args, "--as-of") {
        Some(v) => Some(parse_date(v).with_context(|| format!("bad --as-of value '{v}'"))?),
        None => None,
    };

    let config = PipelineConfig::load_or_default(data_dir)?;

    if !json {
        println!("predict-runner");
        println!("  model:     {}", config.model_version);
        println!("  horizon:   {} month(s)", config.horizon_months);
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let store = PipelineStore::open(db)?;
    store.migrate()?;

    if seed_demo {
        if store.transaction_count()? > 0 {
            log::warn!("{db} already holds transactions; skipping demo seeding");
        } else {
            let counts = demo::seed_demo_dataset(&store, seed, months, as_of.unwrap_or_else(today))?;
            if !json {
                println!(
                    "seeded demo data: {} products, {} customers, {} transactions",
                    counts.products, counts.customers, counts.transactions
                );
            }
        }
    } else if db == ":memory:" {
        log::warn!("running against an empty in-memory database; pass --db or --seed-demo");
    }

    let engine = PredictionEngine::build(config, store);

    loop {
        tick(&engine, as_of.unwrap_or_else(today), json, interval_secs > 0)?;

        if interval_secs == 0 {
            break;
        }
        log::info!("next run in {interval_secs}s");
        thread::sleep(Duration::from_secs(interval_secs));
    }

    Ok(())
}

/// One pipeline run. On a schedule a failed run is logged and the loop
/// carries on to the next tick; a one-shot run propagates the error.
fn tick(engine: &PredictionEngine, as_of: NaiveDate, json: bool, scheduled: bool) -> Result<()> {
    let summary = match engine.run(as_of) {
        Ok(summary) => summary,
        Err(e) if scheduled => {
            log::error!("run as of {as_of} failed: {e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", summary.run_id);
    println!("  status:         {}", summary.status.as_str());
    for m in &summary.models {
        match &m.error {
            None => println!("  {:<16}{} row(s)", format!("{}:", m.model), m.rows),
            Some(e) => println!("  {:<16}FAILED ({e})", format!("{}:", m.model)),
        }
    }
    println!("  predictions:    {}", summary.total_predictions);
    match summary.average_confidence {
        Some(c) => println!("  avg confidence: {c:.2}"),
        None => println!("  avg confidence: n/a"),
    }
    println!();
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::store::RunStatus;

    /// Engine whose snapshot can never load: one transaction has a bad date.
    fn unreadable_engine() -> PredictionEngine {
        let _ = env_logger::builder().is_test(true).try_init();
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
                 ) VALUES ('t-1', 'p-1', 'c-1', 'someday', 1, 2.0, 2.0, 'paid', NULL, NULL, 0);",
            )
            .unwrap();
        engine
    }

    fn as_of() -> NaiveDate {
        parse_date("2024-07-15").unwrap()
    }

    #[test]
    fn scheduled_ticks_survive_a_failed_run() {
        let engine = unreadable_engine();
        tick(&engine, as_of(), true, true).unwrap();
        tick(&engine, as_of(), true, true).unwrap();

        let runs = engine.store.list_prediction_runs().unwrap();
        assert_eq!(runs.len(), 2, "every tick must attempt its own run");
        assert!(runs.iter().all(|r| r.status == RunStatus::Failed));
    }

    #[test]
    fn one_shot_run_propagates_the_failure() {
        let engine = unreadable_engine();
        assert!(tick(&engine, as_of(), true, false).is_err());
    }

    #[test]
    fn healthy_tick_prints_and_succeeds() {
        let engine = PredictionEngine::build_test().unwrap();
        demo::seed_demo_dataset(&engine.store, 9, 6, as_of()).unwrap();
        tick(&engine, as_of(), false, false).unwrap();
        assert_eq!(engine.store.list_prediction_runs().unwrap().len(), 1);
    }
}
