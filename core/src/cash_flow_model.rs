//! Cash flow predictor: portfolio-level inflow forecast.
//!
//! Revenue is projected with Holt's linear method; the collection rate is
//! smoothed with simple exponential smoothing and widened by its historical
//! spread into best / most-likely / worst scenarios.
//!
//! Confidence is `100 × (1 − MAPE)` measured against the in-sample Holt
//! levels. That is a fit-quality signal, not held-out forecast accuracy: a
//! series the smoother tracks closely scores high even if the next months
//! break the pattern.

use crate::{
    calendar::MonthKey,
    config::CashFlowConfig,
    error::PipelineResult,
    model::{PredictionBatch, PredictionModel},
    snapshot::{DataSnapshot, PaymentStatus},
    stats,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowForecast {
    pub forecast_month:          MonthKey,
    pub predicted_revenue:       f64,
    pub best_case_inflow:        f64,
    pub most_likely_inflow:      f64,
    pub worst_case_inflow:       f64,
    /// Smoothed collection rate behind the most-likely scenario.
    pub collection_rate:         f64,
    /// Revenue expected to remain uncollected in the month.
    pub expected_delayed_amount: f64,
    pub confidence:              f64,
    pub months_observed:         usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct MonthlyCash {
    revenue: f64,
    paid:    f64,
}

/// Collection-rate scenarios derived from history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionScenarios {
    pub best:   f64,
    pub likely: f64,
    pub worst:  f64,
}

impl CollectionScenarios {
    pub fn new(smoothed_rate: f64, std_dev: f64) -> Self {
        let likely = smoothed_rate.clamp(0.0, 1.0);
        Self {
            best:   (likely + std_dev).min(1.0),
            likely,
            worst:  (likely - std_dev).max(0.0),
        }
    }
}

// ── Model ────────────────────────────────────────────────────────────────────

pub struct CashFlowModel {
    config:  CashFlowConfig,
    horizon: usize,
}

impl CashFlowModel {
    pub fn new(config: CashFlowConfig, horizon: usize) -> Self {
        Self { config, horizon }
    }
}

impl PredictionModel for CashFlowModel {
    fn name(&self) -> &'static str { "cash_flow" }

    fn predict(&self, snapshot: &DataSnapshot) -> PipelineResult<PredictionBatch> {
        Ok(PredictionBatch::CashFlow(predict_cash_flow(snapshot, &self.config, self.horizon)))
    }
}

/// Exactly `horizon` forward rows when enough months are populated, none otherwise.
pub fn predict_cash_flow(
    snapshot: &DataSnapshot,
    config: &CashFlowConfig,
    horizon: usize,
) -> Vec<CashFlowForecast> {
    let mut buckets: BTreeMap<MonthKey, MonthlyCash> = BTreeMap::new();
    for txn in &snapshot.transactions {
        let bucket = buckets.entry(txn.month()).or_default();
        bucket.revenue += txn.total_amount;
        bucket.paid += if txn.payment_status == PaymentStatus::Paid {
            txn.total_amount
        } else {
            (txn.total_amount - txn.outstanding_amount).max(0.0)
        };
    }

    if buckets.len() < config.min_months.max(2) {
        log::debug!("cash_flow: {} populated month(s), need {}", buckets.len(), config.min_months);
        return Vec::new();
    }
    let Some(last_month) = buckets.keys().next_back().copied() else {
        return Vec::new();
    };

    let revenue: Vec<f64> = buckets.values().map(|b| b.revenue).collect();
    let rates: Vec<f64> = buckets
        .values()
        .map(|b| if b.revenue != 0.0 { b.paid / b.revenue } else { 0.0 })
        .collect();

    let Some(holt) = stats::holt_linear(&revenue, config.alpha, config.beta) else {
        return Vec::new();
    };
    let smoothed_rate = stats::simple_exponential_smoothing(&rates, config.rate_alpha).unwrap_or(0.0);
    let scenarios = CollectionScenarios::new(smoothed_rate, stats::std_dev_population(&rates));
    let confidence = fit_confidence(&revenue, &holt.level, config.max_confidence);

    (1..=horizon)
        .map(|h| {
            let predicted_revenue = holt.forecast(h).max(0.0);
            CashFlowForecast {
                forecast_month:          last_month.plus(h as u32),
                predicted_revenue,
                best_case_inflow:        predicted_revenue * scenarios.best,
                most_likely_inflow:      predicted_revenue * scenarios.likely,
                worst_case_inflow:       predicted_revenue * scenarios.worst,
                collection_rate:         scenarios.likely,
                expected_delayed_amount: predicted_revenue * (1.0 - scenarios.likely),
                confidence,
                months_observed:         revenue.len(),
            }
        })
        .collect()
}

/// In-sample fit confidence. Zero when MAPE is undefined (all-zero revenue).
fn fit_confidence(actual: &[f64], smoothed: &[f64], max_confidence: f64) -> f64 {
    match stats::mean_absolute_percentage_error(actual, smoothed) {
        Some(mape) => (100.0 * (1.0 - mape)).clamp(0.0, max_confidence),
        None => 0.0,
    }
}
