//! Sales forecaster: per-product monthly demand regression.
//!
//! For each catalog product with enough monthly history:
//!   1. Sum quantity and revenue per calendar month.
//!   2. Fit OLS of quantity on the *global* month index, so every product
//!      shares one calendar axis.
//!   3. Extrapolate the months following the last observed month.
//!
//! R² of the fit is the row confidence.

use crate::{
    calendar::MonthKey,
    config::SalesForecastConfig,
    error::PipelineResult,
    model::{PredictionBatch, PredictionModel},
    snapshot::DataSnapshot,
    stats,
    types::EntityId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            Self::Up
        } else if slope < 0.0 {
            Self::Down
        } else {
            Self::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up     => "up",
            Self::Down   => "down",
            Self::Stable => "stable",
        }
    }
}

impl FromStr for Trend {
    type Err = crate::error::PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up"     => Ok(Self::Up),
            "down"   => Ok(Self::Down),
            "stable" => Ok(Self::Stable),
            _ => Err(crate::error::PipelineError::UnknownVariant {
                kind:  "trend",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesForecast {
    pub product_id:         EntityId,
    pub forecast_month:     MonthKey,
    pub predicted_quantity: f64,
    pub predicted_revenue:  f64,
    /// R² of the regression, in [0, 1].
    pub confidence:         f64,
    pub trend:              Trend,
    pub growth_rate:        f64,
    pub slope:              f64,
    pub intercept:          f64,
    pub months_observed:    usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct MonthlySales {
    quantity: f64,
    revenue:  f64,
}

// ── Model ────────────────────────────────────────────────────────────────────

pub struct SalesForecastModel {
    config:  SalesForecastConfig,
    horizon: usize,
}

impl SalesForecastModel {
    pub fn new(config: SalesForecastConfig, horizon: usize) -> Self {
        Self { config, horizon }
    }
}

impl PredictionModel for SalesForecastModel {
    fn name(&self) -> &'static str { "sales_forecast" }

    fn predict(&self, snapshot: &DataSnapshot) -> PipelineResult<PredictionBatch> {
        Ok(PredictionBatch::Sales(forecast_sales(snapshot, &self.config, self.horizon)))
    }
}

/// Three-month (or `horizon`) demand and revenue forecast for every eligible product.
pub fn forecast_sales(
    snapshot: &DataSnapshot,
    config: &SalesForecastConfig,
    horizon: usize,
) -> Vec<SalesForecast> {
    let months = snapshot.observed_months();
    let Some(last_month) = months.last().copied() else {
        return Vec::new();
    };
    let month_index: HashMap<MonthKey, usize> =
        months.iter().enumerate().map(|(i, m)| (*m, i)).collect();

    let mut per_product: HashMap<&str, BTreeMap<MonthKey, MonthlySales>> = HashMap::new();
    for txn in &snapshot.transactions {
        let bucket = per_product
            .entry(txn.product_id.as_str())
            .or_default()
            .entry(txn.month())
            .or_default();
        bucket.quantity += txn.quantity;
        bucket.revenue += txn.total_amount;
    }

    let mut out = Vec::new();
    for product in &snapshot.products {
        let Some(history) = per_product.get(product.product_id.as_str()) else {
            continue;
        };
        if history.len() < config.min_months {
            log::debug!(
                "sales_forecast: skipping {} ({} month(s) of history)",
                product.product_id,
                history.len()
            );
            continue;
        }

        let xs: Vec<f64> = history.keys().map(|m| month_index[m] as f64).collect();
        let ys: Vec<f64> = history.values().map(|s| s.quantity).collect();
        let Some(fit) = stats::linear_regression(&xs, &ys) else {
            continue;
        };

        let fitted: Vec<f64> = xs.iter().map(|x| fit.predict(*x)).collect();
        let confidence = stats::r_squared(&ys, &fitted).max(0.0);
        let avg_price = average_unit_price(history, config.price_window_months);
        let mean_quantity = stats::mean(&ys);
        let growth_rate = if mean_quantity != 0.0 { fit.slope / mean_quantity } else { 0.0 };
        let trend = Trend::from_slope(fit.slope);

        for step in 0..horizon {
            let x = (months.len() + step) as f64;
            let predicted_quantity = fit.predict(x).max(0.0);
            out.push(SalesForecast {
                product_id:         product.product_id.clone(),
                forecast_month:     last_month.plus(step as u32 + 1),
                predicted_quantity,
                predicted_revenue:  predicted_quantity * avg_price,
                confidence,
                trend,
                growth_rate,
                slope:              fit.slope,
                intercept:          fit.intercept,
                months_observed:    history.len(),
            });
        }
    }
    out
}

/// Mean revenue/quantity over the most recent `window` months, ignoring
/// months with no quantity. Zero when none qualify.
fn average_unit_price(history: &BTreeMap<MonthKey, MonthlySales>, window: usize) -> f64 {
    let prices: Vec<f64> = history
        .values()
        .rev()
        .take(window)
        .filter(|s| s.quantity > 0.0)
        .map(|s| s.revenue / s.quantity)
        .collect();
    stats::mean(&prices)
}
