//! Inventory optimizer: safety stock, reorder point and stockout risk.
//!
//! Demand is a zero-filled monthly series spanning the whole observed
//! calendar range: a month with no sales is a real lull, not a gap.
//! Lead-time demand is modelled as Normal(avg_daily × L, daily_std × √L).
//!
//! Products without an inventory record are not optimized.

use crate::{
    calendar::MonthKey,
    config::InventoryConfig,
    error::{PipelineError, PipelineResult},
    model::{PredictionBatch, PredictionModel},
    snapshot::DataSnapshot,
    stats,
    types::{EntityId, STOCKOUT_SENTINEL_DAYS},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    Low,
    Medium,
    High,
}

impl Volatility {
    pub fn from_cv(cv: f64, config: &InventoryConfig) -> Self {
        if cv > config.high_cv {
            Self::High
        } else if cv > config.medium_cv {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low    => "low",
            Self::Medium => "medium",
            Self::High   => "high",
        }
    }
}

impl FromStr for Volatility {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low"    => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high"   => Ok(Self::High),
            _ => Err(PipelineError::UnknownVariant { kind: "volatility", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryForecast {
    pub product_id:            EntityId,
    pub current_stock:         f64,
    /// Reorder point currently configured on the inventory record.
    pub current_reorder_point: f64,
    pub avg_monthly_demand:    f64,
    pub demand_std_dev:        f64,
    pub avg_daily_demand:      f64,
    pub coefficient_variation: f64,
    pub volatility:            Volatility,
    pub safety_stock:          f64,
    pub optimal_reorder_point: f64,
    /// `STOCKOUT_SENTINEL_DAYS` when there is no demand.
    pub days_until_stockout:   f64,
    pub stockout_probability:  f64,
    pub recommended_order_qty: f64,
    pub recommendation:        String,
    pub confidence:            f64,
    pub months_with_data:      usize,
}

/// Demand statistics for one product over the zero-filled series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandProfile {
    pub avg_monthly:     f64,
    pub std_dev_monthly: f64,
    pub avg_daily:       f64,
    pub std_dev_daily:   f64,
    pub cv:              f64,
}

impl DemandProfile {
    pub fn from_monthly(series: &[f64], days_per_month: f64) -> Self {
        let avg_monthly = stats::mean(series);
        let std_dev_monthly = stats::std_dev_population(series);
        Self {
            avg_monthly,
            std_dev_monthly,
            avg_daily: avg_monthly / days_per_month,
            std_dev_daily: std_dev_monthly / days_per_month.sqrt(),
            cv: if avg_monthly != 0.0 { std_dev_monthly / avg_monthly } else { 0.0 },
        }
    }
}

// ── Model ────────────────────────────────────────────────────────────────────

pub struct InventoryModel {
    config: InventoryConfig,
}

impl InventoryModel {
    pub fn new(config: InventoryConfig) -> Self {
        Self { config }
    }
}

impl PredictionModel for InventoryModel {
    fn name(&self) -> &'static str { "inventory" }

    fn predict(&self, snapshot: &DataSnapshot) -> PipelineResult<PredictionBatch> {
        Ok(PredictionBatch::Inventory(optimize_inventory(snapshot, &self.config)))
    }
}

pub fn optimize_inventory(snapshot: &DataSnapshot, config: &InventoryConfig) -> Vec<InventoryForecast> {
    let observed = snapshot.observed_months();
    let (Some(first), Some(last)) = (observed.first().copied(), observed.last().copied()) else {
        return Vec::new();
    };
    let calendar = MonthKey::range_inclusive(first, last);
    if calendar.len() < config.min_series_months {
        log::debug!("inventory: {} month(s) of history, need {}", calendar.len(), config.min_series_months);
        return Vec::new();
    }
    let slot: HashMap<MonthKey, usize> = calendar.iter().enumerate().map(|(i, m)| (*m, i)).collect();

    let mut demand: HashMap<&str, Vec<f64>> = HashMap::new();
    let mut active_months: HashMap<&str, BTreeSet<MonthKey>> = HashMap::new();
    for txn in &snapshot.transactions {
        let month = txn.month();
        demand
            .entry(txn.product_id.as_str())
            .or_insert_with(|| vec![0.0; calendar.len()])[slot[&month]] += txn.quantity;
        active_months.entry(txn.product_id.as_str()).or_default().insert(month);
    }

    let empty_series = vec![0.0; calendar.len()];
    let mut out = Vec::new();
    for product in &snapshot.products {
        let Some(record) = snapshot.inventory_for(&product.product_id) else {
            log::debug!("inventory: no stock record for {}", product.product_id);
            continue;
        };
        let series = demand.get(product.product_id.as_str()).unwrap_or(&empty_series);
        let months_with_data = active_months
            .get(product.product_id.as_str())
            .map_or(0, BTreeSet::len);

        out.push(plan_product(
            &product.product_id,
            record.current_stock,
            record.reorder_point,
            DemandProfile::from_monthly(series, config.days_per_month),
            months_with_data,
            config,
        ));
    }
    out
}

fn plan_product(
    product_id: &str,
    stock: f64,
    current_reorder_point: f64,
    profile: DemandProfile,
    months_with_data: usize,
    config: &InventoryConfig,
) -> InventoryForecast {
    let lead = config.lead_time_days;
    let safety_stock = config.service_level_z * profile.std_dev_daily * lead.sqrt();
    let reorder_point = profile.avg_daily * lead + safety_stock;

    let days_until_stockout = if profile.avg_daily > 0.0 {
        stock / profile.avg_daily
    } else {
        STOCKOUT_SENTINEL_DAYS
    };

    let stockout_probability = stockout_probability(stock, &profile, lead);
    let recommended_order_qty =
        (reorder_point + profile.avg_daily * config.order_cover_days - stock).max(0.0).ceil();
    let confidence = (config.confidence_base + config.confidence_per_month * months_with_data as f64)
        .min(config.confidence_cap);

    let recommendation = recommend(
        stock,
        reorder_point,
        days_until_stockout,
        recommended_order_qty,
        &profile,
        config,
    );

    InventoryForecast {
        product_id: product_id.to_string(),
        current_stock: stock,
        current_reorder_point,
        avg_monthly_demand: profile.avg_monthly,
        demand_std_dev: profile.std_dev_monthly,
        avg_daily_demand: profile.avg_daily,
        coefficient_variation: profile.cv,
        volatility: Volatility::from_cv(profile.cv, config),
        safety_stock,
        optimal_reorder_point: reorder_point,
        days_until_stockout,
        stockout_probability,
        recommended_order_qty,
        recommendation,
        confidence,
        months_with_data,
    }
}

/// P(lead-time demand > stock). Certain with no stock; impossible with
/// stock and no demand variance.
pub fn stockout_probability(stock: f64, profile: &DemandProfile, lead_time_days: f64) -> f64 {
    if stock <= 0.0 {
        return 1.0;
    }
    let mean_lt = profile.avg_daily * lead_time_days;
    let std_lt = profile.std_dev_daily * lead_time_days.sqrt();
    if std_lt <= 0.0 {
        return 0.0;
    }
    let z = (stock - mean_lt) / std_lt;
    (1.0 - stats::normal_cdf(z)).clamp(0.0, 1.0)
}

fn recommend(
    stock: f64,
    reorder_point: f64,
    days_until_stockout: f64,
    order_qty: f64,
    profile: &DemandProfile,
    config: &InventoryConfig,
) -> String {
    if stock <= 0.0 {
        return format!("CRITICAL: out of stock. Reorder {order_qty:.0} units immediately.");
    }
    if stock < reorder_point {
        return format!(
            "URGENT: stock ({stock:.0}) is below the reorder point ({reorder_point:.0}). \
             Order {order_qty:.0} units now."
        );
    }

    let days_to_reorder = if profile.avg_daily > 0.0 {
        ((stock - reorder_point) / profile.avg_daily).max(0.0)
    } else {
        STOCKOUT_SENTINEL_DAYS
    };

    if days_until_stockout < config.plan_reorder_days {
        return format!(
            "Plan a reorder within {days_to_reorder:.0} days; current stock covers about \
             {days_until_stockout:.0} days."
        );
    }
    if days_until_stockout > config.overstock_days {
        let reduction = (stock - profile.avg_daily * config.overstock_target_days).max(0.0);
        return format!(
            "Overstocked: about {days_until_stockout:.0} days of cover. Consider reducing \
             stock by {reduction:.0} units."
        );
    }
    format!("Stock healthy. Next reorder in about {days_to_reorder:.0} days.")
}
