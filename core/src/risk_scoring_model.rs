//! Risk scorer: per-customer payment risk on a 0–100 scale.
//!
//! This model:
//!   1. Derives six raw payment-behaviour features per customer.
//!   2. Min-max normalizes each feature across the scored population.
//!   3. Combines them with fixed weights and squashes through a sigmoid.
//!   4. Classifies the score into Low / Medium / High.
//!
//! Customers with no transactions are not scored.

use crate::{
    config::RiskScoringConfig,
    error::{PipelineError, PipelineResult},
    model::{PredictionBatch, PredictionModel},
    snapshot::{DataSnapshot, PaymentStatus, Transaction},
    stats,
    types::EntityId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const FEATURE_COUNT: usize = 6;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "overdue_ratio",
    "outstanding_ratio",
    "avg_payment_delay",
    "credit_utilization",
    "recency_score",
    "partial_payment_ratio",
];

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskFeatures {
    pub overdue_ratio:         f64,
    pub outstanding_ratio:     f64,
    pub avg_payment_delay:     f64,
    pub credit_utilization:    f64,
    pub recency_score:         f64,
    pub partial_payment_ratio: f64,
}

impl RiskFeatures {
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.overdue_ratio,
            self.outstanding_ratio,
            self.avg_payment_delay,
            self.credit_utilization,
            self.recency_score,
            self.partial_payment_ratio,
        ]
    }

    pub fn from_array(v: [f64; FEATURE_COUNT]) -> Self {
        Self {
            overdue_ratio:         v[0],
            outstanding_ratio:     v[1],
            avg_payment_delay:     v[2],
            credit_utilization:    v[3],
            recency_score:         v[4],
            partial_payment_ratio: v[5],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bands are inclusive on their lower bound.
    pub fn from_score(score: f64, config: &RiskScoringConfig) -> Self {
        if score >= config.high_threshold {
            Self::High
        } else if score >= config.medium_threshold {
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

impl FromStr for RiskLevel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low"    => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high"   => Ok(Self::High),
            _ => Err(PipelineError::UnknownVariant { kind: "risk level", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRiskScore {
    pub customer_id:         EntityId,
    pub risk_score:          f64,
    pub risk_level:          RiskLevel,
    pub expected_delay_days: f64,
    pub transaction_count:   usize,
    pub overdue_count:       usize,
    pub raw_features:        RiskFeatures,
    /// Each feature scaled to [0, 1] across this run's population.
    pub normalized_features: RiskFeatures,
    /// Feature with the largest weighted contribution, or "none".
    pub primary_factor:      String,
}

// ── Model ────────────────────────────────────────────────────────────────────

pub struct RiskScoringModel {
    config: RiskScoringConfig,
}

impl RiskScoringModel {
    pub fn new(config: RiskScoringConfig) -> Self {
        Self { config }
    }
}

impl PredictionModel for RiskScoringModel {
    fn name(&self) -> &'static str { "risk_scoring" }

    fn predict(&self, snapshot: &DataSnapshot) -> PipelineResult<PredictionBatch> {
        Ok(PredictionBatch::Risk(score_customers(snapshot, &self.config)))
    }
}

struct RawScore<'a> {
    customer_id:   &'a str,
    features:      RiskFeatures,
    txn_count:     usize,
    overdue_count: usize,
}

/// Score every customer that has at least one transaction.
pub fn score_customers(snapshot: &DataSnapshot, config: &RiskScoringConfig) -> Vec<CustomerRiskScore> {
    let by_customer = snapshot.transactions_by_customer();

    let raw: Vec<RawScore<'_>> = snapshot
        .customers
        .iter()
        .filter_map(|customer| {
            let txns = by_customer.get(customer.customer_id.as_str())?;
            if txns.is_empty() {
                return None;
            }
            let overdue_count = txns
                .iter()
                .filter(|t| t.payment_status == PaymentStatus::Overdue)
                .count();
            Some(RawScore {
                customer_id: customer.customer_id.as_str(),
                features: raw_features(txns, customer.credit_limit, snapshot.as_of, config),
                txn_count: txns.len(),
                overdue_count,
            })
        })
        .collect();

    if raw.is_empty() {
        return Vec::new();
    }

    let (mins, maxs) = feature_bounds(&raw);
    let weights = config.weights.as_array();

    raw.iter()
        .map(|r| {
            let values = r.features.as_array();
            let mut normalized = [0.0; FEATURE_COUNT];
            for i in 0..FEATURE_COUNT {
                let range = maxs[i] - mins[i];
                normalized[i] = if range > 0.0 {
                    ((values[i] - mins[i]) / range).clamp(0.0, 1.0)
                } else {
                    0.0
                };
            }

            let contributions: Vec<f64> =
                weights.iter().zip(normalized.iter()).map(|(w, n)| w * n).collect();
            let weighted_sum: f64 = contributions.iter().sum();
            let probability =
                stats::sigmoid((weighted_sum - config.sigmoid_center) * config.sigmoid_steepness);
            let risk_score = (probability * 100.0).clamp(0.0, 100.0);

            let expected_delay_days = if r.overdue_count > 0 {
                r.features.avg_payment_delay * (1.0 + probability)
            } else {
                r.features.avg_payment_delay
            };

            CustomerRiskScore {
                customer_id: r.customer_id.to_string(),
                risk_score,
                risk_level: RiskLevel::from_score(risk_score, config),
                expected_delay_days,
                transaction_count: r.txn_count,
                overdue_count: r.overdue_count,
                raw_features: r.features,
                normalized_features: RiskFeatures::from_array(normalized),
                primary_factor: primary_factor(&contributions).to_string(),
            }
        })
        .collect()
}

fn raw_features(
    txns: &[&Transaction],
    credit_limit: Option<f64>,
    as_of: NaiveDate,
    config: &RiskScoringConfig,
) -> RiskFeatures {
    let count = txns.len() as f64;
    let overdue = txns.iter().filter(|t| t.payment_status == PaymentStatus::Overdue).count();
    let partial = txns.iter().filter(|t| t.payment_status == PaymentStatus::Partial).count();
    let outstanding: f64 = txns.iter().map(|t| t.outstanding_amount).sum();
    let revenue: f64 = txns.iter().map(|t| t.total_amount).sum();

    let delays: Vec<f64> = txns
        .iter()
        .filter_map(|t| match (t.received_date, t.due_date) {
            (Some(received), Some(due)) => Some((received - due).num_days().max(0) as f64),
            _ => None,
        })
        .collect();

    let limit = credit_limit.filter(|l| *l > 0.0).unwrap_or(1.0);

    let days_since_last = txns
        .iter()
        .map(|t| t.date)
        .max()
        .map(|last| (as_of - last).num_days().max(0) as f64)
        .unwrap_or(0.0);

    RiskFeatures {
        overdue_ratio:         overdue as f64 / count,
        outstanding_ratio:     if revenue != 0.0 { outstanding / revenue } else { 0.0 },
        avg_payment_delay:     stats::mean(&delays),
        credit_utilization:    (outstanding / limit).min(1.0),
        recency_score:         (days_since_last / config.recency_horizon_days).min(1.0),
        partial_payment_ratio: partial as f64 / count,
    }
}

fn feature_bounds(raw: &[RawScore<'_>]) -> ([f64; FEATURE_COUNT], [f64; FEATURE_COUNT]) {
    let mut mins = [f64::INFINITY; FEATURE_COUNT];
    let mut maxs = [f64::NEG_INFINITY; FEATURE_COUNT];
    for r in raw {
        for (i, v) in r.features.as_array().iter().enumerate() {
            mins[i] = mins[i].min(*v);
            maxs[i] = maxs[i].max(*v);
        }
    }
    (mins, maxs)
}

fn primary_factor(contributions: &[f64]) -> &'static str {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in contributions.iter().enumerate() {
        if *c > 0.0 && best.map_or(true, |(_, b)| *c > b) {
            best = Some((i, *c));
        }
    }
    best.map(|(i, _)| FEATURE_NAMES[i]).unwrap_or("none")
}
