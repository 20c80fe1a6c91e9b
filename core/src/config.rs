use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

// ── Sales forecaster ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SalesForecastConfig {
    /// Products with fewer distinct months of history are skipped.
    pub min_months: usize,
    /// Most recent months used to average the unit price.
    pub price_window_months: usize,
}

impl Default for SalesForecastConfig {
    fn default() -> Self {
        Self { min_months: 3, price_window_months: 3 }
    }
}

// ── Risk scorer ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskWeights {
    pub overdue_ratio:         f64,
    pub outstanding_ratio:     f64,
    pub avg_payment_delay:     f64,
    pub credit_utilization:    f64,
    pub recency_score:         f64,
    pub partial_payment_ratio: f64,
}

impl RiskWeights {
    /// Weights in feature order (see `risk_scoring_model::FEATURE_NAMES`).
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.overdue_ratio,
            self.outstanding_ratio,
            self.avg_payment_delay,
            self.credit_utilization,
            self.recency_score,
            self.partial_payment_ratio,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            overdue_ratio:         0.25,
            outstanding_ratio:     0.20,
            avg_payment_delay:     0.20,
            credit_utilization:    0.15,
            recency_score:         0.10,
            partial_payment_ratio: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskScoringConfig {
    pub weights:              RiskWeights,
    /// Weighted sum that maps to a 50/100 score.
    pub sigmoid_center:       f64,
    pub sigmoid_steepness:    f64,
    pub high_threshold:       f64,
    pub medium_threshold:     f64,
    /// Days of inactivity at which the recency feature saturates.
    pub recency_horizon_days: f64,
}

impl Default for RiskScoringConfig {
    fn default() -> Self {
        Self {
            weights:              RiskWeights::default(),
            sigmoid_center:       0.5,
            sigmoid_steepness:    6.0,
            high_threshold:       60.0,
            medium_threshold:     30.0,
            recency_horizon_days: 180.0,
        }
    }
}

// ── Cash flow predictor ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CashFlowConfig {
    pub min_months:      usize,
    /// Holt level smoothing.
    pub alpha:           f64,
    /// Holt trend smoothing.
    pub beta:            f64,
    /// Smoothing applied to the monthly collection rate.
    pub rate_alpha:      f64,
    pub max_confidence:  f64,
}

impl Default for CashFlowConfig {
    fn default() -> Self {
        Self {
            min_months:     3,
            alpha:          0.3,
            beta:           0.1,
            rate_alpha:     0.3,
            max_confidence: 99.0,
        }
    }
}

// ── Inventory optimizer ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InventoryConfig {
    pub min_series_months:     usize,
    pub lead_time_days:        f64,
    /// z-score of the target service level (1.645 ≈ 95%).
    pub service_level_z:       f64,
    pub days_per_month:        f64,
    pub high_cv:               f64,
    pub medium_cv:             f64,
    pub plan_reorder_days:     f64,
    pub overstock_days:        f64,
    /// Demand cover, beyond the reorder point, that a recommended order buys.
    pub order_cover_days:      f64,
    /// Cover an overstocked product is trimmed back to.
    pub overstock_target_days: f64,
    pub confidence_base:       f64,
    pub confidence_per_month:  f64,
    pub confidence_cap:        f64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            min_series_months:     2,
            lead_time_days:        7.0,
            service_level_z:       1.645,
            days_per_month:        30.0,
            high_cv:               0.5,
            medium_cv:             0.25,
            plan_reorder_days:     30.0,
            overstock_days:        120.0,
            order_cover_days:      30.0,
            overstock_target_days: 90.0,
            confidence_base:       50.0,
            confidence_per_month:  3.0,
            confidence_cap:        95.0,
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub model_version:  String,
    /// Forward months produced by the sales and cash-flow models.
    pub horizon_months: usize,
    pub sales:          SalesForecastConfig,
    pub risk:           RiskScoringConfig,
    pub cash_flow:      CashFlowConfig,
    pub inventory:      InventoryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_version:  "stats-v1".into(),
            horizon_months: 3,
            sales:          SalesForecastConfig::default(),
            risk:           RiskScoringConfig::default(),
            cash_flow:      CashFlowConfig::default(),
            inventory:      InventoryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from `<data_dir>/pipeline.json`. Missing sections fall back to defaults.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/pipeline.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load when `<data_dir>/pipeline.json` exists, defaults otherwise.
    pub fn load_or_default(data_dir: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(&format!("{data_dir}/pipeline.json")).exists() {
            Self::load(data_dir)
        } else {
            log::info!("no pipeline.json under {data_dir}; using built-in defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let weight_sum = self.risk.weights.sum();
        if (weight_sum - 1.0).abs() > 1e-9 {
            return Err(PipelineError::InvalidConfig(format!(
                "risk weights must sum to 1.0, got {weight_sum}"
            )));
        }
        if self.risk.weights.as_array().iter().any(|w| *w < 0.0) {
            return Err(PipelineError::InvalidConfig("risk weights must be non-negative".into()));
        }
        if self.risk.medium_threshold > self.risk.high_threshold {
            return Err(PipelineError::InvalidConfig(
                "medium risk threshold must not exceed the high threshold".into(),
            ));
        }
        for (name, value) in [
            ("cash_flow.alpha", self.cash_flow.alpha),
            ("cash_flow.beta", self.cash_flow.beta),
            ("cash_flow.rate_alpha", self.cash_flow.rate_alpha),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.cash_flow.min_months < 2 {
            return Err(PipelineError::InvalidConfig(
                "cash_flow.min_months must be at least 2 to seed a trend".into(),
            ));
        }
        if self.inventory.lead_time_days <= 0.0 || self.inventory.days_per_month <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "inventory lead time and days per month must be positive".into(),
            ));
        }
        if self.horizon_months == 0 {
            return Err(PipelineError::InvalidConfig("horizon_months must be at least 1".into()));
        }
        Ok(())
    }
}
