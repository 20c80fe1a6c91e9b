use super::{json_column, parsed_column, PipelineStore};
use crate::{
    cash_flow_model::CashFlowForecast,
    error::PipelineResult,
    inventory_model::InventoryForecast,
    model::PredictionBatch,
    risk_scoring_model::CustomerRiskScore,
    sales_forecast_model::SalesForecast,
};
use rusqlite::params;

impl PipelineStore {
    /// Write one model's batch under `run_id`. The batch lands atomically:
    /// either every row is written or none is.
    pub fn insert_batch(&self, run_id: &str, batch: &PredictionBatch) -> PipelineResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        match batch {
            PredictionBatch::Sales(rows) => {
                for r in rows {
                    self.insert_sales_forecast(run_id, r)?;
                }
            }
            PredictionBatch::Risk(rows) => {
                for r in rows {
                    self.insert_risk_score(run_id, r)?;
                }
            }
            PredictionBatch::CashFlow(rows) => {
                for r in rows {
                    self.insert_cash_flow_forecast(run_id, r)?;
                }
            }
            PredictionBatch::Inventory(rows) => {
                for r in rows {
                    self.insert_inventory_forecast(run_id, r)?;
                }
            }
        }
        tx.commit()?;
        Ok(batch.len())
    }

    /// Rows written under `run_id` across all four prediction tables.
    pub fn prediction_count(&self, run_id: &str) -> PipelineResult<i64> {
        let count = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM sales_forecast      WHERE run_id = ?1)
                  + (SELECT COUNT(*) FROM customer_risk_score WHERE run_id = ?1)
                  + (SELECT COUNT(*) FROM cash_flow_forecast  WHERE run_id = ?1)
                  + (SELECT COUNT(*) FROM inventory_forecast  WHERE run_id = ?1)",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Sales forecast ─────────────────────────────────────────────

    pub fn insert_sales_forecast(&self, run_id: &str, r: &SalesForecast) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO sales_forecast (
                run_id, product_id, forecast_month, predicted_quantity, predicted_revenue,
                confidence, trend, growth_rate, slope, intercept, months_observed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run_id,
                &r.product_id,
                r.forecast_month.to_string(),
                r.predicted_quantity,
                r.predicted_revenue,
                r.confidence,
                r.trend.as_str(),
                r.growth_rate,
                r.slope,
                r.intercept,
                r.months_observed as i64,
            ],
        )?;
        Ok(())
    }

    pub fn sales_forecasts_for_run(&self, run_id: &str) -> PipelineResult<Vec<SalesForecast>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, forecast_month, predicted_quantity, predicted_revenue,
                    confidence, trend, growth_rate, slope, intercept, months_observed
             FROM sales_forecast WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(SalesForecast {
                product_id:         row.get(0)?,
                forecast_month:     parsed_column(row, 1)?,
                predicted_quantity: row.get(2)?,
                predicted_revenue:  row.get(3)?,
                confidence:         row.get(4)?,
                trend:              parsed_column(row, 5)?,
                growth_rate:        row.get(6)?,
                slope:              row.get(7)?,
                intercept:          row.get(8)?,
                months_observed:    row.get::<_, i64>(9)? as usize,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Customer risk score ────────────────────────────────────────

    pub fn insert_risk_score(&self, run_id: &str, r: &CustomerRiskScore) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO customer_risk_score (
                run_id, customer_id, risk_score, risk_level, expected_delay_days,
                transaction_count, overdue_count, raw_features, normalized_features,
                primary_factor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                &r.customer_id,
                r.risk_score,
                r.risk_level.as_str(),
                r.expected_delay_days,
                r.transaction_count as i64,
                r.overdue_count as i64,
                serde_json::to_string(&r.raw_features)?,
                serde_json::to_string(&r.normalized_features)?,
                &r.primary_factor,
            ],
        )?;
        Ok(())
    }

    pub fn risk_scores_for_run(&self, run_id: &str) -> PipelineResult<Vec<CustomerRiskScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, risk_score, risk_level, expected_delay_days, transaction_count,
                    overdue_count, raw_features, normalized_features, primary_factor
             FROM customer_risk_score WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(CustomerRiskScore {
                customer_id:         row.get(0)?,
                risk_score:          row.get(1)?,
                risk_level:          parsed_column(row, 2)?,
                expected_delay_days: row.get(3)?,
                transaction_count:   row.get::<_, i64>(4)? as usize,
                overdue_count:       row.get::<_, i64>(5)? as usize,
                raw_features:        json_column(row, 6)?,
                normalized_features: json_column(row, 7)?,
                primary_factor:      row.get(8)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Cash flow forecast ─────────────────────────────────────────

    pub fn insert_cash_flow_forecast(&self, run_id: &str, r: &CashFlowForecast) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO cash_flow_forecast (
                run_id, forecast_month, predicted_revenue, best_case_inflow,
                most_likely_inflow, worst_case_inflow, collection_rate,
                expected_delayed_amount, confidence, months_observed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                r.forecast_month.to_string(),
                r.predicted_revenue,
                r.best_case_inflow,
                r.most_likely_inflow,
                r.worst_case_inflow,
                r.collection_rate,
                r.expected_delayed_amount,
                r.confidence,
                r.months_observed as i64,
            ],
        )?;
        Ok(())
    }

    pub fn cash_flow_forecasts_for_run(&self, run_id: &str) -> PipelineResult<Vec<CashFlowForecast>> {
        let mut stmt = self.conn.prepare(
            "SELECT forecast_month, predicted_revenue, best_case_inflow, most_likely_inflow,
                    worst_case_inflow, collection_rate, expected_delayed_amount, confidence,
                    months_observed
             FROM cash_flow_forecast WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(CashFlowForecast {
                forecast_month:          parsed_column(row, 0)?,
                predicted_revenue:       row.get(1)?,
                best_case_inflow:        row.get(2)?,
                most_likely_inflow:      row.get(3)?,
                worst_case_inflow:       row.get(4)?,
                collection_rate:         row.get(5)?,
                expected_delayed_amount: row.get(6)?,
                confidence:              row.get(7)?,
                months_observed:         row.get::<_, i64>(8)? as usize,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Inventory forecast ─────────────────────────────────────────

    pub fn insert_inventory_forecast(&self, run_id: &str, r: &InventoryForecast) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO inventory_forecast (
                run_id, product_id, current_stock, current_reorder_point, avg_monthly_demand,
                demand_std_dev, avg_daily_demand, coefficient_variation, volatility,
                safety_stock, optimal_reorder_point, days_until_stockout,
                stockout_probability, recommended_order_qty, recommendation, confidence,
                months_with_data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                run_id,
                &r.product_id,
                r.current_stock,
                r.current_reorder_point,
                r.avg_monthly_demand,
                r.demand_std_dev,
                r.avg_daily_demand,
                r.coefficient_variation,
                r.volatility.as_str(),
                r.safety_stock,
                r.optimal_reorder_point,
                r.days_until_stockout,
                r.stockout_probability,
                r.recommended_order_qty,
                &r.recommendation,
                r.confidence,
                r.months_with_data as i64,
            ],
        )?;
        Ok(())
    }

    pub fn inventory_forecasts_for_run(&self, run_id: &str) -> PipelineResult<Vec<InventoryForecast>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, current_stock, current_reorder_point, avg_monthly_demand,
                    demand_std_dev, avg_daily_demand, coefficient_variation, volatility,
                    safety_stock, optimal_reorder_point, days_until_stockout,
                    stockout_probability, recommended_order_qty, recommendation, confidence,
                    months_with_data
             FROM inventory_forecast WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(InventoryForecast {
                product_id:            row.get(0)?,
                current_stock:         row.get(1)?,
                current_reorder_point: row.get(2)?,
                avg_monthly_demand:    row.get(3)?,
                demand_std_dev:        row.get(4)?,
                avg_daily_demand:      row.get(5)?,
                coefficient_variation: row.get(6)?,
                volatility:            parsed_column(row, 7)?,
                safety_stock:          row.get(8)?,
                optimal_reorder_point: row.get(9)?,
                days_until_stockout:   row.get(10)?,
                stockout_probability:  row.get(11)?,
                recommended_order_qty: row.get(12)?,
                recommendation:        row.get(13)?,
                confidence:            row.get(14)?,
                months_with_data:      row.get::<_, i64>(15)? as usize,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
