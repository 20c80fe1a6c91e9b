//! Risk scorer: normalized weighted sigmoid over payment behaviour.

use chrono::NaiveDate;
use insight_core::{
    calendar::parse_date,
    config::{RiskScoringConfig, RiskWeights},
    demo,
    risk_scoring_model::{score_customers, RiskLevel},
    snapshot::{Customer, DataSnapshot, PaymentStatus, Transaction},
    store::PipelineStore,
};

fn date(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn customer(id: &str, credit_limit: Option<f64>) -> Customer {
    Customer {
        customer_id: id.into(),
        name:        format!("Customer {id}"),
        credit_limit,
        region:      Some("North".into()),
    }
}

#[allow(clippy::too_many_arguments)]
fn invoice(
    id: &str,
    customer_id: &str,
    day: &str,
    total: f64,
    status: PaymentStatus,
    due: &str,
    received: Option<&str>,
    outstanding: f64,
) -> Transaction {
    Transaction {
        transaction_id:     id.into(),
        product_id:         "p-1".into(),
        customer_id:        customer_id.into(),
        date:               date(day),
        quantity:           1.0,
        unit_price:         total,
        total_amount:       total,
        payment_status:     status,
        due_date:           Some(date(due)),
        received_date:      received.map(date),
        outstanding_amount: outstanding,
    }
}

/// c-good pays on time and bought recently; c-bad is late, partial,
/// overdue and long inactive.
fn good_and_bad() -> DataSnapshot {
    DataSnapshot {
        as_of: date("2024-06-30"),
        customers: vec![customer("c-good", Some(10_000.0)), customer("c-bad", Some(1_000.0))],
        transactions: vec![
            invoice("t-1", "c-good", "2024-06-01", 500.0, PaymentStatus::Paid, "2024-07-01", Some("2024-06-20"), 0.0),
            invoice("t-2", "c-good", "2024-06-20", 800.0, PaymentStatus::Paid, "2024-07-20", Some("2024-06-25"), 0.0),
            invoice("t-3", "c-bad", "2023-10-01", 900.0, PaymentStatus::Overdue, "2023-10-31", None, 900.0),
            invoice("t-4", "c-bad", "2023-11-01", 600.0, PaymentStatus::Partial, "2023-12-01", Some("2024-01-30"), 300.0),
            invoice("t-5", "c-bad", "2023-12-01", 400.0, PaymentStatus::Paid, "2023-12-31", Some("2024-02-29"), 0.0),
        ],
        ..Default::default()
    }
}

fn score_for<'a>(
    rows: &'a [insight_core::risk_scoring_model::CustomerRiskScore],
    id: &str,
) -> &'a insight_core::risk_scoring_model::CustomerRiskScore {
    rows.iter().find(|r| r.customer_id == id).unwrap_or_else(|| panic!("no score for {id}"))
}

#[test]
fn clean_recent_customer_scores_near_zero() {
    let rows = score_customers(&good_and_bad(), &RiskScoringConfig::default());
    let good = score_for(&rows, "c-good");

    assert!(good.risk_score < 5.0, "Expected near-zero score, got {}", good.risk_score);
    assert_eq!(good.risk_level, RiskLevel::Low);
    assert_eq!(good.primary_factor, "none");
    assert_eq!(good.overdue_count, 0);
    assert_eq!(good.expected_delay_days, 0.0);
}

#[test]
fn worst_customer_on_every_feature_is_high_risk() {
    let rows = score_customers(&good_and_bad(), &RiskScoringConfig::default());
    let bad = score_for(&rows, "c-bad");

    // Every normalized feature is 1, so the weighted sum is 1 and the
    // score is 100 × sigmoid(3).
    let expected = 100.0 / (1.0 + (-3.0f64).exp());
    assert!((bad.risk_score - expected).abs() < 1e-9, "score {}", bad.risk_score);
    assert_eq!(bad.risk_level, RiskLevel::High);
    assert_eq!(bad.primary_factor, "overdue_ratio");
    assert_eq!(bad.transaction_count, 3);
    assert_eq!(bad.overdue_count, 1);
}

#[test]
fn raw_features_follow_payment_history() {
    let rows = score_customers(&good_and_bad(), &RiskScoringConfig::default());
    let f = score_for(&rows, "c-bad").raw_features;

    assert!((f.overdue_ratio - 1.0 / 3.0).abs() < 1e-12);
    assert!((f.partial_payment_ratio - 1.0 / 3.0).abs() < 1e-12);
    assert!((f.outstanding_ratio - 1200.0 / 1900.0).abs() < 1e-12);
    // Delays: 60 days (partial) and 60 days (late paid).
    assert!((f.avg_payment_delay - 60.0).abs() < 1e-12, "delay {}", f.avg_payment_delay);
    // 1200 outstanding against a 1000 limit caps at 1.
    assert_eq!(f.credit_utilization, 1.0);
    // Last purchase 2023-12-01, 212 days before as_of, beyond the 180-day horizon.
    assert_eq!(f.recency_score, 1.0);
}

#[test]
fn overdue_customers_get_inflated_expected_delay() {
    let rows = score_customers(&good_and_bad(), &RiskScoringConfig::default());
    let bad = score_for(&rows, "c-bad");
    let p = bad.risk_score / 100.0;
    assert!((bad.expected_delay_days - 60.0 * (1.0 + p)).abs() < 1e-9);
}

#[test]
fn single_customer_normalizes_to_zero() {
    let mut snap = good_and_bad();
    snap.customers.retain(|c| c.customer_id == "c-bad");
    snap.transactions.retain(|t| t.customer_id == "c-bad");

    let rows = score_customers(&snap, &RiskScoringConfig::default());
    assert_eq!(rows.len(), 1);
    assert!(rows[0].normalized_features.as_array().iter().all(|v| *v == 0.0));
    assert_eq!(rows[0].risk_level, RiskLevel::Low);
}

#[test]
fn customers_without_transactions_are_not_scored() {
    let mut snap = good_and_bad();
    snap.customers.push(customer("c-idle", None));
    let rows = score_customers(&snap, &RiskScoringConfig::default());
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.customer_id != "c-idle"));
}

#[test]
fn missing_credit_limit_defaults_to_one() {
    let snap = DataSnapshot {
        as_of: date("2024-06-30"),
        customers: vec![customer("c-1", None)],
        transactions: vec![invoice(
            "t-1", "c-1", "2024-06-01", 50.0, PaymentStatus::Pending, "2024-07-01", None, 0.5,
        )],
        ..Default::default()
    };
    let rows = score_customers(&snap, &RiskScoringConfig::default());
    assert!((rows[0].raw_features.credit_utilization - 0.5).abs() < 1e-12);
}

#[test]
fn levels_are_inclusive_on_their_lower_bound() {
    let config = RiskScoringConfig::default();
    assert_eq!(RiskLevel::from_score(60.0, &config), RiskLevel::High);
    assert_eq!(RiskLevel::from_score(59.999, &config), RiskLevel::Medium);
    assert_eq!(RiskLevel::from_score(30.0, &config), RiskLevel::Medium);
    assert_eq!(RiskLevel::from_score(29.999, &config), RiskLevel::Low);
    assert_eq!(RiskLevel::from_score(0.0, &config), RiskLevel::Low);
}

#[test]
fn default_weights_sum_to_one() {
    assert_eq!(RiskWeights::default().sum(), 1.0);
}

#[test]
fn demo_population_stays_within_bounds() {
    let store = PipelineStore::in_memory().unwrap();
    store.migrate().unwrap();
    let as_of = date("2024-07-15");
    demo::seed_demo_dataset(&store, 2024, 12, as_of).unwrap();
    let snap = store.load_snapshot(as_of).unwrap();

    let config = RiskScoringConfig::default();
    let rows = score_customers(&snap, &config);
    assert!(!rows.is_empty(), "Demo data should produce risk scores");

    for r in &rows {
        for v in r.normalized_features.as_array() {
            assert!((0.0..=1.0).contains(&v), "{}: normalized feature {v} out of range", r.customer_id);
        }
        assert!(
            (0.0..=100.0).contains(&r.risk_score),
            "{}: score {} out of range",
            r.customer_id,
            r.risk_score
        );
        assert_eq!(r.risk_level, RiskLevel::from_score(r.risk_score, &config));
    }
}
