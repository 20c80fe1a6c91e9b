//! Deterministic synthetic dataset for exercising the pipeline end to end.
//!
//! Same seed, month count and `as_of` produce an identical dataset. Every
//! entity kind draws from its own `DemoRng` stream.
//!
//! Shape of the data:
//!   - A small catalog where each product has its own base demand and
//!     monthly growth, so the sales forecaster sees up, down and flat trends.
//!   - Customers with a payment reliability; unreliable ones pay late,
//!     partially or not at all.
//!   - Transactions in the `months` calendar months before `as_of`.
//!   - Inventory for every product except the last one, with a few items
//!     deliberately out of stock or overstocked.

use crate::{
    calendar::MonthKey,
    error::PipelineResult,
    rng::{DemoRng, DemoStream},
    snapshot::{Customer, InventoryRecord, PaymentStatus, Product, Transaction},
    store::PipelineStore,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const PRODUCT_COUNT: usize = 8;
const CUSTOMER_COUNT: usize = 20;
const PAYMENT_TERMS_DAYS: i64 = 30;

const CATEGORIES: &[&str] = &["Electronics", "Office", "Furniture", "Supplies"];
const PRODUCT_NAMES: &[&str] = &[
    "Laptop Stand", "Wireless Mouse", "Desk Lamp", "Printer Paper",
    "Office Chair", "USB-C Hub", "Whiteboard", "Filing Cabinet",
    "Monitor Arm", "Label Maker",
];
const REGIONS: &[&str] = &["North", "South", "East", "West"];
const COMPANY_PREFIXES: &[&str] = &[
    "Acme", "Blue Harbor", "Cedar", "Delta", "Evergreen", "Falcon",
    "Granite", "Horizon", "Ironwood", "Juniper", "Keystone", "Lakeside",
];
const COMPANY_SUFFIXES: &[&str] = &["Ltd", "LLC", "& Co", "Group", "Partners", "Trading"];

/// Rows written by `seed_demo_dataset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoCounts {
    pub products:     usize,
    pub customers:    usize,
    pub transactions: usize,
    pub inventory:    usize,
}

/// Per-product demand curve.
struct DemandCurve {
    base:   f64,
    growth: f64,
    noise:  f64,
}

/// Write the demo dataset into an empty, migrated store.
pub fn seed_demo_dataset(
    store: &PipelineStore,
    seed: u64,
    months: u32,
    as_of: NaiveDate,
) -> PipelineResult<DemoCounts> {
    let products = demo_products(seed);
    let customers = demo_customers(seed);
    let transactions = demo_transactions(seed, months, as_of, &products, &customers);
    let inventory = demo_inventory(seed, &products);

    for p in &products {
        store.insert_product(p)?;
    }
    for c in &customers {
        store.insert_customer(c)?;
    }
    store.insert_transactions(&transactions)?;
    for r in &inventory {
        store.upsert_inventory(r)?;
    }

    let counts = DemoCounts {
        products:     products.len(),
        customers:    customers.len(),
        transactions: transactions.len(),
        inventory:    inventory.len(),
    };
    log::info!(
        "demo dataset seeded (seed={seed}, months={months}): {} products, {} customers, {} transactions",
        counts.products,
        counts.customers,
        counts.transactions,
    );
    Ok(counts)
}

fn demo_products(seed: u64) -> Vec<Product> {
    let mut rng = DemoRng::new(seed, DemoStream::Catalog);
    (0..PRODUCT_COUNT)
        .map(|i| {
            let cost = round_cents(rng.range(5.0, 120.0));
            Product {
                product_id:    format!("p-{:03}", i + 1),
                name:          PRODUCT_NAMES[i % PRODUCT_NAMES.len()].to_string(),
                category:      rng.pick(CATEGORIES).copied().unwrap_or("General").to_string(),
                cost_price:    cost,
                selling_price: round_cents(cost * rng.range(1.2, 1.8)),
            }
        })
        .collect()
}

fn demo_customers(seed: u64) -> Vec<Customer> {
    let mut rng = DemoRng::new(seed, DemoStream::Customers);
    (0..CUSTOMER_COUNT)
        .map(|i| {
            let prefix = rng.pick(COMPANY_PREFIXES).copied().unwrap_or("Demo");
            let suffix = rng.pick(COMPANY_SUFFIXES).copied().unwrap_or("Ltd");
            let credit_limit = if rng.chance(0.1) {
                None
            } else {
                Some((rng.range(5_000.0, 50_000.0) / 500.0).round() * 500.0)
            };
            Customer {
                customer_id: format!("c-{:04}", i + 1),
                name:        format!("{prefix} {suffix}"),
                credit_limit,
                region:      rng.pick(REGIONS).map(|r| r.to_string()),
            }
        })
        .collect()
}

fn demo_transactions(
    seed: u64,
    months: u32,
    as_of: NaiveDate,
    products: &[Product],
    customers: &[Customer],
) -> Vec<Transaction> {
    let mut sales = DemoRng::new(seed, DemoStream::Sales);
    let mut payments = DemoRng::new(seed, DemoStream::Payments);

    let curves: Vec<DemandCurve> = products
        .iter()
        .map(|_| DemandCurve {
            base:   sales.range(40.0, 200.0),
            growth: sales.range(-0.05, 0.08),
            noise:  sales.range(0.02, 0.25),
        })
        .collect();
    let reliability: Vec<f64> = customers.iter().map(|_| payments.range(0.4, 1.0)).collect();

    let current = MonthKey::from_date(as_of);
    let start_index = current.year as i64 * 12 + current.month as i64 - 1 - months as i64;
    let start = MonthKey::new(start_index.div_euclid(12) as i32, start_index.rem_euclid(12) as u32 + 1);

    let mut out = Vec::new();
    for m in 0..months {
        let month = start.plus(m);
        let month_start = month.first_day();
        let days_in_month = (month.next().first_day() - month_start).num_days().max(1) as u64;

        for (product, curve) in products.iter().zip(&curves) {
            let level = curve.base * (1.0 + curve.growth).powi(m as i32);
            let demand = (level * (1.0 + sales.range(-curve.noise, curve.noise))).max(0.0);
            let orders = 2 + sales.next_u64_below(4) as usize;

            for _ in 0..orders {
                let quantity = (demand / orders as f64).round().max(1.0);
                let date = (month_start + Duration::days(sales.next_u64_below(days_in_month) as i64))
                    .min(as_of);
                let customer_idx = sales.next_u64_below(customers.len() as u64) as usize;
                let customer = &customers[customer_idx];
                let unit_price = product.selling_price;
                let total = round_cents(quantity * unit_price);

                let (status, received_date, outstanding) =
                    settle(&mut payments, reliability[customer_idx], date, as_of, total);

                out.push(Transaction {
                    transaction_id:     format!("t-{:06}", out.len() + 1),
                    product_id:         product.product_id.clone(),
                    customer_id:        customer.customer_id.clone(),
                    date,
                    quantity,
                    unit_price,
                    total_amount:       total,
                    payment_status:     status,
                    due_date:           Some(date + Duration::days(PAYMENT_TERMS_DAYS)),
                    received_date,
                    outstanding_amount: outstanding,
                });
            }
        }
    }
    out
}

/// Decide how an invoice was settled by `as_of`.
fn settle(
    rng: &mut DemoRng,
    reliability: f64,
    date: NaiveDate,
    as_of: NaiveDate,
    total: f64,
) -> (PaymentStatus, Option<NaiveDate>, f64) {
    let due = date + Duration::days(PAYMENT_TERMS_DAYS);
    if due > as_of && !rng.chance(reliability) {
        return (PaymentStatus::Pending, None, total);
    }
    if rng.chance(reliability) {
        // Reliable payers settle around the due date, occasionally early.
        let offset = rng.next_u64_below(10) as i64 - 5;
        let received = (due + Duration::days(offset)).min(as_of).max(date);
        return (PaymentStatus::Paid, Some(received), 0.0);
    }
    if rng.chance(0.5) {
        let delay = 5 + rng.next_u64_below(60) as i64;
        let received = (due + Duration::days(delay)).min(as_of).max(date);
        let outstanding = round_cents(total * rng.range(0.2, 0.8));
        return (PaymentStatus::Partial, Some(received), outstanding);
    }
    (PaymentStatus::Overdue, None, total)
}

fn demo_inventory(seed: u64, products: &[Product]) -> Vec<InventoryRecord> {
    let mut rng = DemoRng::new(seed, DemoStream::Inventory);
    products
        .iter()
        .take(products.len().saturating_sub(1))
        .enumerate()
        .map(|(i, p)| {
            let reorder_point = rng.range(20.0, 80.0).round();
            let current_stock = match i % 4 {
                0 => 0.0,
                1 => (reorder_point * rng.range(0.3, 0.9)).round(),
                2 => (reorder_point * rng.range(8.0, 15.0)).round(),
                _ => (reorder_point * rng.range(1.5, 3.0)).round(),
            };
            InventoryRecord {
                product_id: p.product_id.clone(),
                current_stock,
                reorder_point,
            }
        })
        .collect()
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    #[test]
    fn transactions_fall_in_the_window_before_as_of() {
        let products = demo_products(1);
        let customers = demo_customers(1);
        let txns = demo_transactions(1, 6, as_of(), &products, &customers);
        assert!(!txns.is_empty());
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for t in &txns {
            assert!(t.date >= first && t.date <= as_of(), "{} outside window", t.date);
        }
    }

    #[test]
    fn outstanding_never_exceeds_total() {
        let products = demo_products(9);
        let customers = demo_customers(9);
        for t in demo_transactions(9, 12, as_of(), &products, &customers) {
            assert!(t.outstanding_amount >= 0.0 && t.outstanding_amount <= t.total_amount);
            if t.payment_status == PaymentStatus::Paid {
                assert_eq!(t.outstanding_amount, 0.0);
            }
        }
    }

    #[test]
    fn last_product_has_no_inventory_record() {
        let products = demo_products(3);
        let inventory = demo_inventory(3, &products);
        assert_eq!(inventory.len(), products.len() - 1);
        assert!(inventory.iter().all(|r| r.product_id != products[PRODUCT_COUNT - 1].product_id));
    }
}
