//! Input records and the immutable data snapshot every model reads.
//!
//! The snapshot is fetched once at pipeline start. Models only ever borrow
//! it; nothing in the pipeline mutates a transaction, customer, product or
//! inventory row.

use crate::{
    calendar::MonthKey,
    error::PipelineError,
    types::EntityId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Overdue,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid    => "paid",
            Self::Partial => "partial",
            Self::Overdue => "overdue",
            Self::Pending => "pending",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid"    => Ok(Self::Paid),
            "partial" => Ok(Self::Partial),
            "overdue" => Ok(Self::Overdue),
            "pending" => Ok(Self::Pending),
            _ => Err(PipelineError::UnknownVariant {
                kind:  "payment status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id:     EntityId,
    pub product_id:         EntityId,
    pub customer_id:        EntityId,
    pub date:               NaiveDate,
    pub quantity:           f64,
    pub unit_price:         f64,
    pub total_amount:       f64,
    pub payment_status:     PaymentStatus,
    pub due_date:           Option<NaiveDate>,
    pub received_date:      Option<NaiveDate>,
    pub outstanding_amount: f64,
}

impl Transaction {
    pub fn month(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id:  EntityId,
    pub name:         String,
    pub credit_limit: Option<f64>,
    pub region:       Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id:    EntityId,
    pub name:          String,
    pub category:      String,
    pub cost_price:    f64,
    pub selling_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id:    EntityId,
    pub current_stock: f64,
    pub reorder_point: f64,
}

/// Everything the four models need, fetched once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSnapshot {
    /// Reference date for recency features.
    pub as_of:        NaiveDate,
    pub transactions: Vec<Transaction>,
    pub customers:    Vec<Customer>,
    pub products:     Vec<Product>,
    pub inventory:    Vec<InventoryRecord>,
}

impl DataSnapshot {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of, ..Default::default() }
    }

    /// Distinct calendar months present anywhere in the transaction set,
    /// oldest first. Position in this list is the global month index.
    pub fn observed_months(&self) -> Vec<MonthKey> {
        self.transactions
            .iter()
            .map(Transaction::month)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Transactions grouped by customer id.
    pub fn transactions_by_customer(&self) -> HashMap<&str, Vec<&Transaction>> {
        let mut out: HashMap<&str, Vec<&Transaction>> = HashMap::new();
        for txn in &self.transactions {
            out.entry(txn.customer_id.as_str()).or_default().push(txn);
        }
        out
    }

    pub fn inventory_for(&self, product_id: &str) -> Option<&InventoryRecord> {
        self.inventory.iter().find(|r| r.product_id == product_id)
    }
}
