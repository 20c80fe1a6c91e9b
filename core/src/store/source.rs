use super::PipelineStore;
use crate::{
    calendar::{format_date, parse_date, parse_optional_date},
    error::PipelineResult,
    snapshot::{Customer, InventoryRecord, PaymentStatus, Product, Transaction},
};
use rusqlite::params;

/// Transaction row as stored: dates and status still text.
struct TransactionRow {
    transaction_id:     String,
    product_id:         String,
    customer_id:        String,
    txn_date:           String,
    quantity:           f64,
    unit_price:         f64,
    total_amount:       f64,
    payment_status:     String,
    due_date:           Option<String>,
    received_date:      Option<String>,
    outstanding_amount: f64,
}

impl TransactionRow {
    fn into_transaction(self) -> PipelineResult<Transaction> {
        Ok(Transaction {
            transaction_id:     self.transaction_id,
            product_id:         self.product_id,
            customer_id:        self.customer_id,
            date:               parse_date(&self.txn_date)?,
            quantity:           self.quantity,
            unit_price:         self.unit_price,
            total_amount:       self.total_amount,
            payment_status:     self.payment_status.parse::<PaymentStatus>()?,
            due_date:           parse_optional_date(self.due_date.as_deref())?,
            received_date:      parse_optional_date(self.received_date.as_deref())?,
            outstanding_amount: self.outstanding_amount,
        })
    }
}

impl PipelineStore {
    // ── Product ───────────────────────────────────────────────────

    pub fn insert_product(&self, p: &Product) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO product (product_id, name, category, cost_price, selling_price)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&p.product_id, &p.name, &p.category, p.cost_price, p.selling_price],
        )?;
        Ok(())
    }

    pub fn products(&self) -> PipelineResult<Vec<Product>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, name, category, cost_price, selling_price
             FROM product ORDER BY product_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Product {
                product_id:    row.get(0)?,
                name:          row.get(1)?,
                category:      row.get(2)?,
                cost_price:    row.get(3)?,
                selling_price: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Customer ──────────────────────────────────────────────────

    pub fn insert_customer(&self, c: &Customer) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO customer (customer_id, name, credit_limit, region)
             VALUES (?1, ?2, ?3, ?4)",
            params![&c.customer_id, &c.name, c.credit_limit, &c.region],
        )?;
        Ok(())
    }

    pub fn customers(&self) -> PipelineResult<Vec<Customer>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, name, credit_limit, region
             FROM customer ORDER BY customer_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Customer {
                customer_id:  row.get(0)?,
                name:         row.get(1)?,
                credit_limit: row.get(2)?,
                region:       row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Transaction ───────────────────────────────────────────────

    pub fn insert_transaction(&self, t: &Transaction) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO sales_transaction (
                transaction_id, product_id, customer_id, txn_date, quantity, unit_price,
                total_amount, payment_status, due_date, received_date, outstanding_amount
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                &t.transaction_id,
                &t.product_id,
                &t.customer_id,
                format_date(t.date),
                t.quantity,
                t.unit_price,
                t.total_amount,
                t.payment_status.as_str(),
                t.due_date.map(format_date),
                t.received_date.map(format_date),
                t.outstanding_amount,
            ],
        )?;
        Ok(())
    }

    /// Insert many transactions atomically.
    pub fn insert_transactions(&self, txns: &[Transaction]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for t in txns {
            self.insert_transaction(t)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn transactions(&self) -> PipelineResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT transaction_id, product_id, customer_id, txn_date, quantity, unit_price,
                    total_amount, payment_status, due_date, received_date, outstanding_amount
             FROM sales_transaction ORDER BY txn_date ASC, transaction_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TransactionRow {
                    transaction_id:     row.get(0)?,
                    product_id:         row.get(1)?,
                    customer_id:        row.get(2)?,
                    txn_date:           row.get(3)?,
                    quantity:           row.get(4)?,
                    unit_price:         row.get(5)?,
                    total_amount:       row.get(6)?,
                    payment_status:     row.get(7)?,
                    due_date:           row.get(8)?,
                    received_date:      row.get(9)?,
                    outstanding_amount: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    pub fn transaction_count(&self) -> PipelineResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM sales_transaction", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Inventory ─────────────────────────────────────────────────

    pub fn upsert_inventory(&self, r: &InventoryRecord) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO inventory (product_id, current_stock, reorder_point)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(product_id) DO UPDATE SET
                current_stock = excluded.current_stock,
                reorder_point = excluded.reorder_point",
            params![&r.product_id, r.current_stock, r.reorder_point],
        )?;
        Ok(())
    }

    pub fn inventory(&self) -> PipelineResult<Vec<InventoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, current_stock, reorder_point
             FROM inventory ORDER BY product_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(InventoryRecord {
                product_id:    row.get(0)?,
                current_stock: row.get(1)?,
                reorder_point: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
