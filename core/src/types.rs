//! Shared primitive types used across the entire pipeline.

/// A stable, unique identifier for a product, customer or transaction.
pub type EntityId = String;

/// The canonical prediction run identifier.
pub type RunId = String;

/// Days returned by the inventory model when demand is zero.
pub const STOCKOUT_SENTINEL_DAYS: f64 = 999.0;
