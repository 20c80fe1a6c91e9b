//! Batch prediction pipeline for a small business-intelligence platform.
//!
//! One run loads a snapshot of transactions, customers, products and
//! inventory, runs four closed-form statistical models over it, and writes
//! their predictions tagged with a shared run id.

pub mod calendar;
pub mod cash_flow_model;
pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod event;
pub mod inventory_model;
pub mod model;
pub mod risk_scoring_model;
pub mod rng;
pub mod sales_forecast_model;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod types;
