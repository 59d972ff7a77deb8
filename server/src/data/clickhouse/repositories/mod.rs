//! ClickHouse repository modules
//!
//! - **span**: batch inserts into `spans`
//! - **gpu_metric**: batch inserts into `gpu_metrics` plus metric reads
//! - **query**: trace listing and per-trace span reads
//! - **analytics**: overview totals and hourly series

pub mod analytics;
mod conditions;
pub mod gpu_metric;
pub mod query;
pub mod span;
