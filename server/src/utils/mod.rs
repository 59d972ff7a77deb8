//! Utility functions for the application

pub mod api_key;
pub mod clickhouse;
pub mod crypto;
pub mod otlp;
pub mod time;
