//! API route handlers

pub mod admin;
pub mod analytics;
pub mod gpus;
pub mod health;
pub mod otlp_collector;
pub mod traces;
