//! Axonize: OTLP collector and query backend for GPU-aware AI telemetry

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
