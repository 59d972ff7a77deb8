//! Data storage layer
//!
//! - `clickhouse` - telemetry store (spans, GPU metric points)
//! - `postgres` - inventory store (GPU registry, tenants, API keys, usage)
//! - `types` - shared data types across both backends
//! - `traits` - narrow repository traits, one per capability
//! - `error` - unified error type for both backends

pub mod clickhouse;
pub mod error;
pub mod postgres;
pub mod traits;
pub mod types;

pub use clickhouse::ClickhouseService;
pub use error::DataError;
pub use postgres::PostgresService;
pub use traits::{
    AnalyticsQuerier, GpuMetricQuerier, GpuQuerier, GpuRegistry, Pinger, SpanWriter,
    TenantAdmin, TenantKeyStore, TraceQuerier, UsageStore,
};
