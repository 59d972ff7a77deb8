//! Repository traits for the storage backends
//!
//! Each capability is its own narrow trait so consumers (pipeline, query
//! engine, resolver, admin routes) depend only on what they use and can be
//! tested against in-memory fakes. ClickHouse implements the telemetry
//! traits, PostgreSQL the inventory/tenant/usage traits.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::data::error::DataError;
use crate::data::types::{
    ApiKeyRow, ComputeResourceRecord, GpuDetail, GpuLatestMetric, GpuMetricPoint, GpuMetricRow,
    GpuSummary, LatencyPoint, NewApiKey, OverviewTotals, PhysicalGpuRecord, ResolvedKey,
    ResourceContextRecord, SpanRecord, SpanRow, TenantRow, ThroughputPoint, TraceFilter,
    TraceSummary, UsageSnapshot,
};

// ============================================================================
// Telemetry writes (ClickHouse)
// ============================================================================

#[async_trait]
pub trait SpanWriter: Send + Sync {
    /// Insert a flushed batch of spans
    async fn insert_spans(&self, spans: &[SpanRecord]) -> Result<(), DataError>;

    /// Insert GPU metric points derived from a flushed batch
    async fn insert_gpu_metrics(&self, points: &[GpuMetricPoint]) -> Result<(), DataError>;
}

// ============================================================================
// Telemetry queries (ClickHouse)
// ============================================================================

#[async_trait]
pub trait TraceQuerier: Send + Sync {
    /// One summary per distinct trace id, newest first, plus the unpaginated total
    async fn query_traces(
        &self,
        tenant_id: &str,
        filter: &TraceFilter,
    ) -> Result<(Vec<TraceSummary>, u64), DataError>;

    /// All spans of a trace ordered by start time ascending
    async fn query_trace_spans(
        &self,
        tenant_id: &str,
        trace_id: &str,
    ) -> Result<Vec<SpanRow>, DataError>;
}

#[async_trait]
pub trait GpuMetricQuerier: Send + Sync {
    /// Metric points for one resource within `[start, end]`, oldest first
    async fn query_gpu_metrics(
        &self,
        tenant_id: &str,
        resource_uuid: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GpuMetricRow>, DataError>;

    /// Most recent metric values per resource
    async fn latest_gpu_metrics(&self, tenant_id: &str) -> Result<Vec<GpuLatestMetric>, DataError>;
}

#[async_trait]
pub trait AnalyticsQuerier: Send + Sync {
    async fn overview_totals(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<OverviewTotals, DataError>;

    /// Distinct resources that reported metrics within the window
    async fn active_gpu_count(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, DataError>;

    async fn throughput_series(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ThroughputPoint>, DataError>;

    async fn latency_series(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LatencyPoint>, DataError>;
}

// ============================================================================
// GPU inventory (PostgreSQL)
// ============================================================================

#[async_trait]
pub trait GpuRegistry: Send + Sync {
    async fn upsert_physical_gpu(&self, gpu: &PhysicalGpuRecord) -> Result<(), DataError>;

    async fn upsert_compute_resource(
        &self,
        resource: &ComputeResourceRecord,
    ) -> Result<(), DataError>;

    /// Insert or reattach a resource context
    async fn upsert_resource_context(
        &self,
        context: &ResourceContextRecord,
    ) -> Result<(), DataError>;
}

#[async_trait]
pub trait GpuQuerier: Send + Sync {
    async fn list_gpus(&self, tenant_id: &str) -> Result<Vec<GpuSummary>, DataError>;

    async fn get_gpu(
        &self,
        tenant_id: &str,
        resource_uuid: &str,
    ) -> Result<Option<GpuDetail>, DataError>;
}

// ============================================================================
// Tenants, keys and usage (PostgreSQL)
// ============================================================================

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Add to the day's counters, creating the row when absent
    async fn add_usage(
        &self,
        tenant_id: &str,
        day: NaiveDate,
        spans: i64,
        gpu_seconds: i64,
    ) -> Result<(), DataError>;

    async fn get_usage(
        &self,
        tenant_id: &str,
        day: NaiveDate,
    ) -> Result<Option<UsageSnapshot>, DataError>;
}

#[async_trait]
pub trait TenantKeyStore: Send + Sync {
    /// Look up a key hash joined to an active tenant
    async fn lookup_key(&self, key_hash: &str) -> Result<Option<ResolvedKey>, DataError>;

    /// Record that a key was just used
    async fn touch_key(&self, key_hash: &str) -> Result<(), DataError>;
}

#[async_trait]
pub trait TenantAdmin: Send + Sync {
    async fn create_tenant(
        &self,
        tenant_id: &str,
        name: &str,
        plan: &str,
    ) -> Result<TenantRow, DataError>;

    async fn list_tenants(&self) -> Result<Vec<TenantRow>, DataError>;

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRow>, DataError>;

    async fn create_api_key(&self, key: &NewApiKey) -> Result<ApiKeyRow, DataError>;

    /// Revoke the active key with this prefix; returns false when none matched
    async fn revoke_api_key(&self, tenant_id: &str, key_prefix: &str) -> Result<bool, DataError>;
}

// ============================================================================
// Health
// ============================================================================

#[async_trait]
pub trait Pinger: Send + Sync {
    /// Backend name used in logs and readiness output
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), DataError>;
}
