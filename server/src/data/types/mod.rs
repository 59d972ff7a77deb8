//! Shared data types for both storage backends
//!
//! Ingestion produces [`SpanRecord`]s and [`GpuMetricPoint`]s, the query
//! side reads back rows and assembles API responses from them.

mod analytics;
mod enums;
mod gpu;
mod span;
mod tenant;
mod trace;

pub use analytics::{AnalyticsOverview, LatencyPoint, OverviewTotals, ThroughputPoint};
pub use enums::{KeyStatus, SpanStatus, TenantStatus};
pub use gpu::{
    ComputeResourceRecord, GpuDetail, GpuLatestMetric, GpuMetricPoint, GpuMetricRow, GpuSummary,
    PhysicalGpuRecord, RESOURCE_TYPE_FULL_GPU, RESOURCE_TYPE_MIG, ResourceContextRecord,
};
pub use span::{GpuAttachments, SpanRecord};
pub use tenant::{ApiKeyRow, NewApiKey, ResolvedKey, TenantRow, UsageSnapshot};
pub use trace::{SpanNode, SpanRow, TraceDetail, TraceFilter, TraceSummary};
