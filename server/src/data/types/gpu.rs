//! GPU inventory records, metric points and query results

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Resource type of a whole, unpartitioned GPU
pub const RESOURCE_TYPE_FULL_GPU: &str = "full_gpu";

/// Resource type of a MIG slice (resource UUID differs from the physical UUID)
pub const RESOURCE_TYPE_MIG: &str = "mig";

// ============================================================================
// INVENTORY (upserted by the registrar)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalGpuRecord {
    pub tenant_id: String,
    pub uuid: String,
    pub model: String,
    pub vendor: String,
    pub memory_total_gb: f32,
    pub node_id: String,
}

/// A schedulable compute slice; `physical_uuid` always names a physical GPU
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeResourceRecord {
    pub tenant_id: String,
    pub resource_uuid: String,
    pub physical_uuid: String,
    pub resource_type: String,
    pub memory_gb: f32,
}

/// Runtime binding of a labelled workload to a compute resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceContextRecord {
    pub tenant_id: String,
    pub resource_uuid: String,
    pub user_label: String,
    pub hostname: String,
}

impl ResourceContextRecord {
    /// Deterministic context key: `<resource_uuid>:<user_label>`
    pub fn context_id(&self) -> String {
        format!("{}:{}", self.resource_uuid, self.user_label)
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// One GPU metric row derived from a span's GPU attachment.
/// Missing optional fields are written as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuMetricPoint {
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
    pub resource_uuid: String,
    pub physical_gpu_uuid: String,
    pub node_id: String,
    pub utilization: f32,
    pub memory_used_gb: f32,
    pub memory_total_gb: f32,
    pub temperature_celsius: u8,
    pub power_watts: u16,
    pub clock_mhz: u16,
    pub active_spans: u16,
}

/// Time-series point returned by the GPU metrics query
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GpuMetricRow {
    pub timestamp: DateTime<Utc>,
    pub resource_uuid: String,
    pub utilization: f32,
    pub memory_used_gb: f32,
    pub power_watts: u16,
}

/// Most recent metric values for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct GpuLatestMetric {
    pub resource_uuid: String,
    pub utilization: f32,
    pub memory_used_gb: f32,
    pub memory_total_gb: f32,
}

// ============================================================================
// INVENTORY QUERIES
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GpuSummary {
    pub resource_uuid: String,
    pub physical_uuid: String,
    pub model: String,
    pub resource_type: String,
    pub node_id: String,
    pub utilization: f32,
    pub memory_used_gb: f32,
    pub memory_total_gb: f32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GpuDetail {
    pub resource_uuid: String,
    pub physical_uuid: String,
    pub model: String,
    pub resource_type: String,
    pub node_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}
