//! OpenAPI specification

use axum::http::header;
use axum::response::{IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{admin, analytics, gpus, health, traces};
use crate::api::types::ErrorBody;
use crate::data::types::{
    AnalyticsOverview, GpuDetail, GpuMetricRow, GpuSummary, KeyStatus, LatencyPoint, SpanStatus,
    TenantRow, TenantStatus, ThroughputPoint, TraceSummary, UsageSnapshot,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Axonize API",
        version = env!("CARGO_PKG_VERSION"),
        description = "GPU-aware AI telemetry query API"
    ),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "traces", description = "Trace queries"),
        (name = "gpus", description = "GPU inventory and metrics"),
        (name = "analytics", description = "Aggregate analytics"),
        (name = "admin", description = "Tenant and API key provisioning")
    ),
    paths(
        // Health
        health::healthz,
        health::readyz,
        // Traces
        traces::list_traces,
        traces::get_trace,
        // GPUs
        gpus::list_gpus,
        gpus::get_gpu,
        gpus::get_gpu_metrics,
        // Analytics
        analytics::get_overview,
        // Admin
        admin::create_tenant,
        admin::list_tenants,
        admin::create_api_key,
        admin::revoke_api_key,
        admin::get_usage,
    ),
    components(schemas(
        ErrorBody,
        health::HealthResponse,
        health::ReadyResponse,
        traces::TraceListResponse,
        TraceSummary,
        SpanStatus,
        gpus::GpuListResponse,
        gpus::GpuMetricsResponse,
        GpuSummary,
        GpuDetail,
        GpuMetricRow,
        AnalyticsOverview,
        ThroughputPoint,
        LatencyPoint,
        admin::CreateTenantRequest,
        admin::TenantListResponse,
        admin::CreateApiKeyRequest,
        admin::CreateApiKeyResponse,
        TenantRow,
        TenantStatus,
        KeyStatus,
        UsageSnapshot,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_query_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/traces",
            "/api/v1/traces/{trace_id}",
            "/api/v1/gpus/{resource_uuid}/metrics",
            "/api/v1/analytics/overview",
            "/api/v1/admin/tenants/{tenant_id}/keys/{key_prefix}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
