//! GPU inventory and metric endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::auth::TenantId;
use crate::api::extractors::{ValidatedQuery, require_valid_id};
use crate::api::types::{ApiError, parse_timestamp_param};
use crate::core::constants::GPU_METRICS_DEFAULT_WINDOW_SECS;
use crate::data::types::{GpuDetail, GpuMetricRow, GpuSummary};
use crate::domain::QueryService;

/// Optional RFC 3339 window shared by time-series endpoints
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimeRangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl TimeRangeQuery {
    /// Resolve the window; a missing end is now, a missing start is `end - default_window`
    pub fn resolve(
        &self,
        default_window: Duration,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
        let end = parse_timestamp_param(&self.end)?.unwrap_or_else(Utc::now);
        let start = parse_timestamp_param(&self.start)?.unwrap_or(end - default_window);
        if start > end {
            return Err(ApiError::bad_request(
                "INVALID_TIME_RANGE",
                "start must not be after end",
            ));
        }
        Ok((start, end))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GpuListResponse {
    pub gpus: Vec<GpuSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GpuMetricsResponse {
    pub metrics: Vec<GpuMetricRow>,
}

/// Build GPU routes (tenant-authenticated)
pub fn routes(query: Arc<QueryService>) -> Router<()> {
    Router::new()
        .route("/api/v1/gpus", get(list_gpus))
        .route("/api/v1/gpus/{resource_uuid}", get(get_gpu))
        .route("/api/v1/gpus/{resource_uuid}/metrics", get(get_gpu_metrics))
        .with_state(query)
}

/// List compute resources with their latest utilization
#[utoipa::path(
    get,
    path = "/api/v1/gpus",
    tag = "gpus",
    responses(
        (status = 200, description = "Known compute resources", body = GpuListResponse)
    )
)]
pub async fn list_gpus(
    State(query): State<Arc<QueryService>>,
    TenantId(tenant_id): TenantId,
) -> Result<Json<GpuListResponse>, ApiError> {
    let gpus = query.list_gpus(&tenant_id).await?;
    Ok(Json(GpuListResponse { gpus }))
}

#[utoipa::path(
    get,
    path = "/api/v1/gpus/{resource_uuid}",
    tag = "gpus",
    params(("resource_uuid" = String, Path, description = "Compute resource UUID")),
    responses(
        (status = 200, description = "Compute resource", body = GpuDetail),
        (status = 404, description = "Unknown resource")
    )
)]
pub async fn get_gpu(
    State(query): State<Arc<QueryService>>,
    TenantId(tenant_id): TenantId,
    Path(resource_uuid): Path<String>,
) -> Result<Json<GpuDetail>, ApiError> {
    require_valid_id("resource_uuid", &resource_uuid)?;

    query
        .get_gpu(&tenant_id, &resource_uuid)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("GPU_NOT_FOUND", "GPU not found"))
}

/// Metric time series for one resource (default: the last hour)
#[utoipa::path(
    get,
    path = "/api/v1/gpus/{resource_uuid}/metrics",
    tag = "gpus",
    params(
        ("resource_uuid" = String, Path, description = "Compute resource UUID"),
        TimeRangeQuery
    ),
    responses(
        (status = 200, description = "Metric points, oldest first", body = GpuMetricsResponse),
        (status = 400, description = "Invalid time range")
    )
)]
pub async fn get_gpu_metrics(
    State(query): State<Arc<QueryService>>,
    TenantId(tenant_id): TenantId,
    Path(resource_uuid): Path<String>,
    ValidatedQuery(range): ValidatedQuery<TimeRangeQuery>,
) -> Result<Json<GpuMetricsResponse>, ApiError> {
    require_valid_id("resource_uuid", &resource_uuid)?;
    let (start, end) = range.resolve(Duration::seconds(GPU_METRICS_DEFAULT_WINDOW_SECS))?;

    let metrics = query
        .gpu_metrics(&tenant_id, &resource_uuid, start, end)
        .await?;
    Ok(Json(GpuMetricsResponse { metrics }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: Option<&str>, end: Option<&str>) -> TimeRangeQuery {
        TimeRangeQuery {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }

    #[test]
    fn test_resolve_defaults_to_window_before_end() {
        let (start, end) = range(None, Some("2024-05-01T12:00:00Z"))
            .resolve(Duration::hours(1))
            .unwrap();
        assert_eq!(end - start, Duration::hours(1));
        assert_eq!(start.to_rfc3339(), "2024-05-01T11:00:00+00:00");
    }

    #[test]
    fn test_resolve_defaults_to_now() {
        let before = Utc::now();
        let (start, end) = range(None, None).resolve(Duration::hours(24)).unwrap();
        assert!(end >= before);
        assert_eq!(end - start, Duration::hours(24));
    }

    #[test]
    fn test_resolve_rejects_inverted_range() {
        let err = range(Some("2024-05-02T00:00:00Z"), Some("2024-05-01T00:00:00Z"))
            .resolve(Duration::hours(1))
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { ref code, .. } if code == "INVALID_TIME_RANGE"));
    }

    #[test]
    fn test_resolve_rejects_bad_timestamp() {
        assert!(range(Some("noon"), None).resolve(Duration::hours(1)).is_err());
    }
}
