//! Trace query endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::auth::TenantId;
use crate::api::extractors::{ValidatedQuery, require_valid_id};
use crate::api::types::{ApiError, parse_timestamp_param};
use crate::data::types::{TraceDetail, TraceFilter, TraceSummary};
use crate::domain::{QueryService, TracePage};

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTracesQuery {
    #[validate(length(max = 256))]
    pub service_name: Option<String>,
    /// Inclusive lower bound on start time (RFC 3339)
    pub start: Option<String>,
    /// Inclusive upper bound on start time (RFC 3339)
    pub end: Option<String>,
    /// Page size; 0 or absent means 50, capped at 1000
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TraceListResponse {
    pub traces: Vec<TraceSummary>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl From<TracePage> for TraceListResponse {
    fn from(page: TracePage) -> Self {
        Self {
            traces: page.traces,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

/// Build trace routes (tenant-authenticated)
pub fn routes(query: Arc<QueryService>) -> Router<()> {
    Router::new()
        .route("/api/v1/traces", get(list_traces))
        .route("/api/v1/traces/{trace_id}", get(get_trace))
        .with_state(query)
}

/// List traces, newest first
#[utoipa::path(
    get,
    path = "/api/v1/traces",
    tag = "traces",
    params(ListTracesQuery),
    responses(
        (status = 200, description = "One page of trace summaries", body = TraceListResponse),
        (status = 400, description = "Invalid timestamp"),
        (status = 401, description = "Missing or invalid credentials")
    )
)]
pub async fn list_traces(
    State(query): State<Arc<QueryService>>,
    TenantId(tenant_id): TenantId,
    ValidatedQuery(params): ValidatedQuery<ListTracesQuery>,
) -> Result<Json<TraceListResponse>, ApiError> {
    let filter = TraceFilter {
        service_name: params.service_name.filter(|s| !s.is_empty()),
        start: parse_timestamp_param(&params.start)?,
        end: parse_timestamp_param(&params.end)?,
        limit: params.limit.unwrap_or(0),
        offset: params.offset.unwrap_or(0),
    };

    let page = query.list_traces(&tenant_id, filter).await?;
    Ok(Json(page.into()))
}

/// Get one trace with its span tree
#[utoipa::path(
    get,
    path = "/api/v1/traces/{trace_id}",
    tag = "traces",
    params(("trace_id" = String, Path, description = "Hex trace id")),
    responses(
        (status = 200, description = "Trace with nested spans"),
        (status = 404, description = "No spans recorded for this trace id")
    )
)]
pub async fn get_trace(
    State(query): State<Arc<QueryService>>,
    TenantId(tenant_id): TenantId,
    Path(trace_id): Path<String>,
) -> Result<Json<TraceDetail>, ApiError> {
    require_valid_id("trace_id", &trace_id)?;

    query
        .get_trace(&tenant_id, &trace_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("TRACE_NOT_FOUND", "Trace not found"))
}
