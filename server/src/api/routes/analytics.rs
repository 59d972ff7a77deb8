//! Analytics overview endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Duration;

use super::gpus::TimeRangeQuery;
use crate::api::auth::TenantId;
use crate::api::extractors::ValidatedQuery;
use crate::api::types::ApiError;
use crate::core::constants::ANALYTICS_DEFAULT_WINDOW_SECS;
use crate::data::types::AnalyticsOverview;
use crate::domain::QueryService;

/// Build analytics routes (tenant-authenticated)
pub fn routes(query: Arc<QueryService>) -> Router<()> {
    Router::new()
        .route("/api/v1/analytics/overview", get(get_overview))
        .with_state(query)
}

/// Totals and hourly series over a window (default: the last 24 hours)
#[utoipa::path(
    get,
    path = "/api/v1/analytics/overview",
    tag = "analytics",
    params(TimeRangeQuery),
    responses(
        (status = 200, description = "Overview for the window", body = AnalyticsOverview),
        (status = 400, description = "Invalid time range")
    )
)]
pub async fn get_overview(
    State(query): State<Arc<QueryService>>,
    TenantId(tenant_id): TenantId,
    ValidatedQuery(range): ValidatedQuery<TimeRangeQuery>,
) -> Result<Json<AnalyticsOverview>, ApiError> {
    let (start, end) = range.resolve(Duration::seconds(ANALYTICS_DEFAULT_WINDOW_SECS))?;
    let overview = query.analytics_overview(&tenant_id, start, end).await?;
    Ok(Json(overview))
}
