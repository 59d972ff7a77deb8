//! Liveness and readiness endpoints

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::core::constants::READY_CHECK_TIMEOUT_SECS;
use crate::data::Pinger;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// `ready` or `not_ready`
    pub status: &'static str,
    /// Per-backend result: `ok`, `error` or `timeout`
    #[schema(value_type = Object)]
    pub checks: BTreeMap<&'static str, &'static str>,
}

/// Shared state for the readiness probe
#[derive(Clone)]
pub struct HealthApiState {
    pub backends: Arc<Vec<Arc<dyn Pinger>>>,
}

/// Build health routes (unauthenticated)
pub fn routes(backends: Vec<Arc<dyn Pinger>>) -> Router<()> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(HealthApiState {
            backends: Arc::new(backends),
        })
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse)
    )
)]
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Readiness probe: every storage backend must answer a ping
#[utoipa::path(
    get,
    path = "/readyz",
    tag = "health",
    responses(
        (status = 200, description = "All backends reachable", body = ReadyResponse),
        (status = 503, description = "A backend is unreachable", body = ReadyResponse)
    )
)]
pub async fn readyz(State(state): State<HealthApiState>) -> impl IntoResponse {
    let timeout = Duration::from_secs(READY_CHECK_TIMEOUT_SECS);

    let results = futures::future::join_all(state.backends.iter().map(|backend| async move {
        let outcome = match tokio::time::timeout(timeout, backend.ping()).await {
            Ok(Ok(())) => "ok",
            Ok(Err(e)) => {
                tracing::warn!(backend = backend.backend(), error = %e, "Readiness ping failed");
                "error"
            }
            Err(_) => {
                tracing::warn!(backend = backend.backend(), "Readiness ping timed out");
                "timeout"
            }
        };
        (backend.backend(), outcome)
    }))
    .await;

    let ready = results.iter().all(|(_, outcome)| *outcome == "ok");
    let body = ReadyResponse {
        status: if ready { "ready" } else { "not_ready" },
        checks: results.into_iter().collect(),
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
