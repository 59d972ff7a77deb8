//! Tenant and API key provisioning (multi-tenant mode)
//!
//! Raw keys are returned exactly once from key creation; only the SHA-256
//! digest and a display prefix are persisted. Revoking a key does not evict
//! it from resolver caches, it stops resolving once the cached entry expires.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::{ValidatedJson, require_valid_id};
use crate::api::types::ApiError;
use crate::core::constants::{DEFAULT_KEY_SCOPES, DEFAULT_TENANT_PLAN};
use crate::data::TenantAdmin;
use crate::data::types::{NewApiKey, TenantRow, TenantStatus, UsageSnapshot};
use crate::domain::UsageMeter;
use crate::utils::api_key::{generate_api_key, generate_tenant_id, hash_api_key, key_prefix};

/// Shared state for admin endpoints
#[derive(Clone)]
pub struct AdminApiState {
    pub tenants: Arc<dyn TenantAdmin>,
    pub usage: Arc<UsageMeter>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 256, message = "name must be 1-256 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "plan must be 1-64 characters"))]
    pub plan: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TenantListResponse {
    pub tenants: Vec<TenantRow>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 256, message = "name must be 1-256 characters"))]
    pub name: String,
    /// Comma-separated scopes (default: `ingest,read`)
    #[validate(length(min = 1, max = 256, message = "scopes must be 1-256 characters"))]
    pub scopes: Option<String>,
}

/// Creation response; the only time the raw key is ever returned
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateApiKeyResponse {
    pub key: String,
    pub key_prefix: String,
    pub tenant_id: String,
    pub name: String,
    pub scopes: String,
    pub created_at: DateTime<Utc>,
}

/// Build admin routes (admin-key protected)
pub fn routes(tenants: Arc<dyn TenantAdmin>, usage: Arc<UsageMeter>) -> Router<()> {
    Router::new()
        .route(
            "/api/v1/admin/tenants",
            get(list_tenants).post(create_tenant),
        )
        .route("/api/v1/admin/tenants/{tenant_id}/keys", post(create_api_key))
        .route(
            "/api/v1/admin/tenants/{tenant_id}/keys/{key_prefix}",
            delete(revoke_api_key),
        )
        .route("/api/v1/admin/tenants/{tenant_id}/usage", get(get_usage))
        .with_state(AdminApiState { tenants, usage })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/tenants",
    tag = "admin",
    request_body = CreateTenantRequest,
    responses(
        (status = 201, description = "Tenant created", body = TenantRow),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn create_tenant(
    State(state): State<AdminApiState>,
    ValidatedJson(body): ValidatedJson<CreateTenantRequest>,
) -> Result<(StatusCode, Json<TenantRow>), ApiError> {
    let tenant_id = generate_tenant_id();
    let plan = body.plan.as_deref().unwrap_or(DEFAULT_TENANT_PLAN);

    let tenant = state
        .tenants
        .create_tenant(&tenant_id, &body.name, plan)
        .await?;

    tracing::info!(tenant_id = %tenant.tenant_id, plan = %tenant.plan, "Tenant created");
    Ok((StatusCode::CREATED, Json(tenant)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/tenants",
    tag = "admin",
    responses(
        (status = 200, description = "All tenants", body = TenantListResponse)
    )
)]
pub async fn list_tenants(
    State(state): State<AdminApiState>,
) -> Result<Json<TenantListResponse>, ApiError> {
    let tenants = state.tenants.list_tenants().await?;
    Ok(Json(TenantListResponse { tenants }))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/tenants/{tenant_id}/keys",
    tag = "admin",
    params(("tenant_id" = String, Path, description = "Tenant id")),
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "Key created; the raw key is not retrievable later", body = CreateApiKeyResponse),
        (status = 404, description = "Unknown tenant"),
        (status = 409, description = "Tenant is not active")
    )
)]
pub async fn create_api_key(
    State(state): State<AdminApiState>,
    Path(tenant_id): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), ApiError> {
    require_active_tenant(state.tenants.as_ref(), &tenant_id).await?;

    let key = generate_api_key();
    let new_key = NewApiKey {
        key_hash: hash_api_key(&key),
        key_prefix: key_prefix(&key),
        tenant_id,
        name: body.name,
        scopes: body
            .scopes
            .unwrap_or_else(|| DEFAULT_KEY_SCOPES.to_string()),
    };
    let row = state.tenants.create_api_key(&new_key).await?;

    tracing::info!(
        tenant_id = %row.tenant_id,
        key_prefix = %row.key_prefix,
        "API key created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            key,
            key_prefix: row.key_prefix,
            tenant_id: row.tenant_id,
            name: row.name,
            scopes: row.scopes,
            created_at: row.created_at,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/tenants/{tenant_id}/keys/{key_prefix}",
    tag = "admin",
    params(
        ("tenant_id" = String, Path, description = "Tenant id"),
        ("key_prefix" = String, Path, description = "Displayed key prefix")
    ),
    responses(
        (status = 204, description = "Key revoked"),
        (status = 404, description = "No active key with this prefix")
    )
)]
pub async fn revoke_api_key(
    State(state): State<AdminApiState>,
    Path((tenant_id, prefix)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    require_valid_id("tenant_id", &tenant_id)?;
    require_valid_id("key_prefix", &prefix)?;

    if !state.tenants.revoke_api_key(&tenant_id, &prefix).await? {
        return Err(ApiError::not_found(
            "API_KEY_NOT_FOUND",
            "No active API key with this prefix",
        ));
    }

    tracing::info!(tenant_id = %tenant_id, key_prefix = %prefix, "API key revoked");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/tenants/{tenant_id}/usage",
    tag = "admin",
    params(("tenant_id" = String, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Today's usage counters", body = UsageSnapshot),
        (status = 404, description = "Unknown tenant")
    )
)]
pub async fn get_usage(
    State(state): State<AdminApiState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<UsageSnapshot>, ApiError> {
    require_valid_id("tenant_id", &tenant_id)?;
    if state.tenants.get_tenant(&tenant_id).await?.is_none() {
        return Err(tenant_not_found());
    }

    let usage = state.usage.get_usage(&tenant_id).await?;
    Ok(Json(usage))
}

async fn require_active_tenant(tenants: &dyn TenantAdmin, tenant_id: &str) -> Result<(), ApiError> {
    require_valid_id("tenant_id", tenant_id)?;
    match tenants.get_tenant(tenant_id).await? {
        None => Err(tenant_not_found()),
        Some(t) if t.status != TenantStatus::Active => Err(ApiError::conflict(
            "TENANT_INACTIVE",
            "Keys can only be issued for active tenants",
        )),
        Some(_) => Ok(()),
    }
}

fn tenant_not_found() -> ApiError {
    ApiError::not_found("TENANT_NOT_FOUND", "Tenant not found")
}
