//! Tenant, API key and usage rows (PostgreSQL)

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{KeyStatus, TenantStatus};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TenantRow {
    pub tenant_id: String,
    pub name: String,
    pub plan: String,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
}

/// Key lookup result joined against an active tenant
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedKey {
    pub tenant_id: String,
    pub key_status: KeyStatus,
}

/// Values needed to persist a freshly generated key (raw key never stored)
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub key_hash: String,
    pub key_prefix: String,
    pub tenant_id: String,
    pub name: String,
    pub scopes: String,
}

#[derive(Debug, Clone)]
pub struct ApiKeyRow {
    pub key_prefix: String,
    pub tenant_id: String,
    pub name: String,
    pub scopes: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
}

/// Usage counters of one tenant for one UTC day
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UsageSnapshot {
    pub tenant_id: String,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub span_count: i64,
    pub gpu_seconds: i64,
}
