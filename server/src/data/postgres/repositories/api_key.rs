//! API key repository for PostgreSQL operations
//!
//! Keys are addressed by their SHA-256 hash; the raw key never reaches
//! the database.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::{ApiKeyRow, KeyStatus, NewApiKey, ResolvedKey};

/// Look up a key by hash, only when its tenant is active
pub async fn get_by_hash(
    pool: &PgPool,
    key_hash: &str,
) -> Result<Option<ResolvedKey>, PostgresError> {
    let row = sqlx::query_as::<_, (String, String)>(
        r#"SELECT ak.tenant_id, ak.status
           FROM api_keys ak
           JOIN tenants t ON t.tenant_id = ak.tenant_id
           WHERE ak.key_hash = $1 AND t.status = 'active'"#,
    )
    .bind(key_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(tenant_id, status)| ResolvedKey {
        tenant_id,
        key_status: KeyStatus::from_stored(&status),
    }))
}

/// Update last-used timestamp
pub async fn touch_last_used(pool: &PgPool, key_hash: &str) -> Result<(), PostgresError> {
    sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE key_hash = $1")
        .bind(key_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Create a new active API key
pub async fn create_api_key(pool: &PgPool, key: &NewApiKey) -> Result<ApiKeyRow, PostgresError> {
    let (key_prefix, tenant_id, name, scopes, status, created_at) =
        sqlx::query_as::<_, (String, String, String, String, String, DateTime<Utc>)>(
            r#"INSERT INTO api_keys (key_hash, key_prefix, tenant_id, name, scopes, status)
               VALUES ($1, $2, $3, $4, $5, 'active')
               RETURNING key_prefix, tenant_id, name, scopes, status, created_at"#,
        )
        .bind(&key.key_hash)
        .bind(&key.key_prefix)
        .bind(&key.tenant_id)
        .bind(&key.name)
        .bind(&key.scopes)
        .fetch_one(pool)
        .await?;

    Ok(ApiKeyRow {
        key_prefix,
        tenant_id,
        name,
        scopes,
        status: KeyStatus::from_stored(&status),
        created_at,
    })
}

/// Revoke the tenant's active keys with this display prefix
///
/// Returns whether any key was revoked.
pub async fn revoke_api_key(
    pool: &PgPool,
    tenant_id: &str,
    key_prefix: &str,
) -> Result<bool, PostgresError> {
    let result = sqlx::query(
        r#"UPDATE api_keys SET status = 'revoked'
           WHERE tenant_id = $1 AND key_prefix = $2 AND status = 'active'"#,
    )
    .bind(tenant_id)
    .bind(key_prefix)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
