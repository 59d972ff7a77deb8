//! Tenant repository for PostgreSQL operations

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::{TenantRow, TenantStatus};

type TenantTuple = (String, String, String, String, DateTime<Utc>);

fn to_row((tenant_id, name, plan, status, created_at): TenantTuple) -> TenantRow {
    TenantRow {
        tenant_id,
        name,
        plan,
        status: TenantStatus::from_stored(&status),
        created_at,
    }
}

/// Create an active tenant
pub async fn create_tenant(
    pool: &PgPool,
    tenant_id: &str,
    name: &str,
    plan: &str,
) -> Result<TenantRow, PostgresError> {
    let row = sqlx::query_as::<_, TenantTuple>(
        r#"INSERT INTO tenants (tenant_id, name, plan, status)
           VALUES ($1, $2, $3, 'active')
           RETURNING tenant_id, name, plan, status, created_at"#,
    )
    .bind(tenant_id)
    .bind(name)
    .bind(plan)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            PostgresError::Conflict(format!("Tenant {} already exists", tenant_id))
        }
        other => PostgresError::Database(other),
    })?;

    Ok(to_row(row))
}

pub async fn list_tenants(pool: &PgPool) -> Result<Vec<TenantRow>, PostgresError> {
    let rows = sqlx::query_as::<_, TenantTuple>(
        "SELECT tenant_id, name, plan, status, created_at FROM tenants ORDER BY created_at, tenant_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(to_row).collect())
}

pub async fn get_tenant(pool: &PgPool, tenant_id: &str) -> Result<Option<TenantRow>, PostgresError> {
    let row = sqlx::query_as::<_, TenantTuple>(
        "SELECT tenant_id, name, plan, status, created_at FROM tenants WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(to_row))
}
