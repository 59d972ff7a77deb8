//! GPU inventory repository for PostgreSQL operations
//!
//! Upserts are idempotent: replays of the same batch only move
//! `last_seen_at` forward.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::{
    ComputeResourceRecord, GpuDetail, GpuSummary, PhysicalGpuRecord, ResourceContextRecord,
};

pub async fn upsert_physical_gpu(
    pool: &PgPool,
    gpu: &PhysicalGpuRecord,
) -> Result<(), PostgresError> {
    sqlx::query(
        r#"INSERT INTO physical_gpus (tenant_id, uuid, model, vendor, memory_total_gb, node_id)
           VALUES ($1, $2, $3, $4, $5, $6)
           ON CONFLICT (tenant_id, uuid) DO UPDATE SET
               last_seen_at = NOW(),
               model = EXCLUDED.model,
               node_id = EXCLUDED.node_id"#,
    )
    .bind(&gpu.tenant_id)
    .bind(&gpu.uuid)
    .bind(&gpu.model)
    .bind(&gpu.vendor)
    .bind(gpu.memory_total_gb)
    .bind(&gpu.node_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_compute_resource(
    pool: &PgPool,
    resource: &ComputeResourceRecord,
) -> Result<(), PostgresError> {
    sqlx::query(
        r#"INSERT INTO compute_resources (tenant_id, resource_uuid, physical_gpu_uuid, resource_type, memory_gb)
           VALUES ($1, $2, $3, $4, $5)
           ON CONFLICT (tenant_id, resource_uuid) DO UPDATE SET
               last_seen_at = NOW(),
               resource_type = EXCLUDED.resource_type"#,
    )
    .bind(&resource.tenant_id)
    .bind(&resource.resource_uuid)
    .bind(&resource.physical_uuid)
    .bind(&resource.resource_type)
    .bind(resource.memory_gb)
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a context or reattach an existing one (clears `detached_at`)
pub async fn upsert_resource_context(
    pool: &PgPool,
    context: &ResourceContextRecord,
) -> Result<(), PostgresError> {
    sqlx::query(
        r#"INSERT INTO resource_contexts (tenant_id, context_id, resource_uuid, user_label, hostname)
           VALUES ($1, $2, $3, $4, $5)
           ON CONFLICT (tenant_id, context_id) DO UPDATE SET
               hostname = EXCLUDED.hostname,
               detached_at = NULL"#,
    )
    .bind(&context.tenant_id)
    .bind(context.context_id())
    .bind(&context.resource_uuid)
    .bind(&context.user_label)
    .bind(&context.hostname)
    .execute(pool)
    .await?;
    Ok(())
}

/// Inventory view of every compute resource; metric columns are zero here
/// and filled in from the telemetry store by the query engine.
pub async fn list_gpus(pool: &PgPool, tenant_id: &str) -> Result<Vec<GpuSummary>, PostgresError> {
    let rows = sqlx::query_as::<_, (String, String, String, String, String, f32)>(
        r#"SELECT cr.resource_uuid, cr.physical_gpu_uuid,
                  COALESCE(pg.model, ''), cr.resource_type,
                  COALESCE(pg.node_id, ''), cr.memory_gb
           FROM compute_resources cr
           LEFT JOIN physical_gpus pg
             ON pg.tenant_id = cr.tenant_id AND pg.uuid = cr.physical_gpu_uuid
           WHERE cr.tenant_id = $1
           ORDER BY COALESCE(pg.node_id, ''), cr.resource_uuid"#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(resource_uuid, physical_uuid, model, resource_type, node_id, memory_gb)| GpuSummary {
                resource_uuid,
                physical_uuid,
                model,
                resource_type,
                node_id,
                utilization: 0.0,
                memory_used_gb: 0.0,
                memory_total_gb: memory_gb,
            },
        )
        .collect())
}

pub async fn get_gpu(
    pool: &PgPool,
    tenant_id: &str,
    resource_uuid: &str,
) -> Result<Option<GpuDetail>, PostgresError> {
    let row = sqlx::query_as::<
        _,
        (
            String,
            String,
            String,
            String,
            String,
            DateTime<Utc>,
            DateTime<Utc>,
        ),
    >(
        r#"SELECT cr.resource_uuid, cr.physical_gpu_uuid,
                  COALESCE(pg.model, ''), cr.resource_type,
                  COALESCE(pg.node_id, ''), cr.created_at, cr.last_seen_at
           FROM compute_resources cr
           LEFT JOIN physical_gpus pg
             ON pg.tenant_id = cr.tenant_id AND pg.uuid = cr.physical_gpu_uuid
           WHERE cr.tenant_id = $1 AND cr.resource_uuid = $2"#,
    )
    .bind(tenant_id)
    .bind(resource_uuid)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(resource_uuid, physical_uuid, model, resource_type, node_id, first_seen, last_seen)| {
            GpuDetail {
                resource_uuid,
                physical_uuid,
                model,
                resource_type,
                node_id,
                first_seen,
                last_seen,
            }
        },
    ))
}
