//! Usage repository for PostgreSQL operations
//!
//! One row per tenant per UTC day; writes always add to the counters.

use chrono::{Days, NaiveDate};
use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::UsageSnapshot;

/// Upsert-add the day's counters
pub async fn add_usage(
    pool: &PgPool,
    tenant_id: &str,
    day: NaiveDate,
    spans: i64,
    gpu_seconds: i64,
) -> Result<(), PostgresError> {
    let period_end = day.checked_add_days(Days::new(1)).unwrap_or(day);

    sqlx::query(
        r#"INSERT INTO usage_records (tenant_id, period_start, period_end, span_count, gpu_seconds)
           VALUES ($1, $2, $3, $4, $5)
           ON CONFLICT (tenant_id, period_start) DO UPDATE SET
               span_count = usage_records.span_count + EXCLUDED.span_count,
               gpu_seconds = usage_records.gpu_seconds + EXCLUDED.gpu_seconds"#,
    )
    .bind(tenant_id)
    .bind(day)
    .bind(period_end)
    .bind(spans)
    .bind(gpu_seconds)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_usage(
    pool: &PgPool,
    tenant_id: &str,
    day: NaiveDate,
) -> Result<Option<UsageSnapshot>, PostgresError> {
    let row = sqlx::query_as::<_, (i64, i64)>(
        "SELECT span_count, gpu_seconds FROM usage_records WHERE tenant_id = $1 AND period_start = $2",
    )
    .bind(tenant_id)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(span_count, gpu_seconds)| UsageSnapshot {
        tenant_id: tenant_id.to_string(),
        date: day,
        span_count,
        gpu_seconds,
    }))
}
