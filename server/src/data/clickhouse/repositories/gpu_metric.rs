//! ClickHouse GPU metric repository
//!
//! Batch writes of per-span GPU metric points plus the time-series and
//! latest-value reads used by the GPU routes.

use chrono::{DateTime, Utc};
use clickhouse::{Client, Row};
use serde::{Deserialize, Serialize};

use super::conditions::ConditionBuilder;
use crate::data::clickhouse::ClickhouseError;
use crate::data::types::{GpuLatestMetric, GpuMetricPoint, GpuMetricRow};
use crate::utils::clickhouse::{chrono_to_time, micros_to_chrono};

pub const GPU_METRICS_TABLE: &str = "gpu_metrics";

#[derive(Row, Serialize)]
struct GpuMetricInsertRow {
    tenant_id: String,
    #[serde(with = "clickhouse::serde::time::datetime64::micros")]
    timestamp: time::OffsetDateTime,
    resource_uuid: String,
    physical_gpu_uuid: String,
    node_id: String,
    utilization: f32,
    memory_used_gb: f32,
    memory_total_gb: f32,
    temperature_celsius: u8,
    power_watts: u16,
    clock_mhz: u16,
    active_spans: u16,
}

impl From<&GpuMetricPoint> for GpuMetricInsertRow {
    fn from(p: &GpuMetricPoint) -> Self {
        Self {
            tenant_id: p.tenant_id.clone(),
            timestamp: chrono_to_time(p.timestamp),
            resource_uuid: p.resource_uuid.clone(),
            physical_gpu_uuid: p.physical_gpu_uuid.clone(),
            node_id: p.node_id.clone(),
            utilization: p.utilization,
            memory_used_gb: p.memory_used_gb,
            memory_total_gb: p.memory_total_gb,
            temperature_celsius: p.temperature_celsius,
            power_watts: p.power_watts,
            clock_mhz: p.clock_mhz,
            active_spans: p.active_spans,
        }
    }
}

pub async fn insert_batch(
    client: &Client,
    points: &[GpuMetricPoint],
) -> Result<(), ClickhouseError> {
    if points.is_empty() {
        return Ok(());
    }

    let mut insert: clickhouse::insert::Insert<GpuMetricInsertRow> =
        client.insert(GPU_METRICS_TABLE).await?;
    for point in points {
        insert.write(&GpuMetricInsertRow::from(point)).await?;
    }
    insert.end().await?;
    Ok(())
}

#[derive(Row, Deserialize)]
struct ChGpuMetricRow {
    timestamp_us: i64,
    resource_uuid: String,
    utilization: f32,
    memory_used_gb: f32,
    power_watts: u16,
}

impl From<ChGpuMetricRow> for GpuMetricRow {
    fn from(row: ChGpuMetricRow) -> Self {
        Self {
            timestamp: micros_to_chrono(row.timestamp_us),
            resource_uuid: row.resource_uuid,
            utilization: row.utilization,
            memory_used_gb: row.memory_used_gb,
            power_watts: row.power_watts,
        }
    }
}

/// Metric points for one resource within an inclusive window, oldest first
pub async fn query_range(
    client: &Client,
    tenant_id: &str,
    resource_uuid: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<GpuMetricRow>, ClickhouseError> {
    let mut cb = ConditionBuilder::for_tenant(tenant_id);
    cb.add_eq("resource_uuid", resource_uuid);
    cb.add_time_range("timestamp", &start, &end);

    let sql = format!(
        r#"SELECT toUnixTimestamp64Micro(timestamp) AS timestamp_us,
                  resource_uuid, utilization, memory_used_gb, power_watts
           FROM {GPU_METRICS_TABLE}
           WHERE {}
           ORDER BY timestamp ASC"#,
        cb.build()
    );

    let rows: Vec<ChGpuMetricRow> = cb.bind_to(client.query(&sql)).fetch_all().await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

#[derive(Row, Deserialize)]
struct ChLatestRow {
    resource_uuid: String,
    latest_utilization: f32,
    latest_memory_used_gb: f32,
    latest_memory_total_gb: f32,
}

/// Latest reported values per resource
pub async fn query_latest(
    client: &Client,
    tenant_id: &str,
) -> Result<Vec<GpuLatestMetric>, ClickhouseError> {
    let cb = ConditionBuilder::for_tenant(tenant_id);
    let sql = format!(
        r#"SELECT resource_uuid,
                  argMax(utilization, timestamp) AS latest_utilization,
                  argMax(memory_used_gb, timestamp) AS latest_memory_used_gb,
                  argMax(memory_total_gb, timestamp) AS latest_memory_total_gb
           FROM {GPU_METRICS_TABLE}
           WHERE {}
           GROUP BY resource_uuid"#,
        cb.build()
    );

    let rows: Vec<ChLatestRow> = cb.bind_to(client.query(&sql)).fetch_all().await?;
    Ok(rows
        .into_iter()
        .map(|r| GpuLatestMetric {
            resource_uuid: r.resource_uuid,
            utilization: r.latest_utilization,
            memory_used_gb: r.latest_memory_used_gb,
            memory_total_gb: r.latest_memory_total_gb,
        })
        .collect())
}
