//! Analytics overview queries (ClickHouse backend)

use chrono::{DateTime, Utc};
use clickhouse::{Client, Row};
use serde::Deserialize;

use super::conditions::ConditionBuilder;
use super::gpu_metric::GPU_METRICS_TABLE;
use super::span::SPANS_TABLE;
use crate::data::clickhouse::ClickhouseError;
use crate::data::types::{LatencyPoint, OverviewTotals, ThroughputPoint};

fn span_window(tenant_id: &str, start: &DateTime<Utc>, end: &DateTime<Utc>) -> ConditionBuilder {
    let mut cb = ConditionBuilder::for_tenant(tenant_id);
    cb.add_time_range("start_time", start, end);
    cb
}

#[derive(Row, Deserialize)]
struct ChTotalsRow {
    total_traces: u64,
    total_spans: u64,
    error_traces: u64,
    avg_latency_ms: f64,
}

/// Trace-level totals; latency is averaged over trace durations
pub async fn overview_totals(
    client: &Client,
    tenant_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<OverviewTotals, ClickhouseError> {
    let cb = span_window(tenant_id, &start, &end);
    let sql = format!(
        r#"SELECT
               count() AS total_traces,
               sum(trace_spans) AS total_spans,
               countIf(trace_errors > 0) AS error_traces,
               if(count() = 0, 0, avg(trace_duration_ms)) AS avg_latency_ms
           FROM (
               SELECT
                   trace_id,
                   count() AS trace_spans,
                   countIf(status = 'error') AS trace_errors,
                   dateDiff('microsecond', min(start_time), max(end_time)) / 1000.0 AS trace_duration_ms
               FROM {SPANS_TABLE}
               WHERE {}
               GROUP BY trace_id
           )"#,
        cb.build()
    );

    let row: ChTotalsRow = cb.bind_to(client.query(&sql)).fetch_one().await?;
    Ok(OverviewTotals {
        total_traces: row.total_traces,
        total_spans: row.total_spans,
        error_traces: row.error_traces,
        avg_latency_ms: row.avg_latency_ms,
    })
}

pub async fn active_gpu_count(
    client: &Client,
    tenant_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<u64, ClickhouseError> {
    let mut cb = ConditionBuilder::for_tenant(tenant_id);
    cb.add_time_range("timestamp", &start, &end);
    let sql = format!(
        "SELECT uniqExact(resource_uuid) FROM {GPU_METRICS_TABLE} WHERE {}",
        cb.build()
    );
    Ok(cb.bind_to(client.query(&sql)).fetch_one().await?)
}

#[derive(Row, Deserialize)]
struct ChThroughputRow {
    bucket: i64,
    span_count: u64,
}

/// Spans per hour
pub async fn throughput_series(
    client: &Client,
    tenant_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<ThroughputPoint>, ClickhouseError> {
    let cb = span_window(tenant_id, &start, &end);
    let sql = format!(
        r#"SELECT
               toInt64(toUnixTimestamp(toStartOfHour(start_time))) AS bucket,
               count() AS span_count
           FROM {SPANS_TABLE}
           WHERE {}
           GROUP BY bucket
           ORDER BY bucket ASC"#,
        cb.build()
    );

    let rows: Vec<ChThroughputRow> = cb.bind_to(client.query(&sql)).fetch_all().await?;
    Ok(rows
        .into_iter()
        .map(|r| ThroughputPoint {
            timestamp: r.bucket,
            count: r.span_count,
        })
        .collect())
}

#[derive(Row, Deserialize)]
struct ChLatencyRow {
    bucket: i64,
    p50_ms: f64,
    p95_ms: f64,
    p99_ms: f64,
}

/// Span duration percentiles per hour
pub async fn latency_series(
    client: &Client,
    tenant_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<LatencyPoint>, ClickhouseError> {
    let cb = span_window(tenant_id, &start, &end);
    let sql = format!(
        r#"SELECT
               toInt64(toUnixTimestamp(toStartOfHour(start_time))) AS bucket,
               quantile(0.5)(duration_ms) AS p50_ms,
               quantile(0.95)(duration_ms) AS p95_ms,
               quantile(0.99)(duration_ms) AS p99_ms
           FROM {SPANS_TABLE}
           WHERE {}
           GROUP BY bucket
           ORDER BY bucket ASC"#,
        cb.build()
    );

    let rows: Vec<ChLatencyRow> = cb.bind_to(client.query(&sql)).fetch_all().await?;
    Ok(rows
        .into_iter()
        .map(|r| LatencyPoint {
            timestamp: r.bucket,
            p50_ms: r.p50_ms,
            p95_ms: r.p95_ms,
            p99_ms: r.p99_ms,
        })
        .collect())
}
