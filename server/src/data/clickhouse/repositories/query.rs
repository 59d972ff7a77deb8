//! Trace queries (ClickHouse backend)
//!
//! Column aliases never reuse a stored column name: ClickHouse resolves
//! aliases in WHERE, which would otherwise rewrite the tenant/time filters.

use std::collections::HashMap;

use clickhouse::{Client, Row};
use serde::Deserialize;

use super::conditions::ConditionBuilder;
use super::span::SPANS_TABLE;
use crate::data::clickhouse::ClickhouseError;
use crate::data::types::{SpanRow, SpanStatus, TraceFilter, TraceSummary};
use crate::utils::clickhouse::micros_to_chrono;

/// ClickHouse row for trace listing
#[derive(Row, Deserialize)]
struct ChTraceRow {
    trace_id: String,
    start_us: i64,
    end_us: i64,
    trace_service: String,
    trace_environment: String,
    span_count: u64,
    error_count: u64,
}

impl From<ChTraceRow> for TraceSummary {
    fn from(row: ChTraceRow) -> Self {
        Self {
            trace_id: row.trace_id,
            start_time: micros_to_chrono(row.start_us),
            end_time: micros_to_chrono(row.end_us),
            duration_ms: (row.end_us - row.start_us) as f64 / 1000.0,
            service_name: row.trace_service,
            environment: row.trace_environment,
            span_count: row.span_count,
            error_count: row.error_count,
        }
    }
}

fn trace_conditions(tenant_id: &str, filter: &TraceFilter) -> ConditionBuilder {
    let mut cb = ConditionBuilder::for_tenant(tenant_id);
    if let Some(ref service) = filter.service_name {
        cb.add_eq("service_name", service);
    }
    if let Some(ref start) = filter.start {
        cb.add_timestamp_gte("start_time", start);
    }
    if let Some(ref end) = filter.end {
        cb.add_timestamp_lte("start_time", end);
    }
    cb
}

/// List trace summaries newest first, with the total distinct trace count
pub async fn list_traces(
    client: &Client,
    tenant_id: &str,
    filter: &TraceFilter,
) -> Result<(Vec<TraceSummary>, u64), ClickhouseError> {
    let cb = trace_conditions(tenant_id, filter);
    let where_clause = cb.build();

    let count_sql = format!(
        "SELECT count(DISTINCT trace_id) FROM {SPANS_TABLE} WHERE {}",
        where_clause
    );
    let total: u64 = cb.bind_to(client.query(&count_sql)).fetch_one().await?;

    let sql = format!(
        r#"SELECT
               trace_id,
               toUnixTimestamp64Micro(min(start_time)) AS start_us,
               toUnixTimestamp64Micro(max(end_time)) AS end_us,
               any(service_name) AS trace_service,
               any(environment) AS trace_environment,
               count() AS span_count,
               countIf(status = 'error') AS error_count
           FROM {SPANS_TABLE}
           WHERE {}
           GROUP BY trace_id
           ORDER BY start_us DESC
           LIMIT ? OFFSET ?"#,
        where_clause
    );

    let rows: Vec<ChTraceRow> = cb
        .bind_to(client.query(&sql))
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all()
        .await?;

    Ok((rows.into_iter().map(Into::into).collect(), total))
}

/// ClickHouse row for spans of a single trace
#[derive(Row, Deserialize)]
struct ChSpanRow {
    span_id: String,
    parent_span_id: Option<String>,
    name: String,
    service_name: String,
    environment: String,
    start_us: i64,
    end_us: i64,
    duration_ms: f64,
    status: String,
    error_message: Option<String>,
    attributes: String,
}

impl From<ChSpanRow> for SpanRow {
    fn from(row: ChSpanRow) -> Self {
        Self {
            span_id: row.span_id,
            parent_span_id: row.parent_span_id.filter(|p| !p.is_empty()),
            name: row.name,
            service_name: row.service_name,
            environment: row.environment,
            start_time: micros_to_chrono(row.start_us),
            end_time: micros_to_chrono(row.end_us),
            duration_ms: row.duration_ms,
            status: SpanStatus::from_stored(&row.status),
            error_message: row.error_message,
            attributes: parse_attributes(&row.attributes),
        }
    }
}

/// Stored attributes are a JSON object of strings; anything else reads as empty
fn parse_attributes(raw: &str) -> HashMap<String, String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// All spans of a trace ordered by start time ascending
pub async fn get_trace_spans(
    client: &Client,
    tenant_id: &str,
    trace_id: &str,
) -> Result<Vec<SpanRow>, ClickhouseError> {
    let mut cb = ConditionBuilder::for_tenant(tenant_id);
    cb.add_eq("trace_id", trace_id);

    let sql = format!(
        r#"SELECT
               span_id, parent_span_id, name, service_name, environment,
               toUnixTimestamp64Micro(start_time) AS start_us,
               toUnixTimestamp64Micro(end_time) AS end_us,
               duration_ms, status, error_message, attributes
           FROM {SPANS_TABLE}
           WHERE {}
           ORDER BY start_time ASC"#,
        cb.build()
    );

    let rows: Vec<ChSpanRow> = cb.bind_to(client.query(&sql)).fetch_all().await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_trace_conditions_include_filters() {
        let filter = TraceFilter {
            service_name: Some("llm-api".into()),
            start: DateTime::from_timestamp(1_700_000_000, 0),
            end: None,
            limit: 50,
            offset: 0,
        };
        let cb = trace_conditions("acme", &filter);
        assert_eq!(
            cb.build(),
            "tenant_id = ? AND service_name = ? AND start_time >= fromUnixTimestamp64Micro(?)"
        );
    }

    #[test]
    fn test_trace_summary_duration() {
        let summary = TraceSummary::from(ChTraceRow {
            trace_id: "t1".into(),
            start_us: 1_000_000,
            end_us: 3_500_000,
            trace_service: "svc".into(),
            trace_environment: "prod".into(),
            span_count: 4,
            error_count: 1,
        });
        assert!((summary.duration_ms - 2500.0).abs() < f64::EPSILON);
        assert_eq!(summary.span_count, 4);
    }

    #[test]
    fn test_span_row_parses_attributes_and_status() {
        let row = SpanRow::from(ChSpanRow {
            span_id: "s1".into(),
            parent_span_id: Some(String::new()),
            name: "infer".into(),
            service_name: "svc".into(),
            environment: "prod".into(),
            start_us: 0,
            end_us: 1000,
            duration_ms: 1.0,
            status: "error".into(),
            error_message: Some("boom".into()),
            attributes: r#"{"k":"v"}"#.into(),
        });
        assert_eq!(row.parent_span_id, None);
        assert_eq!(row.status, SpanStatus::Error);
        assert_eq!(row.attributes.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_parse_attributes_invalid_json() {
        assert!(parse_attributes("not json").is_empty());
    }
}
