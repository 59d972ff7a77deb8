//! ClickHouse span repository
//!
//! Batch writes for normalized spans.

use clickhouse::Client;
use clickhouse::Row;
use serde::Serialize;

use crate::data::clickhouse::ClickhouseError;
use crate::data::types::SpanRecord;
use crate::utils::clickhouse::chrono_to_time;

pub const SPANS_TABLE: &str = "spans";

/// Row structure for inserting spans into ClickHouse
#[derive(Row, Serialize)]
struct SpanInsertRow {
    tenant_id: String,
    trace_id: String,
    span_id: String,
    parent_span_id: Option<String>,
    name: String,
    service_name: String,
    environment: String,
    #[serde(with = "clickhouse::serde::time::datetime64::micros")]
    start_time: time::OffsetDateTime,
    #[serde(with = "clickhouse::serde::time::datetime64::micros")]
    end_time: time::OffsetDateTime,
    duration_ms: f64,
    model_name: Option<String>,
    model_version: Option<String>,
    inference_type: Option<String>,
    tokens_input: Option<u32>,
    tokens_output: Option<u32>,
    tokens_per_second: Option<f32>,
    ttft_ms: Option<f32>,
    diffusion_steps: Option<u16>,
    cfg_scale: Option<f32>,
    cost_usd: Option<f64>,
    gpu_resource_uuids: Vec<String>,
    gpu_physical_uuids: Vec<String>,
    gpu_models: Vec<String>,
    gpu_node_ids: Vec<String>,
    gpu_resource_types: Vec<String>,
    gpu_user_labels: Vec<String>,
    gpu_memory_used_gb: Vec<f32>,
    gpu_memory_total_gb: Vec<f32>,
    gpu_utilization: Vec<f32>,
    gpu_temperature_celsius: Vec<u8>,
    gpu_power_watts: Vec<u16>,
    gpu_clock_mhz: Vec<u16>,
    status: String,
    error_message: Option<String>,
    attributes: String,
}

impl From<&SpanRecord> for SpanInsertRow {
    fn from(span: &SpanRecord) -> Self {
        let gpus = &span.gpus;
        Self {
            tenant_id: span.tenant_id.clone(),
            trace_id: span.trace_id.clone(),
            span_id: span.span_id.clone(),
            parent_span_id: span.parent_span_id.clone(),
            name: span.name.clone(),
            service_name: span.service_name.clone(),
            environment: span.environment.clone(),
            start_time: chrono_to_time(span.start_time),
            end_time: chrono_to_time(span.end_time),
            duration_ms: span.duration_ms,
            model_name: span.model_name.clone(),
            model_version: span.model_version.clone(),
            inference_type: span.inference_type.clone(),
            tokens_input: span.tokens_input,
            tokens_output: span.tokens_output,
            tokens_per_second: span.tokens_per_second,
            ttft_ms: span.ttft_ms,
            diffusion_steps: span.diffusion_steps,
            cfg_scale: span.cfg_scale,
            cost_usd: span.cost_usd,
            gpu_resource_uuids: gpus.resource_uuids.clone(),
            gpu_physical_uuids: gpus.physical_uuids.clone(),
            gpu_models: gpus.models.clone(),
            gpu_node_ids: gpus.node_ids.clone(),
            gpu_resource_types: gpus.resource_types.clone(),
            gpu_user_labels: gpus.user_labels.clone(),
            gpu_memory_used_gb: gpus.memory_used_gb.clone(),
            gpu_memory_total_gb: gpus.memory_total_gb.clone(),
            gpu_utilization: gpus.utilization.clone(),
            gpu_temperature_celsius: gpus.temperature_celsius.clone(),
            gpu_power_watts: gpus.power_watts.clone(),
            gpu_clock_mhz: gpus.clock_mhz.clone(),
            status: span.status.as_str().to_string(),
            error_message: span.error_message.clone(),
            attributes: serde_json::to_string(&span.attributes).unwrap_or_else(|_| "{}".into()),
        }
    }
}

/// Insert a batch of spans into ClickHouse
pub async fn insert_batch(client: &Client, spans: &[SpanRecord]) -> Result<(), ClickhouseError> {
    if spans.is_empty() {
        return Ok(());
    }

    let mut insert: clickhouse::insert::Insert<SpanInsertRow> = client.insert(SPANS_TABLE).await?;

    for span in spans {
        let row = SpanInsertRow::from(span);
        insert.write(&row).await?;
    }

    insert.end().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{GpuAttachments, SpanStatus};
    use chrono::DateTime;
    use std::collections::HashMap;

    #[test]
    fn test_insert_row_from_span_record() {
        let span = SpanRecord {
            tenant_id: "acme".into(),
            trace_id: "aa".into(),
            span_id: "bb".into(),
            name: "generate".into(),
            start_time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            end_time: DateTime::from_timestamp(1_700_000_001, 0).unwrap(),
            duration_ms: 1000.0,
            tokens_input: Some(12),
            gpus: GpuAttachments {
                resource_uuids: vec!["GPU-1".into()],
                temperature_celsius: vec![61],
                ..Default::default()
            },
            status: SpanStatus::Error,
            error_message: Some("oom".into()),
            attributes: HashMap::from([("http.method".to_string(), "POST".to_string())]),
            ..Default::default()
        };

        let row = SpanInsertRow::from(&span);
        assert_eq!(row.tenant_id, "acme");
        assert_eq!(row.status, "error");
        assert_eq!(row.tokens_input, Some(12));
        assert_eq!(row.gpu_resource_uuids, vec!["GPU-1".to_string()]);
        assert_eq!(row.gpu_temperature_celsius, vec![61]);
        assert!(row.gpu_power_watts.is_empty());
        assert_eq!(row.start_time.unix_timestamp(), 1_700_000_000);
        assert_eq!(row.attributes, r#"{"http.method":"POST"}"#);
    }
}
