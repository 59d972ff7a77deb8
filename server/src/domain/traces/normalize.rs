//! Span normalization
//!
//! Flattens an OTLP export request into [`SpanRecord`]s. Span attributes
//! land in one of three places:
//!
//! 1. Known AI inference keys, coerced into typed fields
//! 2. Indexed GPU keys (`gpu.<N>.<field>`), collected into the GPU arrays
//! 3. Everything else, stringified into the free-form attribute map
//!
//! GPU indices are read from 0 upward and extraction stops at the first
//! index without a `resource_uuid`, even when higher indices exist.

use std::collections::HashMap;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::AnyValue;
use opentelemetry_proto::tonic::trace::v1::{Span, status::StatusCode};

use crate::data::types::{GpuAttachments, SpanRecord, SpanStatus};
use crate::utils::otlp::{
    any_value_as_f64, any_value_as_u8, any_value_as_u16, any_value_as_u32, any_value_to_string,
    attribute_map, is_indexed_gpu_key, keys, resource_string,
};
use crate::utils::time::{duration_ms, nanos_to_datetime};

/// Normalize every span of an export request, in traversal order
pub fn normalize(request: &ExportTraceServiceRequest, tenant_id: &str) -> Vec<SpanRecord> {
    let mut records = Vec::new();

    for resource_spans in &request.resource_spans {
        let resource_attrs = resource_spans
            .resource
            .as_ref()
            .map(|r| r.attributes.as_slice())
            .unwrap_or_default();
        let service_name = resource_string(resource_attrs, keys::SERVICE_NAME);
        let environment = resource_string(resource_attrs, keys::DEPLOYMENT_ENV);

        for scope_spans in &resource_spans.scope_spans {
            for span in &scope_spans.spans {
                records.push(normalize_span(span, tenant_id, &service_name, &environment));
            }
        }
    }

    records
}

fn normalize_span(
    span: &Span,
    tenant_id: &str,
    service_name: &str,
    environment: &str,
) -> SpanRecord {
    let attrs = attribute_map(&span.attributes);
    let (status, error_message) = map_status(span);

    let mut record = SpanRecord {
        tenant_id: tenant_id.to_string(),
        trace_id: hex::encode(&span.trace_id),
        span_id: hex::encode(&span.span_id),
        parent_span_id: if span.parent_span_id.is_empty() {
            None
        } else {
            Some(hex::encode(&span.parent_span_id))
        },
        name: span.name.clone(),
        service_name: service_name.to_string(),
        environment: environment.to_string(),
        start_time: nanos_to_datetime(span.start_time_unix_nano),
        end_time: nanos_to_datetime(span.end_time_unix_nano),
        duration_ms: duration_ms(span.start_time_unix_nano, span.end_time_unix_nano),
        status,
        error_message,
        gpus: parse_gpu_attachments(&attrs),
        ..Default::default()
    };

    for (key, value) in attrs {
        match key {
            keys::MODEL_NAME => record.model_name = Some(any_value_to_string(value)),
            keys::MODEL_VERSION => record.model_version = Some(any_value_to_string(value)),
            keys::INFERENCE_TYPE => record.inference_type = Some(any_value_to_string(value)),
            keys::TOKENS_INPUT => record.tokens_input = Some(any_value_as_u32(value)),
            keys::TOKENS_OUTPUT => record.tokens_output = Some(any_value_as_u32(value)),
            keys::TOKENS_PER_SECOND => {
                record.tokens_per_second = Some(any_value_as_f64(value) as f32)
            }
            keys::TTFT_MS => record.ttft_ms = Some(any_value_as_f64(value) as f32),
            keys::DIFFUSION_STEPS => record.diffusion_steps = Some(any_value_as_u16(value)),
            keys::CFG_SCALE => record.cfg_scale = Some(any_value_as_f64(value) as f32),
            keys::COST_USD => record.cost_usd = Some(any_value_as_f64(value)),
            _ if is_indexed_gpu_key(key) => {}
            _ => {
                record
                    .attributes
                    .insert(key.to_string(), any_value_to_string(value));
            }
        }
    }

    record
}

/// `ERROR` keeps a non-empty message, `UNSET` (or no status) is unset,
/// every other code is ok
fn map_status(span: &Span) -> (SpanStatus, Option<String>) {
    let Some(status) = span.status.as_ref() else {
        return (SpanStatus::Unset, None);
    };
    match StatusCode::try_from(status.code) {
        Ok(StatusCode::Error) => {
            let message = Some(status.message.clone()).filter(|m| !m.is_empty());
            (SpanStatus::Error, message)
        }
        Ok(StatusCode::Unset) => (SpanStatus::Unset, None),
        _ => (SpanStatus::Ok, None),
    }
}

fn parse_gpu_attachments(attrs: &HashMap<&str, &AnyValue>) -> GpuAttachments {
    let mut gpus = GpuAttachments::default();

    for idx in 0usize.. {
        let field = |name: &str| attrs.get(format!("gpu.{idx}.{name}").as_str()).copied();

        let Some(resource_uuid) = field("resource_uuid") else {
            break;
        };
        gpus.resource_uuids.push(any_value_to_string(resource_uuid));

        if let Some(v) = field("physical_uuid") {
            gpus.physical_uuids.push(any_value_to_string(v));
        }
        if let Some(v) = field("model") {
            gpus.models.push(any_value_to_string(v));
        }
        if let Some(v) = field("node_id") {
            gpus.node_ids.push(any_value_to_string(v));
        }
        if let Some(v) = field("resource_type") {
            gpus.resource_types.push(any_value_to_string(v));
        }
        if let Some(v) = field("user_label") {
            gpus.user_labels.push(any_value_to_string(v));
        }
        if let Some(v) = field("memory_used_gb") {
            gpus.memory_used_gb.push(any_value_as_f64(v) as f32);
        }
        if let Some(v) = field("memory_total_gb") {
            gpus.memory_total_gb.push(any_value_as_f64(v) as f32);
        }
        if let Some(v) = field("utilization") {
            gpus.utilization.push(any_value_as_f64(v) as f32);
        }
        if let Some(v) = field("temperature_celsius") {
            gpus.temperature_celsius.push(any_value_as_u8(v));
        }
        if let Some(v) = field("power_watts") {
            gpus.power_watts.push(any_value_as_u16(v));
        }
        if let Some(v) = field("clock_mhz") {
            gpus.clock_mhz.push(any_value_as_u16(v));
        }
    }

    gpus
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::{KeyValue, any_value};
    use opentelemetry_proto::tonic::resource::v1::Resource;
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Status};

    fn kv_str(key: &str, value: &str) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue {
                value: Some(any_value::Value::StringValue(value.to_string())),
            }),
        }
    }

    fn kv_int(key: &str, value: i64) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue {
                value: Some(any_value::Value::IntValue(value)),
            }),
        }
    }

    fn kv_double(key: &str, value: f64) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue {
                value: Some(any_value::Value::DoubleValue(value)),
            }),
        }
    }

    fn span(attributes: Vec<KeyValue>) -> Span {
        Span {
            trace_id: vec![0xab; 16],
            span_id: vec![0x01; 8],
            name: "generate".to_string(),
            start_time_unix_nano: 1_700_000_000_000_000_000,
            end_time_unix_nano: 1_700_000_000_250_000_000,
            attributes,
            ..Default::default()
        }
    }

    fn request(resource: Vec<KeyValue>, spans: Vec<Span>) -> ExportTraceServiceRequest {
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: Some(Resource {
                    attributes: resource,
                    ..Default::default()
                }),
                scope_spans: vec![ScopeSpans {
                    spans,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_core_fields_and_resource_labels() {
        let mut s = span(vec![]);
        s.parent_span_id = vec![0x02; 8];
        let req = request(
            vec![
                kv_str("service.name", "llm-api"),
                kv_str("deployment.environment", "prod"),
            ],
            vec![s, span(vec![])],
        );

        let records = normalize(&req, "tn_1");
        assert_eq!(records.len(), 2);

        let r = &records[0];
        assert_eq!(r.tenant_id, "tn_1");
        assert_eq!(r.trace_id, "ab".repeat(16));
        assert_eq!(r.span_id, "0101010101010101");
        assert_eq!(r.parent_span_id.as_deref(), Some("0202020202020202"));
        assert_eq!(r.service_name, "llm-api");
        assert_eq!(r.environment, "prod");
        assert_eq!(r.duration_ms, 250.0);
        assert_eq!(records[1].parent_span_id, None);
        assert_eq!(records[1].service_name, "llm-api");
    }

    #[test]
    fn test_negative_duration_passes_through() {
        let mut s = span(vec![]);
        s.start_time_unix_nano = 3_000_000;
        s.end_time_unix_nano = 1_000_000;

        let records = normalize(&request(vec![], vec![s]), "default");
        assert_eq!(records[0].duration_ms, -2.0);
    }

    #[test]
    fn test_status_mapping() {
        let with_status = |code: StatusCode, message: &str| {
            let mut s = span(vec![]);
            s.status = Some(Status {
                code: code as i32,
                message: message.to_string(),
            });
            map_status(&s)
        };

        assert_eq!(
            with_status(StatusCode::Error, "boom"),
            (SpanStatus::Error, Some("boom".to_string()))
        );
        assert_eq!(with_status(StatusCode::Error, ""), (SpanStatus::Error, None));
        assert_eq!(with_status(StatusCode::Unset, "x"), (SpanStatus::Unset, None));
        assert_eq!(with_status(StatusCode::Ok, "x"), (SpanStatus::Ok, None));
        assert_eq!(map_status(&span(vec![])), (SpanStatus::Unset, None));
    }

    #[test]
    fn test_attribute_classification() {
        let s = span(vec![
            kv_str("ai.model.name", "llama-3-70b"),
            kv_int("ai.llm.tokens.input", 512),
            kv_int("ai.llm.tokens.output", 128),
            kv_double("ai.llm.ttft_ms", 42.5),
            kv_int("ai.diffusion.steps", 70_000),
            kv_double("cost.usd", 0.0031),
            kv_str("gpu.0.resource_uuid", "GPU-a"),
            kv_str("gpu.9.model", "stray"),
            kv_str("http.route", "/v1/chat"),
            kv_int("retry.count", 2),
            kv_int("gpu.count", 8),
        ]);

        let r = &normalize(&request(vec![], vec![s]), "default")[0];
        assert_eq!(r.model_name.as_deref(), Some("llama-3-70b"));
        assert_eq!(r.tokens_input, Some(512));
        assert_eq!(r.tokens_output, Some(128));
        assert_eq!(r.ttft_ms, Some(42.5));
        assert_eq!(r.diffusion_steps, Some(u16::MAX));
        assert_eq!(r.cost_usd, Some(0.0031));
        assert_eq!(r.tokens_per_second, None);

        assert_eq!(r.attributes.len(), 3);
        assert_eq!(r.attributes["http.route"], "/v1/chat");
        assert_eq!(r.attributes["retry.count"], "2");
        assert_eq!(r.attributes["gpu.count"], "8");
        assert!(!r.attributes.contains_key("gpu.0.resource_uuid"));
        assert!(!r.attributes.contains_key("gpu.9.model"));
    }

    #[test]
    fn test_gpu_extraction_stops_at_first_gap() {
        let s = span(vec![
            kv_str("gpu.0.resource_uuid", "MIG-0"),
            kv_str("gpu.0.physical_uuid", "GPU-0"),
            kv_double("gpu.0.utilization", 0.75),
            kv_int("gpu.0.temperature_celsius", 64),
            kv_str("gpu.1.resource_uuid", "GPU-1"),
            kv_str("gpu.1.user_label", "trainer"),
            kv_str("gpu.3.resource_uuid", "GPU-3"),
            kv_str("gpu.3.model", "H100"),
        ]);

        let gpus = &normalize(&request(vec![], vec![s]), "default")[0].gpus;
        assert_eq!(gpus.resource_uuids, vec!["MIG-0", "GPU-1"]);
        assert_eq!(gpus.physical_uuids, vec!["GPU-0"]);
        assert_eq!(gpus.utilization, vec![0.75]);
        assert_eq!(gpus.temperature_celsius, vec![64]);
        assert_eq!(gpus.user_labels, vec!["trainer"]);
        assert!(gpus.models.is_empty());
    }

    #[test]
    fn test_valueless_resource_uuid_keeps_extracting() {
        let s = span(vec![
            KeyValue {
                key: "gpu.0.resource_uuid".to_string(),
                value: None,
            },
            kv_str("gpu.1.resource_uuid", "GPU-1"),
        ]);

        let gpus = &normalize(&request(vec![], vec![s]), "default")[0].gpus;
        assert_eq!(gpus.resource_uuids, vec!["", "GPU-1"]);
    }

    #[test]
    fn test_gpu_extraction_requires_index_zero() {
        let s = span(vec![kv_str("gpu.1.resource_uuid", "GPU-1")]);
        let gpus = &normalize(&request(vec![], vec![s]), "default")[0].gpus;
        assert!(gpus.is_empty());
    }
}
