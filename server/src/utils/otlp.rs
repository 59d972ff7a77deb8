//! OTLP utility functions
//!
//! Attribute lookup and value coercion for OTLP protobuf types.

use std::collections::HashMap;

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};

// ============================================================================
// SHARED ATTRIBUTE KEYS
// ============================================================================

/// Resource and span attribute keys read during normalization
pub mod keys {
    pub const SERVICE_NAME: &str = "service.name";
    pub const DEPLOYMENT_ENV: &str = "deployment.environment";

    pub const MODEL_NAME: &str = "ai.model.name";
    pub const MODEL_VERSION: &str = "ai.model.version";
    pub const INFERENCE_TYPE: &str = "ai.inference.type";
    pub const TOKENS_INPUT: &str = "ai.llm.tokens.input";
    pub const TOKENS_OUTPUT: &str = "ai.llm.tokens.output";
    pub const TOKENS_PER_SECOND: &str = "ai.llm.tokens_per_second";
    pub const TTFT_MS: &str = "ai.llm.ttft_ms";
    pub const DIFFUSION_STEPS: &str = "ai.diffusion.steps";
    pub const CFG_SCALE: &str = "ai.diffusion.cfg_scale";
    pub const COST_USD: &str = "cost.usd";

    /// Prefix of indexed GPU attachment keys, `gpu.<N>.<field>`
    pub const GPU_PREFIX: &str = "gpu.";
}

/// True for `gpu.<N>.<field>`; other `gpu.` keys such as `gpu.count` are
/// ordinary attributes
pub fn is_indexed_gpu_key(key: &str) -> bool {
    key.strip_prefix(keys::GPU_PREFIX)
        .and_then(|rest| rest.split_once('.'))
        .is_some_and(|(index, field)| {
            !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) && !field.is_empty()
        })
}

// ============================================================================
// ATTRIBUTE LOOKUP
// ============================================================================

/// Value of a key sent without one
static EMPTY_VALUE: AnyValue = AnyValue { value: None };

/// Index attributes by key; later duplicates win. A key without a value is
/// still present and reads as the empty value.
pub fn attribute_map(attrs: &[KeyValue]) -> HashMap<&str, &AnyValue> {
    attrs
        .iter()
        .map(|kv| (kv.key.as_str(), kv.value.as_ref().unwrap_or(&EMPTY_VALUE)))
        .collect()
}

/// String value of a resource attribute, empty when absent
pub fn resource_string(attrs: &[KeyValue], key: &str) -> String {
    attrs
        .iter()
        .rev()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_ref())
        .map(any_value_to_string)
        .unwrap_or_default()
}

// ============================================================================
// VALUE COERCION
// ============================================================================

/// Convert AnyValue to string representation
pub fn any_value_to_string(value: &AnyValue) -> String {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => s.clone(),
        Some(any_value::Value::BoolValue(b)) => b.to_string(),
        Some(any_value::Value::IntValue(i)) => i.to_string(),
        Some(any_value::Value::DoubleValue(d)) => d.to_string(),
        Some(any_value::Value::ArrayValue(arr)) => {
            let values: Vec<String> = arr.values.iter().map(any_value_to_string).collect();
            serde_json::to_string(&values).unwrap_or_default()
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            let map: HashMap<String, String> = kvlist
                .values
                .iter()
                .filter_map(|kv| {
                    kv.value
                        .as_ref()
                        .map(|v| (kv.key.clone(), any_value_to_string(v)))
                })
                .collect();
            serde_json::to_string(&map).unwrap_or_default()
        }
        Some(any_value::Value::BytesValue(b)) => hex::encode(b),
        None => String::new(),
    }
}

/// Numeric value as f64 (ints are widened, anything else reads as 0)
pub fn any_value_as_f64(value: &AnyValue) -> f64 {
    match &value.value {
        Some(any_value::Value::DoubleValue(d)) => *d,
        Some(any_value::Value::IntValue(i)) => *i as f64,
        _ => 0.0,
    }
}

/// Numeric value as i64 (doubles are truncated, anything else reads as 0)
pub fn any_value_as_i64(value: &AnyValue) -> i64 {
    match &value.value {
        Some(any_value::Value::IntValue(i)) => *i,
        Some(any_value::Value::DoubleValue(d)) => *d as i64,
        _ => 0,
    }
}

/// Integer value clamped into `u32`
pub fn any_value_as_u32(value: &AnyValue) -> u32 {
    any_value_as_i64(value).clamp(0, u32::MAX as i64) as u32
}

/// Integer value clamped into `u16`
pub fn any_value_as_u16(value: &AnyValue) -> u16 {
    any_value_as_i64(value).clamp(0, u16::MAX as i64) as u16
}

/// Integer value clamped into `u8`
pub fn any_value_as_u8(value: &AnyValue) -> u8 {
    any_value_as_i64(value).clamp(0, u8::MAX as i64) as u8
}
