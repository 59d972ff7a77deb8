//! Normalized span record produced by ingestion

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::SpanStatus;

/// Per-span GPU attachments, one entry per accepted `gpu.<N>` index.
///
/// `resource_uuids` always has one entry per attachment. The optional
/// columns only grow when the attribute was present for that index, so they
/// may be shorter; read them through the bounds-checked accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuAttachments {
    pub resource_uuids: Vec<String>,
    pub physical_uuids: Vec<String>,
    pub models: Vec<String>,
    pub node_ids: Vec<String>,
    pub resource_types: Vec<String>,
    pub user_labels: Vec<String>,
    pub memory_used_gb: Vec<f32>,
    pub memory_total_gb: Vec<f32>,
    pub utilization: Vec<f32>,
    pub temperature_celsius: Vec<u8>,
    pub power_watts: Vec<u16>,
    pub clock_mhz: Vec<u16>,
}

impl GpuAttachments {
    /// Number of attached GPUs
    pub fn len(&self) -> usize {
        self.resource_uuids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_uuids.is_empty()
    }

    pub fn physical_uuid(&self, i: usize) -> Option<&str> {
        self.physical_uuids.get(i).map(String::as_str)
    }

    pub fn model(&self, i: usize) -> Option<&str> {
        self.models.get(i).map(String::as_str)
    }

    pub fn node_id(&self, i: usize) -> Option<&str> {
        self.node_ids.get(i).map(String::as_str)
    }

    pub fn resource_type(&self, i: usize) -> Option<&str> {
        self.resource_types.get(i).map(String::as_str)
    }

    pub fn user_label(&self, i: usize) -> Option<&str> {
        self.user_labels.get(i).map(String::as_str)
    }

    pub fn memory_used_gb(&self, i: usize) -> Option<f32> {
        self.memory_used_gb.get(i).copied()
    }

    pub fn memory_total_gb(&self, i: usize) -> Option<f32> {
        self.memory_total_gb.get(i).copied()
    }

    pub fn utilization(&self, i: usize) -> Option<f32> {
        self.utilization.get(i).copied()
    }

    pub fn temperature_celsius(&self, i: usize) -> Option<u8> {
        self.temperature_celsius.get(i).copied()
    }

    pub fn power_watts(&self, i: usize) -> Option<u16> {
        self.power_watts.get(i).copied()
    }

    pub fn clock_mhz(&self, i: usize) -> Option<u16> {
        self.clock_mhz.get(i).copied()
    }
}

/// One normalized span, immutable once built by the normalizer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanRecord {
    // Identity
    pub tenant_id: String,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,

    // Labels
    pub name: String,
    pub service_name: String,
    pub environment: String,

    // Timing
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `(end - start)` in milliseconds; negative under clock skew
    pub duration_ms: f64,

    // AI inference
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub inference_type: Option<String>,
    pub tokens_input: Option<u32>,
    pub tokens_output: Option<u32>,
    pub tokens_per_second: Option<f32>,
    pub ttft_ms: Option<f32>,
    pub diffusion_steps: Option<u16>,
    pub cfg_scale: Option<f32>,
    pub cost_usd: Option<f64>,

    pub gpus: GpuAttachments,

    // Outcome
    pub status: SpanStatus,
    pub error_message: Option<String>,

    /// Everything not captured above, stringified
    pub attributes: HashMap<String, String>,
}

impl SpanRecord {
    /// GPU-seconds consumed by this span (zero for negative durations)
    pub fn gpu_seconds(&self) -> f64 {
        if self.duration_ms <= 0.0 {
            return 0.0;
        }
        self.duration_ms / 1000.0 * self.gpus.len() as f64
    }
}
