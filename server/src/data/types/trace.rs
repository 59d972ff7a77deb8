//! Trace query params and results

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::SpanStatus;

/// Filter for trace listing
#[derive(Debug, Clone, Default)]
pub struct TraceFilter {
    pub service_name: Option<String>,
    /// Inclusive lower bound on span start time
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on span start time
    pub end: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

/// One row per distinct trace id in a listing
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TraceSummary {
    pub trace_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub service_name: String,
    pub environment: String,
    pub span_count: u64,
    pub error_count: u64,
}

/// Flat span as read back from the telemetry store
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRow {
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub service_name: String,
    pub environment: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub status: SpanStatus,
    pub error_message: Option<String>,
    pub attributes: HashMap<String, String>,
}

/// Span projected into a trace tree
#[derive(Debug, Clone, Serialize)]
pub struct SpanNode {
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    pub children: Vec<SpanNode>,
}

impl From<SpanRow> for SpanNode {
    fn from(row: SpanRow) -> Self {
        Self {
            span_id: row.span_id,
            parent_span_id: row.parent_span_id,
            name: row.name,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_ms: row.duration_ms,
            status: row.status,
            error_message: row.error_message,
            attributes: row.attributes,
            children: Vec::new(),
        }
    }
}

/// Full trace with its reconstructed span forest
#[derive(Debug, Clone, Serialize)]
pub struct TraceDetail {
    pub trace_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub service_name: String,
    pub environment: String,
    pub span_count: u64,
    pub error_count: u64,
    pub spans: Vec<SpanNode>,
}
