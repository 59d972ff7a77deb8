//! Analytics overview results

use serde::Serialize;
use utoipa::ToSchema;

/// Scalar totals over the requested window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverviewTotals {
    pub total_traces: u64,
    pub total_spans: u64,
    pub error_traces: u64,
    pub avg_latency_ms: f64,
}

/// Span count per hourly bucket (bucket start as unix seconds)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThroughputPoint {
    pub timestamp: i64,
    pub count: u64,
}

/// Span latency percentiles per hourly bucket
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LatencyPoint {
    pub timestamp: i64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalyticsOverview {
    pub total_traces: u64,
    pub total_spans: u64,
    pub avg_latency_ms: f64,
    /// Fraction of traces containing at least one error span
    pub error_rate: f64,
    pub active_gpu_count: u64,
    pub throughput_series: Vec<ThroughputPoint>,
    pub latency_series: Vec<LatencyPoint>,
}

impl AnalyticsOverview {
    pub fn assemble(
        totals: OverviewTotals,
        active_gpu_count: u64,
        throughput_series: Vec<ThroughputPoint>,
        latency_series: Vec<LatencyPoint>,
    ) -> Self {
        let error_rate = if totals.total_traces == 0 {
            0.0
        } else {
            totals.error_traces as f64 / totals.total_traces as f64
        };
        Self {
            total_traces: totals.total_traces,
            total_spans: totals.total_spans,
            avg_latency_ms: totals.avg_latency_ms,
            error_rate,
            active_gpu_count,
            throughput_series,
            latency_series,
        }
    }
}
