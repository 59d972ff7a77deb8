//! Repository trait implementations for ClickHouse
//!
//! ClickHouse operations are natively async so no spawn_blocking needed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::data::error::DataError;
use crate::data::traits::{AnalyticsQuerier, GpuMetricQuerier, Pinger, SpanWriter, TraceQuerier};
use crate::data::types::{
    GpuLatestMetric, GpuMetricPoint, GpuMetricRow, LatencyPoint, OverviewTotals, SpanRecord,
    SpanRow, ThroughputPoint, TraceFilter, TraceSummary,
};

use super::ClickhouseService;
use super::repositories::{analytics, gpu_metric, query, span};

#[async_trait]
impl SpanWriter for ClickhouseService {
    async fn insert_spans(&self, spans: &[SpanRecord]) -> Result<(), DataError> {
        span::insert_batch(self.client(), spans)
            .await
            .map_err(Into::into)
    }

    async fn insert_gpu_metrics(&self, points: &[GpuMetricPoint]) -> Result<(), DataError> {
        gpu_metric::insert_batch(self.client(), points)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl TraceQuerier for ClickhouseService {
    async fn query_traces(
        &self,
        tenant_id: &str,
        filter: &TraceFilter,
    ) -> Result<(Vec<TraceSummary>, u64), DataError> {
        query::list_traces(self.client(), tenant_id, filter)
            .await
            .map_err(Into::into)
    }

    async fn query_trace_spans(
        &self,
        tenant_id: &str,
        trace_id: &str,
    ) -> Result<Vec<SpanRow>, DataError> {
        query::get_trace_spans(self.client(), tenant_id, trace_id)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl GpuMetricQuerier for ClickhouseService {
    async fn query_gpu_metrics(
        &self,
        tenant_id: &str,
        resource_uuid: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GpuMetricRow>, DataError> {
        gpu_metric::query_range(self.client(), tenant_id, resource_uuid, start, end)
            .await
            .map_err(Into::into)
    }

    async fn latest_gpu_metrics(&self, tenant_id: &str) -> Result<Vec<GpuLatestMetric>, DataError> {
        gpu_metric::query_latest(self.client(), tenant_id)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl AnalyticsQuerier for ClickhouseService {
    async fn overview_totals(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<OverviewTotals, DataError> {
        analytics::overview_totals(self.client(), tenant_id, start, end)
            .await
            .map_err(Into::into)
    }

    async fn active_gpu_count(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, DataError> {
        analytics::active_gpu_count(self.client(), tenant_id, start, end)
            .await
            .map_err(Into::into)
    }

    async fn throughput_series(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ThroughputPoint>, DataError> {
        analytics::throughput_series(self.client(), tenant_id, start, end)
            .await
            .map_err(Into::into)
    }

    async fn latency_series(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LatencyPoint>, DataError> {
        analytics::latency_series(self.client(), tenant_id, start, end)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl Pinger for ClickhouseService {
    fn backend(&self) -> &'static str {
        "clickhouse"
    }

    async fn ping(&self) -> Result<(), DataError> {
        self.health_check().await.map_err(Into::into)
    }
}
