//! Trace, GPU and analytics query engine
//!
//! Thin orchestration over the narrow querier traits: page clamping, tree
//! assembly for a single trace, and merging inventory with the latest
//! metric values for the GPU list.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::constants::{QUERY_DEFAULT_LIMIT, QUERY_MAX_LIMIT};
use crate::data::types::{
    AnalyticsOverview, GpuDetail, GpuMetricRow, GpuSummary, TraceDetail, TraceFilter,
    TraceSummary,
};
use crate::data::{AnalyticsQuerier, DataError, GpuMetricQuerier, GpuQuerier, TraceQuerier};
use crate::domain::traces::build_trace;

/// One page of trace summaries with the unpaginated total
#[derive(Debug, Clone)]
pub struct TracePage {
    pub traces: Vec<TraceSummary>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

pub struct QueryService {
    traces: Arc<dyn TraceQuerier>,
    gpus: Arc<dyn GpuQuerier>,
    metrics: Arc<dyn GpuMetricQuerier>,
    analytics: Arc<dyn AnalyticsQuerier>,
}

impl QueryService {
    pub fn new(
        traces: Arc<dyn TraceQuerier>,
        gpus: Arc<dyn GpuQuerier>,
        metrics: Arc<dyn GpuMetricQuerier>,
        analytics: Arc<dyn AnalyticsQuerier>,
    ) -> Self {
        Self {
            traces,
            gpus,
            metrics,
            analytics,
        }
    }

    pub async fn list_traces(
        &self,
        tenant_id: &str,
        mut filter: TraceFilter,
    ) -> Result<TracePage, DataError> {
        filter.limit = clamp_limit(filter.limit);
        let (traces, total) = self.traces.query_traces(tenant_id, &filter).await?;
        Ok(TracePage {
            traces,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    /// `None` when no span carries this trace id
    pub async fn get_trace(
        &self,
        tenant_id: &str,
        trace_id: &str,
    ) -> Result<Option<TraceDetail>, DataError> {
        let rows = self.traces.query_trace_spans(tenant_id, trace_id).await?;
        Ok(build_trace(trace_id, rows))
    }

    /// Inventory enriched with each resource's most recent metric values
    pub async fn list_gpus(&self, tenant_id: &str) -> Result<Vec<GpuSummary>, DataError> {
        let (gpus, latest) = tokio::try_join!(
            self.gpus.list_gpus(tenant_id),
            self.metrics.latest_gpu_metrics(tenant_id)
        )?;

        let latest: HashMap<_, _> = latest
            .into_iter()
            .map(|m| (m.resource_uuid.clone(), m))
            .collect();

        Ok(gpus
            .into_iter()
            .map(|mut gpu| {
                if let Some(m) = latest.get(&gpu.resource_uuid) {
                    gpu.utilization = m.utilization;
                    gpu.memory_used_gb = m.memory_used_gb;
                    if m.memory_total_gb > 0.0 {
                        gpu.memory_total_gb = m.memory_total_gb;
                    }
                }
                gpu
            })
            .collect())
    }

    pub async fn get_gpu(
        &self,
        tenant_id: &str,
        resource_uuid: &str,
    ) -> Result<Option<GpuDetail>, DataError> {
        self.gpus.get_gpu(tenant_id, resource_uuid).await
    }

    pub async fn gpu_metrics(
        &self,
        tenant_id: &str,
        resource_uuid: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GpuMetricRow>, DataError> {
        self.metrics
            .query_gpu_metrics(tenant_id, resource_uuid, start, end)
            .await
    }

    pub async fn analytics_overview(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AnalyticsOverview, DataError> {
        let (totals, active_gpus, throughput, latency) = tokio::try_join!(
            self.analytics.overview_totals(tenant_id, start, end),
            self.analytics.active_gpu_count(tenant_id, start, end),
            self.analytics.throughput_series(tenant_id, start, end),
            self.analytics.latency_series(tenant_id, start, end),
        )?;
        Ok(AnalyticsOverview::assemble(
            totals,
            active_gpus,
            throughput,
            latency,
        ))
    }
}

/// Zero means "use the default"; anything above the cap is capped
fn clamp_limit(limit: u32) -> u32 {
    match limit {
        0 => QUERY_DEFAULT_LIMIT,
        n => n.min(QUERY_MAX_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::data::types::{
        GpuLatestMetric, LatencyPoint, OverviewTotals, SpanRow, SpanStatus, ThroughputPoint,
    };

    #[derive(Default)]
    struct FakeStore {
        last_filter: Mutex<Option<TraceFilter>>,
        spans: Vec<SpanRow>,
        gpus: Vec<GpuSummary>,
        latest: Vec<GpuLatestMetric>,
    }

    #[async_trait]
    impl TraceQuerier for FakeStore {
        async fn query_traces(
            &self,
            _tenant_id: &str,
            filter: &TraceFilter,
        ) -> Result<(Vec<TraceSummary>, u64), DataError> {
            *self.last_filter.lock() = Some(filter.clone());
            Ok((vec![], 1234))
        }

        async fn query_trace_spans(
            &self,
            _tenant_id: &str,
            _trace_id: &str,
        ) -> Result<Vec<SpanRow>, DataError> {
            Ok(self.spans.clone())
        }
    }

    #[async_trait]
    impl GpuQuerier for FakeStore {
        async fn list_gpus(&self, _tenant_id: &str) -> Result<Vec<GpuSummary>, DataError> {
            Ok(self.gpus.clone())
        }

        async fn get_gpu(
            &self,
            _tenant_id: &str,
            _resource_uuid: &str,
        ) -> Result<Option<GpuDetail>, DataError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl GpuMetricQuerier for FakeStore {
        async fn query_gpu_metrics(
            &self,
            _tenant_id: &str,
            _resource_uuid: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<GpuMetricRow>, DataError> {
            Ok(vec![])
        }

        async fn latest_gpu_metrics(
            &self,
            _tenant_id: &str,
        ) -> Result<Vec<GpuLatestMetric>, DataError> {
            Ok(self.latest.clone())
        }
    }

    #[async_trait]
    impl AnalyticsQuerier for FakeStore {
        async fn overview_totals(
            &self,
            _tenant_id: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<OverviewTotals, DataError> {
            Ok(OverviewTotals {
                total_traces: 10,
                total_spans: 50,
                error_traces: 2,
                avg_latency_ms: 120.0,
            })
        }

        async fn active_gpu_count(
            &self,
            _tenant_id: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<u64, DataError> {
            Ok(4)
        }

        async fn throughput_series(
            &self,
            _tenant_id: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<ThroughputPoint>, DataError> {
            Ok(vec![ThroughputPoint {
                timestamp: 0,
                count: 50,
            }])
        }

        async fn latency_series(
            &self,
            _tenant_id: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<LatencyPoint>, DataError> {
            Err(DataError::timeout("clickhouse", 60))
        }
    }

    fn service(store: FakeStore) -> (QueryService, Arc<FakeStore>) {
        let store = Arc::new(store);
        let svc = QueryService::new(store.clone(), store.clone(), store.clone(), store.clone());
        (svc, store)
    }

    fn gpu(uuid: &str, memory_total_gb: f32) -> GpuSummary {
        GpuSummary {
            resource_uuid: uuid.to_string(),
            physical_uuid: uuid.to_string(),
            model: "H100".to_string(),
            resource_type: "full_gpu".to_string(),
            node_id: "node-a".to_string(),
            utilization: 0.0,
            memory_used_gb: 0.0,
            memory_total_gb,
        }
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0), 50);
        assert_eq!(clamp_limit(10), 10);
        assert_eq!(clamp_limit(1000), 1000);
        assert_eq!(clamp_limit(5000), 1000);
    }

    #[tokio::test]
    async fn test_list_traces_clamps_and_reports_total() {
        let (svc, store) = service(FakeStore::default());

        let page = svc
            .list_traces(
                "tn_a",
                TraceFilter {
                    limit: 9999,
                    offset: 20,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(page.limit, 1000);
        assert_eq!(page.offset, 20);
        assert_eq!(page.total, 1234);
        assert_eq!(store.last_filter.lock().as_ref().unwrap().limit, 1000);
    }

    #[tokio::test]
    async fn test_get_trace_not_found_is_none() {
        let (svc, _) = service(FakeStore::default());
        assert!(svc.get_trace("tn_a", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_trace_builds_tree() {
        let now = Utc::now();
        let row = |id: &str, parent: Option<&str>, status| SpanRow {
            span_id: id.to_string(),
            parent_span_id: parent.map(str::to_string),
            name: id.to_string(),
            service_name: "svc".to_string(),
            environment: String::new(),
            start_time: now,
            end_time: now,
            duration_ms: 0.0,
            status,
            error_message: None,
            attributes: HashMap::new(),
        };
        let (svc, _) = service(FakeStore {
            spans: vec![
                row("1", None, SpanStatus::Ok),
                row("2", Some("1"), SpanStatus::Error),
            ],
            ..Default::default()
        });

        let trace = svc.get_trace("tn_a", "abc").await.unwrap().unwrap();
        assert_eq!(trace.trace_id, "abc");
        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.error_count, 1);
    }

    #[tokio::test]
    async fn test_list_gpus_merges_latest_metrics() {
        let (svc, _) = service(FakeStore {
            gpus: vec![gpu("GPU-1", 80.0), gpu("GPU-2", 40.0)],
            latest: vec![GpuLatestMetric {
                resource_uuid: "GPU-2".to_string(),
                utilization: 0.6,
                memory_used_gb: 12.0,
                memory_total_gb: 0.0,
            }],
            ..Default::default()
        });

        let gpus = svc.list_gpus("tn_a").await.unwrap();
        assert_eq!(gpus[0].utilization, 0.0);
        assert_eq!(gpus[1].utilization, 0.6);
        assert_eq!(gpus[1].memory_used_gb, 12.0);
        // A zero reading does not replace the inventory capacity
        assert_eq!(gpus[1].memory_total_gb, 40.0);
    }

    #[tokio::test]
    async fn test_analytics_overview_propagates_failure() {
        let (svc, _) = service(FakeStore::default());
        let now = Utc::now();
        let err = svc
            .analytics_overview("tn_a", now - chrono::Duration::hours(24), now)
            .await
            .unwrap_err();
        assert_eq!(err.backend(), "clickhouse");
    }
}
