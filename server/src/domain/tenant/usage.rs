//! Per-tenant daily usage metering
//!
//! Counters are keyed by tenant and UTC day. Recording always adds to the
//! day's row (creating it when absent) and never overwrites.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::data::types::UsageSnapshot;
use crate::data::{DataError, UsageStore};

/// Sink for usage increments produced by the ingest pipeline
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record_spans(&self, tenant_id: &str, count: i64) -> Result<(), DataError>;

    async fn record_gpu_seconds(&self, tenant_id: &str, seconds: i64) -> Result<(), DataError>;
}

pub struct UsageMeter {
    store: Arc<dyn UsageStore>,
}

impl UsageMeter {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Today's usage; zero counters when nothing was recorded yet
    pub async fn get_usage(&self, tenant_id: &str) -> Result<UsageSnapshot, DataError> {
        self.get_usage_on(tenant_id, today()).await
    }

    async fn get_usage_on(
        &self,
        tenant_id: &str,
        date: NaiveDate,
    ) -> Result<UsageSnapshot, DataError> {
        let snapshot = self.store.get_usage(tenant_id, date).await?;
        Ok(snapshot.unwrap_or_else(|| UsageSnapshot {
            tenant_id: tenant_id.to_string(),
            date,
            span_count: 0,
            gpu_seconds: 0,
        }))
    }
}

#[async_trait]
impl UsageRecorder for UsageMeter {
    async fn record_spans(&self, tenant_id: &str, count: i64) -> Result<(), DataError> {
        self.store.add_usage(tenant_id, today(), count, 0).await
    }

    async fn record_gpu_seconds(&self, tenant_id: &str, seconds: i64) -> Result<(), DataError> {
        self.store.add_usage(tenant_id, today(), 0, seconds).await
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    use parking_lot::Mutex;

    /// In-memory usage table with upsert-add semantics
    #[derive(Default)]
    pub(crate) struct FakeUsageStore {
        pub rows: Mutex<HashMap<(String, NaiveDate), (i64, i64)>>,
    }

    #[async_trait]
    impl UsageStore for FakeUsageStore {
        async fn add_usage(
            &self,
            tenant_id: &str,
            day: NaiveDate,
            spans: i64,
            gpu_seconds: i64,
        ) -> Result<(), DataError> {
            let mut rows = self.rows.lock();
            let row = rows.entry((tenant_id.to_string(), day)).or_default();
            row.0 += spans;
            row.1 += gpu_seconds;
            Ok(())
        }

        async fn get_usage(
            &self,
            tenant_id: &str,
            day: NaiveDate,
        ) -> Result<Option<UsageSnapshot>, DataError> {
            Ok(self
                .rows
                .lock()
                .get(&(tenant_id.to_string(), day))
                .map(|&(span_count, gpu_seconds)| UsageSnapshot {
                    tenant_id: tenant_id.to_string(),
                    date: day,
                    span_count,
                    gpu_seconds,
                }))
        }
    }

    #[tokio::test]
    async fn test_record_spans_accumulates() {
        let meter = UsageMeter::new(Arc::new(FakeUsageStore::default()));

        meter.record_spans("tn_a", 5).await.unwrap();
        meter.record_spans("tn_a", 3).await.unwrap();
        meter.record_gpu_seconds("tn_a", 12).await.unwrap();

        let usage = meter.get_usage("tn_a").await.unwrap();
        assert_eq!(usage.span_count, 8);
        assert_eq!(usage.gpu_seconds, 12);
        assert_eq!(usage.date, today());
    }

    #[tokio::test]
    async fn test_get_usage_without_row_is_zero() {
        let meter = UsageMeter::new(Arc::new(FakeUsageStore::default()));

        let usage = meter.get_usage("tn_new").await.unwrap();
        assert_eq!(usage.tenant_id, "tn_new");
        assert_eq!(usage.span_count, 0);
        assert_eq!(usage.gpu_seconds, 0);
    }

    #[tokio::test]
    async fn test_days_are_separate() {
        let store = Arc::new(FakeUsageStore::default());
        let meter = UsageMeter::new(store.clone());
        let yesterday = today().pred_opt().unwrap();

        store.add_usage("tn_a", yesterday, 100, 0).await.unwrap();
        meter.record_spans("tn_a", 1).await.unwrap();

        assert_eq!(meter.get_usage("tn_a").await.unwrap().span_count, 1);
        assert_eq!(
            meter
                .get_usage_on("tn_a", yesterday)
                .await
                .unwrap()
                .span_count,
            100
        );
    }
}
