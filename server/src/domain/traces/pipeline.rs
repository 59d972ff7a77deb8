//! Batching ingest pipeline
//!
//! ```text
//!  Export ──▶ normalize ──▶ submit ──▶ [ buffer ] ──▶ flush (threshold or timer)
//!                                                     │
//!                  ┌──────────────────┬───────────────┼──────────────────┐
//!                  ▼                  ▼               ▼                  ▼
//!             insert spans    insert GPU metrics   register GPUs    record usage
//! ```
//!
//! The buffer lock only covers appending and swapping the batch out. All
//! storage I/O of a flush runs on the detached batch after the lock is
//! released, so ingestion never waits on a slow write unless its own submit
//! crossed the threshold.
//!
//! The four flush steps are independent: each runs under the flush timeout
//! and a failure is logged without affecting the others. Nothing is retried.
//! A failed flush is never reported to the exporting client.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::registrar::{GpuRegistrar, physical_uuid};
use crate::core::{Drain, IngestConfig};
use crate::data::SpanWriter;
use crate::data::types::{GpuMetricPoint, SpanRecord};
use crate::domain::tenant::UsageRecorder;

/// Background flush timer: stop signal plus the task to join
struct FlushTimer {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct IngestPipeline {
    buffer: Mutex<Vec<SpanRecord>>,
    batch_size: usize,
    flush_interval: Duration,
    flush_timeout: Duration,
    writer: Arc<dyn SpanWriter>,
    registrar: GpuRegistrar,
    usage: Option<Arc<dyn UsageRecorder>>,
    timer: Mutex<Option<FlushTimer>>,
}

impl IngestPipeline {
    pub fn new(
        config: &IngestConfig,
        writer: Arc<dyn SpanWriter>,
        registrar: GpuRegistrar,
        usage: Option<Arc<dyn UsageRecorder>>,
    ) -> Self {
        let batch_size = config.batch_size.max(1);
        Self {
            buffer: Mutex::new(Vec::with_capacity(batch_size)),
            batch_size,
            flush_interval: config.flush_interval,
            flush_timeout: config.flush_timeout,
            writer,
            registrar,
            usage,
            timer: Mutex::new(None),
        }
    }

    /// Start the background flush timer. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let pipeline = Arc::clone(self);
        let period = self.flush_interval;

        let handle = tokio::spawn(async move {
            // First tick one period from now rather than immediately
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(interval_ms = period.as_millis() as u64, "Flush timer started");
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => pipeline.flush().await,
                }
            }
            tracing::debug!("Flush timer stopped");
        });

        *timer = Some(FlushTimer { stop_tx, handle });
    }

    /// Append normalized records; flushes inline when the threshold is reached
    pub async fn submit(&self, records: Vec<SpanRecord>) {
        if records.is_empty() {
            return;
        }

        let should_flush = {
            let mut buffer = self.buffer.lock();
            buffer.extend(records);
            buffer.len() >= self.batch_size
        };

        if should_flush {
            self.flush().await;
        }
    }

    /// Number of records waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Detach the current batch and write it out
    pub async fn flush(&self) {
        let batch = {
            let mut buffer = self.buffer.lock();
            if buffer.is_empty() {
                return;
            }
            std::mem::replace(&mut *buffer, Vec::with_capacity(self.batch_size))
        };
        let count = batch.len();

        self.bounded("insert_spans", async {
            match self.writer.insert_spans(&batch).await {
                Ok(()) => tracing::debug!(count, "Flushed spans"),
                Err(e) => tracing::error!(count, error = %e, "Failed to flush spans"),
            }
        })
        .await;

        let points = derive_gpu_metrics(&batch);
        if !points.is_empty() {
            self.bounded("insert_gpu_metrics", async {
                if let Err(e) = self.writer.insert_gpu_metrics(&points).await {
                    tracing::error!(count = points.len(), error = %e, "Failed to insert GPU metrics");
                }
            })
            .await;
        }

        self.bounded("register_gpus", self.registrar.register_batch(&batch))
            .await;

        if let Some(usage) = &self.usage {
            self.bounded("record_usage", record_usage(usage.as_ref(), &batch))
                .await;
        }
    }

    /// Stop the timer, wait for it to exit, then flush whatever is left
    pub async fn stop(&self) {
        let timer = self.timer.lock().take();
        if let Some(FlushTimer { stop_tx, handle }) = timer {
            let _ = stop_tx.send(true);
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Flush timer task failed");
            }
        }
        self.flush().await;
    }

    async fn bounded(&self, step: &'static str, fut: impl Future<Output = ()>) {
        if tokio::time::timeout(self.flush_timeout, fut).await.is_err() {
            tracing::error!(
                step,
                timeout_ms = self.flush_timeout.as_millis() as u64,
                "Flush step timed out"
            );
        }
    }
}

#[async_trait]
impl Drain for IngestPipeline {
    fn name(&self) -> &'static str {
        "ingest_pipeline"
    }

    async fn drain(&self) {
        self.stop().await;
    }
}

/// One metric point per GPU attachment, stamped with the span start.
/// Optional fields missing for an index are written as zero.
fn derive_gpu_metrics(batch: &[SpanRecord]) -> Vec<GpuMetricPoint> {
    batch
        .iter()
        .flat_map(|span| {
            let gpus = &span.gpus;
            (0..gpus.len()).map(move |i| GpuMetricPoint {
                tenant_id: span.tenant_id.clone(),
                timestamp: span.start_time,
                resource_uuid: gpus.resource_uuids[i].clone(),
                physical_gpu_uuid: physical_uuid(gpus, i).to_string(),
                node_id: gpus.node_id(i).unwrap_or_default().to_string(),
                utilization: gpus.utilization(i).unwrap_or_default(),
                memory_used_gb: gpus.memory_used_gb(i).unwrap_or_default(),
                memory_total_gb: gpus.memory_total_gb(i).unwrap_or_default(),
                temperature_celsius: gpus.temperature_celsius(i).unwrap_or_default(),
                power_watts: gpus.power_watts(i).unwrap_or_default(),
                clock_mhz: gpus.clock_mhz(i).unwrap_or_default(),
                active_spans: 1,
            })
        })
        .collect()
}

/// Per-tenant totals of one batch: span count and GPU-seconds
fn usage_totals(batch: &[SpanRecord]) -> BTreeMap<&str, (i64, f64)> {
    let mut totals: BTreeMap<&str, (i64, f64)> = BTreeMap::new();
    for span in batch {
        let entry = totals.entry(span.tenant_id.as_str()).or_default();
        entry.0 += 1;
        entry.1 += span.gpu_seconds();
    }
    totals
}

async fn record_usage(usage: &dyn UsageRecorder, batch: &[SpanRecord]) {
    for (tenant_id, (spans, gpu_seconds)) in usage_totals(batch) {
        if let Err(e) = usage.record_spans(tenant_id, spans).await {
            tracing::warn!(tenant_id, error = %e, "Failed to record span usage");
        }

        let gpu_seconds = gpu_seconds.round() as i64;
        if gpu_seconds > 0
            && let Err(e) = usage.record_gpu_seconds(tenant_id, gpu_seconds).await
        {
            tracing::warn!(tenant_id, error = %e, "Failed to record GPU usage");
        }
    }
}
