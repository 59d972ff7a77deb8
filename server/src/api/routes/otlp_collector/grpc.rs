//! gRPC OTLP trace server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use prost::Message;
use tokio::sync::watch;
use tonic::transport::Server as TonicServer;
use tonic::{Request, Response, Status};

use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
    trace_service_server::{TraceService, TraceServiceServer},
};

use crate::api::auth::TenantAuth;
use crate::core::constants::OTLP_BODY_LIMIT;
use crate::domain::IngestPipeline;
use crate::domain::traces::normalize;

const AUTHORIZATION_METADATA: &str = "authorization";

pub struct OtlpGrpcServer {
    addr: SocketAddr,
    auth: Arc<TenantAuth>,
    pipeline: Arc<IngestPipeline>,
}

impl OtlpGrpcServer {
    pub fn new(
        host: &str,
        port: u16,
        auth: Arc<TenantAuth>,
        pipeline: Arc<IngestPipeline>,
    ) -> Result<Self> {
        let addr = SocketAddr::new(host.parse()?, port);
        Ok(Self {
            addr,
            auth,
            pipeline,
        })
    }

    pub async fn start(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let addr = self.addr;

        tracing::info!(%addr, "OTLP gRPC server listening");

        TonicServer::builder()
            .add_service(
                TraceServiceServer::new(OtlpTraceService::new(self.auth, self.pipeline))
                    .max_decoding_message_size(OTLP_BODY_LIMIT)
                    .max_encoding_message_size(OTLP_BODY_LIMIT),
            )
            .serve_with_shutdown(addr, async move {
                let _ = shutdown_rx.wait_for(|&v| v).await;
                tracing::debug!("OTLP gRPC server shutting down");
            })
            .await?;

        Ok(())
    }
}

/// Trace export handler: authenticate, normalize, hand off to the pipeline
pub struct OtlpTraceService {
    auth: Arc<TenantAuth>,
    pipeline: Arc<IngestPipeline>,
}

impl OtlpTraceService {
    pub fn new(auth: Arc<TenantAuth>, pipeline: Arc<IngestPipeline>) -> Self {
        Self { auth, pipeline }
    }
}

#[tonic::async_trait]
impl TraceService for OtlpTraceService {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let authorization = request
            .metadata()
            .get(AUTHORIZATION_METADATA)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let tenant_id = self
            .auth
            .authenticate(authorization.as_deref())
            .await
            .map_err(|e| e.into_status())?;

        let spans = normalize(request.get_ref(), &tenant_id);
        tracing::debug!(
            tenant_id = %tenant_id,
            count = spans.len(),
            bytes = request.get_ref().encoded_len(),
            "Received OTLP traces"
        );

        // Storage failures stay inside the pipeline; the exporter always gets an ack
        self.pipeline.submit(spans).await;

        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use opentelemetry_proto::tonic::resource::v1::Resource;
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};

    use crate::core::IngestConfig;
    use crate::data::types::{
        ComputeResourceRecord, GpuMetricPoint, PhysicalGpuRecord, ResourceContextRecord,
        SpanRecord,
    };
    use crate::data::{DataError, GpuRegistry, SpanWriter};
    use crate::domain::GpuRegistrar;

    struct NullStore;

    #[async_trait]
    impl SpanWriter for NullStore {
        async fn insert_spans(&self, _spans: &[SpanRecord]) -> Result<(), DataError> {
            Ok(())
        }

        async fn insert_gpu_metrics(&self, _points: &[GpuMetricPoint]) -> Result<(), DataError> {
            Ok(())
        }
    }

    #[async_trait]
    impl GpuRegistry for NullStore {
        async fn upsert_physical_gpu(&self, _gpu: &PhysicalGpuRecord) -> Result<(), DataError> {
            Ok(())
        }

        async fn upsert_compute_resource(
            &self,
            _resource: &ComputeResourceRecord,
        ) -> Result<(), DataError> {
            Ok(())
        }

        async fn upsert_resource_context(
            &self,
            _context: &ResourceContextRecord,
        ) -> Result<(), DataError> {
            Ok(())
        }
    }

    fn service(api_key: Option<&str>) -> (OtlpTraceService, Arc<IngestPipeline>) {
        let store = Arc::new(NullStore);
        let config = IngestConfig {
            batch_size: 1000,
            ..Default::default()
        };
        let pipeline = Arc::new(IngestPipeline::new(
            &config,
            store.clone(),
            GpuRegistrar::new(store, "NVIDIA"),
            None,
        ));
        let auth = Arc::new(TenantAuth::Static {
            api_key: api_key.map(str::to_string),
        });
        (OtlpTraceService::new(auth, pipeline.clone()), pipeline)
    }

    fn export_request(span_count: usize) -> ExportTraceServiceRequest {
        let spans = (0..span_count)
            .map(|i| Span {
                trace_id: vec![1; 16],
                span_id: vec![i as u8 + 1; 8],
                name: format!("op-{}", i),
                start_time_unix_nano: 1_000_000_000,
                end_time_unix_nano: 2_000_000_000,
                ..Default::default()
            })
            .collect();
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: Some(Resource::default()),
                scope_spans: vec![ScopeSpans {
                    spans,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    fn with_auth(
        request: ExportTraceServiceRequest,
        header: &str,
    ) -> Request<ExportTraceServiceRequest> {
        let mut request = Request::new(request);
        request
            .metadata_mut()
            .insert(AUTHORIZATION_METADATA, header.parse().unwrap());
        request
    }

    #[tokio::test]
    async fn test_export_buffers_spans() {
        let (svc, pipeline) = service(Some("s3cret"));

        let response = svc
            .export(with_auth(export_request(3), "Bearer s3cret"))
            .await
            .unwrap();

        assert!(response.get_ref().partial_success.is_none());
        assert_eq!(pipeline.buffered(), 3);
    }

    #[tokio::test]
    async fn test_export_rejects_bad_key() {
        let (svc, pipeline) = service(Some("s3cret"));

        let status = svc
            .export(with_auth(export_request(1), "Bearer wrong"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        let status = svc.export(Request::new(export_request(1))).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        assert_eq!(pipeline.buffered(), 0);
    }

    #[tokio::test]
    async fn test_export_open_when_no_key_configured() {
        let (svc, pipeline) = service(None);
        svc.export(Request::new(export_request(2))).await.unwrap();
        assert_eq!(pipeline.buffered(), 2);
    }

    #[tokio::test]
    async fn test_empty_export_is_acknowledged() {
        let (svc, pipeline) = service(None);
        svc.export(Request::new(ExportTraceServiceRequest::default()))
            .await
            .unwrap();
        assert_eq!(pipeline.buffered(), 0);
    }
}
