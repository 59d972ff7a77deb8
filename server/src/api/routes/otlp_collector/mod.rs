//! OpenTelemetry Protocol (OTLP) gRPC trace ingestion

mod grpc;

pub use grpc::{OtlpGrpcServer, OtlpTraceService};
