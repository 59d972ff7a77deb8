//! API surfaces: OTLP gRPC ingestion and the HTTP query/admin API

pub mod auth;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
mod server;
pub mod types;

pub use auth::{AdminAuth, TenantAuth};
pub use routes::otlp_collector::OtlpGrpcServer;
pub use server::{AdminState, ApiServer, ApiState, build_router};
