//! Domain logic for GPU/AI telemetry
//!
//! - `traces` - span normalization, batching pipeline, GPU registrar, trace trees
//! - `tenant` - bearer key resolution and usage metering
//! - `query` - trace, GPU and analytics query engine

pub mod query;
pub mod tenant;
pub mod traces;

pub use query::{QueryService, TracePage};
pub use tenant::{ResolveError, TenantResolver, UsageMeter, UsageRecorder};
pub use traces::{GpuRegistrar, IngestPipeline};
