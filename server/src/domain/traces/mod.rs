//! Trace ingestion and reconstruction
//!
//! - `normalize` - OTLP export request to flat span records
//! - `pipeline` - buffering and flushing of normalized records
//! - `registrar` - GPU inventory upserts for a flushed batch
//! - `tree` - parent/child reconstruction for trace queries

mod normalize;
mod pipeline;
mod registrar;
mod tree;

pub use normalize::normalize;
pub use pipeline::IngestPipeline;
pub use registrar::GpuRegistrar;
pub use tree::build_trace;
