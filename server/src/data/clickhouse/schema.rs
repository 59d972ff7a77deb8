//! ClickHouse schema definitions
//!
//! Two telemetry tables, both scoped by `tenant_id` as the first sort key:
//! - `spans`: one row per normalized span, GPU attachments as parallel arrays
//! - `gpu_metrics`: one row per (span, attached GPU), monthly partitions

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Table holding the applied schema version
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id UInt8,
    version Int32,
    applied_at Int64,
    description Nullable(String)
) ENGINE = ReplacingMergeTree()
ORDER BY id
"#;

pub const SPANS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS spans (
    -- IDENTITY
    tenant_id               LowCardinality(String),
    trace_id                String,
    span_id                 String,
    parent_span_id          Nullable(String),

    -- LABELS
    name                    String,
    service_name            LowCardinality(String),
    environment             LowCardinality(String),

    -- TIMING
    start_time              DateTime64(6, 'UTC'),
    end_time                DateTime64(6, 'UTC'),
    duration_ms             Float64,

    -- AI INFERENCE
    model_name              LowCardinality(Nullable(String)),
    model_version           Nullable(String),
    inference_type          LowCardinality(Nullable(String)),
    tokens_input            Nullable(UInt32),
    tokens_output           Nullable(UInt32),
    tokens_per_second       Nullable(Float32),
    ttft_ms                 Nullable(Float32),
    diffusion_steps         Nullable(UInt16),
    cfg_scale               Nullable(Float32),
    cost_usd                Nullable(Float64),

    -- GPU ATTACHMENTS (index i of each array describes the same GPU)
    gpu_resource_uuids      Array(String),
    gpu_physical_uuids      Array(String),
    gpu_models              Array(LowCardinality(String)),
    gpu_node_ids            Array(String),
    gpu_resource_types      Array(LowCardinality(String)),
    gpu_user_labels         Array(String),
    gpu_memory_used_gb      Array(Float32),
    gpu_memory_total_gb     Array(Float32),
    gpu_utilization         Array(Float32),
    gpu_temperature_celsius Array(UInt8),
    gpu_power_watts         Array(UInt16),
    gpu_clock_mhz           Array(UInt16),

    -- OUTCOME
    status                  LowCardinality(String),
    error_message           Nullable(String),

    -- REMAINING ATTRIBUTES (JSON object of strings)
    attributes              String,

    ingested_at             DateTime64(6, 'UTC') DEFAULT now64(6),

    INDEX idx_service service_name TYPE set(100) GRANULARITY 4,
    INDEX idx_start start_time TYPE minmax GRANULARITY 1
) ENGINE = MergeTree()
PARTITION BY toYYYYMM(start_time)
ORDER BY (tenant_id, trace_id, start_time)
"#;

pub const GPU_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS gpu_metrics (
    tenant_id               LowCardinality(String),
    timestamp               DateTime64(6, 'UTC'),
    resource_uuid           String,
    physical_gpu_uuid       String,
    node_id                 String,
    utilization             Float32,
    memory_used_gb          Float32,
    memory_total_gb         Float32,
    temperature_celsius     UInt8,
    power_watts             UInt16,
    clock_mhz               UInt16,
    active_spans            UInt16
) ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (tenant_id, resource_uuid, timestamp)
"#;

/// All statements of the initial schema, in creation order
pub fn generate_schema() -> Vec<&'static str> {
    vec![SCHEMA_VERSION_TABLE, SPANS_TABLE, GPU_METRICS_TABLE]
}
