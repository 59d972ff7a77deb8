//! PostgreSQL schema definitions
//!
//! Inventory (physical GPUs, compute resources, resource contexts), tenants,
//! API keys and daily usage counters. Every inventory and usage row is
//! keyed by tenant.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema SQL for PostgreSQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at BIGINT NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success BOOLEAN NOT NULL DEFAULT TRUE
);

-- =============================================================================
-- 1. Tenants
-- =============================================================================
CREATE TABLE IF NOT EXISTS tenants (
    tenant_id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK(length(name) >= 1 AND length(name) <= 100),
    plan TEXT NOT NULL DEFAULT 'free',
    status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'suspended')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- =============================================================================
-- 2. API keys (raw key never stored)
-- =============================================================================
CREATE TABLE IF NOT EXISTS api_keys (
    key_hash TEXT PRIMARY KEY,
    key_prefix TEXT NOT NULL,
    tenant_id TEXT NOT NULL REFERENCES tenants(tenant_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    scopes TEXT NOT NULL DEFAULT 'ingest,read',
    status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'revoked')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_used_at TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_api_keys_tenant ON api_keys(tenant_id);
CREATE INDEX IF NOT EXISTS idx_api_keys_prefix ON api_keys(tenant_id, key_prefix);

-- =============================================================================
-- 3. GPU inventory
-- =============================================================================
CREATE TABLE IF NOT EXISTS physical_gpus (
    tenant_id TEXT NOT NULL,
    uuid TEXT NOT NULL,
    model TEXT NOT NULL DEFAULT '',
    vendor TEXT NOT NULL,
    memory_total_gb REAL NOT NULL DEFAULT 0,
    node_id TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_seen_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (tenant_id, uuid)
);

CREATE TABLE IF NOT EXISTS compute_resources (
    tenant_id TEXT NOT NULL,
    resource_uuid TEXT NOT NULL,
    physical_gpu_uuid TEXT NOT NULL,
    -- 'full_gpu', 'mig' or a sized slice such as 'mig_40gb'
    resource_type TEXT NOT NULL,
    memory_gb REAL NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_seen_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (tenant_id, resource_uuid),
    FOREIGN KEY (tenant_id, physical_gpu_uuid) REFERENCES physical_gpus(tenant_id, uuid)
);

CREATE TABLE IF NOT EXISTS resource_contexts (
    tenant_id TEXT NOT NULL,
    context_id TEXT NOT NULL,
    resource_uuid TEXT NOT NULL,
    user_label TEXT NOT NULL,
    hostname TEXT NOT NULL DEFAULT '',
    attached_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    detached_at TIMESTAMPTZ,
    PRIMARY KEY (tenant_id, context_id)
);

CREATE INDEX IF NOT EXISTS idx_resource_contexts_resource ON resource_contexts(tenant_id, resource_uuid);

-- =============================================================================
-- 4. Usage (one row per tenant per UTC day)
-- =============================================================================
CREATE TABLE IF NOT EXISTS usage_records (
    tenant_id TEXT NOT NULL,
    period_start DATE NOT NULL,
    period_end DATE NOT NULL,
    span_count BIGINT NOT NULL DEFAULT 0,
    gpu_seconds BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (tenant_id, period_start)
);
"#;

/// Seed data: the tenant used by static auth mode
pub const DEFAULT_DATA: &str = r#"
INSERT INTO tenants (tenant_id, name, plan, status)
VALUES ('default', 'Default', 'free', 'active')
ON CONFLICT (tenant_id) DO NOTHING;
"#;
