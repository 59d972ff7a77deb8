use clap::Parser;

use std::path::PathBuf;

use super::config::AuthMode;
use super::constants::{
    ENV_ADMIN_KEY, ENV_API_KEY, ENV_AUTH_MODE, ENV_BATCH_SIZE, ENV_CLICKHOUSE_URL, ENV_CONFIG,
    ENV_FLUSH_INTERVAL_MS, ENV_GPU_VENDOR, ENV_GRPC_PORT, ENV_HOST, ENV_HTTP_PORT,
    ENV_POSTGRES_URL,
};

#[derive(Parser)]
#[command(name = "axonize")]
#[command(version, about = "GPU-aware AI telemetry collector", long_about = None)]
pub struct Cli {
    /// Server host address
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Query API (HTTP) port
    #[arg(long, short = 'p', env = ENV_HTTP_PORT)]
    pub http_port: Option<u16>,

    /// OTLP gRPC ingestion port
    #[arg(long, env = ENV_GRPC_PORT)]
    pub grpc_port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Shared secret for static auth mode (empty disables auth)
    #[arg(long, env = ENV_API_KEY, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Auth mode (static or multi_tenant)
    #[arg(long, env = ENV_AUTH_MODE, value_parser = parse_auth_mode)]
    pub auth_mode: Option<AuthMode>,

    /// Admin key for tenant provisioning endpoints (multi_tenant mode)
    #[arg(long, env = ENV_ADMIN_KEY, hide_env_values = true)]
    pub admin_key: Option<String>,

    /// Vendor recorded on newly seen physical GPUs
    #[arg(long, env = ENV_GPU_VENDOR)]
    pub gpu_vendor: Option<String>,

    /// Buffered spans that trigger a flush
    #[arg(long, env = ENV_BATCH_SIZE)]
    pub batch_size: Option<usize>,

    /// Periodic flush interval in milliseconds
    #[arg(long, env = ENV_FLUSH_INTERVAL_MS)]
    pub flush_interval_ms: Option<u64>,

    // Database options
    /// PostgreSQL connection URL
    #[arg(long, env = ENV_POSTGRES_URL, hide_env_values = true)]
    pub postgres_url: Option<String>,

    /// ClickHouse connection URL
    #[arg(long, env = ENV_CLICKHOUSE_URL)]
    pub clickhouse_url: Option<String>,
}

/// Parse auth mode from CLI/env string
pub(crate) fn parse_auth_mode(s: &str) -> Result<AuthMode, String> {
    match s.to_lowercase().as_str() {
        "static" => Ok(AuthMode::Static),
        "multi_tenant" | "multi-tenant" => Ok(AuthMode::MultiTenant),
        _ => Err(format!(
            "Invalid auth mode '{}'. Valid options: static, multi_tenant",
            s
        )),
    }
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub http_port: Option<u16>,
    pub grpc_port: Option<u16>,
    pub config: Option<PathBuf>,
    pub api_key: Option<String>,
    pub auth_mode: Option<AuthMode>,
    pub admin_key: Option<String>,
    pub gpu_vendor: Option<String>,
    pub batch_size: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub postgres_url: Option<String>,
    pub clickhouse_url: Option<String>,
}

/// Parse CLI arguments into a config overlay
pub fn parse() -> CliConfig {
    let cli = Cli::parse();
    CliConfig {
        host: cli.host,
        http_port: cli.http_port,
        grpc_port: cli.grpc_port,
        config: cli.config,
        api_key: cli.api_key,
        auth_mode: cli.auth_mode,
        admin_key: cli.admin_key,
        gpu_vendor: cli.gpu_vendor,
        batch_size: cli.batch_size,
        flush_interval_ms: cli.flush_interval_ms,
        postgres_url: cli.postgres_url,
        clickhouse_url: cli.clickhouse_url,
    }
}
