use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    CLICKHOUSE_DEFAULT_DATABASE, CLICKHOUSE_DEFAULT_MAX_EXECUTION_SECS, CLICKHOUSE_DEFAULT_URL,
    CLICKHOUSE_DEFAULT_USER, CONFIG_FILE_NAME, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS,
    DEFAULT_GPU_VENDOR, DEFAULT_GRPC_PORT, DEFAULT_HOST, DEFAULT_HTTP_PORT, FLUSH_TIMEOUT_SECS,
    POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_MAX_CONNECTIONS, POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
    POSTGRES_DEFAULT_MIN_CONNECTIONS, POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
    POSTGRES_DEFAULT_URL,
};

// =============================================================================
// Auth Mode Enum
// =============================================================================

/// How bearer credentials are mapped to tenants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// One shared secret, every caller is the default tenant
    #[default]
    Static,
    /// Per-tenant issued keys resolved against Postgres
    MultiTenant,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Static => write!(f, "static"),
            AuthMode::MultiTenant => write!(f, "multi_tenant"),
        }
    }
}

// =============================================================================
// File Config Sections
// =============================================================================

/// Server configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub http_port: Option<u16>,
    pub grpc_port: Option<u16>,
}

/// Auth configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuthFileConfig {
    /// `static` (default) or `multi_tenant`
    pub mode: Option<AuthMode>,
    /// Shared secret for static mode
    pub api_key: Option<String>,
    /// Admin key for provisioning endpoints
    pub admin_key: Option<String>,
}

/// Ingestion configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct IngestFileConfig {
    pub batch_size: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub flush_timeout_secs: Option<u64>,
    pub gpu_vendor: Option<String>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use AXONIZE_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// ClickHouse configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClickhouseFileConfig {
    /// ClickHouse connection URL (or use AXONIZE_CLICKHOUSE_URL env var)
    pub url: Option<String>,
    /// Database name (default: "axonize")
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Server-side max execution time per query in seconds
    pub timeout_secs: Option<u64>,
}

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    pub postgres: Option<PostgresFileConfig>,
    pub clickhouse: Option<ClickhouseFileConfig>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub auth: Option<AuthFileConfig>,
    pub ingest: Option<IngestFileConfig>,
    pub database: Option<DatabaseFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Runtime Config
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub grpc_port: u16,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Static shared secret; `None` leaves static mode open
    pub api_key: Option<String>,
    /// Admin key; `None` disables the admin surface
    pub admin_key: Option<String>,
}

/// Ingest pipeline configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub flush_timeout: Duration,
    pub gpu_vendor: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            flush_timeout: Duration::from_secs(FLUSH_TIMEOUT_SECS),
            gpu_vendor: DEFAULT_GPU_VENDOR.to_string(),
        }
    }
}

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

/// ClickHouse configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct ClickhouseConfig {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub postgres: PostgresConfig,
    pub clickhouse: ClickhouseConfig,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub ingest: IngestConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let file_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        let file_config = match file_path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                config
            }
            None => FileConfig::default(),
        };

        Self::from_sources(cli, file_config)
    }

    /// Layer CLI/env values over a parsed file config and the defaults
    fn from_sources(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_auth = file_config.auth.unwrap_or_default();
        let file_ingest = file_config.ingest.unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();
        let file_postgres = file_database.postgres.unwrap_or_default();
        let file_clickhouse = file_database.clickhouse.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            http_port: cli
                .http_port
                .or(file_server.http_port)
                .unwrap_or(DEFAULT_HTTP_PORT),
            grpc_port: cli
                .grpc_port
                .or(file_server.grpc_port)
                .unwrap_or(DEFAULT_GRPC_PORT),
        };

        // Empty secrets count as unset
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let auth = AuthConfig {
            mode: cli.auth_mode.or(file_auth.mode).unwrap_or_default(),
            api_key: non_empty(cli.api_key.clone().or(file_auth.api_key)),
            admin_key: non_empty(cli.admin_key.clone().or(file_auth.admin_key)),
        };

        let ingest = IngestConfig {
            batch_size: cli
                .batch_size
                .or(file_ingest.batch_size)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            flush_interval: Duration::from_millis(
                cli.flush_interval_ms
                    .or(file_ingest.flush_interval_ms)
                    .unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
            ),
            flush_timeout: Duration::from_secs(
                file_ingest
                    .flush_timeout_secs
                    .unwrap_or(FLUSH_TIMEOUT_SECS),
            ),
            gpu_vendor: cli
                .gpu_vendor
                .clone()
                .or(file_ingest.gpu_vendor)
                .unwrap_or_else(|| DEFAULT_GPU_VENDOR.to_string()),
        };

        let postgres = PostgresConfig {
            url: cli
                .postgres_url
                .clone()
                .or(file_postgres.url)
                .unwrap_or_else(|| POSTGRES_DEFAULT_URL.to_string()),
            max_connections: file_postgres
                .max_connections
                .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
            min_connections: file_postgres
                .min_connections
                .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
            acquire_timeout_secs: file_postgres
                .acquire_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout_secs: file_postgres
                .idle_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
            max_lifetime_secs: file_postgres
                .max_lifetime_secs
                .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
            statement_timeout_secs: file_postgres
                .statement_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
        };

        let clickhouse = ClickhouseConfig {
            url: cli
                .clickhouse_url
                .clone()
                .or(file_clickhouse.url)
                .unwrap_or_else(|| CLICKHOUSE_DEFAULT_URL.to_string()),
            database: file_clickhouse
                .database
                .unwrap_or_else(|| CLICKHOUSE_DEFAULT_DATABASE.to_string()),
            user: file_clickhouse
                .user
                .unwrap_or_else(|| CLICKHOUSE_DEFAULT_USER.to_string()),
            password: file_clickhouse.password,
            timeout_secs: file_clickhouse
                .timeout_secs
                .unwrap_or(CLICKHOUSE_DEFAULT_MAX_EXECUTION_SECS),
        };

        let config = Self {
            server,
            auth,
            ingest,
            database: DatabaseConfig {
                postgres,
                clickhouse,
            },
        };

        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            http_port = config.server.http_port,
            grpc_port = config.server.grpc_port,
            auth_mode = %config.auth.mode,
            static_key_set = config.auth.api_key.is_some(),
            admin_key_set = config.auth.admin_key.is_some(),
            batch_size = config.ingest.batch_size,
            flush_interval_ms = config.ingest.flush_interval.as_millis() as u64,
            gpu_vendor = %config.ingest.gpu_vendor,
            clickhouse_database = %config.database.clickhouse.database,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.http_port == 0 {
            anyhow::bail!("Configuration error: server.http_port must be greater than 0");
        }
        if self.server.grpc_port == 0 {
            anyhow::bail!("Configuration error: server.grpc_port must be greater than 0");
        }
        if self.server.http_port == self.server.grpc_port {
            anyhow::bail!(
                "Configuration error: server.http_port ({}) and server.grpc_port ({}) cannot be the same",
                self.server.http_port,
                self.server.grpc_port
            );
        }
        if self.ingest.batch_size == 0 {
            anyhow::bail!("Configuration error: ingest.batch_size must be greater than 0");
        }
        if self.ingest.flush_interval.is_zero() {
            anyhow::bail!("Configuration error: ingest.flush_interval_ms must be greater than 0");
        }
        if self.ingest.gpu_vendor.is_empty() {
            anyhow::bail!("Configuration error: ingest.gpu_vendor must not be empty");
        }
        if self.database.postgres.min_connections > self.database.postgres.max_connections {
            anyhow::bail!(
                "Configuration error: database.postgres.min_connections ({}) exceeds max_connections ({})",
                self.database.postgres.min_connections,
                self.database.postgres.max_connections
            );
        }
        if self.auth.mode == AuthMode::Static && self.auth.api_key.is_none() {
            tracing::warn!("No API key configured, static auth accepts unauthenticated requests");
        }
        Ok(())
    }
}
