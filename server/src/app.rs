//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{AdminAuth, AdminState, ApiServer, ApiState, OtlpGrpcServer, TenantAuth};
use crate::core::cli::{self, CliConfig};
use crate::core::config::{AppConfig, AuthMode};
use crate::core::constants::{APP_NAME, APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::{ClickhouseService, Pinger, PostgresService};
use crate::domain::{
    GpuRegistrar, IngestPipeline, QueryService, TenantResolver, UsageMeter, UsageRecorder,
};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub clickhouse: Arc<ClickhouseService>,
    pub postgres: Arc<PostgresService>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let cli_config = cli::parse();
        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let (clickhouse, postgres) = tokio::try_join!(
            async {
                ClickhouseService::init(&config.database.clickhouse)
                    .await
                    .context("Failed to initialize ClickHouse")
            },
            async {
                PostgresService::init(&config.database.postgres)
                    .await
                    .context("Failed to initialize PostgreSQL")
            },
        )?;

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            clickhouse: Arc::new(clickhouse),
            postgres: Arc::new(postgres),
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        let config = &app.config;
        let multi_tenant = config.auth.mode == AuthMode::MultiTenant;

        let usage = Arc::new(UsageMeter::new(app.postgres.clone()));
        let resolver = multi_tenant.then(|| Arc::new(TenantResolver::new(app.postgres.clone())));
        let tenant_auth = Arc::new(TenantAuth::from_config(&config.auth, resolver));
        if !multi_tenant && config.auth.api_key.is_none() {
            tracing::warn!("No API key configured; ingestion and queries are unauthenticated");
        }

        let recorder = multi_tenant.then(|| usage.clone() as Arc<dyn UsageRecorder>);
        let pipeline = Arc::new(IngestPipeline::new(
            &config.ingest,
            app.clickhouse.clone(),
            GpuRegistrar::new(app.postgres.clone(), config.ingest.gpu_vendor.clone()),
            recorder,
        ));
        pipeline.start();

        // Drains run in order: final flush first, then the stores it writes to
        app.shutdown.register_drain(pipeline.clone()).await;
        app.shutdown.register_drain(app.clickhouse.clone()).await;
        app.shutdown.register_drain(app.postgres.clone()).await;

        let grpc_server = OtlpGrpcServer::new(
            &config.server.host,
            config.server.grpc_port,
            tenant_auth.clone(),
            pipeline,
        )?;
        let shutdown_rx = app.shutdown.subscribe();
        let shutdown = app.shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = grpc_server.start(shutdown_rx).await {
                tracing::error!(error = %e, "OTLP gRPC server error");
                shutdown.trigger();
            }
        });
        app.shutdown.register(handle).await;

        let query = Arc::new(QueryService::new(
            app.clickhouse.clone(),
            app.postgres.clone(),
            app.clickhouse.clone(),
            app.clickhouse.clone(),
        ));
        let admin = match (&config.auth.admin_key, multi_tenant) {
            (Some(key), true) => Some(AdminState {
                auth: Arc::new(AdminAuth::new(key)),
                tenants: app.postgres.clone(),
                usage,
            }),
            (None, true) => {
                tracing::warn!("No admin key configured; tenant provisioning API disabled");
                None
            }
            (_, false) => None,
        };
        let backends: Vec<Arc<dyn Pinger>> = vec![app.clickhouse.clone(), app.postgres.clone()];

        let server = ApiServer::new(
            &config.server,
            ApiState {
                query,
                tenant_auth,
                backends,
                admin,
            },
            app.shutdown.clone(),
        )?;

        tracing::info!(
            auth_mode = %config.auth.mode,
            http_port = config.server.http_port,
            grpc_port = config.server.grpc_port,
            "{} started",
            APP_NAME
        );

        let result = server.start().await;
        if let Err(ref e) = result {
            tracing::error!(error = %e, "Query API error");
        }

        app.shutdown.shutdown().await;
        result
    }
}
