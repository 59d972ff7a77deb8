//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::auth::{AdminAuth, TenantAuth, require_admin, require_tenant};
use super::middleware;
use super::openapi::openapi_json;
use super::routes::{admin, analytics, gpus, health, traces};
use crate::core::ShutdownService;
use crate::core::config::ServerConfig;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::data::{Pinger, TenantAdmin};
use crate::domain::{QueryService, UsageMeter};

/// Provisioning surface; only mounted in multi-tenant mode with an admin key
#[derive(Clone)]
pub struct AdminState {
    pub auth: Arc<AdminAuth>,
    pub tenants: Arc<dyn TenantAdmin>,
    pub usage: Arc<UsageMeter>,
}

/// Everything the HTTP router needs
#[derive(Clone)]
pub struct ApiState {
    pub query: Arc<QueryService>,
    pub tenant_auth: Arc<TenantAuth>,
    pub backends: Vec<Arc<dyn Pinger>>,
    pub admin: Option<AdminState>,
}

/// Assemble the full router: probes, tenant-scoped queries and optional admin
pub fn build_router(state: ApiState) -> Router {
    let ApiState {
        query,
        tenant_auth,
        backends,
        admin,
    } = state;

    // route_layer so unknown paths fall through to the 404 handler unauthenticated
    let query_routes = Router::new()
        .merge(traces::routes(query.clone()))
        .merge(gpus::routes(query.clone()))
        .merge(analytics::routes(query))
        .route_layer(axum::middleware::from_fn_with_state(
            tenant_auth,
            require_tenant,
        ));

    let router = Router::new()
        .merge(health::routes(backends))
        .route("/api/openapi.json", get(openapi_json))
        .merge(query_routes);

    let router = match admin {
        Some(AdminState {
            auth,
            tenants,
            usage,
        }) => router.merge(
            admin::routes(tenants, usage)
                .route_layer(axum::middleware::from_fn_with_state(auth, require_admin)),
        ),
        None => router,
    };

    router
        .fallback(middleware::handle_404)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(middleware::cors())
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
}

pub struct ApiServer {
    addr: SocketAddr,
    state: ApiState,
    shutdown: ShutdownService,
}

impl ApiServer {
    pub fn new(config: &ServerConfig, state: ApiState, shutdown: ShutdownService) -> Result<Self> {
        let addr = SocketAddr::new(config.host.parse()?, config.http_port);
        Ok(Self {
            addr,
            state,
            shutdown,
        })
    }

    /// Serve until the shutdown signal fires and in-flight requests finish
    pub async fn start(self) -> Result<()> {
        let Self {
            addr,
            state,
            shutdown,
        } = self;

        let admin_enabled = state.admin.is_some();
        let router = build_router(state);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, admin_enabled, "Query API listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::debug!("Query API stopped");
        Ok(())
    }
}
