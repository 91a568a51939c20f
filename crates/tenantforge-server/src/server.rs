use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{delete, get},
};
use tenantforge_db_memory::create_memory_store;
use tenantforge_db_postgres::PostgresStore;
use tenantforge_orchestrator::Orchestrator;
use tenantforge_providers::{ProviderSet, aws, memory::InMemoryCloud};
use tenantforge_store::{DynConfigStore, DynDirectoryStore};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, ProviderBackend, StorageBackend};
use crate::handlers;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: DynConfigStore,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, store: DynConfigStore) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            store,
        }
    }
}

pub struct TenantForgeServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route(
            "/create-client-infrastructure",
            get(handlers::create_client_infrastructure),
        )
        .route("/delete-infrastructure", delete(handlers::delete_infrastructure))
        .layer(ConcurrencyLimitLayer::new(cfg.server.max_concurrent_requests))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .with_state(state)
}

/// Wires the configured store and provider backends into an orchestrator.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let (store, directory): (DynConfigStore, DynDirectoryStore) = match cfg.storage.backend {
        StorageBackend::Memory => {
            let store = create_memory_store();
            let config: DynConfigStore = store.clone();
            let directory: DynDirectoryStore = store;
            (config, directory)
        }
        StorageBackend::Postgres => {
            let pg = cfg.storage.postgres.clone().unwrap_or_default();
            let store = Arc::new(PostgresStore::connect(&pg).await?);
            let config: DynConfigStore = store.clone();
            let directory: DynDirectoryStore = store;
            (config, directory)
        }
    };
    tracing::info!(backend = store.backend_name(), "Config store ready");

    let providers: ProviderSet = match cfg.provisioning.provider {
        ProviderBackend::Aws => {
            let clients = aws::AwsClients::load(&cfg.aws).await;
            aws::providers(&clients, &cfg.aws)
        }
        ProviderBackend::Memory => {
            tracing::warn!("Using the in-memory cloud; no real resources will be created");
            InMemoryCloud::with_region(cfg.aws.region.clone()).providers()
        }
    };

    let orchestrator = Orchestrator::new(
        store.clone(),
        directory,
        providers,
        cfg.orchestrator_settings(),
    );
    Ok(AppState::new(orchestrator, store))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<TenantForgeServer> {
        let state = build_state(&self.config).await?;
        let app = build_app(state, &self.config);

        Ok(TenantForgeServer {
            addr: self.addr,
            app,
        })
    }
}

impl TenantForgeServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
