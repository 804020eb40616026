//! API server
//!
//! Server setup: shared state, middleware stack, graceful shutdown.

use super::{middleware::{create_cors_layer, request_id_middleware}, routes::create_router};
use crate::config::EngineConfig;
use crate::identity::IdentityService;
use crate::ledger::Ledger;
use crate::metrics::EngineMetrics;
use crate::payment::PaymentGateway;
use crate::settlement::SettlementCoordinator;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// Shared application state
pub struct AppState {
    pub coordinator: Arc<SettlementCoordinator>,
    pub ledger: Arc<dyn Ledger>,
    pub identity: Arc<IdentityService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub metrics: Arc<EngineMetrics>,
    pub engine_id: String,
    pub network: String,
    pub version: String,
    pub coordinator_public_key: String,
    pub enable_metrics: bool,
    pub started_at: Instant,
}

/// HTTP/WS front end over the settlement engine
pub struct ApiServer {
    config: EngineConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: EngineConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Start the API server and block until shutdown.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.socket_addr()?;
        let app = self.create_app();

        info!("Starting croupier settlement API");
        self.log_server_info();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    /// Application with the full middleware stack
    fn create_app(&self) -> axum::Router {
        create_router(self.state.clone())
            // Request ID middleware (first for tracing)
            .layer(axum::middleware::from_fn(request_id_middleware))
            // CORS layer (before timeout to handle preflight)
            .layer(create_cors_layer(self.config.server.allowed_origins.clone()))
            // Timeout layer
            .layer(TimeoutLayer::new(self.config.request_timeout()))
            // Tracing layer (last for complete request tracing)
            .layer(TraceLayer::new_for_http())
    }

    fn socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.server.host.parse::<std::net::IpAddr>()?,
            self.config.server.port,
        )))
    }

    fn log_server_info(&self) {
        info!("Server configuration:");
        info!("   Engine ID: {}", self.config.server.engine_id);
        info!("   Network: {}", self.config.server.network);
        info!("   Version: {}", self.state.version);
        info!("   CORS: {:?}", self.config.server.allowed_origins);
        info!("   Request timeout: {}s", self.config.server.request_timeout_secs);
        info!(
            "   Table limits: {} - {} micros",
            self.config.tables.min_stake_micros, self.config.tables.max_stake_micros
        );
        info!("   VRF public key: {}", self.state.coordinator_public_key);
        info!("Available endpoints:");
        info!("   GET  /health               - Health check");
        info!("   GET  /status               - Engine status");
        info!("   POST /api/bet/:game        - Settle a single-shot wager");
        info!("   POST /api/mines/*          - Mines round flow");
        info!("   GET  /api/feed             - Live bet feed");
        info!("   GET  /ws/feed, /ws/balance - Realtime subscriptions");
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
