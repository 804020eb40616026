//! Croupier server binary

use clap::Parser;
use croupier::api::{ApiServer, AppState};
use croupier::config::EngineConfig;
use croupier::identity::IdentityService;
use croupier::ledger::memory::InMemoryLedger;
use croupier::ledger::Ledger;
use croupier::metrics::EngineMetrics;
use croupier::payment::SimulatedGateway;
use croupier::rng::VrfOutcomeSource;
use croupier::settlement::feed::LiveBetFeed;
use croupier::settlement::{SettlementCoordinator, SettlementLimits};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "croupier", about = "Server-authoritative wager settlement engine")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Development preset: auto-verified sessions and a faucet balance
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None if cli.dev => EngineConfig::development(),
        None => EngineConfig::default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.monitoring.log_filter.clone().into()),
        )
        .init();

    let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
    let outcomes = Arc::new(VrfOutcomeSource::new_random());
    let feed = Arc::new(LiveBetFeed::new(config.tables.feed_capacity));
    let metrics = Arc::new(EngineMetrics::new()?);

    let limits = SettlementLimits {
        min_stake: config.tables.min_stake_micros,
        max_stake: config.tables.max_stake_micros,
        commit_attempts: config.tables.commit_attempts,
        retry_backoff: config.retry_backoff(),
    };
    let coordinator = Arc::new(SettlementCoordinator::new(
        ledger.clone(),
        outcomes.clone(),
        feed,
        metrics.clone(),
        limits,
    ));

    // Refund any round left open by a previous run before taking traffic.
    let recovered = coordinator.recover().await?;
    if recovered > 0 {
        info!(recovered, "recovered orphaned rounds at startup");
    }

    let identity = Arc::new(IdentityService::new(
        ledger.clone(),
        config.identity.auto_verify,
        config.identity.starting_balance_micros,
    ));
    let gateway = Arc::new(SimulatedGateway::new(
        config.payments.provider_base_url.clone(),
        config.payments.currencies.clone(),
    ));

    let state = Arc::new(AppState {
        coordinator,
        ledger,
        identity,
        gateway,
        metrics,
        engine_id: config.server.engine_id.clone(),
        network: config.server.network.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        coordinator_public_key: outcomes.public_key_hex(),
        enable_metrics: config.monitoring.enable_metrics,
        started_at: Instant::now(),
    });

    ApiServer::new(config, state).run().await
}
