//! Prometheus metrics for the settlement engine

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Engine-wide counters, exported at /metrics
pub struct EngineMetrics {
    registry: Registry,
    pub wagers_settled: IntCounterVec,
    pub stake_volume_micros: IntCounter,
    pub payout_volume_micros: IntCounter,
    pub transfers: IntCounterVec,
    pub commit_retries: IntCounter,
    pub rounds_recovered: IntCounter,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let wagers_settled = IntCounterVec::new(
            Opts::new("croupier_wagers_settled_total", "Settled wagers"),
            &["game", "status"],
        )?;
        let stake_volume_micros = IntCounter::new(
            "croupier_stake_volume_micros_total",
            "Total stake volume in micro-credits",
        )?;
        let payout_volume_micros = IntCounter::new(
            "croupier_payout_volume_micros_total",
            "Total payout volume in micro-credits",
        )?;
        let transfers = IntCounterVec::new(
            Opts::new("croupier_transfers_total", "Transfer-class ledger events"),
            &["kind"],
        )?;
        let commit_retries = IntCounter::new(
            "croupier_ledger_commit_retries_total",
            "Ledger commits retried after transient failures",
        )?;
        let rounds_recovered = IntCounter::new(
            "croupier_rounds_recovered_total",
            "Orphaned open rounds refunded during recovery",
        )?;

        registry.register(Box::new(wagers_settled.clone()))?;
        registry.register(Box::new(stake_volume_micros.clone()))?;
        registry.register(Box::new(payout_volume_micros.clone()))?;
        registry.register(Box::new(transfers.clone()))?;
        registry.register(Box::new(commit_retries.clone()))?;
        registry.register(Box::new(rounds_recovered.clone()))?;

        Ok(Self {
            registry,
            wagers_settled,
            stake_volume_micros,
            payout_volume_micros,
            transfers,
            commit_retries,
            rounds_recovered,
        })
    }

    /// Text exposition format for the /metrics endpoint.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics not utf-8: {}", e)))
    }
}
