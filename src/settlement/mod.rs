//! Settlement coordinator
//!
//! Owns the wager lifecycle: validate, debit, resolve, credit, record.
//! For single-shot games the whole sequence is one atomic ledger
//! transaction, so there is no window in which an account is debited
//! without a matching record. Multi-step mines rounds persist an open
//! round inside the stake-debit transaction; `recover` refunds any round
//! left orphaned by a crash.
//!
//! One wager per account may be in flight at a time. The in-flight map is
//! the reentrancy lock: it is held for the duration of a single-shot
//! settlement and for the whole life of a mines round.

pub mod feed;
pub mod rounds;
pub mod transfer;

use crate::errors::{EngineError, EngineResult};
use crate::games::{self, Amount, BetParams, GameKind};
use crate::ledger::{
    AccountId, Ledger, LedgerOp, LedgerTransaction, WagerRecord, WagerStatus,
};
use crate::metrics::EngineMetrics;
use crate::rng::{Draw, VrfOutcomeSource};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use self::feed::LiveBetFeed;
use self::rounds::MinesRound;

/// Table limits and retry policy for the coordinator
#[derive(Debug, Clone)]
pub struct SettlementLimits {
    pub min_stake: Amount,
    pub max_stake: Amount,
    /// Total commit attempts for a transaction (first try included)
    pub commit_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for SettlementLimits {
    fn default() -> Self {
        Self {
            // 0.10 to 1,000.00 credits
            min_stake: 100_000,
            max_stake: 1_000_000_000,
            commit_attempts: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

/// Coordinates outcome draws and atomic ledger settlement
pub struct SettlementCoordinator {
    ledger: Arc<dyn Ledger>,
    outcomes: Arc<VrfOutcomeSource>,
    feed: Arc<LiveBetFeed>,
    metrics: Arc<EngineMetrics>,
    limits: SettlementLimits,
    in_flight: DashMap<AccountId, ()>,
    rounds: DashMap<AccountId, MinesRound>,
}

impl SettlementCoordinator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        outcomes: Arc<VrfOutcomeSource>,
        feed: Arc<LiveBetFeed>,
        metrics: Arc<EngineMetrics>,
        limits: SettlementLimits,
    ) -> Self {
        Self {
            ledger,
            outcomes,
            feed,
            metrics,
            limits,
            in_flight: DashMap::new(),
            rounds: DashMap::new(),
        }
    }

    pub fn feed(&self) -> &LiveBetFeed {
        &self.feed
    }

    /// Settle one single-shot wager (dice, keno, limbo, wheel).
    ///
    /// Mines rounds are multi-step and go through `mines_start` /
    /// `mines_reveal` / `mines_cashout` instead.
    pub async fn place_bet(
        &self,
        account_id: &str,
        stake: Amount,
        params: BetParams,
    ) -> EngineResult<WagerRecord> {
        if matches!(params, BetParams::Mines { .. }) {
            return Err(EngineError::Validation(
                "mines wagers settle through the round flow".to_string(),
            ));
        }
        games::validate_params(&params)?;
        self.validate_stake(stake)?;

        let profile = self.ledger.account(account_id).await?;
        if profile.balance < stake {
            return Err(EngineError::InsufficientFunds {
                balance_micros: profile.balance,
                required_micros: stake,
            });
        }

        let _guard = self.acquire(account_id)?;

        let wager_id = Uuid::new_v4().to_string();
        let game = params.game();
        let draw = self
            .outcomes
            .draw(&wager_id, game, account_id, &params.commitment(stake))?;
        let result = games::evaluate(stake, &params, &draw)?;

        let record = WagerRecord {
            id: wager_id,
            account_id: account_id.to_string(),
            display_name: profile.display_name.clone(),
            game,
            stake,
            params,
            outcome: result.outcome,
            multiplier_bp: result.multiplier_bp,
            payout: result.payout,
            status: if result.won {
                WagerStatus::Won
            } else {
                WagerStatus::Lost
            },
            proof: draw.proof,
            created_at: Utc::now(),
        };

        let mut ops = vec![
            LedgerOp::Debit {
                account: account_id.to_string(),
                amount: stake,
            },
            LedgerOp::AddWagered {
                account: account_id.to_string(),
                amount: stake,
            },
        ];
        if result.payout > 0 {
            ops.push(LedgerOp::Credit {
                account: account_id.to_string(),
                amount: result.payout,
            });
        }
        ops.push(LedgerOp::AppendWager(record.clone()));

        self.commit_with_retry(LedgerTransaction::new(ops)).await?;

        debug!(
            wager = %record.id,
            game = %record.game,
            stake,
            payout = record.payout,
            "wager settled"
        );
        self.feed.push(&record, profile.ghost_mode);
        self.record_settlement(&record);

        Ok(record)
    }

    /// Refund every open round with no in-memory owner, restoring the
    /// debited stake. Run at startup and after reconnecting to the ledger.
    pub async fn recover(&self) -> EngineResult<usize> {
        let open = self.ledger.open_rounds().await?;
        let mut refunded = 0usize;

        for round in open {
            if self.rounds.contains_key(&round.account_id) {
                continue;
            }
            warn!(
                account = %round.account_id,
                wager = %round.wager_id,
                stake = round.stake,
                "refunding orphaned open round"
            );
            let tx = LedgerTransaction::new(vec![
                LedgerOp::Credit {
                    account: round.account_id.clone(),
                    amount: round.stake,
                },
                LedgerOp::CloseRound {
                    account: round.account_id.clone(),
                },
            ]);
            self.commit_with_retry(tx).await?;
            self.in_flight.remove(&round.account_id);
            self.metrics.rounds_recovered.inc();
            refunded += 1;
        }

        if refunded > 0 {
            info!(refunded, "open-round recovery complete");
        }
        Ok(refunded)
    }

    pub(crate) fn validate_stake(&self, stake: Amount) -> EngineResult<()> {
        if stake < self.limits.min_stake {
            return Err(EngineError::Validation(format!(
                "stake {} below table minimum {}",
                stake, self.limits.min_stake
            )));
        }
        if stake > self.limits.max_stake {
            return Err(EngineError::Validation(format!(
                "stake {} above table maximum {}",
                stake, self.limits.max_stake
            )));
        }
        Ok(())
    }

    /// Take the per-account reentrancy lock, or reject.
    pub(crate) fn acquire(&self, account_id: &str) -> EngineResult<InFlightGuard<'_>> {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(account_id.to_string()) {
            Entry::Occupied(_) => Err(EngineError::WagerInFlight),
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Ok(InFlightGuard {
                    map: &self.in_flight,
                    key: account_id.to_string(),
                    armed: true,
                })
            }
        }
    }

    pub(crate) fn release(&self, account_id: &str) {
        self.in_flight.remove(account_id);
    }

    /// Commit with bounded retries on transient failures. The transaction
    /// id is stable across attempts, so a commit that actually landed
    /// before an ambiguous failure is not applied twice.
    pub(crate) async fn commit_with_retry(&self, tx: LedgerTransaction) -> EngineResult<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.ledger.commit(tx.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let err: EngineError = e.into();
                    if err.is_transient() && attempt < self.limits.commit_attempts {
                        warn!(
                            tx = %tx.id,
                            attempt,
                            error = %err,
                            "transient ledger failure, retrying commit"
                        );
                        self.metrics.commit_retries.inc();
                        tokio::time::sleep(self.limits.retry_backoff).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    pub(crate) fn record_settlement(&self, record: &WagerRecord) {
        let status = match record.status {
            WagerStatus::Won => "won",
            WagerStatus::Lost => "lost",
        };
        self.metrics
            .wagers_settled
            .with_label_values(&[&record.game.to_string(), status])
            .inc();
        self.metrics.stake_volume_micros.inc_by(record.stake);
        self.metrics.payout_volume_micros.inc_by(record.payout);
    }

    pub(crate) fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub(crate) fn outcomes(&self) -> &Arc<VrfOutcomeSource> {
        &self.outcomes
    }

    pub(crate) fn rounds(&self) -> &DashMap<AccountId, MinesRound> {
        &self.rounds
    }

    pub(crate) fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Game kinds this coordinator settles.
    pub fn supported_games() -> &'static [GameKind] {
        &[
            GameKind::Dice,
            GameKind::Mines,
            GameKind::Keno,
            GameKind::Limbo,
            GameKind::Wheel,
        ]
    }
}

/// Re-verify a persisted wager end-to-end: the VRF proof must check out
/// against the input the engine committed to, and replaying the outcome
/// bytes through the rule module must reproduce the recorded result.
pub fn verify_wager_record(record: &WagerRecord) -> EngineResult<bool> {
    let expected_input = format!(
        "{}:{}:{}:{}",
        record.id,
        record.game,
        record.account_id,
        record.params.commitment(record.stake)
    );
    if !VrfOutcomeSource::verify_proof(&record.proof, &expected_input)? {
        return Ok(false);
    }

    let bytes = hex::decode(&record.proof.vrf_output)
        .map_err(|e| EngineError::Validation(format!("invalid VRF output hex: {}", e)))?;
    let output: [u8; 32] = bytes
        .try_into()
        .map_err(|_| EngineError::Validation("VRF output must be 32 bytes".to_string()))?;
    let draw = Draw::from_output(output);

    match (&record.params, &record.outcome) {
        (BetParams::Mines { mines }, games::OutcomeData::Mines { mine_cells, .. }) => {
            // Reveal order is the player's; only the placement is drawn.
            Ok(games::mines::place_mines(&draw, *mines)? == *mine_cells)
        }
        (params, _) => {
            let result = games::evaluate(record.stake, params, &draw)?;
            Ok(result.outcome == record.outcome && result.payout == record.payout)
        }
    }
}

/// RAII reentrancy lock; `keep` hands ownership to a mines round.
#[derive(Debug)]
pub(crate) struct InFlightGuard<'a> {
    map: &'a DashMap<AccountId, ()>,
    key: AccountId,
    armed: bool,
}

impl InFlightGuard<'_> {
    /// Leave the lock held after this guard drops; the round settlement
    /// path releases it explicitly.
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.map.remove(&self.key);
        }
    }
}
