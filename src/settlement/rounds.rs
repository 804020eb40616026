//! Mines round lifecycle
//!
//! A round opens by debiting the stake and persisting an open-round
//! document in the same ledger transaction; it settles (mine hit or
//! cash-out) with a second transaction that appends the wager record and
//! closes the round. The in-flight lock taken at start is held until the
//! settling transaction commits, so no other wager can run for the
//! account mid-round.
//!
//! Mine placement is drawn once at round start from the VRF output and
//! never changes afterward; reveals only test membership.

use super::SettlementCoordinator;
use crate::errors::{EngineError, EngineResult};
use crate::games::{mines, Amount, BetParams, GameKind, OutcomeData};
use crate::ledger::{
    Ledger, LedgerOp, LedgerTransaction, OpenRoundRecord, WagerRecord, WagerStatus,
};
use crate::rng::DrawProof;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// In-memory state of one active mines round
#[derive(Debug, Clone)]
pub struct MinesRound {
    pub wager_id: String,
    pub account_id: String,
    pub display_name: String,
    pub ghost_mode: bool,
    pub stake: Amount,
    pub mines: u8,
    pub mine_cells: Vec<u8>,
    pub revealed: Vec<u8>,
    pub opened_at: DateTime<Utc>,
    pub proof: DrawProof,
    /// Set while a settling transaction is in flight; concurrent round
    /// operations are rejected rather than double-settled.
    settling: bool,
}

/// Player-visible round state (mine positions stay hidden)
#[derive(Debug, Clone, Serialize)]
pub struct MinesRoundView {
    pub wager_id: String,
    pub stake: Amount,
    pub mines: u8,
    pub revealed: Vec<u8>,
    pub multiplier_bp: u64,
    pub can_reveal: bool,
}

/// Result of revealing one cell
#[derive(Debug, Clone)]
pub enum MinesReveal {
    Safe {
        multiplier_bp: u64,
        revealed: Vec<u8>,
        can_reveal: bool,
    },
    Mine {
        record: WagerRecord,
    },
}

enum RevealAction {
    Safe {
        multiplier_bp: u64,
        revealed: Vec<u8>,
        can_reveal: bool,
    },
    Mine(MinesRound),
}

impl MinesRound {
    fn view(&self) -> EngineResult<MinesRoundView> {
        let multiplier_bp = mines::multiplier_bp(self.mines, self.revealed.len() as u8)?;
        Ok(MinesRoundView {
            wager_id: self.wager_id.clone(),
            stake: self.stake,
            mines: self.mines,
            revealed: self.revealed.clone(),
            multiplier_bp,
            can_reveal: (self.revealed.len() as u8) < mines::max_reveals(self.mines),
        })
    }
}

impl SettlementCoordinator {
    /// Open a mines round: debit the stake and persist the open round in
    /// one atomic transaction.
    pub async fn mines_start(
        &self,
        account_id: &str,
        stake: Amount,
        mine_count: u8,
    ) -> EngineResult<MinesRoundView> {
        mines::validate(mine_count)?;
        self.validate_stake(stake)?;

        let profile = self.ledger().account(account_id).await?;
        if profile.balance < stake {
            return Err(EngineError::InsufficientFunds {
                balance_micros: profile.balance,
                required_micros: stake,
            });
        }

        let guard = self.acquire(account_id)?;

        let wager_id = Uuid::new_v4().to_string();
        let params = BetParams::Mines { mines: mine_count };
        let draw = self.outcomes().draw(
            &wager_id,
            GameKind::Mines,
            account_id,
            &params.commitment(stake),
        )?;
        let mine_cells = mines::place_mines(&draw, mine_count)?;
        let opened_at = Utc::now();

        let round_record = OpenRoundRecord {
            wager_id: wager_id.clone(),
            account_id: account_id.to_string(),
            game: GameKind::Mines,
            stake,
            mines: mine_count,
            mine_cells: mine_cells.clone(),
            revealed: vec![],
            proof: draw.proof.clone(),
            opened_at,
        };
        let tx = LedgerTransaction::new(vec![
            LedgerOp::Debit {
                account: account_id.to_string(),
                amount: stake,
            },
            LedgerOp::AddWagered {
                account: account_id.to_string(),
                amount: stake,
            },
            LedgerOp::OpenRound(round_record),
        ]);
        self.commit_with_retry(tx).await?;

        let round = MinesRound {
            wager_id,
            account_id: account_id.to_string(),
            display_name: profile.display_name,
            ghost_mode: profile.ghost_mode,
            stake,
            mines: mine_count,
            mine_cells,
            revealed: vec![],
            opened_at,
            proof: draw.proof,
            settling: false,
        };
        let view = round.view()?;
        self.rounds().insert(account_id.to_string(), round);

        // The reentrancy lock now belongs to the round.
        guard.keep();

        debug!(account = %account_id, stake, mines = mine_count, "mines round opened");
        Ok(view)
    }

    /// Reveal one cell. A safe reveal is purely in-memory; a mine hit
    /// settles the round as lost.
    pub async fn mines_reveal(&self, account_id: &str, cell: u8) -> EngineResult<MinesReveal> {
        if cell >= mines::GRID_CELLS {
            return Err(EngineError::Validation(format!(
                "cell {} outside the {}-cell grid",
                cell,
                mines::GRID_CELLS
            )));
        }

        // Classify under the map guard; never hold it across an await.
        let action = {
            let mut round = self
                .rounds()
                .get_mut(account_id)
                .ok_or(EngineError::NoActiveRound)?;
            if round.settling {
                return Err(EngineError::RoundSettling);
            }
            if round.revealed.contains(&cell) {
                return Err(EngineError::Validation(format!(
                    "cell {} already revealed",
                    cell
                )));
            }

            if round.mine_cells.contains(&cell) {
                round.settling = true;
                let mut snapshot = round.clone();
                snapshot.revealed.push(cell);
                RevealAction::Mine(snapshot)
            } else {
                if round.revealed.len() as u8 >= mines::max_reveals(round.mines) {
                    return Err(EngineError::Validation(
                        "no further reveals; the round must cash out".to_string(),
                    ));
                }
                round.revealed.push(cell);
                let multiplier_bp = mines::multiplier_bp(round.mines, round.revealed.len() as u8)?;
                RevealAction::Safe {
                    multiplier_bp,
                    revealed: round.revealed.clone(),
                    can_reveal: (round.revealed.len() as u8) < mines::max_reveals(round.mines),
                }
            }
        };

        match action {
            RevealAction::Safe {
                multiplier_bp,
                revealed,
                can_reveal,
            } => Ok(MinesReveal::Safe {
                multiplier_bp,
                revealed,
                can_reveal,
            }),
            RevealAction::Mine(snapshot) => {
                let record = WagerRecord {
                    id: snapshot.wager_id.clone(),
                    account_id: snapshot.account_id.clone(),
                    display_name: snapshot.display_name.clone(),
                    game: GameKind::Mines,
                    stake: snapshot.stake,
                    params: BetParams::Mines {
                        mines: snapshot.mines,
                    },
                    outcome: OutcomeData::Mines {
                        mine_cells: snapshot.mine_cells.clone(),
                        revealed: snapshot.revealed.clone(),
                        cashed_out: false,
                    },
                    multiplier_bp: 0,
                    payout: 0,
                    status: WagerStatus::Lost,
                    proof: snapshot.proof.clone(),
                    created_at: Utc::now(),
                };
                let tx = LedgerTransaction::new(vec![
                    LedgerOp::AppendWager(record.clone()),
                    LedgerOp::CloseRound {
                        account: account_id.to_string(),
                    },
                ]);
                match self.commit_with_retry(tx).await {
                    Ok(()) => {
                        self.rounds().remove(account_id);
                        self.release(account_id);
                        self.feed().push(&record, snapshot.ghost_mode);
                        self.record_settlement(&record);
                        debug!(account = %account_id, cell, "mine hit, round lost");
                        Ok(MinesReveal::Mine { record })
                    }
                    Err(e) => {
                        // Leave the round retryable; the stake stays staked.
                        if let Some(mut round) = self.rounds().get_mut(account_id) {
                            round.settling = false;
                        }
                        Err(e)
                    }
                }
            }
        }
    }

    /// Lock in the current multiplier and settle the round as won.
    pub async fn mines_cashout(&self, account_id: &str) -> EngineResult<WagerRecord> {
        let snapshot = {
            let mut round = self
                .rounds()
                .get_mut(account_id)
                .ok_or(EngineError::NoActiveRound)?;
            if round.settling {
                return Err(EngineError::RoundSettling);
            }
            // Cash-out needs at least one safe reveal, except in the
            // degenerate 24-mine round where no reveal is ever allowed and
            // immediate cash-out at 1.00x is the only exit.
            if round.revealed.is_empty() && mines::max_reveals(round.mines) > 0 {
                return Err(EngineError::Validation(
                    "cash out requires at least one safe reveal".to_string(),
                ));
            }
            round.settling = true;
            round.clone()
        };

        let revealed_count = snapshot.revealed.len() as u8;
        let multiplier_bp = mines::multiplier_bp(snapshot.mines, revealed_count)?;
        let payout = mines::payout(snapshot.stake, snapshot.mines, revealed_count)?;

        let record = WagerRecord {
            id: snapshot.wager_id.clone(),
            account_id: snapshot.account_id.clone(),
            display_name: snapshot.display_name.clone(),
            game: GameKind::Mines,
            stake: snapshot.stake,
            params: BetParams::Mines {
                mines: snapshot.mines,
            },
            outcome: OutcomeData::Mines {
                mine_cells: snapshot.mine_cells.clone(),
                revealed: snapshot.revealed.clone(),
                cashed_out: true,
            },
            multiplier_bp,
            payout,
            status: WagerStatus::Won,
            proof: snapshot.proof.clone(),
            created_at: Utc::now(),
        };
        let tx = LedgerTransaction::new(vec![
            LedgerOp::Credit {
                account: account_id.to_string(),
                amount: payout,
            },
            LedgerOp::AppendWager(record.clone()),
            LedgerOp::CloseRound {
                account: account_id.to_string(),
            },
        ]);
        match self.commit_with_retry(tx).await {
            Ok(()) => {
                self.rounds().remove(account_id);
                self.release(account_id);
                self.feed().push(&record, snapshot.ghost_mode);
                self.record_settlement(&record);
                debug!(
                    account = %account_id,
                    payout,
                    multiplier_bp,
                    "mines round cashed out"
                );
                Ok(record)
            }
            Err(e) => {
                if let Some(mut round) = self.rounds().get_mut(account_id) {
                    round.settling = false;
                }
                Err(e)
            }
        }
    }

    /// Current round state for the account, if any.
    pub fn mines_state(&self, account_id: &str) -> EngineResult<Option<MinesRoundView>> {
        match self.rounds().get(account_id) {
            Some(round) => Ok(Some(round.view()?)),
            None => Ok(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn round_mine_cells(&self, account_id: &str) -> Option<Vec<u8>> {
        self.rounds().get(account_id).map(|r| r.mine_cells.clone())
    }
}
