//! In-process reference ledger
//!
//! A single write lock serializes commits, which is what gives transfers
//! and settlements their check-then-mutate atomicity. Commit runs in two
//! phases: validate every operation against a scratch view of balances,
//! then apply. A failure in the validate phase leaves no trace.

use super::{
    AccountId, AccountProfile, Ledger, LedgerError, LedgerOp, LedgerTransaction, OpenRoundRecord,
    TransferRecord, WagerRecord,
};
use crate::games::Amount;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<AccountId, AccountProfile>,
    wagers: Vec<WagerRecord>,
    transfers: Vec<TransferRecord>,
    open_rounds: HashMap<AccountId, OpenRoundRecord>,
    applied: HashSet<Uuid>,
}

/// In-memory ledger with atomic commits and per-account balance watches
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    watchers: DashMap<AccountId, watch::Sender<Amount>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            watchers: DashMap::new(),
        }
    }

    fn lock_poisoned() -> LedgerError {
        LedgerError::Unavailable("ledger state lock poisoned".to_string())
    }

    /// Net balance deltas and rule checks for one transaction, computed
    /// against current state without mutating it.
    fn validate(
        state: &LedgerState,
        tx: &LedgerTransaction,
    ) -> Result<HashMap<AccountId, i128>, LedgerError> {
        let mut deltas: HashMap<AccountId, i128> = HashMap::new();

        for op in &tx.ops {
            match op {
                LedgerOp::Debit { account, amount } => {
                    Self::require_account(state, account)?;
                    *deltas.entry(account.clone()).or_default() -= *amount as i128;
                }
                LedgerOp::Credit { account, amount } => {
                    Self::require_account(state, account)?;
                    *deltas.entry(account.clone()).or_default() += *amount as i128;
                }
                LedgerOp::AddWagered { account, .. }
                | LedgerOp::SetVerified { account, .. }
                | LedgerOp::SetGhostMode { account, .. } => {
                    Self::require_account(state, account)?;
                }
                LedgerOp::AppendWager(record) => {
                    Self::require_account(state, &record.account_id)?;
                }
                LedgerOp::AppendTransfer(record) => {
                    if let Some(account) = &record.debited_account {
                        Self::require_account(state, account)?;
                    }
                    if let Some(account) = &record.credited_account {
                        Self::require_account(state, account)?;
                    }
                }
                LedgerOp::OpenRound(round) => {
                    Self::require_account(state, &round.account_id)?;
                    if state.open_rounds.contains_key(&round.account_id) {
                        return Err(LedgerError::Rejected(format!(
                            "account {} already has an open round",
                            round.account_id
                        )));
                    }
                }
                LedgerOp::CloseRound { account } => {
                    if !state.open_rounds.contains_key(account) {
                        return Err(LedgerError::Rejected(format!(
                            "account {} has no open round to close",
                            account
                        )));
                    }
                }
            }
        }

        // The non-negative balance invariant is checked on the net effect
        // of the whole transaction.
        for (account, delta) in &deltas {
            let balance = state
                .accounts
                .get(account)
                .map(|a| a.balance)
                .ok_or_else(|| LedgerError::UnknownAccount(account.clone()))?;
            let after = balance as i128 + delta;
            if after < 0 {
                return Err(LedgerError::InsufficientFunds {
                    account: account.clone(),
                    balance_micros: balance,
                    required_micros: delta.unsigned_abs() as u64,
                });
            }
        }

        Ok(deltas)
    }

    fn require_account(state: &LedgerState, account: &str) -> Result<(), LedgerError> {
        if state.accounts.contains_key(account) {
            Ok(())
        } else {
            Err(LedgerError::UnknownAccount(account.to_string()))
        }
    }

    fn apply(state: &mut LedgerState, tx: LedgerTransaction) {
        for op in tx.ops {
            match op {
                LedgerOp::Debit { account, amount } => {
                    if let Some(profile) = state.accounts.get_mut(&account) {
                        profile.balance -= amount;
                    }
                }
                LedgerOp::Credit { account, amount } => {
                    if let Some(profile) = state.accounts.get_mut(&account) {
                        profile.balance += amount;
                    }
                }
                LedgerOp::AddWagered { account, amount } => {
                    if let Some(profile) = state.accounts.get_mut(&account) {
                        profile.total_wagered += amount;
                    }
                }
                LedgerOp::SetVerified { account, verified } => {
                    if let Some(profile) = state.accounts.get_mut(&account) {
                        profile.verified = verified;
                    }
                }
                LedgerOp::SetGhostMode { account, enabled } => {
                    if let Some(profile) = state.accounts.get_mut(&account) {
                        profile.ghost_mode = enabled;
                    }
                }
                LedgerOp::AppendWager(record) => {
                    state.wagers.push(record);
                }
                LedgerOp::AppendTransfer(mut record) => {
                    // Fill the audit balances from the state as applied so
                    // far; the debit op for this transfer runs before the
                    // append in every transaction the engine builds.
                    if let Some(account) = &record.debited_account {
                        if let Some(profile) = state.accounts.get(account) {
                            record.debited_balance_after = Some(profile.balance);
                            record.debited_balance_before = Some(profile.balance + record.amount);
                        }
                    }
                    state.transfers.push(record);
                }
                LedgerOp::OpenRound(round) => {
                    state.open_rounds.insert(round.account_id.clone(), round);
                }
                LedgerOp::CloseRound { account } => {
                    state.open_rounds.remove(&account);
                }
            }
        }
        state.applied.insert(tx.id);
    }

    fn notify_watchers(&self, balances: &[(AccountId, Amount)]) {
        for (account, balance) in balances {
            if let Some(sender) = self.watchers.get(account) {
                let _ = sender.send(*balance);
            }
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_account(&self, profile: AccountProfile) -> Result<(), LedgerError> {
        let mut state = self.state.write().map_err(|_| Self::lock_poisoned())?;
        if state.accounts.contains_key(&profile.id) {
            return Err(LedgerError::Rejected(format!(
                "account {} already exists",
                profile.id
            )));
        }
        let (sender, _) = watch::channel(profile.balance);
        self.watchers.insert(profile.id.clone(), sender);
        state.accounts.insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn account(&self, id: &str) -> Result<AccountProfile, LedgerError> {
        let state = self.state.read().map_err(|_| Self::lock_poisoned())?;
        state
            .accounts
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownAccount(id.to_string()))
    }

    async fn commit(&self, tx: LedgerTransaction) -> Result<(), LedgerError> {
        let touched: Vec<(AccountId, Amount)>;
        {
            let mut state = self.state.write().map_err(|_| Self::lock_poisoned())?;
            if state.applied.contains(&tx.id) {
                return Ok(());
            }

            let deltas = Self::validate(&state, &tx)?;
            Self::apply(&mut state, tx);

            touched = deltas
                .keys()
                .filter_map(|account| {
                    state
                        .accounts
                        .get(account)
                        .map(|p| (account.clone(), p.balance))
                })
                .collect();
        }
        self.notify_watchers(&touched);
        Ok(())
    }

    async fn wager(&self, wager_id: &str) -> Result<Option<WagerRecord>, LedgerError> {
        let state = self.state.read().map_err(|_| Self::lock_poisoned())?;
        Ok(state.wagers.iter().find(|w| w.id == wager_id).cloned())
    }

    async fn wagers_for(
        &self,
        account: &str,
        limit: usize,
    ) -> Result<Vec<WagerRecord>, LedgerError> {
        let state = self.state.read().map_err(|_| Self::lock_poisoned())?;
        Ok(state
            .wagers
            .iter()
            .rev()
            .filter(|w| w.account_id == account)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_wagers(&self, limit: usize) -> Result<Vec<WagerRecord>, LedgerError> {
        let state = self.state.read().map_err(|_| Self::lock_poisoned())?;
        Ok(state.wagers.iter().rev().take(limit).cloned().collect())
    }

    async fn transfers_for(
        &self,
        account: &str,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, LedgerError> {
        let state = self.state.read().map_err(|_| Self::lock_poisoned())?;
        Ok(state
            .transfers
            .iter()
            .rev()
            .filter(|t| {
                t.debited_account.as_deref() == Some(account)
                    || t.credited_account.as_deref() == Some(account)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn open_rounds(&self) -> Result<Vec<OpenRoundRecord>, LedgerError> {
        let state = self.state.read().map_err(|_| Self::lock_poisoned())?;
        Ok(state.open_rounds.values().cloned().collect())
    }

    async fn open_round_for(&self, account: &str) -> Result<Option<OpenRoundRecord>, LedgerError> {
        let state = self.state.read().map_err(|_| Self::lock_poisoned())?;
        Ok(state.open_rounds.get(account).cloned())
    }

    fn subscribe_balance(&self, account: &str) -> Option<watch::Receiver<Amount>> {
        self.watchers.get(account).map(|s| s.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::{BetParams, GameKind, OutcomeData, RollDirection};
    use crate::ledger::{Role, TransferKind, WagerStatus};
    use crate::rng::DrawProof;
    use chrono::Utc;

    fn profile(id: &str, balance: Amount) -> AccountProfile {
        AccountProfile {
            id: id.to_string(),
            display_name: format!("name-{}", id),
            role: Role::Player,
            verified: true,
            ghost_mode: false,
            balance,
            total_wagered: 0,
            created_at: Utc::now(),
        }
    }

    fn wager_record(id: &str, account: &str, stake: Amount, payout: Amount) -> WagerRecord {
        WagerRecord {
            id: id.to_string(),
            account_id: account.to_string(),
            display_name: "tester".to_string(),
            game: GameKind::Dice,
            stake,
            params: BetParams::Dice {
                threshold: 50,
                direction: RollDirection::Over,
            },
            outcome: OutcomeData::Dice { roll: 77 },
            multiplier_bp: 19_800,
            payout,
            status: if payout > 0 {
                WagerStatus::Won
            } else {
                WagerStatus::Lost
            },
            proof: DrawProof {
                vrf_output: String::new(),
                vrf_proof: String::new(),
                public_key: String::new(),
                input_message: String::new(),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_applies_all_ops_atomically() {
        let ledger = InMemoryLedger::new();
        ledger.create_account(profile("a", 10_000_000)).await.unwrap();

        let tx = LedgerTransaction::new(vec![
            LedgerOp::Debit {
                account: "a".to_string(),
                amount: 5_000_000,
            },
            LedgerOp::AddWagered {
                account: "a".to_string(),
                amount: 5_000_000,
            },
            LedgerOp::Credit {
                account: "a".to_string(),
                amount: 9_900_000,
            },
            LedgerOp::AppendWager(wager_record("w1", "a", 5_000_000, 9_900_000)),
        ]);
        ledger.commit(tx).await.unwrap();

        let account = ledger.account("a").await.unwrap();
        assert_eq!(account.balance, 14_900_000);
        assert_eq!(account.total_wagered, 5_000_000);
        assert_eq!(ledger.recent_wagers(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overdraw_rejects_whole_transaction() {
        let ledger = InMemoryLedger::new();
        ledger.create_account(profile("a", 1_000_000)).await.unwrap();

        let tx = LedgerTransaction::new(vec![
            LedgerOp::Debit {
                account: "a".to_string(),
                amount: 2_000_000,
            },
            LedgerOp::AppendWager(wager_record("w1", "a", 2_000_000, 0)),
        ]);
        let err = ledger.commit(tx).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        // Nothing applied
        assert_eq!(ledger.account("a").await.unwrap().balance, 1_000_000);
        assert!(ledger.recent_wagers(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replaying_committed_id_is_noop() {
        let ledger = InMemoryLedger::new();
        ledger.create_account(profile("a", 5_000_000)).await.unwrap();

        let tx = LedgerTransaction::new(vec![LedgerOp::Debit {
            account: "a".to_string(),
            amount: 1_000_000,
        }]);
        ledger.commit(tx.clone()).await.unwrap();
        ledger.commit(tx).await.unwrap();

        assert_eq!(ledger.account("a").await.unwrap().balance, 4_000_000);
    }

    #[tokio::test]
    async fn test_transfer_audit_balances_filled_at_apply() {
        let ledger = InMemoryLedger::new();
        ledger.create_account(profile("agent", 10_000_000)).await.unwrap();
        ledger.create_account(profile("player", 0)).await.unwrap();

        let record = TransferRecord {
            id: "t1".to_string(),
            kind: TransferKind::Agent,
            debited_account: Some("agent".to_string()),
            credited_account: Some("player".to_string()),
            amount: 3_000_000,
            debited_balance_before: None,
            debited_balance_after: None,
            created_at: Utc::now(),
        };
        let tx = LedgerTransaction::new(vec![
            LedgerOp::Debit {
                account: "agent".to_string(),
                amount: 3_000_000,
            },
            LedgerOp::Credit {
                account: "player".to_string(),
                amount: 3_000_000,
            },
            LedgerOp::AppendTransfer(record),
        ]);
        ledger.commit(tx).await.unwrap();

        let transfers = ledger.transfers_for("agent", 10).await.unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].debited_balance_before, Some(10_000_000));
        assert_eq!(transfers[0].debited_balance_after, Some(7_000_000));
    }

    #[tokio::test]
    async fn test_balance_watch_tracks_commits() {
        let ledger = InMemoryLedger::new();
        ledger.create_account(profile("a", 2_000_000)).await.unwrap();

        let rx = ledger.subscribe_balance("a").expect("watch exists");
        assert_eq!(*rx.borrow(), 2_000_000);

        ledger
            .commit(LedgerTransaction::new(vec![LedgerOp::Credit {
                account: "a".to_string(),
                amount: 500_000,
            }]))
            .await
            .unwrap();
        assert_eq!(*rx.borrow(), 2_500_000);
    }

    #[tokio::test]
    async fn test_open_round_lifecycle() {
        let ledger = InMemoryLedger::new();
        ledger.create_account(profile("a", 5_000_000)).await.unwrap();

        let round = OpenRoundRecord {
            wager_id: "w1".to_string(),
            account_id: "a".to_string(),
            game: GameKind::Mines,
            stake: 1_000_000,
            mines: 5,
            mine_cells: vec![1, 5, 9, 13, 21],
            revealed: vec![],
            proof: DrawProof {
                vrf_output: String::new(),
                vrf_proof: String::new(),
                public_key: String::new(),
                input_message: String::new(),
            },
            opened_at: Utc::now(),
        };
        ledger
            .commit(LedgerTransaction::new(vec![
                LedgerOp::Debit {
                    account: "a".to_string(),
                    amount: 1_000_000,
                },
                LedgerOp::OpenRound(round.clone()),
            ]))
            .await
            .unwrap();

        // A second open round for the same account is rejected
        let err = ledger
            .commit(LedgerTransaction::new(vec![LedgerOp::OpenRound(round)]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(_)));

        assert!(ledger.open_round_for("a").await.unwrap().is_some());
        ledger
            .commit(LedgerTransaction::new(vec![LedgerOp::CloseRound {
                account: "a".to_string(),
            }]))
            .await
            .unwrap();
        assert!(ledger.open_round_for("a").await.unwrap().is_none());
    }
}
