//! Transfer-class ledger events: agent credits, deposits, withdrawals
//!
//! The sender-balance-check, debit, and recipient credit happen inside a
//! single ledger transaction; two concurrent transfers cannot both read a
//! stale sufficient balance because the ledger serializes commits and
//! re-checks the non-negative invariant atomically.

use super::SettlementCoordinator;
use crate::errors::{EngineError, EngineResult};
use crate::games::Amount;
use crate::ledger::{Ledger, LedgerOp, LedgerTransaction, Role, TransferKind, TransferRecord};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

impl SettlementCoordinator {
    /// Agent cash-in: move funds from an agent to a player account.
    pub async fn agent_transfer(
        &self,
        sender_id: &str,
        recipient_id: &str,
        amount: Amount,
    ) -> EngineResult<TransferRecord> {
        if amount == 0 {
            return Err(EngineError::Validation(
                "transfer amount must be positive".to_string(),
            ));
        }
        if sender_id == recipient_id {
            return Err(EngineError::Validation(
                "sender and recipient must differ".to_string(),
            ));
        }

        let sender = self.ledger().account(sender_id).await?;
        if !matches!(sender.role, Role::Agent | Role::Admin) {
            return Err(EngineError::Forbidden(
                "only agent accounts can transfer to players".to_string(),
            ));
        }
        // Friendly pre-check; the commit re-checks atomically.
        if sender.balance < amount {
            return Err(EngineError::InsufficientFunds {
                balance_micros: sender.balance,
                required_micros: amount,
            });
        }
        self.ledger().account(recipient_id).await?;

        let record = TransferRecord {
            id: Uuid::new_v4().to_string(),
            kind: TransferKind::Agent,
            debited_account: Some(sender_id.to_string()),
            credited_account: Some(recipient_id.to_string()),
            amount,
            debited_balance_before: None,
            debited_balance_after: None,
            created_at: Utc::now(),
        };
        let tx = LedgerTransaction::new(vec![
            LedgerOp::Debit {
                account: sender_id.to_string(),
                amount,
            },
            LedgerOp::Credit {
                account: recipient_id.to_string(),
                amount,
            },
            LedgerOp::AppendTransfer(record.clone()),
        ]);
        self.commit_with_retry(tx).await?;
        self.metrics().transfers.with_label_values(&["agent"]).inc();
        debug!(sender = %sender_id, recipient = %recipient_id, amount, "agent transfer committed");

        self.stored_transfer(sender_id, record).await
    }

    /// Credit a deposit confirmed by the payment gateway webhook.
    pub async fn deposit(&self, account_id: &str, amount: Amount) -> EngineResult<TransferRecord> {
        if amount == 0 {
            return Err(EngineError::Validation(
                "deposit amount must be positive".to_string(),
            ));
        }
        self.ledger().account(account_id).await?;

        let record = TransferRecord {
            id: Uuid::new_v4().to_string(),
            kind: TransferKind::Deposit,
            debited_account: None,
            credited_account: Some(account_id.to_string()),
            amount,
            debited_balance_before: None,
            debited_balance_after: None,
            created_at: Utc::now(),
        };
        let tx = LedgerTransaction::new(vec![
            LedgerOp::Credit {
                account: account_id.to_string(),
                amount,
            },
            LedgerOp::AppendTransfer(record.clone()),
        ]);
        self.commit_with_retry(tx).await?;
        self.metrics()
            .transfers
            .with_label_values(&["deposit"])
            .inc();
        debug!(account = %account_id, amount, "deposit credited");

        Ok(record)
    }

    /// Debit a withdrawal request.
    pub async fn withdraw(&self, account_id: &str, amount: Amount) -> EngineResult<TransferRecord> {
        if amount == 0 {
            return Err(EngineError::Validation(
                "withdrawal amount must be positive".to_string(),
            ));
        }
        let profile = self.ledger().account(account_id).await?;
        if profile.balance < amount {
            return Err(EngineError::InsufficientFunds {
                balance_micros: profile.balance,
                required_micros: amount,
            });
        }

        let record = TransferRecord {
            id: Uuid::new_v4().to_string(),
            kind: TransferKind::Withdrawal,
            debited_account: Some(account_id.to_string()),
            credited_account: None,
            amount,
            debited_balance_before: None,
            debited_balance_after: None,
            created_at: Utc::now(),
        };
        let tx = LedgerTransaction::new(vec![
            LedgerOp::Debit {
                account: account_id.to_string(),
                amount,
            },
            LedgerOp::AppendTransfer(record.clone()),
        ]);
        self.commit_with_retry(tx).await?;
        self.metrics()
            .transfers
            .with_label_values(&["withdrawal"])
            .inc();
        debug!(account = %account_id, amount, "withdrawal debited");

        self.stored_transfer(account_id, record).await
    }

    /// Prefer the ledger's stored copy, which carries the audit balances
    /// filled in at apply time.
    async fn stored_transfer(
        &self,
        account_id: &str,
        local: TransferRecord,
    ) -> EngineResult<TransferRecord> {
        let stored = self
            .ledger()
            .transfers_for(account_id, 16)
            .await?
            .into_iter()
            .find(|t| t.id == local.id);
        Ok(stored.unwrap_or(local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::InMemoryLedger;
    use crate::ledger::{AccountProfile, Ledger};
    use crate::metrics::EngineMetrics;
    use crate::rng::VrfOutcomeSource;
    use crate::settlement::feed::LiveBetFeed;
    use crate::settlement::SettlementLimits;
    use std::sync::Arc;

    async fn setup() -> (Arc<SettlementCoordinator>, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        for (id, role, balance) in [
            ("agent-1", Role::Agent, 10_000_000u64),
            ("player-1", Role::Player, 0),
            ("player-2", Role::Player, 500_000),
        ] {
            ledger
                .create_account(AccountProfile {
                    id: id.to_string(),
                    display_name: id.to_string(),
                    role,
                    verified: true,
                    ghost_mode: false,
                    balance,
                    total_wagered: 0,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let coordinator = Arc::new(SettlementCoordinator::new(
            ledger.clone(),
            Arc::new(VrfOutcomeSource::new_random()),
            Arc::new(LiveBetFeed::new(10)),
            Arc::new(EngineMetrics::new().unwrap()),
            SettlementLimits::default(),
        ));
        (coordinator, ledger)
    }

    #[tokio::test]
    async fn test_agent_transfer_moves_funds_and_audits() {
        let (coordinator, ledger) = setup().await;

        let record = coordinator
            .agent_transfer("agent-1", "player-1", 3_000_000)
            .await
            .expect("transfer failed");

        assert_eq!(record.debited_balance_before, Some(10_000_000));
        assert_eq!(record.debited_balance_after, Some(7_000_000));
        assert_eq!(ledger.account("agent-1").await.unwrap().balance, 7_000_000);
        assert_eq!(ledger.account("player-1").await.unwrap().balance, 3_000_000);
    }

    #[tokio::test]
    async fn test_player_cannot_agent_transfer() {
        let (coordinator, _) = setup().await;
        let err = coordinator
            .agent_transfer("player-2", "player-1", 100_000)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_transfer_over_balance_rejected() {
        let (coordinator, ledger) = setup().await;
        let err = coordinator
            .agent_transfer("agent-1", "player-1", 20_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
        assert_eq!(ledger.account("agent-1").await.unwrap().balance, 10_000_000);
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let (coordinator, _) = setup().await;
        assert!(coordinator
            .agent_transfer("agent-1", "player-1", 0)
            .await
            .is_err());
        assert!(coordinator.deposit("player-1", 0).await.is_err());
        assert!(coordinator.withdraw("player-2", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_deposit_and_withdraw_roundtrip() {
        let (coordinator, ledger) = setup().await;

        coordinator.deposit("player-1", 2_000_000).await.unwrap();
        assert_eq!(ledger.account("player-1").await.unwrap().balance, 2_000_000);

        let record = coordinator.withdraw("player-1", 1_500_000).await.unwrap();
        assert_eq!(record.kind, TransferKind::Withdrawal);
        assert_eq!(record.debited_balance_after, Some(500_000));
        assert_eq!(ledger.account("player-1").await.unwrap().balance, 500_000);
    }

    #[tokio::test]
    async fn test_concurrent_transfers_cannot_both_overdraw() {
        let (coordinator, ledger) = setup().await;

        // Agent holds 10.00; two concurrent 6.00 transfers: exactly one
        // may commit.
        let a = coordinator.agent_transfer("agent-1", "player-1", 6_000_000);
        let b = coordinator.agent_transfer("agent-1", "player-2", 6_000_000);
        let (ra, rb) = tokio::join!(a, b);

        let successes = [ra.is_ok(), rb.is_ok()].iter().filter(|s| **s).count();
        assert_eq!(successes, 1, "exactly one transfer must win the race");
        assert_eq!(ledger.account("agent-1").await.unwrap().balance, 4_000_000);
    }
}
