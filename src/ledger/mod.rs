//! Balance ledger collaborator contract
//!
//! The ledger owns per-account balances, the append-only wager and
//! transfer collections, and open-round documents for multi-step games.
//! Its one hard guarantee: `commit` applies a transaction's operations
//! atomically, failing the whole transaction if any debit would drive a
//! balance negative. Transactions are identified by UUID and replaying a
//! committed id is a no-op, so callers may retry ambiguous failures.

pub mod memory;

use crate::games::{Amount, BetParams, GameKind, OutcomeData};
use crate::rng::DrawProof;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

pub type AccountId = String;

/// Account role, enforced at the API boundary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Agent,
    Support,
    Admin,
}

/// Per-account balance document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: AccountId,
    pub display_name: String,
    pub role: Role,
    pub verified: bool,
    /// Anonymize this account's display name in public feeds
    pub ghost_mode: bool,
    pub balance: Amount,
    pub total_wagered: Amount,
    pub created_at: DateTime<Utc>,
}

/// Wager final status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WagerStatus {
    Won,
    Lost,
}

/// Immutable record of one settled wager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerRecord {
    pub id: String,
    pub account_id: AccountId,
    pub display_name: String,
    pub game: GameKind,
    pub stake: Amount,
    pub params: BetParams,
    pub outcome: OutcomeData,
    pub multiplier_bp: u64,
    pub payout: Amount,
    pub status: WagerStatus,
    pub proof: DrawProof,
    pub created_at: DateTime<Utc>,
}

/// Ledger event class for non-wager balance movements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Agent,
    Deposit,
    Withdrawal,
}

/// Audit record for a transfer-class balance movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: String,
    pub kind: TransferKind,
    pub debited_account: Option<AccountId>,
    pub credited_account: Option<AccountId>,
    pub amount: Amount,
    /// Debited side's balance immediately before/after the commit, filled
    /// in by the ledger at apply time for audit.
    pub debited_balance_before: Option<Amount>,
    pub debited_balance_after: Option<Amount>,
    pub created_at: DateTime<Utc>,
}

/// Open multi-step round document; removed by the settling transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRoundRecord {
    pub wager_id: String,
    pub account_id: AccountId,
    pub game: GameKind,
    pub stake: Amount,
    pub mines: u8,
    pub mine_cells: Vec<u8>,
    pub revealed: Vec<u8>,
    pub proof: DrawProof,
    pub opened_at: DateTime<Utc>,
}

/// One operation inside an atomic ledger transaction
#[derive(Debug, Clone)]
pub enum LedgerOp {
    Debit { account: AccountId, amount: Amount },
    Credit { account: AccountId, amount: Amount },
    AddWagered { account: AccountId, amount: Amount },
    SetVerified { account: AccountId, verified: bool },
    SetGhostMode { account: AccountId, enabled: bool },
    AppendWager(WagerRecord),
    AppendTransfer(TransferRecord),
    OpenRound(OpenRoundRecord),
    CloseRound { account: AccountId },
}

/// Atomic, idempotent unit of ledger work
#[derive(Debug, Clone)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub ops: Vec<LedgerOp>,
}

impl LedgerTransaction {
    pub fn new(ops: Vec<LedgerOp>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ops,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("account {account}: balance {balance_micros} < required {required_micros}")]
    InsufficientFunds {
        account: AccountId,
        balance_micros: u64,
        required_micros: u64,
    },

    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),
}

/// Document-store ledger contract
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn create_account(&self, profile: AccountProfile) -> Result<(), LedgerError>;

    async fn account(&self, id: &str) -> Result<AccountProfile, LedgerError>;

    /// Apply all operations atomically, or none of them. Replaying an
    /// already-committed transaction id succeeds without reapplying.
    async fn commit(&self, tx: LedgerTransaction) -> Result<(), LedgerError>;

    async fn wager(&self, wager_id: &str) -> Result<Option<WagerRecord>, LedgerError>;

    /// Per-account wager history, newest first.
    async fn wagers_for(&self, account: &str, limit: usize)
        -> Result<Vec<WagerRecord>, LedgerError>;

    /// Most recent settled wagers across all accounts, newest first.
    async fn recent_wagers(&self, limit: usize) -> Result<Vec<WagerRecord>, LedgerError>;

    /// Per-account transfer history, newest first.
    async fn transfers_for(
        &self,
        account: &str,
        limit: usize,
    ) -> Result<Vec<TransferRecord>, LedgerError>;

    async fn open_rounds(&self) -> Result<Vec<OpenRoundRecord>, LedgerError>;

    async fn open_round_for(&self, account: &str) -> Result<Option<OpenRoundRecord>, LedgerError>;

    /// Live balance subscription; the UI must treat this as the single
    /// source of truth and never compute balances locally.
    fn subscribe_balance(&self, account: &str) -> Option<watch::Receiver<Amount>>;
}
