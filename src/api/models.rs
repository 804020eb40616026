//! API request and response models
//!
//! The wire speaks decimal credits; everything behind the boundary is
//! integer micro-credits. Conversion lives here and nowhere else.

use crate::games::{
    Amount, GameKind, OutcomeData, RiskTier, RollDirection, BP_PER_X, MICROS_PER_CREDIT,
};
use crate::identity::SessionState;
use crate::ledger::{Role, TransferKind, TransferRecord, WagerRecord, WagerStatus};
use crate::payment::Invoice;
use crate::rng::DrawProof;
use crate::settlement::feed::FeedEntry;
use crate::settlement::rounds::MinesRoundView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parse a decimal credit amount from the wire into micro-credits.
pub fn credits_to_micros(credits: f64) -> Result<Amount, String> {
    if !credits.is_finite() || credits <= 0.0 {
        return Err(format!("amount must be a positive number, got {}", credits));
    }
    let micros = credits * MICROS_PER_CREDIT as f64;
    if micros > u64::MAX as f64 / 2.0 {
        return Err(format!("amount {} out of range", credits));
    }
    Ok(micros.round() as Amount)
}

pub fn micros_to_credits(micros: Amount) -> f64 {
    micros as f64 / MICROS_PER_CREDIT as f64
}

pub fn bp_to_multiplier(bp: u64) -> f64 {
    bp as f64 / BP_PER_X as f64
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Engine status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub engine_id: String,
    pub network: String,
    pub version: String,
    pub uptime_secs: u64,
    pub games: Vec<GameKind>,
    pub vrf_public_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub account_id: String,
    pub token: String,
    pub role: Role,
    pub state: SessionState,
    pub balance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account_id: String,
    pub balance: f64,
    pub total_wagered: f64,
}

/// Single-shot bet requests, one per game
#[derive(Debug, Clone, Deserialize)]
pub struct DiceBetRequest {
    pub stake: f64,
    pub threshold: u8,
    pub direction: RollDirection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KenoBetRequest {
    pub stake: f64,
    pub picks: Vec<u8>,
    pub tier: RiskTier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimboBetRequest {
    pub stake: f64,
    /// Target multiplier, e.g. 2.5 for 2.50x
    pub target: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WheelBetRequest {
    pub stake: f64,
    pub tier: RiskTier,
}

/// Settled wager, as returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerResponse {
    pub wager_id: String,
    pub game: GameKind,
    pub stake: f64,
    pub multiplier: f64,
    pub payout: f64,
    pub status: WagerStatus,
    pub outcome: OutcomeData,
    pub proof: DrawProof,
    /// Authoritative balance after settlement
    pub balance: f64,
    pub settled_at: DateTime<Utc>,
}

impl WagerResponse {
    pub fn from_record(record: WagerRecord, balance: Amount) -> Self {
        Self {
            wager_id: record.id,
            game: record.game,
            stake: micros_to_credits(record.stake),
            multiplier: bp_to_multiplier(record.multiplier_bp),
            payout: micros_to_credits(record.payout),
            status: record.status,
            outcome: record.outcome,
            proof: record.proof,
            balance: micros_to_credits(balance),
            settled_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinesStartRequest {
    pub stake: f64,
    pub mines: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinesRoundResponse {
    pub wager_id: String,
    pub stake: f64,
    pub mines: u8,
    pub revealed: Vec<u8>,
    pub multiplier: f64,
    pub can_reveal: bool,
}

impl MinesRoundResponse {
    pub fn from_view(view: MinesRoundView) -> Self {
        Self {
            wager_id: view.wager_id,
            stake: micros_to_credits(view.stake),
            mines: view.mines,
            revealed: view.revealed,
            multiplier: bp_to_multiplier(view.multiplier_bp),
            can_reveal: view.can_reveal,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinesRevealRequest {
    pub cell: u8,
}

/// Outcome of one reveal: either the round continues or it settled
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum MinesRevealResponse {
    Safe {
        multiplier: f64,
        revealed: Vec<u8>,
        can_reveal: bool,
    },
    Mine {
        wager: Box<WagerResponse>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub recipient_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub transfer_id: String,
    pub kind: TransferKind,
    pub debited_account: Option<String>,
    pub credited_account: Option<String>,
    pub amount: f64,
    pub debited_balance_before: Option<f64>,
    pub debited_balance_after: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl TransferResponse {
    pub fn from_record(record: TransferRecord) -> Self {
        Self {
            transfer_id: record.id,
            kind: record.kind,
            debited_account: record.debited_account,
            credited_account: record.credited_account,
            amount: micros_to_credits(record.amount),
            debited_balance_before: record.debited_balance_before.map(micros_to_credits),
            debited_balance_after: record.debited_balance_after.map(micros_to_credits),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositInvoiceRequest {
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub invoice_id: String,
    pub currency: String,
    pub pay_url: String,
    pub created_at: DateTime<Utc>,
}

impl InvoiceResponse {
    pub fn from_invoice(invoice: Invoice) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            currency: invoice.currency,
            pay_url: invoice.pay_url,
            created_at: invoice.created_at,
        }
    }
}

/// Payment provider confirmation callback payload
#[derive(Debug, Clone, Deserialize)]
pub struct DepositWebhookRequest {
    pub invoice_id: String,
    pub account_id: String,
    pub amount: f64,
    pub currency: String,
}

/// History query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub entries: Vec<FeedEntryResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntryResponse {
    pub wager_id: String,
    pub display_name: String,
    pub game: GameKind,
    pub stake: f64,
    pub multiplier: f64,
    pub payout: f64,
    pub status: WagerStatus,
    pub settled_at: DateTime<Utc>,
}

impl FeedEntryResponse {
    pub fn from_entry(entry: FeedEntry) -> Self {
        Self {
            wager_id: entry.wager_id,
            display_name: entry.display_name,
            game: entry.game,
            stake: micros_to_credits(entry.stake),
            multiplier: bp_to_multiplier(entry.multiplier_bp),
            payout: micros_to_credits(entry.payout),
            status: entry.status,
            settled_at: entry.settled_at,
        }
    }
}

/// Request to verify a VRF proof bundle
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyProofRequest {
    pub vrf_output: String,
    pub vrf_proof: String,
    pub public_key: String,
    pub input_message: String,
}

/// Verification result for proofs and persisted wagers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}
