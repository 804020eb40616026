//! Croupier - Server-Authoritative Wager Settlement Engine
//!
//! Outcome generation, wager settlement, and the balance-ledger contract
//! for a casino-style platform. Every payout-affecting decision runs here,
//! behind the API; the browser client only renders what the engine and its
//! live subscriptions say.
//!
//! The settlement path is atomic per wager: validate, debit, resolve,
//! credit, and record commit together against the ledger or not at all.
//! Outcomes are drawn from a VRF so every settled wager ships with a
//! publicly verifiable proof.

pub mod api;
pub mod config;
pub mod errors;
pub mod games;
pub mod identity;
pub mod ledger;
pub mod metrics;
pub mod payment;
pub mod rng;
pub mod settlement;

pub use config::EngineConfig;
pub use errors::{EngineError, EngineResult};
pub use games::{Amount, BetParams, GameKind, RiskTier, RollDirection};
pub use ledger::{Ledger, WagerRecord, WagerStatus};
pub use rng::VrfOutcomeSource;
pub use settlement::{SettlementCoordinator, SettlementLimits};
