//! Engine error taxonomy
//!
//! Four families of failure matter to callers: validation (no mutation
//! attempted), insufficient funds (no mutation attempted), transient ledger
//! failures (retry or reconcile before reporting), and settlement
//! inconsistencies (a committed debit with no matching record).

use crate::ledger::LedgerError;

/// Root error type for all settlement-engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient funds: balance {balance_micros} < required {required_micros}")]
    InsufficientFunds {
        balance_micros: u64,
        required_micros: u64,
    },

    #[error("a wager is already in flight for this account")]
    WagerInFlight,

    #[error("no active round for this account")]
    NoActiveRound,

    #[error("round settlement already in progress")]
    RoundSettling,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("wager not found: {0}")]
    WagerNotFound(String),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("settlement inconsistency: {0}")]
    Inconsistency(String),

    #[error("outcome source failure: {0}")]
    OutcomeSource(String),
}

impl EngineError {
    /// Transient errors are safe to retry with the same ledger transaction id.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::LedgerUnavailable(_))
    }
}

impl From<LedgerError> for EngineError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientFunds {
                balance_micros,
                required_micros,
                ..
            } => EngineError::InsufficientFunds {
                balance_micros,
                required_micros,
            },
            LedgerError::UnknownAccount(id) => EngineError::AccountNotFound(id),
            LedgerError::Unavailable(msg) => EngineError::LedgerUnavailable(msg),
            LedgerError::Rejected(msg) => EngineError::Inconsistency(msg),
        }
    }
}

/// Convenience alias used throughout the engine
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(EngineError::LedgerUnavailable("timeout".to_string()).is_transient());
        assert!(!EngineError::Validation("bad stake".to_string()).is_transient());
        assert!(!EngineError::WagerInFlight.is_transient());
    }

    #[test]
    fn test_ledger_error_conversion() {
        let e: EngineError = LedgerError::UnknownAccount("acct-1".to_string()).into();
        match e {
            EngineError::AccountNotFound(id) => assert_eq!(id, "acct-1"),
            other => panic!("unexpected conversion: {other:?}"),
        }
    }
}
