//! Game rule modules
//!
//! Each game is a pure function from (stake, parameters, draw) to an
//! outcome and payout. Nothing here touches the ledger; the settlement
//! coordinator owns all balance mutation. Amounts are u64 micro-credits,
//! multipliers are reported in basis points (10_000 = 1.00x), and payouts
//! are computed with exact integer arithmetic.

pub mod dice;
pub mod keno;
pub mod limbo;
pub mod mines;
pub mod wheel;

use crate::errors::{EngineError, EngineResult};
use crate::rng::Draw;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Micro-credits per display credit (the API boundary converts)
pub const MICROS_PER_CREDIT: u64 = 1_000_000;

/// Basis points per 1.00x multiplier
pub const BP_PER_X: u64 = 10_000;

/// Amounts are u64 micro-credits throughout the engine
pub type Amount = u64;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Dice,
    Mines,
    Keno,
    Limbo,
    Wheel,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::Dice => write!(f, "dice"),
            GameKind::Mines => write!(f, "mines"),
            GameKind::Keno => write!(f, "keno"),
            GameKind::Limbo => write!(f, "limbo"),
            GameKind::Wheel => write!(f, "wheel"),
        }
    }
}

/// Risk tier for paytable-driven games (keno, wheel)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// Dice roll direction relative to the chosen threshold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RollDirection {
    Over,
    Under,
}

/// Player-chosen parameters, one variant per game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum BetParams {
    Dice {
        threshold: u8,
        direction: RollDirection,
    },
    Mines {
        mines: u8,
    },
    Keno {
        picks: Vec<u8>,
        tier: RiskTier,
    },
    Limbo {
        target_bp: u64,
    },
    Wheel {
        tier: RiskTier,
    },
}

impl BetParams {
    pub fn game(&self) -> GameKind {
        match self {
            BetParams::Dice { .. } => GameKind::Dice,
            BetParams::Mines { .. } => GameKind::Mines,
            BetParams::Keno { .. } => GameKind::Keno,
            BetParams::Limbo { .. } => GameKind::Limbo,
            BetParams::Wheel { .. } => GameKind::Wheel,
        }
    }

    /// Canonical commitment string bound into the VRF input message.
    pub fn commitment(&self, stake: Amount) -> String {
        // serde_json on these variants cannot fail; fall back to the game
        // name so a commitment is always present.
        let params = serde_json::to_string(self).unwrap_or_else(|_| self.game().to_string());
        format!("stake={};params={}", stake, params)
    }
}

/// Drawn outcome descriptor persisted with the wager record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum OutcomeData {
    Dice {
        roll: u8,
    },
    Mines {
        mine_cells: Vec<u8>,
        revealed: Vec<u8>,
        cashed_out: bool,
    },
    Keno {
        drawn: Vec<u8>,
        matches: u8,
    },
    Limbo {
        generated_bp: u64,
    },
    Wheel {
        segment_index: usize,
    },
}

/// Result of evaluating one wager's rules against a draw
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub won: bool,
    pub multiplier_bp: u64,
    pub payout: Amount,
    pub outcome: OutcomeData,
}

/// Validate player-chosen parameters before any ledger mutation.
pub fn validate_params(params: &BetParams) -> EngineResult<()> {
    match params {
        BetParams::Dice {
            threshold,
            direction: _,
        } => dice::validate(*threshold),
        BetParams::Mines { mines } => mines::validate(*mines),
        BetParams::Keno { picks, tier: _ } => keno::validate(picks),
        BetParams::Limbo { target_bp } => limbo::validate(*target_bp),
        BetParams::Wheel { tier: _ } => Ok(()),
    }
}

/// Evaluate a single-shot wager. Mines rounds are multi-step and settle
/// through the round flow instead.
pub fn evaluate(stake: Amount, params: &BetParams, draw: &Draw) -> EngineResult<RuleOutcome> {
    validate_params(params)?;
    match params {
        BetParams::Dice {
            threshold,
            direction,
        } => dice::evaluate(stake, *threshold, *direction, draw),
        BetParams::Keno { picks, tier } => keno::evaluate(stake, picks, *tier, draw),
        BetParams::Limbo { target_bp } => limbo::evaluate(stake, *target_bp, draw),
        BetParams::Wheel { tier } => wheel::evaluate(stake, *tier, draw),
        BetParams::Mines { .. } => Err(EngineError::Validation(
            "mines wagers settle through the round flow".to_string(),
        )),
    }
}

/// Exact `amount * num / den` with a u128 intermediate, truncating.
pub(crate) fn mul_div(amount: Amount, num: u64, den: u64) -> Amount {
    debug_assert!(den > 0);
    ((amount as u128 * num as u128) / den as u128) as Amount
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_exact() {
        // $5.00 stake at 99/50 pays $9.90 exactly
        assert_eq!(mul_div(5 * MICROS_PER_CREDIT, 99, 50), 9_900_000);
    }

    #[test]
    fn test_mul_div_truncates_toward_zero() {
        assert_eq!(mul_div(10, 1, 3), 3);
    }

    #[test]
    fn test_commitment_binds_stake_and_params() {
        let params = BetParams::Dice {
            threshold: 50,
            direction: RollDirection::Over,
        };
        let a = params.commitment(1_000_000);
        let b = params.commitment(2_000_000);
        assert_ne!(a, b);
        assert!(a.contains("stake=1000000"));
    }

    #[test]
    fn test_evaluate_rejects_mines() {
        let draw = Draw::from_output([1u8; 32]);
        let err = evaluate(1_000_000, &BetParams::Mines { mines: 5 }, &draw).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
