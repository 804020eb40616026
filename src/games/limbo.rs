//! Limbo: target multiplier against a generated result
//!
//! The player names a target above 1.00x. The house generates a result on
//! an inverse distribution calibrated so P(result >= m) = 0.99 / m; the
//! wager wins iff the result reaches the target, and pays stake x target
//! exactly, never stake x result.

use super::{mul_div, Amount, OutcomeData, RuleOutcome, BP_PER_X};
use crate::errors::{EngineError, EngineResult};
use crate::rng::Draw;
use rand::Rng;

/// Targets are strictly above 1.00x
pub const MIN_TARGET_BP: u64 = BP_PER_X + 1;
/// 10,000x cap keeps payouts inside u64 micro-credit range
pub const MAX_TARGET_BP: u64 = 100_000_000;

const UNIT_SCALE: u64 = 1_000_000;

pub fn validate(target_bp: u64) -> EngineResult<()> {
    if !(MIN_TARGET_BP..=MAX_TARGET_BP).contains(&target_bp) {
        return Err(EngineError::Validation(format!(
            "limbo target must be above 1.00x and at most {:.2}x, got {} bp",
            MAX_TARGET_BP as f64 / BP_PER_X as f64,
            target_bp
        )));
    }
    Ok(())
}

/// Generated result in basis points, floored at 1.00x.
pub fn generate_bp(draw: &Draw) -> u64 {
    let u: u64 = draw.rng().gen_range(1..=UNIT_SCALE);
    // 0.99 * UNIT_SCALE * BP_PER_X / u, clamped to the 1.00x floor
    let raw = 9_900_000_000u64 / u;
    raw.max(BP_PER_X)
}

pub fn evaluate(stake: Amount, target_bp: u64, draw: &Draw) -> EngineResult<RuleOutcome> {
    validate(target_bp)?;

    let generated_bp = generate_bp(draw);
    let won = generated_bp >= target_bp;
    let payout = if won {
        mul_div(stake, target_bp, BP_PER_X)
    } else {
        0
    };

    Ok(RuleOutcome {
        won,
        multiplier_bp: target_bp,
        payout,
        outcome: OutcomeData::Limbo { generated_bp },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::{GameKind, MICROS_PER_CREDIT};
    use crate::rng::VrfOutcomeSource;

    #[test]
    fn test_target_bounds() {
        assert!(validate(BP_PER_X).is_err(), "1.00x is not a valid target");
        assert!(validate(BP_PER_X + 1).is_ok());
        assert!(validate(MAX_TARGET_BP).is_ok());
        assert!(validate(MAX_TARGET_BP + 1).is_err());
    }

    #[test]
    fn test_generated_never_below_one() {
        for seed in 0..100u8 {
            assert!(generate_bp(&Draw::from_output([seed; 32])) >= BP_PER_X);
        }
    }

    #[test]
    fn test_payout_is_stake_times_target_exactly() {
        // Find a draw that wins a 1.5x target, then check the payout ignores
        // how far the generated value overshot.
        let target = 15_000;
        let stake = 2 * MICROS_PER_CREDIT;
        for seed in 0..200u8 {
            let draw = Draw::from_output([seed; 32]);
            let result = evaluate(stake, target, &draw).unwrap();
            match result.outcome {
                OutcomeData::Limbo { generated_bp } => {
                    assert_eq!(result.won, generated_bp >= target);
                    if result.won {
                        assert_eq!(result.payout, 3_000_000);
                        return;
                    }
                }
                ref other => panic!("unexpected outcome: {other:?}"),
            }
        }
        panic!("no winning draw found in 200 seeds for a 1.5x target");
    }

    #[test]
    fn test_win_rate_tracks_target() {
        // P(win at 2.00x) = 0.99 / 2 = 0.495
        let source = VrfOutcomeSource::new_random();
        let trials = 20_000;
        let mut wins = 0u32;
        for i in 0..trials {
            let draw = source
                .draw(&format!("limbo-{}", i), GameKind::Limbo, "acct", "t=20000")
                .unwrap();
            if evaluate(MICROS_PER_CREDIT, 20_000, &draw).unwrap().won {
                wins += 1;
            }
        }
        let rate = wins as f64 / trials as f64;
        assert!(
            (rate - 0.495).abs() < 0.02,
            "win rate {} too far from 0.495",
            rate
        );
    }
}
