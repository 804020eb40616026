//! Dice: threshold roll with a 1% structural edge
//!
//! The player picks a threshold T in [2, 98] and a direction. The house
//! rolls 0..=99; "over" wins on roll >= T (100 - T winning rolls), "under"
//! wins on roll < T (T winning rolls). The multiplier is 99 / win-chance:
//! the 99-vs-100 constant is where the edge lives.

use super::{mul_div, Amount, OutcomeData, RollDirection, RuleOutcome, BP_PER_X};
use crate::errors::{EngineError, EngineResult};
use crate::rng::Draw;
use rand::Rng;

pub const MIN_THRESHOLD: u8 = 2;
pub const MAX_THRESHOLD: u8 = 98;
pub const HOUSE_NUMERATOR: u64 = 99;

pub fn validate(threshold: u8) -> EngineResult<()> {
    if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&threshold) {
        return Err(EngineError::Validation(format!(
            "dice threshold must be in [{}, {}], got {}",
            MIN_THRESHOLD, MAX_THRESHOLD, threshold
        )));
    }
    Ok(())
}

/// Winning rolls out of 100 for the given threshold and direction.
pub fn win_chance(threshold: u8, direction: RollDirection) -> u64 {
    match direction {
        RollDirection::Over => 100 - threshold as u64,
        RollDirection::Under => threshold as u64,
    }
}

pub fn multiplier_bp(threshold: u8, direction: RollDirection) -> u64 {
    HOUSE_NUMERATOR * BP_PER_X / win_chance(threshold, direction)
}

pub fn evaluate(
    stake: Amount,
    threshold: u8,
    direction: RollDirection,
    draw: &Draw,
) -> EngineResult<RuleOutcome> {
    validate(threshold)?;

    let roll: u8 = draw.rng().gen_range(0..100);
    let won = match direction {
        RollDirection::Over => roll >= threshold,
        RollDirection::Under => roll < threshold,
    };

    let chance = win_chance(threshold, direction);
    let payout = if won {
        mul_div(stake, HOUSE_NUMERATOR, chance)
    } else {
        0
    };

    Ok(RuleOutcome {
        won,
        multiplier_bp: multiplier_bp(threshold, direction),
        payout,
        outcome: OutcomeData::Dice { roll },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::MICROS_PER_CREDIT;
    use crate::rng::VrfOutcomeSource;
    use crate::games::GameKind;

    #[test]
    fn test_threshold_bounds() {
        assert!(validate(1).is_err());
        assert!(validate(2).is_ok());
        assert!(validate(98).is_ok());
        assert!(validate(99).is_err());
    }

    #[test]
    fn test_multiplier_formula() {
        // T=50 over: chance 50, multiplier 99/50 = 1.98x
        assert_eq!(multiplier_bp(50, RollDirection::Over), 19_800);
        // T=90 over: chance 10, multiplier 9.9x
        assert_eq!(multiplier_bp(90, RollDirection::Over), 99_000);
        // T=90 under: chance 90, multiplier 1.1x
        assert_eq!(multiplier_bp(90, RollDirection::Under), 11_000);
    }

    #[test]
    fn test_payout_matches_roll() {
        let draw = Draw::from_output([42u8; 32]);
        let stake = 5 * MICROS_PER_CREDIT;
        let result = evaluate(stake, 50, RollDirection::Over, &draw).expect("evaluate failed");

        match result.outcome {
            OutcomeData::Dice { roll } => {
                assert_eq!(result.won, roll >= 50);
            }
            ref other => panic!("unexpected outcome: {other:?}"),
        }
        if result.won {
            // $5.00 x 99/50 = $9.90
            assert_eq!(result.payout, 9_900_000);
        } else {
            assert_eq!(result.payout, 0);
        }
    }

    #[test]
    fn test_expected_value_converges_to_99_percent() {
        let source = VrfOutcomeSource::new_random();
        let stake = MICROS_PER_CREDIT;
        let trials = 20_000u64;

        let mut total_payout: u128 = 0;
        for i in 0..trials {
            let draw = source
                .draw(&format!("ev-{}", i), GameKind::Dice, "acct", "t=50,over")
                .unwrap();
            let result = evaluate(stake, 50, RollDirection::Over, &draw).unwrap();
            total_payout += result.payout as u128;
        }

        let mean = total_payout as f64 / trials as f64;
        let expected = stake as f64 * 0.99;
        let tolerance = stake as f64 * 0.05;
        assert!(
            (mean - expected).abs() < tolerance,
            "mean payout {} too far from expected {}",
            mean,
            expected
        );
    }

    #[test]
    fn test_under_direction_uses_threshold_as_chance() {
        let draw = Draw::from_output([7u8; 32]);
        let result = evaluate(MICROS_PER_CREDIT, 30, RollDirection::Under, &draw).unwrap();
        match result.outcome {
            OutcomeData::Dice { roll } => assert_eq!(result.won, roll < 30),
            ref other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(result.multiplier_bp, 33_000);
    }
}
