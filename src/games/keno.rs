//! Keno: fixed-odds paytable on a 10-of-40 pick
//!
//! The player selects exactly 10 distinct numbers from 1..=40; the house
//! draws 10 without replacement. Payout is a paytable lookup keyed by risk
//! tier and match count. All tiers pay zero at 0 and 1 matches.

use super::{mul_div, Amount, OutcomeData, RiskTier, RuleOutcome, BP_PER_X};
use crate::errors::{EngineError, EngineResult};
use crate::rng::Draw;

pub const BOARD_SIZE: u8 = 40;
pub const PICK_COUNT: usize = 10;
pub const DRAW_COUNT: usize = 10;

/// Paytables in basis points, indexed by match count 0..=10.
///
/// Lower tiers pay earlier and flatter; higher tiers trade frequency for
/// magnitude. The 0- and 1-match floor is zero in every tier.
const PAYTABLE_LOW: [u64; 11] = [
    0, 0, 5_000, 15_000, 20_000, 30_000, 60_000, 120_000, 400_000, 1_000_000, 2_500_000,
];
const PAYTABLE_MEDIUM: [u64; 11] = [
    0, 0, 0, 10_000, 25_000, 50_000, 150_000, 500_000, 2_000_000, 5_000_000, 10_000_000,
];
const PAYTABLE_HIGH: [u64; 11] = [
    0, 0, 0, 0, 20_000, 60_000, 300_000, 1_200_000, 5_000_000, 20_000_000, 100_000_000,
];

pub fn paytable(tier: RiskTier) -> &'static [u64; 11] {
    match tier {
        RiskTier::Low => &PAYTABLE_LOW,
        RiskTier::Medium => &PAYTABLE_MEDIUM,
        RiskTier::High => &PAYTABLE_HIGH,
    }
}

pub fn validate(picks: &[u8]) -> EngineResult<()> {
    if picks.len() != PICK_COUNT {
        return Err(EngineError::Validation(format!(
            "keno requires exactly {} picks, got {}",
            PICK_COUNT,
            picks.len()
        )));
    }
    let mut seen = [false; BOARD_SIZE as usize + 1];
    for &n in picks {
        if n == 0 || n > BOARD_SIZE {
            return Err(EngineError::Validation(format!(
                "keno pick {} outside 1..={}",
                n, BOARD_SIZE
            )));
        }
        if seen[n as usize] {
            return Err(EngineError::Validation(format!("duplicate keno pick {}", n)));
        }
        seen[n as usize] = true;
    }
    Ok(())
}

/// House draw: 10 distinct numbers from 1..=40, derived from the VRF output.
pub fn draw_numbers(draw: &Draw) -> Vec<u8> {
    let mut rng = draw.rng();
    let mut numbers: Vec<u8> = rand::seq::index::sample(&mut rng, BOARD_SIZE as usize, DRAW_COUNT)
        .into_iter()
        .map(|i| i as u8 + 1)
        .collect();
    numbers.sort_unstable();
    numbers
}

pub fn evaluate(
    stake: Amount,
    picks: &[u8],
    tier: RiskTier,
    draw: &Draw,
) -> EngineResult<RuleOutcome> {
    validate(picks)?;

    let drawn = draw_numbers(draw);
    let matches = picks.iter().filter(|p| drawn.contains(p)).count() as u8;

    let bp = paytable(tier)[matches as usize];
    let payout = mul_div(stake, bp, BP_PER_X);

    Ok(RuleOutcome {
        won: bp > 0,
        multiplier_bp: bp,
        payout,
        outcome: OutcomeData::Keno { drawn, matches },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::MICROS_PER_CREDIT;

    fn picks() -> Vec<u8> {
        (1..=10).collect()
    }

    #[test]
    fn test_validation() {
        assert!(validate(&picks()).is_ok());
        assert!(validate(&[1, 2, 3]).is_err(), "too few picks");
        assert!(
            validate(&[0, 2, 3, 4, 5, 6, 7, 8, 9, 10]).is_err(),
            "zero is off the board"
        );
        assert!(
            validate(&[1, 1, 3, 4, 5, 6, 7, 8, 9, 10]).is_err(),
            "duplicates rejected"
        );
        assert!(
            validate(&[41, 2, 3, 4, 5, 6, 7, 8, 9, 10]).is_err(),
            "41 is off the board"
        );
    }

    #[test]
    fn test_zero_payout_floor() {
        for tier in [RiskTier::Low, RiskTier::Medium, RiskTier::High] {
            let table = paytable(tier);
            assert_eq!(table[0], 0);
            assert_eq!(table[1], 0);
        }
    }

    #[test]
    fn test_draw_is_ten_distinct_on_board() {
        let drawn = draw_numbers(&Draw::from_output([11u8; 32]));
        assert_eq!(drawn.len(), DRAW_COUNT);
        assert!(drawn.iter().all(|n| (1..=BOARD_SIZE).contains(n)));
        assert!(drawn.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_match_count_in_range_and_payout_from_table() {
        let stake = 3 * MICROS_PER_CREDIT;
        for seed in 0..50u8 {
            let draw = Draw::from_output([seed; 32]);
            let result = evaluate(stake, &picks(), RiskTier::Medium, &draw).unwrap();
            match result.outcome {
                OutcomeData::Keno { matches, .. } => {
                    assert!(matches <= 10);
                    let bp = paytable(RiskTier::Medium)[matches as usize];
                    assert_eq!(result.multiplier_bp, bp);
                    assert_eq!(result.payout, mul_div(stake, bp, BP_PER_X));
                    assert_eq!(result.won, bp > 0);
                }
                ref other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }
}
