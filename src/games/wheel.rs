//! Wheel: weighted discrete segments per risk tier
//!
//! Each tier is a fixed list of (multiplier, weight) segments. The draw
//! selects one segment weighted by its configured weight; zero is a valid
//! segment and carries the largest weight in every tier.

use super::{mul_div, Amount, OutcomeData, RiskTier, RuleOutcome, BP_PER_X};
use crate::errors::{EngineError, EngineResult};
use crate::rng::Draw;
use rand::distributions::{Distribution, WeightedIndex};

/// One wheel segment: payout multiplier in basis points and draw weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub multiplier_bp: u64,
    pub weight: u32,
}

const fn seg(multiplier_bp: u64, weight: u32) -> Segment {
    Segment {
        multiplier_bp,
        weight,
    }
}

const SEGMENTS_LOW: [Segment; 4] = [
    seg(0, 8),
    seg(14_000, 6),
    seg(16_000, 4),
    seg(25_000, 2),
];
const SEGMENTS_MEDIUM: [Segment; 5] = [
    seg(0, 11),
    seg(15_000, 4),
    seg(20_000, 2),
    seg(30_000, 2),
    seg(36_000, 1),
];
const SEGMENTS_HIGH: [Segment; 4] = [
    seg(0, 22),
    seg(40_000, 1),
    seg(80_000, 1),
    seg(120_000, 1),
];

pub fn segments(tier: RiskTier) -> &'static [Segment] {
    match tier {
        RiskTier::Low => &SEGMENTS_LOW,
        RiskTier::Medium => &SEGMENTS_MEDIUM,
        RiskTier::High => &SEGMENTS_HIGH,
    }
}

pub fn evaluate(stake: Amount, tier: RiskTier, draw: &Draw) -> EngineResult<RuleOutcome> {
    let table = segments(tier);
    let dist = WeightedIndex::new(table.iter().map(|s| s.weight))
        .map_err(|e| EngineError::OutcomeSource(format!("bad wheel weights: {}", e)))?;

    let segment_index = dist.sample(&mut draw.rng());
    let segment = table[segment_index];
    let payout = mul_div(stake, segment.multiplier_bp, BP_PER_X);

    Ok(RuleOutcome {
        won: segment.multiplier_bp > 0,
        multiplier_bp: segment.multiplier_bp,
        payout,
        outcome: OutcomeData::Wheel { segment_index },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::{GameKind, MICROS_PER_CREDIT, RiskTier};
    use crate::rng::VrfOutcomeSource;

    #[test]
    fn test_zero_is_most_likely_segment_in_every_tier() {
        for tier in [RiskTier::Low, RiskTier::Medium, RiskTier::High] {
            let table = segments(tier);
            let zero = table
                .iter()
                .find(|s| s.multiplier_bp == 0)
                .expect("every tier has a zero segment");
            for s in table.iter().filter(|s| s.multiplier_bp != 0) {
                assert!(zero.weight > s.weight, "zero must carry the largest weight");
            }
        }
    }

    #[test]
    fn test_payout_is_stake_times_segment_value() {
        let stake = 4 * MICROS_PER_CREDIT;
        let draw = Draw::from_output([23u8; 32]);
        let result = evaluate(stake, RiskTier::Medium, &draw).unwrap();
        match result.outcome {
            OutcomeData::Wheel { segment_index } => {
                let segment = segments(RiskTier::Medium)[segment_index];
                assert_eq!(result.multiplier_bp, segment.multiplier_bp);
                assert_eq!(result.payout, mul_div(stake, segment.multiplier_bp, BP_PER_X));
            }
            ref other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_segment_frequency_converges_to_weights() {
        let source = VrfOutcomeSource::new_random();
        let table = segments(RiskTier::Low);
        let total_weight: u32 = table.iter().map(|s| s.weight).sum();
        let trials = 10_000;

        let mut counts = vec![0u32; table.len()];
        for i in 0..trials {
            let draw = source
                .draw(&format!("wheel-{}", i), GameKind::Wheel, "acct", "tier=low")
                .unwrap();
            let result = evaluate(MICROS_PER_CREDIT, RiskTier::Low, &draw).unwrap();
            match result.outcome {
                OutcomeData::Wheel { segment_index } => counts[segment_index] += 1,
                ref other => panic!("unexpected outcome: {other:?}"),
            }
        }

        for (i, segment) in table.iter().enumerate() {
            let expected = segment.weight as f64 / total_weight as f64;
            let observed = counts[i] as f64 / trials as f64;
            assert!(
                (observed - expected).abs() < 0.03,
                "segment {} frequency {} too far from weight share {}",
                i,
                observed,
                expected
            );
        }
    }
}
