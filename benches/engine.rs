//! Hot-path benchmarks: outcome draws and rule evaluation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use croupier::games::{self, BetParams, RiskTier, RollDirection};
use croupier::rng::{Draw, VrfOutcomeSource};
use croupier::GameKind;

fn bench_vrf_draw(c: &mut Criterion) {
    let source = VrfOutcomeSource::new_random();
    let mut i = 0u64;
    c.bench_function("vrf_draw", |b| {
        b.iter(|| {
            i += 1;
            let draw = source
                .draw(&format!("wager-{}", i), GameKind::Dice, "acct", "t=50,over")
                .unwrap();
            black_box(draw)
        })
    });
}

fn bench_rule_evaluation(c: &mut Criterion) {
    let draw = Draw::from_output([42u8; 32]);
    let stake = 1_000_000;

    let cases: Vec<(&str, BetParams)> = vec![
        (
            "dice",
            BetParams::Dice {
                threshold: 50,
                direction: RollDirection::Over,
            },
        ),
        (
            "keno",
            BetParams::Keno {
                picks: (1..=10).collect(),
                tier: RiskTier::Medium,
            },
        ),
        ("limbo", BetParams::Limbo { target_bp: 20_000 }),
        ("wheel", BetParams::Wheel { tier: RiskTier::High }),
    ];

    for (name, params) in cases {
        c.bench_function(&format!("evaluate_{}", name), |b| {
            b.iter(|| black_box(games::evaluate(stake, &params, &draw).unwrap()))
        });
    }
}

fn bench_mines_placement(c: &mut Criterion) {
    let draw = Draw::from_output([7u8; 32]);
    c.bench_function("mines_placement", |b| {
        b.iter(|| black_box(games::mines::place_mines(&draw, 10).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_vrf_draw,
    bench_rule_evaluation,
    bench_mines_placement
);
criterion_main!(benches);
