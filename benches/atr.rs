//! Benchmarks for indicator calculation and ledger updates

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use guardrail_bot::indicator::{average_true_range, relative_strength_index};
use guardrail_bot::ledger::{PositionLedger, Side};
use guardrail_bot::market::Candle;
use guardrail_bot::risk::{RiskLimits, StandardRiskPolicy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn candles(count: usize) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let open_time = start + Duration::hours(i as i64);
            let base = dec!(50000) + Decimal::from(i % 17) * dec!(25);
            Candle {
                open_time,
                open: base,
                high: base + dec!(120),
                low: base - dec!(90),
                close: base + dec!(15),
                volume: dec!(3.5),
                close_time: open_time + Duration::hours(1),
            }
        })
        .collect()
}

fn benchmark_atr(c: &mut Criterion) {
    let candles = candles(100);

    c.bench_function("average_true_range_14", |b| {
        b.iter(|| average_true_range(black_box(&candles), 14))
    });
}

fn benchmark_rsi(c: &mut Criterion) {
    let closes: Vec<Decimal> = candles(100).iter().map(|c| c.close).collect();

    c.bench_function("relative_strength_index_14", |b| {
        b.iter(|| relative_strength_index(black_box(&closes), 14))
    });
}

fn benchmark_round_trip(c: &mut Criterion) {
    c.bench_function("ledger_open_close", |b| {
        b.iter(|| {
            let mut risk = StandardRiskPolicy::new(RiskLimits::default(), dec!(1000));
            let mut ledger = PositionLedger::new("BTCUSDT", dec!(1000));
            ledger
                .open(Side::Buy, dec!(0.001), dec!(50000), &mut risk)
                .unwrap();
            ledger
                .close(Side::Sell, dec!(0.001), dec!(50100), dec!(200), &mut risk)
                .unwrap()
        })
    });
}

criterion_group!(benches, benchmark_atr, benchmark_rsi, benchmark_round_trip);
criterion_main!(benches);
