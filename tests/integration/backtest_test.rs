//! Backtest runner

use chrono::{Duration, TimeZone, Utc};
use guardrail_bot::backtest::{BacktestError, BacktestRequest, BacktestRunner};
use guardrail_bot::market::{Candle, SimulatedMarket};
use guardrail_bot::storage::MemoryStore;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn candles(count: usize) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let open_time = start + Duration::minutes(5 * i as i64);
            Candle {
                open_time,
                open: dec!(100),
                high: dec!(101),
                low: dec!(99),
                close: dec!(100.5),
                volume: dec!(10),
                close_time: open_time + Duration::minutes(5),
            }
        })
        .collect()
}

#[tokio::test]
async fn test_equity_curve_has_one_point_per_candle() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    market.set_candles(candles(12)).await;
    let store = Arc::new(MemoryStore::new());
    let runner = BacktestRunner::new(market).with_store(store.clone());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let result = runner
        .run(&BacktestRequest::new(
            "ETHUSDT",
            start,
            start + Duration::hours(1),
            dec!(750),
        ))
        .await
        .unwrap();

    assert_eq!(result.equity_curve.len(), 12);
    assert_eq!(result.summary.candles, 12);
    assert_eq!(result.summary.start_equity, dec!(750));
    assert_eq!(result.summary.end_equity, dec!(750));
    assert_eq!(result.summary.max_drawdown, dec!(0));
    assert_eq!(
        result.equity_curve[0].timestamp,
        start + Duration::minutes(5)
    );

    let stored = store.backtests().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].symbol, "ETHUSDT");
}

#[tokio::test]
async fn test_empty_range_yields_empty_curve() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    market.set_candles(vec![]).await;
    let runner = BacktestRunner::new(market);
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let result = runner
        .run(&BacktestRequest::new("BTCUSDT", start, start, dec!(1000)))
        .await
        .unwrap();

    assert!(result.equity_curve.is_empty());
    assert_eq!(result.summary.candles, 0);
}

#[tokio::test]
async fn test_unavailable_market_is_an_error() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    market.set_unavailable(true).await;
    let runner = BacktestRunner::new(market);
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let err = runner
        .run(&BacktestRequest::new(
            "BTCUSDT",
            start,
            start + Duration::hours(1),
            dec!(1000),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, BacktestError::Data(_)));
}
