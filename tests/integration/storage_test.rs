//! Persistence through the engine

use guardrail_bot::config::Config;
use guardrail_bot::engine::TradingEngine;
use guardrail_bot::ledger::{OrderKind, Side};
use guardrail_bot::market::SimulatedMarket;
use guardrail_bot::storage::{read_equity_curve, JsonlStore, LogLevel};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_engine_writes_jsonl_records() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonlStore::open(dir.path()).await.unwrap());
    let market = Arc::new(SimulatedMarket::new(dec!(200)));
    let engine = TradingEngine::new(&Config::default(), market.clone(), Some(store.clone()));

    engine.open(Side::Sell, dec!(0.5)).await.unwrap();
    market.set_price(dec!(190)).await;
    engine.close(Side::Buy, dec!(0.5)).await.unwrap();

    let orders = store.orders().await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].kind, OrderKind::Open);
    assert_eq!(orders[1].kind, OrderKind::Close);
    assert_eq!(orders[1].pnl, dec!(5));

    let positions = store.positions().await.unwrap();
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].size, dec!(-0.5));
    assert_eq!(positions[1].size, dec!(0));

    let logs = store.logs().await.unwrap();
    assert!(logs
        .iter()
        .all(|e| e.level == LogLevel::Info && e.symbol == "BTCUSDT"));
    assert_eq!(logs.len(), 2);
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = Arc::new(JsonlStore::open(dir.path()).await.unwrap());
        let engine = TradingEngine::new(
            &Config::default(),
            Arc::new(SimulatedMarket::new(dec!(100))),
            Some(store),
        );
        engine.start().await;
        engine.stop().await;
    }

    let reopened = JsonlStore::open(dir.path()).await.unwrap();
    let messages: Vec<String> = reopened
        .logs()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert_eq!(messages, vec!["Bot started", "Bot stopped"]);
}

#[tokio::test]
async fn test_backtest_equity_parquet_written() {
    use guardrail_bot::backtest::{BacktestRequest, BacktestRunner};
    use guardrail_bot::cli::parse_datetime;

    let dir = tempdir().unwrap();
    let store = Arc::new(JsonlStore::open(dir.path()).await.unwrap());
    let runner =
        BacktestRunner::new(Arc::new(SimulatedMarket::new(dec!(100)))).with_store(store.clone());

    let result = runner
        .run(&BacktestRequest::new(
            "BTCUSDT",
            parse_datetime("2024-01-01").unwrap(),
            parse_datetime("2024-01-01 02:00:00").unwrap(),
            dec!(1000),
        ))
        .await
        .unwrap();

    let stored = store.backtests().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, result.id);

    let curve = read_equity_curve(&store.equity_path(&result)).unwrap();
    assert_eq!(curve, result.equity_curve);
}
