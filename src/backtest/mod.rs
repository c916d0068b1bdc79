//! Backtesting module
//!
//! Replays historical candles and reports an equity curve. The replay holds
//! capital constant per candle, so the curve is a baseline for comparing
//! strategy variants rather than a strategy simulation.

mod analytics;

pub use analytics::{BacktestResult, BacktestSummary, EquityPoint};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::market::{Interval, KlineRange, MarketDataClient, MarketDataError};
use crate::storage::PersistenceStore;

/// Backtest errors
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Failed to load candles: {0}")]
    Data(#[from] MarketDataError),
}

/// Backtest configuration
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub initial_capital: Decimal,
    /// Candle interval, 5m unless overridden
    pub interval: Interval,
}

impl BacktestRequest {
    pub fn new(
        symbol: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        initial_capital: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            initial_capital,
            interval: Interval::FiveMinutes,
        }
    }
}

/// Runs backtests against a market data source
pub struct BacktestRunner {
    market: Arc<dyn MarketDataClient>,
    store: Option<Arc<dyn PersistenceStore>>,
}

impl BacktestRunner {
    pub fn new(market: Arc<dyn MarketDataClient>) -> Self {
        Self {
            market,
            store: None,
        }
    }

    /// Persist results to `store`
    pub fn with_store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Fetch candles for the request range and build the equity curve
    ///
    /// A failed store write is logged; the result is still returned.
    pub async fn run(&self, request: &BacktestRequest) -> Result<BacktestResult, BacktestError> {
        if request.start > request.end {
            return Err(BacktestError::InvalidRange {
                start: request.start,
                end: request.end,
            });
        }

        tracing::info!(
            symbol = %request.symbol,
            start = %request.start,
            end = %request.end,
            interval = %request.interval,
            "Running backtest"
        );

        let candles = self
            .market
            .get_historical_klines(
                &request.symbol,
                request.interval,
                KlineRange::Between {
                    start: request.start,
                    end: request.end,
                },
            )
            .await?;

        let equity_curve: Vec<EquityPoint> = candles
            .iter()
            .map(|candle| EquityPoint {
                timestamp: candle.close_time,
                equity: request.initial_capital,
            })
            .collect();

        let result = BacktestResult {
            id: Uuid::new_v4(),
            symbol: request.symbol.clone(),
            interval: request.interval,
            start: request.start,
            end: request.end,
            initial_capital: request.initial_capital,
            summary: BacktestSummary::from_equity(&equity_curve),
            equity_curve,
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.insert_backtest_result(&result).await {
                tracing::error!(error = %e, id = %result.id, "Failed to store backtest result");
            }
        }

        tracing::info!(
            id = %result.id,
            candles = result.summary.candles,
            "Backtest complete"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::SimulatedMarket;
    use crate::storage::MemoryStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        (start, start + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_equity_curve_matches_candles() {
        let market = Arc::new(SimulatedMarket::with_wave(dec!(100), 0.05, 20));
        let store = Arc::new(MemoryStore::new());
        let runner = BacktestRunner::new(market.clone()).with_store(store.clone());
        let (start, end) = window();

        let result = runner
            .run(&BacktestRequest::new("BTCUSDT", start, end, dec!(1000)))
            .await
            .unwrap();

        let candles = market
            .get_historical_klines(
                "BTCUSDT",
                Interval::FiveMinutes,
                KlineRange::Between { start, end },
            )
            .await
            .unwrap();
        assert_eq!(result.equity_curve.len(), candles.len());
        assert!(result.equity_curve.iter().all(|p| p.equity == dec!(1000)));
        assert_eq!(result.summary.net_pnl, dec!(0));
        assert_eq!(store.backtests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_range() {
        let runner = BacktestRunner::new(Arc::new(SimulatedMarket::new(dec!(100))));
        let (start, end) = window();

        let result = runner
            .run(&BacktestRequest::new("BTCUSDT", end, start, dec!(1000)))
            .await;

        assert!(matches!(result, Err(BacktestError::InvalidRange { .. })));
    }

    #[tokio::test]
    async fn test_data_failure_is_returned() {
        let market = Arc::new(SimulatedMarket::new(dec!(100)));
        market.set_unavailable(true).await;
        let runner = BacktestRunner::new(market);
        let (start, end) = window();

        let result = runner
            .run(&BacktestRequest::new("BTCUSDT", start, end, dec!(1000)))
            .await;

        assert!(matches!(result, Err(BacktestError::Data(_))));
    }

    #[tokio::test]
    async fn test_store_failure_still_returns_result() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let runner =
            BacktestRunner::new(Arc::new(SimulatedMarket::new(dec!(100)))).with_store(store.clone());
        let (start, end) = window();

        let result = runner
            .run(&BacktestRequest::new("BTCUSDT", start, end, dec!(500)))
            .await
            .unwrap();

        assert!(!result.equity_curve.is_empty());
        assert!(store.backtests().await.is_empty());
    }
}
