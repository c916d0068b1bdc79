//! Average True Range
//!
//! TR = max(high - low, |high - prev_close|, |low - prev_close|) for every
//! consecutive pair of candles. ATR is the plain mean of the last `period`
//! TR values, so `period + 1` candles are needed.
//!
//! Zero is the "no volatility signal" sentinel: callers treat it as ATR
//! unavailable, not as a perfectly calm market.

use crate::market::{Candle, Interval, KlineRange, MarketDataClient};
use rust_decimal::Decimal;

/// Default ATR look-back
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// True Range for each consecutive pair, so `candles.len() - 1` values
pub fn true_range(candles: &[Candle]) -> Vec<Decimal> {
    candles
        .windows(2)
        .map(|pair| {
            let prev_close = pair[0].close;
            let bar = &pair[1];
            (bar.high - bar.low)
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect()
}

/// ATR over the most recent `period` true ranges, or zero if there is not
/// enough data
pub fn average_true_range(candles: &[Candle], period: usize) -> Decimal {
    if period == 0 || candles.len() < period + 1 {
        return Decimal::ZERO;
    }

    let ranges = true_range(candles);
    let recent = &ranges[ranges.len() - period..];
    recent.iter().copied().sum::<Decimal>() / Decimal::from(period as u64)
}

/// Fetches fresh candles and turns them into an ATR value
#[derive(Debug, Clone)]
pub struct VolatilityEstimator {
    /// Bar interval the ATR is computed on
    pub interval: Interval,
    /// Look-back in bars
    pub period: usize,
}

impl VolatilityEstimator {
    /// Create an estimator for the given interval and period
    pub fn new(interval: Interval, period: usize) -> Self {
        Self { interval, period }
    }

    /// Current ATR for `symbol`
    ///
    /// Retrieval failures are logged and reported as zero.
    pub async fn estimate(&self, market: &dyn MarketDataClient, symbol: &str) -> Decimal {
        let range = KlineRange::Recent(self.period + 1);
        match market
            .get_historical_klines(symbol, self.interval, range)
            .await
        {
            Ok(candles) => {
                let atr = average_true_range(&candles, self.period);
                if atr.is_zero() {
                    tracing::debug!(
                        symbol,
                        candles = candles.len(),
                        period = self.period,
                        "ATR unavailable"
                    );
                }
                atr
            }
            Err(e) => {
                tracing::error!(error = %e, symbol, "Failed to calculate ATR");
                Decimal::ZERO
            }
        }
    }
}

impl Default for VolatilityEstimator {
    fn default() -> Self {
        Self::new(Interval::OneHour, DEFAULT_ATR_PERIOD)
    }
}
