//! Market data module
//!
//! Price, RSI and candle retrieval for the traded instrument. The engine only
//! talks to [`MarketDataClient`]; Binance REST and a simulated market are the
//! two shipped implementations.

mod binance;
mod simulated;

pub use binance::{BinanceClient, BinanceConfig, BINANCE_API_URL};
pub use simulated::SimulatedMarket;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Bar close time
    pub close_time: DateTime<Utc>,
}

/// Kline interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    /// Exchange notation, e.g. `"5m"`
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
        }
    }

    /// Length of one bar
    pub fn duration(&self) -> Duration {
        match self {
            Interval::OneMinute => Duration::minutes(1),
            Interval::FiveMinutes => Duration::minutes(5),
            Interval::FifteenMinutes => Duration::minutes(15),
            Interval::OneHour => Duration::hours(1),
            Interval::FourHours => Duration::hours(4),
            Interval::OneDay => Duration::days(1),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::OneMinute),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "1h" => Ok(Interval::OneHour),
            "4h" => Ok(Interval::FourHours),
            "1d" => Ok(Interval::OneDay),
            other => Err(MarketDataError::Parse(format!("unknown interval: {other}"))),
        }
    }
}

/// Which candles to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineRange {
    /// The `n` most recent bars
    Recent(usize),
    /// Every bar opening within `[start, end]`
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Market data retrieval errors
///
/// All of these are transient from the engine's point of view: the affected
/// tick is skipped and the next one tries again.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Malformed market data: {0}")]
    Parse(String),
    #[error("Not enough data: needed {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },
}

/// Trait for market data sources
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Latest traded price
    async fn get_price(&self, symbol: &str) -> Result<Decimal, MarketDataError>;
    /// RSI for the given bar interval
    async fn get_rsi(&self, symbol: &str, interval: Interval) -> Result<Decimal, MarketDataError>;
    /// Historical candles, oldest first
    async fn get_historical_klines(
        &self,
        symbol: &str,
        interval: Interval,
        range: KlineRange,
    ) -> Result<Vec<Candle>, MarketDataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_round_trip_notation() {
        for s in ["1m", "5m", "15m", "1h", "4h", "1d"] {
            let interval: Interval = s.parse().unwrap();
            assert_eq!(interval.as_str(), s);
        }
    }

    #[test]
    fn test_interval_unknown() {
        assert!("3h".parse::<Interval>().is_err());
    }

    #[test]
    fn test_interval_duration() {
        assert_eq!(Interval::FiveMinutes.duration(), Duration::minutes(5));
        assert_eq!(Interval::OneHour.duration(), Duration::hours(1));
    }

    #[test]
    fn test_interval_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            interval: Interval,
        }
        let w: Wrapper = toml::from_str(r#"interval = "15m""#).unwrap();
        assert_eq!(w.interval, Interval::FifteenMinutes);
    }
}
