//! Binance spot REST client
//!
//! Prices come from `/api/v3/ticker/price`, candles from `/api/v3/klines`.
//! Binance does not serve RSI, so it is computed locally from recent klines.

use super::{Candle, Interval, KlineRange, MarketDataClient, MarketDataError};
use crate::indicator::{relative_strength_index, DEFAULT_RSI_PERIOD};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Binance REST base URL
pub const BINANCE_API_URL: &str = "https://api.binance.com";

/// Maximum rows Binance returns per klines request
const KLINES_PAGE_LIMIT: usize = 1000;

/// Configuration for the Binance client
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// Base URL for the REST API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// RSI look-back
    pub rsi_period: usize,
    /// Klines fetched to warm up the RSI smoothing
    pub rsi_lookback: usize,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_API_URL.to_string(),
            timeout: Duration::from_secs(10),
            rsi_period: DEFAULT_RSI_PERIOD,
            rsi_lookback: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

/// Client for Binance's public market data endpoints
pub struct BinanceClient {
    config: BinanceConfig,
    client: Client,
}

impl BinanceClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_config(BinanceConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: BinanceConfig) -> Result<Self, MarketDataError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!(url = %url, "Binance request");

        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::Api { status, body });
        }

        Ok(response.json().await?)
    }

    async fn fetch_klines_page(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let mut query = vec![
            ("symbol", symbol.to_uppercase()),
            ("interval", interval.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some((start, end)) = window {
            query.push(("startTime", start.timestamp_millis().to_string()));
            query.push(("endTime", end.timestamp_millis().to_string()));
        }

        let rows: Vec<Vec<Value>> = self.get_json("/api/v3/klines", &query).await?;
        rows.iter().map(|row| parse_kline_row(row)).collect()
    }
}

/// Parse one klines row: `[open_time, open, high, low, close, volume, close_time, ...]`
pub(crate) fn parse_kline_row(row: &[Value]) -> Result<Candle, MarketDataError> {
    Ok(Candle {
        open_time: millis_at(row, 0)?,
        open: decimal_at(row, 1)?,
        high: decimal_at(row, 2)?,
        low: decimal_at(row, 3)?,
        close: decimal_at(row, 4)?,
        volume: decimal_at(row, 5)?,
        close_time: millis_at(row, 6)?,
    })
}

fn decimal_at(row: &[Value], idx: usize) -> Result<Decimal, MarketDataError> {
    row.get(idx)
        .and_then(Value::as_str)
        .and_then(|s| Decimal::from_str(s).ok())
        .ok_or_else(|| MarketDataError::Parse(format!("kline field {idx} is not a decimal")))
}

fn millis_at(row: &[Value], idx: usize) -> Result<DateTime<Utc>, MarketDataError> {
    row.get(idx)
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| MarketDataError::Parse(format!("kline field {idx} is not a timestamp")))
}

#[async_trait]
impl MarketDataClient for BinanceClient {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, MarketDataError> {
        let ticker: TickerPrice = self
            .get_json("/api/v3/ticker/price", &[("symbol", symbol.to_uppercase())])
            .await?;
        Decimal::from_str(&ticker.price)
            .map_err(|e| MarketDataError::Parse(format!("ticker price: {e}")))
    }

    async fn get_rsi(&self, symbol: &str, interval: Interval) -> Result<Decimal, MarketDataError> {
        let candles = self
            .get_historical_klines(symbol, interval, KlineRange::Recent(self.config.rsi_lookback))
            .await?;
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();

        relative_strength_index(&closes, self.config.rsi_period).ok_or(
            MarketDataError::InsufficientData {
                needed: self.config.rsi_period + 1,
                got: closes.len(),
            },
        )
    }

    async fn get_historical_klines(
        &self,
        symbol: &str,
        interval: Interval,
        range: KlineRange,
    ) -> Result<Vec<Candle>, MarketDataError> {
        match range {
            KlineRange::Recent(count) => {
                let limit = count.clamp(1, KLINES_PAGE_LIMIT);
                self.fetch_klines_page(symbol, interval, limit, None).await
            }
            KlineRange::Between { start, end } => {
                let mut candles: Vec<Candle> = Vec::new();
                let mut cursor = start;

                while cursor <= end {
                    let page = self
                        .fetch_klines_page(symbol, interval, KLINES_PAGE_LIMIT, Some((cursor, end)))
                        .await?;
                    let Some(last) = page.last() else {
                        break;
                    };
                    cursor = last.open_time + chrono::Duration::milliseconds(1);
                    let full_page = page.len() == KLINES_PAGE_LIMIT;
                    candles.extend(page);
                    if !full_page {
                        break;
                    }
                }

                tracing::debug!(
                    symbol,
                    interval = %interval,
                    candles = candles.len(),
                    "Fetched historical klines"
                );
                Ok(candles)
            }
        }
    }
}
