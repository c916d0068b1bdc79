//! Simulated market for paper trading
//!
//! Prices follow a deterministic sine wave around a base price, advancing one
//! step per `get_price` call. Price, RSI and candles can each be pinned to a
//! fixed value, and the whole source can be switched to "unavailable" to
//! exercise data-failure paths.

use super::{Candle, Interval, KlineRange, MarketDataClient, MarketDataError};
use crate::indicator::{relative_strength_index, DEFAULT_RSI_PERIOD};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

/// Upper bound on bars synthesized for a `Between` request
const MAX_SYNTHETIC_CANDLES: usize = 50_000;

/// Number of closes used when deriving RSI from the wave
const RSI_LOOKBACK: usize = 100;

struct SimState {
    base_price: Decimal,
    /// Wave amplitude as a fraction of the base price
    amplitude: f64,
    /// Steps per full wave
    period_steps: u32,
    step: i64,
    price_override: Option<Decimal>,
    rsi_override: Option<Decimal>,
    candles_override: Option<Vec<Candle>>,
    unavailable: bool,
}

impl SimState {
    fn price_at(&self, step: i64) -> Decimal {
        if let Some(price) = self.price_override {
            return price;
        }
        if self.amplitude == 0.0 || self.period_steps == 0 {
            return self.base_price;
        }
        let phase = 2.0 * std::f64::consts::PI * step as f64 / self.period_steps as f64;
        let factor = Decimal::try_from(1.0 + self.amplitude * phase.sin()).unwrap_or(Decimal::ONE);
        (self.base_price * factor).round_dp(2)
    }

    fn candle_at(&self, step: i64, open_time: DateTime<Utc>, interval: Interval) -> Candle {
        let open = self.price_at(step - 1);
        let close = self.price_at(step);
        Candle {
            open_time,
            open,
            high: (open.max(close) * dec!(1.001)).round_dp(2),
            low: (open.min(close) * dec!(0.999)).round_dp(2),
            close,
            volume: dec!(1),
            close_time: open_time + interval.duration(),
        }
    }

    fn check_available(&self) -> Result<(), MarketDataError> {
        if self.unavailable {
            return Err(MarketDataError::Api {
                status: 503,
                body: "simulated market unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Deterministic in-process market data source
pub struct SimulatedMarket {
    state: RwLock<SimState>,
}

impl SimulatedMarket {
    /// A flat market pinned at `base_price`
    pub fn new(base_price: Decimal) -> Self {
        Self::with_wave(base_price, 0.0, 0)
    }

    /// A market oscillating `amplitude` (fraction of base) over `period_steps`
    pub fn with_wave(base_price: Decimal, amplitude: f64, period_steps: u32) -> Self {
        Self {
            state: RwLock::new(SimState {
                base_price,
                amplitude,
                period_steps,
                step: 0,
                price_override: None,
                rsi_override: None,
                candles_override: None,
                unavailable: false,
            }),
        }
    }

    /// Pin the traded price
    pub async fn set_price(&self, price: Decimal) {
        self.state.write().await.price_override = Some(price);
    }

    /// Pin the RSI reading
    pub async fn set_rsi(&self, rsi: Decimal) {
        self.state.write().await.rsi_override = Some(rsi);
    }

    /// Serve these candles for every kline request
    pub async fn set_candles(&self, candles: Vec<Candle>) {
        self.state.write().await.candles_override = Some(candles);
    }

    /// Make every request fail
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    fn synthesize(state: &SimState, interval: Interval, range: KlineRange) -> Vec<Candle> {
        let now = Utc::now();
        match range {
            KlineRange::Recent(count) => (0..count)
                .map(|i| {
                    let back = (count - 1 - i) as i64;
                    let open_time = now - interval.duration() * (back as i32 + 1);
                    state.candle_at(state.step - back, open_time, interval)
                })
                .collect(),
            KlineRange::Between { start, end } => {
                let mut candles = Vec::new();
                let mut open_time = start;
                let mut step = 0i64;
                while open_time <= end && candles.len() < MAX_SYNTHETIC_CANDLES {
                    candles.push(state.candle_at(step, open_time, interval));
                    open_time += interval.duration();
                    step += 1;
                }
                candles
            }
        }
    }
}

#[async_trait]
impl MarketDataClient for SimulatedMarket {
    async fn get_price(&self, _symbol: &str) -> Result<Decimal, MarketDataError> {
        let mut state = self.state.write().await;
        state.check_available()?;
        state.step += 1;
        Ok(state.price_at(state.step))
    }

    async fn get_rsi(&self, _symbol: &str, interval: Interval) -> Result<Decimal, MarketDataError> {
        let state = self.state.read().await;
        state.check_available()?;
        if let Some(rsi) = state.rsi_override {
            return Ok(rsi);
        }

        let candles = match &state.candles_override {
            Some(candles) => candles.clone(),
            None => Self::synthesize(&state, interval, KlineRange::Recent(RSI_LOOKBACK)),
        };
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        relative_strength_index(&closes, DEFAULT_RSI_PERIOD).ok_or(
            MarketDataError::InsufficientData {
                needed: DEFAULT_RSI_PERIOD + 1,
                got: closes.len(),
            },
        )
    }

    async fn get_historical_klines(
        &self,
        _symbol: &str,
        interval: Interval,
        range: KlineRange,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let state = self.state.read().await;
        state.check_available()?;
        if let Some(candles) = &state.candles_override {
            return Ok(candles.clone());
        }
        Ok(Self::synthesize(&state, interval, range))
    }
}
