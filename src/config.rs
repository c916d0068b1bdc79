//! Configuration types for guardrail-bot

use anyhow::{bail, Context};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::Mode;
use crate::market::{BinanceConfig, Interval, BINANCE_API_URL};
use crate::risk::RiskLimits;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot: BotConfig,
    pub market: MarketConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskLimits,
    pub storage: StorageConfig,
    pub telemetry: TelemetryConfig,
}

/// Instrument, capital and control mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub symbol: String,
    /// Starting free capital
    pub capital: Decimal,
    /// Informational only; no margin model uses it
    pub leverage: u32,
    pub mode: Mode,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            capital: dec!(1000),
            leverage: 1,
            mode: Mode::Manual,
        }
    }
}

/// Market data source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketSource {
    /// Binance public REST API
    #[default]
    Binance,
    /// Deterministic simulated market
    Paper,
}

/// Market data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub source: MarketSource,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Bar interval the entry RSI is read on
    pub rsi_interval: Interval,
    /// Bar interval the ATR is computed on
    pub atr_interval: Interval,
    pub atr_period: usize,
    /// Paper market mid price
    pub paper_base_price: Decimal,
    /// Paper market swing as a fraction of the base price
    pub paper_amplitude: f64,
    /// Paper market ticks per full swing
    pub paper_period_steps: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            source: MarketSource::Binance,
            base_url: BINANCE_API_URL.to_string(),
            timeout_secs: 10,
            rsi_interval: Interval::FiveMinutes,
            atr_interval: Interval::OneHour,
            atr_period: 14,
            paper_base_price: dec!(50000),
            paper_amplitude: 0.02,
            paper_period_steps: 120,
        }
    }
}

impl MarketConfig {
    /// REST client settings for the Binance source
    pub fn binance(&self) -> BinanceConfig {
        BinanceConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            ..BinanceConfig::default()
        }
    }
}

/// Automatic entry and loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// RSI below this opens a long
    pub rsi_oversold: Decimal,
    /// RSI above this opens a short
    pub rsi_overbought: Decimal,
    /// Entry notional as a fraction of capital
    pub order_size_pct: Decimal,
    pub tick_interval_ms: u64,
    /// Upper bound on waiting for the in-flight tick when stopping
    pub stop_timeout_secs: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            rsi_oversold: dec!(30),
            rsi_overbought: dec!(70),
            order_size_pct: dec!(0.01),
            tick_interval_ms: 1000,
            stop_timeout_secs: 5,
        }
    }
}

impl StrategyConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./data"),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
    /// Serve Prometheus metrics on this port when set
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bot.symbol.trim().is_empty() {
            bail!("bot.symbol must not be empty");
        }
        if self.bot.capital <= Decimal::ZERO {
            bail!("bot.capital must be positive, got {}", self.bot.capital);
        }
        if self.strategy.rsi_oversold >= self.strategy.rsi_overbought {
            bail!(
                "strategy.rsi_oversold ({}) must be below rsi_overbought ({})",
                self.strategy.rsi_oversold,
                self.strategy.rsi_overbought
            );
        }
        if self.strategy.order_size_pct <= Decimal::ZERO || self.strategy.order_size_pct > dec!(1) {
            bail!(
                "strategy.order_size_pct must be in (0, 1], got {}",
                self.strategy.order_size_pct
            );
        }
        if self.strategy.tick_interval_ms == 0 {
            bail!("strategy.tick_interval_ms must be positive");
        }
        Ok(())
    }
}
