//! Trading engine
//!
//! Owns the exclusive section (ledger, risk policy and bot settings behind
//! one mutex), the background trading loop, and the operator entry points.
//! Market data is always read before the section is entered and persistence
//! always runs after it is released.

mod runner;
mod status;

pub use runner::TickOutcome;
pub use status::EngineStatus;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{Config, StrategyConfig};
use crate::indicator::VolatilityEstimator;
use crate::ledger::{LedgerError, Order, Position, PositionLedger, Side, DEFAULT_HISTORY_LIMIT};
use crate::market::{Interval, MarketDataClient, MarketDataError};
use crate::risk::{RiskPolicy, RiskSnapshot, StandardRiskPolicy};
use crate::storage::{LogEntry, LogLevel, PersistenceStore, PositionRecord};
use crate::telemetry::{self, CounterMetric, GaugeMetric};

use runner::LoopHandle;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Invalid side: {0:?} (expected BUY or SELL)")]
    InvalidSide(String),

    #[error("Market data unavailable: {0}")]
    DataUnavailable(#[from] MarketDataError),
}

/// Who drives trading decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Only operator orders trade
    #[default]
    Manual,
    /// The loop opens positions on RSI signals
    Auto,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Manual => f.write_str("manual"),
            Mode::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Mode::Manual),
            "auto" => Ok(Mode::Auto),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Operator-adjustable settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotSettings {
    pub symbol: String,
    pub leverage: u32,
    pub mode: Mode,
}

/// Partial settings change; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigUpdate {
    pub symbol: Option<String>,
    pub capital: Option<Decimal>,
    pub leverage: Option<u32>,
    pub mode: Option<Mode>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.symbol.is_none()
            && self.capital.is_none()
            && self.leverage.is_none()
            && self.mode.is_none()
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(symbol) = &self.symbol {
            parts.push(format!("symbol={symbol}"));
        }
        if let Some(capital) = self.capital {
            parts.push(format!("capital={capital}"));
        }
        if let Some(leverage) = self.leverage {
            parts.push(format!("leverage={leverage}"));
        }
        if let Some(mode) = self.mode {
            parts.push(format!("mode={mode}"));
        }
        parts.join(", ")
    }
}

/// State guarded by the exclusive section
struct EngineState {
    settings: BotSettings,
    ledger: PositionLedger,
    risk: Box<dyn RiskPolicy>,
}

impl EngineState {
    fn risk_gauges(&self) -> (Position, RiskSnapshot) {
        (self.ledger.position(), self.risk.snapshot())
    }
}

/// How an order request maps onto the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderIntent {
    Open,
    Close,
    /// Close when the side reduces the position, open otherwise
    Route,
}

/// Shared between the engine handle and the loop task
pub(crate) struct EngineInner {
    state: Mutex<EngineState>,
    market: Arc<dyn MarketDataClient>,
    store: Option<Arc<dyn PersistenceStore>>,
    volatility: VolatilityEstimator,
    strategy: StrategyConfig,
    rsi_interval: Interval,
    running: AtomicBool,
}

impl EngineInner {
    async fn symbol(&self) -> String {
        self.state.lock().await.settings.symbol.clone()
    }

    /// Write an event-log entry to tracing and the store
    pub(crate) async fn log_event(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!(event = %message, "Engine event"),
            LogLevel::Warning => tracing::warn!(event = %message, "Engine event"),
            LogLevel::Error => tracing::error!(event = %message, "Engine event"),
        }

        if let Some(store) = &self.store {
            let symbol = self.symbol().await;
            if let Err(e) = store.insert_log(&LogEntry::new(level, symbol, message)).await {
                telemetry::increment_counter(CounterMetric::PersistenceErrors);
                tracing::error!(error = %e, "Failed to store log entry");
            }
        }
    }

    /// Persist and report a committed fill
    ///
    /// Runs after the exclusive section is released. Store failures are
    /// logged and never undo the fill.
    async fn record_fill(&self, order: &Order, position: Position, risk: &RiskSnapshot) {
        telemetry::increment_counter(CounterMetric::OrdersFilled);
        publish_gauges(position, risk);

        if let Some(store) = &self.store {
            if let Err(e) = store.insert_order(order).await {
                telemetry::increment_counter(CounterMetric::PersistenceErrors);
                tracing::error!(error = %e, order_id = %order.id, "Failed to store order");
            }
            let record = PositionRecord::snapshot(order.symbol.clone(), &position);
            if let Err(e) = store.update_position(&record).await {
                telemetry::increment_counter(CounterMetric::PersistenceErrors);
                tracing::error!(error = %e, order_id = %order.id, "Failed to store position");
            }
        }

        let message = match order.kind {
            crate::ledger::OrderKind::Open => format!(
                "Opened {} {} {} @ {}",
                order.side, order.quantity, order.symbol, order.price
            ),
            crate::ledger::OrderKind::Close => format!(
                "Closed {} {} {} @ {} (P&L {})",
                order.side, order.quantity, order.symbol, order.price, order.pnl
            ),
        };
        self.log_event(LogLevel::Info, message).await;
    }

    async fn submit(
        &self,
        side: Side,
        quantity: Decimal,
        intent: OrderIntent,
    ) -> Result<Order, EngineError> {
        let (symbol, routes_to_close) = {
            let state = self.state.lock().await;
            let closing = state.ledger.position().direction().map(Side::closing) == Some(side);
            (state.settings.symbol.clone(), closing)
        };
        let price = self.market.get_price(&symbol).await?;
        // ATR only sizes the SL/TP left behind by a partial close
        let atr = match intent {
            OrderIntent::Open => Decimal::ZERO,
            OrderIntent::Route if !routes_to_close => Decimal::ZERO,
            OrderIntent::Close | OrderIntent::Route => {
                self.volatility.estimate(self.market.as_ref(), &symbol).await
            }
        };

        let (result, position, risk) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let closing = state.ledger.position().direction().map(Side::closing) == Some(side);
            let close = match intent {
                OrderIntent::Open => false,
                OrderIntent::Close => true,
                OrderIntent::Route => closing,
            };
            let result = if close {
                state
                    .ledger
                    .close(side, quantity, price, atr, state.risk.as_mut())
            } else {
                state.ledger.open(side, quantity, price, state.risk.as_mut())
            };
            let (position, risk) = state.risk_gauges();
            (result, position, risk)
        };

        match result {
            Ok(order) => {
                self.record_fill(&order, position, &risk).await;
                Ok(order)
            }
            Err(e) => {
                telemetry::increment_counter(CounterMetric::OrdersRejected);
                publish_gauges(position, &risk);
                self.log_event(
                    LogLevel::Warning,
                    format!("Order {side} {quantity} rejected: {e}"),
                )
                .await;
                Err(e.into())
            }
        }
    }
}

fn publish_gauges(position: Position, risk: &RiskSnapshot) {
    telemetry::set_decimal_gauge(GaugeMetric::Capital, position.capital);
    telemetry::set_decimal_gauge(GaugeMetric::PositionSize, position.size);
    telemetry::set_decimal_gauge(GaugeMetric::RealizedPnl, risk.cumulative_pnl);
    telemetry::set_gauge(GaugeMetric::RiskLocked, if risk.locked { 1.0 } else { 0.0 });
    telemetry::set_gauge(GaugeMetric::ConsecutiveLosses, risk.consecutive_losses as f64);
}

/// Handle to the trading engine
///
/// Every method takes `&self`; the engine can be shared behind an `Arc`
/// between the operator console and signal handlers.
pub struct TradingEngine {
    inner: Arc<EngineInner>,
    task: Mutex<Option<LoopHandle>>,
}

impl TradingEngine {
    /// Create an engine using the standard risk policy from `config.risk`
    pub fn new(
        config: &Config,
        market: Arc<dyn MarketDataClient>,
        store: Option<Arc<dyn PersistenceStore>>,
    ) -> Self {
        let risk = StandardRiskPolicy::new(config.risk.clone(), config.bot.capital);
        Self::with_policy(config, market, store, Box::new(risk))
    }

    /// Create an engine with a custom risk policy
    pub fn with_policy(
        config: &Config,
        market: Arc<dyn MarketDataClient>,
        store: Option<Arc<dyn PersistenceStore>>,
        risk: Box<dyn RiskPolicy>,
    ) -> Self {
        let state = EngineState {
            settings: BotSettings {
                symbol: config.bot.symbol.clone(),
                leverage: config.bot.leverage,
                mode: config.bot.mode,
            },
            ledger: PositionLedger::new(config.bot.symbol.clone(), config.bot.capital),
            risk,
        };

        let inner = EngineInner {
            state: Mutex::new(state),
            market,
            store,
            volatility: VolatilityEstimator::new(
                config.market.atr_interval,
                config.market.atr_period,
            ),
            strategy: config.strategy.clone(),
            rsi_interval: config.market.rsi_interval,
            running: AtomicBool::new(false),
        };

        Self {
            inner: Arc::new(inner),
            task: Mutex::new(None),
        }
    }

    /// Whether the trading loop is running
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Start the trading loop; a no-op with a warning if already running
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            drop(task);
            self.inner
                .log_event(LogLevel::Warning, "Bot already running")
                .await;
            return;
        }

        self.inner.running.store(true, Ordering::SeqCst);
        *task = Some(runner::spawn(Arc::clone(&self.inner)));
        drop(task);

        self.inner.log_event(LogLevel::Info, "Bot started").await;
    }

    /// Stop the trading loop; a no-op with a warning if already stopped
    ///
    /// Waits for an in-flight tick, bounded by the configured stop timeout.
    pub async fn stop(&self) {
        let task = self.task.lock().await.take();
        let Some(task) = task else {
            self.inner
                .log_event(LogLevel::Warning, "Bot already stopped")
                .await;
            return;
        };

        self.inner.running.store(false, Ordering::SeqCst);
        task.shutdown(self.inner.strategy.stop_timeout()).await;

        self.inner.log_event(LogLevel::Info, "Bot stopped").await;
    }

    /// Run one decision tick immediately
    pub async fn tick(&self) -> Result<TickOutcome, EngineError> {
        self.inner.tick().await
    }

    /// Open or add to a position at the current market price
    pub async fn open(&self, side: Side, quantity: Decimal) -> Result<Order, EngineError> {
        self.inner.submit(side, quantity, OrderIntent::Open).await
    }

    /// Reduce the position at the current market price
    pub async fn close(&self, side: Side, quantity: Decimal) -> Result<Order, EngineError> {
        self.inner.submit(side, quantity, OrderIntent::Close).await
    }

    /// Operator order: closes when `side` reduces the position, opens otherwise
    ///
    /// Risk locks are still enforced.
    pub async fn execute_manual_order(
        &self,
        side: &str,
        quantity: Decimal,
    ) -> Result<Order, EngineError> {
        let side: Side = side
            .parse()
            .map_err(|_| EngineError::InvalidSide(side.to_string()))?;
        self.inner.submit(side, quantity, OrderIntent::Route).await
    }

    /// Apply operator settings changes under the exclusive section
    pub async fn update_config(&self, update: ConfigUpdate) {
        if update.is_empty() {
            return;
        }

        {
            let mut state = self.inner.state.lock().await;
            if let Some(symbol) = &update.symbol {
                if !state.ledger.position().is_flat() {
                    tracing::warn!(
                        from = %state.settings.symbol,
                        to = %symbol,
                        "Changing symbol with an open position"
                    );
                }
                state.settings.symbol = symbol.clone();
                state.ledger.set_symbol(symbol.clone());
            }
            if let Some(capital) = update.capital {
                state.ledger.set_capital(capital);
                state.risk.rebase_capital(capital);
            }
            if let Some(leverage) = update.leverage {
                state.settings.leverage = leverage;
            }
            if let Some(mode) = update.mode {
                state.settings.mode = mode;
            }
        }

        self.inner
            .log_event(LogLevel::Info, format!("Config updated: {}", update.describe()))
            .await;
    }

    /// Switch between manual and automatic trading
    pub async fn set_mode(&self, mode: Mode) {
        self.update_config(ConfigUpdate {
            mode: Some(mode),
            ..ConfigUpdate::default()
        })
        .await;
    }

    /// Engage the risk lock
    pub async fn lock(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.inner.state.lock().await.risk.lock(reason.clone());
        telemetry::set_gauge(GaugeMetric::RiskLocked, 1.0);
        self.inner
            .log_event(LogLevel::Warning, format!("Risk lock engaged: {reason}"))
            .await;
    }

    /// Clear the risk lock
    pub async fn unlock(&self) {
        self.inner.state.lock().await.risk.unlock();
        telemetry::set_gauge(GaugeMetric::RiskLocked, 0.0);
        self.inner
            .log_event(LogLevel::Info, "Risk lock cleared")
            .await;
    }

    /// Consistent snapshot of the engine state
    pub async fn status(&self) -> EngineStatus {
        let state = self.inner.state.lock().await;
        let position = state.ledger.position();
        let risk = state.risk.snapshot();

        EngineStatus {
            running: self.is_running(),
            mode: state.settings.mode,
            symbol: state.settings.symbol.clone(),
            leverage: state.settings.leverage,
            capital: position.capital,
            position_size: position.size,
            entry_price: position.entry_price,
            direction: position.direction(),
            sltp: state.ledger.sltp(),
            open_orders: state.ledger.open_orders().to_vec(),
            history: state.ledger.history(DEFAULT_HISTORY_LIMIT).to_vec(),
            locked: risk.locked,
            lock_reason: risk.lock_reason.clone(),
            risk,
        }
    }
}

impl Drop for TradingEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
