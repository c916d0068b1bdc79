//! Trading loop
//!
//! One background task fires a decision tick per period until it is told to
//! shut down. A failing or panicking tick is logged and counted; the loop
//! keeps going.

use futures_util::FutureExt;
use rust_decimal::Decimal;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{EngineError, EngineInner, EngineState, Mode};
use crate::ledger::{LedgerError, Order, Side};
use crate::market::MarketDataError;
use crate::risk::{Direction, SlTp};
use crate::storage::LogLevel;
use crate::telemetry::{self, CounterMetric, GaugeMetric};

/// Decimal places kept on automatically sized quantities
const QUANTITY_DP: u32 = 8;

/// What a tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Manual mode or risk-locked
    Inactive,
    /// The risk policy stood down this tick
    Cancelled { rsi: Decimal },
    /// Flat and RSI inside the neutral band
    NoSignal { rsi: Decimal },
    /// Flat with a signal, but a risk gate refused the entry
    Blocked,
    /// Opened a position
    Opened(Order),
    /// Position open; SL/TP refreshed
    Trailed(SlTp),
}

/// Running loop task and its shutdown signal
pub(crate) struct LoopHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LoopHandle {
    /// Signal shutdown and wait for the in-flight tick, aborting after `timeout`
    pub(crate) async fn shutdown(self, timeout: Duration) {
        let _ = self.shutdown_tx.send(true);
        let abort = self.handle.abort_handle();

        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => tracing::debug!("Trading loop joined"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Trading loop task failed"),
            Err(_) => {
                abort.abort();
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Trading loop did not stop in time, aborted"
                );
            }
        }
    }

    pub(crate) fn abort(self) {
        self.handle.abort();
    }
}

/// Spawn the periodic loop
pub(crate) fn spawn(inner: Arc<EngineInner>) -> LoopHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let period = inner.strategy.tick_interval();

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(period_ms = period.as_millis() as u64, "Trading loop started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break,

                _ = interval.tick() => run_guarded(&inner).await,
            }
        }

        tracing::debug!("Trading loop exited");
    });

    LoopHandle {
        shutdown_tx,
        handle,
    }
}

async fn run_guarded(inner: &EngineInner) {
    let started = Instant::now();

    match AssertUnwindSafe(inner.tick()).catch_unwind().await {
        Ok(Ok(outcome)) => tracing::debug!(?outcome, "Tick complete"),
        Ok(Err(e)) => {
            telemetry::increment_counter(CounterMetric::TickErrors);
            inner
                .log_event(LogLevel::Error, format!("Tick failed: {e}"))
                .await;
        }
        Err(panic) => {
            telemetry::increment_counter(CounterMetric::TickErrors);
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            inner
                .log_event(LogLevel::Error, format!("Tick panicked: {message}"))
                .await;
        }
    }

    telemetry::record_tick_latency(started.elapsed());
}

impl EngineInner {
    /// One pass of the decision procedure
    pub(crate) async fn tick(&self) -> Result<TickOutcome, EngineError> {
        let symbol = {
            let state = self.state.lock().await;
            if !Self::active(&state) {
                tracing::debug!(mode = %state.settings.mode, "Manual mode or locked, waiting");
                return Ok(TickOutcome::Inactive);
            }
            state.settings.symbol.clone()
        };

        let price = self.market.get_price(&symbol).await?;
        if price <= Decimal::ZERO {
            return Err(MarketDataError::Parse(format!("non-positive price {price}")).into());
        }
        let atr = self.volatility.estimate(self.market.as_ref(), &symbol).await;
        let rsi = self.market.get_rsi(&symbol, self.rsi_interval).await?;
        telemetry::set_decimal_gauge(GaugeMetric::Atr, atr);

        let (outcome, position, risk) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            // Mode or lock may have changed while market data was in flight
            if !Self::active(state) {
                return Ok(TickOutcome::Inactive);
            }
            let outcome = self.decide(state, price, atr, rsi)?;
            let (position, risk) = state.risk_gauges();
            (outcome, position, risk)
        };

        if let TickOutcome::Opened(order) = &outcome {
            self.record_fill(order, position, &risk).await;
        }

        Ok(outcome)
    }

    fn active(state: &EngineState) -> bool {
        state.settings.mode == Mode::Auto && !state.risk.is_locked()
    }

    fn decide(
        &self,
        state: &mut EngineState,
        price: Decimal,
        atr: Decimal,
        rsi: Decimal,
    ) -> Result<TickOutcome, LedgerError> {
        if state.risk.should_cancel_trade(rsi, true) {
            tracing::debug!(%rsi, "Trade cancelled by risk policy");
            return Ok(TickOutcome::Cancelled { rsi });
        }

        let position = state.ledger.position();
        let Some(direction) = position.direction() else {
            if !state.risk.check_open_positions(state.ledger.open_orders().len()) {
                tracing::debug!(
                    open_orders = state.ledger.open_orders().len(),
                    "Open position limit reached"
                );
                return Ok(TickOutcome::Blocked);
            }

            let side = if rsi < self.strategy.rsi_oversold {
                Side::Buy
            } else if rsi > self.strategy.rsi_overbought {
                Side::Sell
            } else {
                return Ok(TickOutcome::NoSignal { rsi });
            };

            let notional = self.strategy.order_size_pct * position.capital;
            if !state.risk.check_position_size(notional, position.capital) {
                return Ok(TickOutcome::Blocked);
            }
            let quantity = (notional / price).round_dp(QUANTITY_DP);
            if quantity.is_zero() {
                return Ok(TickOutcome::Blocked);
            }

            tracing::info!(%side, %rsi, %price, %quantity, "Entry signal");
            let order = state
                .ledger
                .open(side, quantity, price, state.risk.as_mut())?;
            // The new position gets its stop on the same tick
            if let Some(direction) = state.ledger.position().direction() {
                Self::refresh_sltp(state, price, atr, direction);
            }
            return Ok(TickOutcome::Opened(order));
        };

        let sltp = Self::refresh_sltp(state, price, atr, direction);
        Ok(TickOutcome::Trailed(sltp))
    }

    fn refresh_sltp(
        state: &mut EngineState,
        price: Decimal,
        atr: Decimal,
        direction: Direction,
    ) -> SlTp {
        let sltp = state.risk.refresh_sltp(
            state.ledger.position().entry_price,
            price,
            atr,
            direction,
            state.ledger.sltp(),
        );
        state.ledger.set_sltp(sltp);
        tracing::debug!(
            %direction,
            stop_loss = %sltp.stop_loss,
            take_profit = %sltp.take_profit,
            "SL/TP refreshed"
        );
        sltp
    }
}
