//! Threshold-based risk policy

use super::{Direction, DrawdownMonitor, LockReason, RiskLimits, RiskPolicy, RiskSnapshot, SlTp};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
struct ActiveLock {
    reason: LockReason,
    since: DateTime<Utc>,
}

/// Default risk policy driven by [`RiskLimits`]
///
/// States are Unlocked and Locked. Losing streaks, realized drawdown, total
/// realized loss and exhausted capital move it to Locked on
/// `update_on_trade`; an explicit `unlock` or an elapsed cooldown move it
/// back. Leaving the Locked state rebases the loss tracking so the same
/// losses do not lock again on the next trade.
#[derive(Debug, Clone)]
pub struct StandardRiskPolicy {
    limits: RiskLimits,
    monitor: DrawdownMonitor,
    lock: Option<ActiveLock>,
    consecutive_losses: u32,
    trade_count: u64,
    capital: Decimal,
}

impl StandardRiskPolicy {
    /// Create a policy tracking equity from `initial_capital`
    pub fn new(limits: RiskLimits, initial_capital: Decimal) -> Self {
        Self {
            limits,
            monitor: DrawdownMonitor::new(initial_capital),
            lock: None,
            consecutive_losses: 0,
            trade_count: 0,
            capital: initial_capital,
        }
    }

    /// Configured limits
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    fn lapsed(&self, lock: &ActiveLock, now: DateTime<Utc>) -> bool {
        let cooldown = self.limits.lock_cooldown_secs;
        cooldown > 0 && now - lock.since >= Duration::seconds(cooldown as i64)
    }

    fn active_lock(&self) -> Option<&ActiveLock> {
        let now = Utc::now();
        self.lock.as_ref().filter(|lock| !self.lapsed(lock, now))
    }

    fn engage(&mut self, reason: LockReason) {
        tracing::warn!(reason = %reason, "Risk lock engaged");
        self.lock = Some(ActiveLock {
            reason,
            since: Utc::now(),
        });
    }

    fn release(&mut self) {
        self.lock = None;
        self.consecutive_losses = 0;
        self.monitor.rebase();
    }

    fn breach(&self) -> Option<LockReason> {
        if self.capital <= dec!(0) {
            return Some(LockReason::CapitalExhausted(self.capital));
        }
        let max_losses = self.limits.max_consecutive_losses;
        if max_losses > 0 && self.consecutive_losses >= max_losses {
            return Some(LockReason::ConsecutiveLosses(self.consecutive_losses));
        }
        self.monitor.should_lock(&self.limits)
    }

    fn distances(&self, entry_price: Decimal, atr: Decimal) -> (Decimal, Decimal) {
        if atr > dec!(0) {
            (
                atr * self.limits.stop_atr_multiplier,
                atr * self.limits.target_atr_multiplier,
            )
        } else {
            (
                entry_price * self.limits.fallback_stop_pct,
                entry_price * self.limits.fallback_target_pct,
            )
        }
    }
}

impl RiskPolicy for StandardRiskPolicy {
    fn is_locked(&self) -> bool {
        self.active_lock().is_some()
    }

    fn lock_reason(&self) -> Option<String> {
        self.active_lock().map(|lock| lock.reason.to_string())
    }

    fn check_position_size(&self, proposed_size: Decimal, capital: Decimal) -> bool {
        let max_size = capital * self.limits.max_position_pct;
        let ok = capital > dec!(0) && proposed_size > dec!(0) && proposed_size <= max_size;
        if !ok {
            tracing::debug!(%proposed_size, %capital, %max_size, "Position size rejected");
        }
        ok
    }

    fn check_open_positions(&self, open_count: usize) -> bool {
        open_count < self.limits.max_open_positions
    }

    fn should_cancel_trade(&self, rsi: Decimal, trend_confirmed: bool) -> bool {
        if !trend_confirmed {
            return true;
        }
        if rsi < dec!(0) || rsi > dec!(100) {
            tracing::warn!(%rsi, "RSI out of range");
            return true;
        }
        rsi < self.limits.rsi_extreme_low || rsi > self.limits.rsi_extreme_high
    }

    fn calculate_dynamic_sltp(
        &self,
        entry_price: Decimal,
        atr: Decimal,
        direction: Direction,
    ) -> SlTp {
        let (stop_distance, target_distance) = self.distances(entry_price, atr);
        match direction {
            Direction::Long => SlTp::new(entry_price - stop_distance, entry_price + target_distance),
            Direction::Short => {
                SlTp::new(entry_price + stop_distance, entry_price - target_distance)
            }
        }
    }

    fn update_sltp_if_trend_continues(
        &self,
        current_price: Decimal,
        current: SlTp,
        direction: Direction,
        atr: Decimal,
    ) -> SlTp {
        if atr <= dec!(0) {
            return current;
        }
        let stop_distance = atr * self.limits.stop_atr_multiplier;
        let target_distance = atr * self.limits.target_atr_multiplier;

        match direction {
            Direction::Long => {
                let candidate = current_price - stop_distance;
                if candidate > current.stop_loss {
                    SlTp::new(
                        candidate,
                        current.take_profit.max(current_price + target_distance),
                    )
                } else {
                    current
                }
            }
            Direction::Short => {
                let candidate = current_price + stop_distance;
                if candidate < current.stop_loss {
                    SlTp::new(
                        candidate,
                        current.take_profit.min(current_price - target_distance),
                    )
                } else {
                    current
                }
            }
        }
    }

    fn update_on_trade(&mut self, realized_pnl: Decimal, new_capital: Decimal) {
        self.trade_count += 1;
        self.capital = new_capital;

        if let Some(lock) = &self.lock {
            if self.lapsed(lock, Utc::now()) {
                tracing::info!(reason = %lock.reason, "Risk lock cooldown elapsed");
                self.release();
            }
        }

        if realized_pnl < dec!(0) {
            self.consecutive_losses += 1;
        } else if realized_pnl > dec!(0) {
            self.consecutive_losses = 0;
        }
        if !realized_pnl.is_zero() {
            self.monitor.record(realized_pnl);
        }

        // Opening fills only move cash into a position; equity is unchanged
        if self.lock.is_none() && !realized_pnl.is_zero() {
            if let Some(reason) = self.breach() {
                self.engage(reason);
            }
        }
    }

    fn rebase_capital(&mut self, capital: Decimal) {
        tracing::info!(from = %self.capital, to = %capital, "Risk baseline rebased");
        self.capital = capital;
        self.monitor.rebase_to(capital);
    }

    fn lock(&mut self, reason: String) {
        self.engage(LockReason::Manual(reason));
    }

    fn unlock(&mut self) {
        if self.lock.is_some() {
            tracing::info!("Risk lock cleared by operator");
        }
        self.release();
    }

    fn snapshot(&self) -> RiskSnapshot {
        let active = self.active_lock();
        RiskSnapshot {
            locked: active.is_some(),
            lock_reason: active.map(|lock| lock.reason.to_string()),
            locked_since: active.map(|lock| lock.since),
            consecutive_losses: self.consecutive_losses,
            cumulative_pnl: self.monitor.current_equity - self.monitor.start_equity,
            peak_equity: self.monitor.peak_equity,
            trade_count: self.trade_count,
            capital: self.capital,
        }
    }
}
