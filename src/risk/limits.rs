//! Risk limits and realized-equity drawdown tracking

use super::LockReason;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Thresholds for the standard risk policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Maximum order notional as a fraction of capital
    pub max_position_pct: Decimal,
    /// Maximum tracked open orders before new entries are refused
    pub max_open_positions: usize,
    /// Losing closes in a row that lock trading (0 disables)
    pub max_consecutive_losses: u32,
    /// Drawdown of realized equity from its peak that locks trading
    pub max_drawdown_pct: Decimal,
    /// Cumulative realized loss, as a fraction of starting equity, that locks trading
    pub max_total_loss_pct: Decimal,
    /// RSI below this is treated as capitulation and entries are cancelled
    pub rsi_extreme_low: Decimal,
    /// RSI above this is treated as a blow-off and entries are cancelled
    pub rsi_extreme_high: Decimal,
    /// Stop distance in ATRs
    pub stop_atr_multiplier: Decimal,
    /// Target distance in ATRs
    pub target_atr_multiplier: Decimal,
    /// Stop distance as a fraction of entry when ATR is unavailable
    pub fallback_stop_pct: Decimal,
    /// Target distance as a fraction of entry when ATR is unavailable
    pub fallback_target_pct: Decimal,
    /// Seconds after which a lock lapses on its own (0 = only explicit unlock)
    pub lock_cooldown_secs: u64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_pct: dec!(0.01),
            max_open_positions: 3,
            max_consecutive_losses: 3,
            max_drawdown_pct: dec!(0.10),
            max_total_loss_pct: dec!(0.05),
            rsi_extreme_low: dec!(10),
            rsi_extreme_high: dec!(90),
            stop_atr_multiplier: dec!(1.5),
            target_atr_multiplier: dec!(3.0),
            fallback_stop_pct: dec!(0.01),
            fallback_target_pct: dec!(0.02),
            lock_cooldown_secs: 0,
        }
    }
}

/// Tracks realized equity (starting capital plus realized P&L)
///
/// Free capital swings with every opening trade, so drawdown is measured on
/// realized results only.
#[derive(Debug, Clone)]
pub struct DrawdownMonitor {
    /// Equity when tracking started or was last rebased
    pub start_equity: Decimal,
    /// Highest realized equity seen
    pub peak_equity: Decimal,
    /// Current realized equity
    pub current_equity: Decimal,
}

impl DrawdownMonitor {
    /// Create a new monitor
    pub fn new(initial_equity: Decimal) -> Self {
        Self {
            start_equity: initial_equity,
            peak_equity: initial_equity,
            current_equity: initial_equity,
        }
    }

    /// Apply a realized P&L
    pub fn record(&mut self, pnl: Decimal) {
        self.current_equity += pnl;
        if self.current_equity > self.peak_equity {
            self.peak_equity = self.current_equity;
        }
    }

    /// Fractional drawdown from peak
    pub fn current_drawdown(&self) -> Decimal {
        if self.peak_equity <= dec!(0) {
            return dec!(0);
        }
        ((self.peak_equity - self.current_equity) / self.peak_equity).max(dec!(0))
    }

    /// Fractional loss relative to the starting equity
    pub fn total_loss(&self) -> Decimal {
        if self.start_equity <= dec!(0) {
            return dec!(0);
        }
        ((self.start_equity - self.current_equity) / self.start_equity).max(dec!(0))
    }

    /// Whether realized results breach the limits
    pub fn should_lock(&self, limits: &RiskLimits) -> Option<LockReason> {
        let total_loss = self.total_loss();
        if total_loss >= limits.max_total_loss_pct && total_loss > dec!(0) {
            return Some(LockReason::MaxTotalLossReached(total_loss));
        }

        let drawdown = self.current_drawdown();
        if drawdown >= limits.max_drawdown_pct && drawdown > dec!(0) {
            return Some(LockReason::MaxDrawdownReached(drawdown));
        }

        None
    }

    /// Forget past losses: current equity becomes the new start and peak
    pub fn rebase(&mut self) {
        self.start_equity = self.current_equity;
        self.peak_equity = self.current_equity;
    }

    /// Restart tracking from an externally set equity
    pub fn rebase_to(&mut self, equity: Decimal) {
        self.current_equity = equity;
        self.rebase();
    }
}
