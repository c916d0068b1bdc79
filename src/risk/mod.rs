//! Risk management module
//!
//! Trade gating, position sizing, SL/TP computation and the lock state
//! machine. The ledger and the trading loop only see [`RiskPolicy`].

mod limits;
mod policy;
mod types;

pub use limits::{DrawdownMonitor, RiskLimits};
pub use policy::StandardRiskPolicy;
pub use types::{Direction, LockReason, RiskSnapshot, SlTp};

use rust_decimal::Decimal;

/// Trait for risk policy implementations
///
/// Owns the risk state: the lock, its reason and the running aggregates that
/// decide future locking. Once locked, every capital-affecting ledger
/// operation must fail until [`RiskPolicy::update_on_trade`] or
/// [`RiskPolicy::unlock`] clears the lock.
pub trait RiskPolicy: Send + Sync {
    /// Whether capital-affecting operations are currently refused
    fn is_locked(&self) -> bool;

    /// Human-readable lock reason, only while locked
    fn lock_reason(&self) -> Option<String>;

    /// Whether an order of `proposed_size` notional is acceptable for `capital`
    fn check_position_size(&self, proposed_size: Decimal, capital: Decimal) -> bool;

    /// Whether another position may be opened given `open_count` tracked orders
    fn check_open_positions(&self, open_count: usize) -> bool;

    /// Whether the entry logic should stand down this tick
    fn should_cancel_trade(&self, rsi: Decimal, trend_confirmed: bool) -> bool;

    /// Fresh SL/TP for a position entered at `entry_price`
    ///
    /// Long: stop < entry < target. Short: target < entry < stop.
    fn calculate_dynamic_sltp(&self, entry_price: Decimal, atr: Decimal, direction: Direction)
        -> SlTp;

    /// Trail `current` forward while price keeps moving in the position's favor
    ///
    /// Never moves a long stop down or a short stop up.
    fn update_sltp_if_trend_continues(
        &self,
        current_price: Decimal,
        current: SlTp,
        direction: Direction,
        atr: Decimal,
    ) -> SlTp;

    /// Record a trade outcome; may lock or clear a lapsed lock
    fn update_on_trade(&mut self, realized_pnl: Decimal, new_capital: Decimal);

    /// Restart capital and equity tracking after the operator resets capital
    fn rebase_capital(&mut self, capital: Decimal);

    /// Engage the lock by operator request
    fn lock(&mut self, reason: String);

    /// Clear the lock by operator request
    fn unlock(&mut self);

    /// Current risk state
    fn snapshot(&self) -> RiskSnapshot;

    /// Recompute SL/TP from entry and trail it, never giving back ground
    /// already held in `cached`
    fn refresh_sltp(
        &self,
        entry_price: Decimal,
        current_price: Decimal,
        atr: Decimal,
        direction: Direction,
        cached: Option<SlTp>,
    ) -> SlTp {
        let fresh = self.calculate_dynamic_sltp(entry_price, atr, direction);
        let base = match cached {
            Some(previous) => fresh.most_favorable(previous, direction),
            None => fresh,
        };
        self.update_sltp_if_trend_continues(current_price, base, direction, atr)
    }
}
