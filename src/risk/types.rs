//! Risk management types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Direction implied by a signed position size, `None` when flat
    pub fn of(size: Decimal) -> Option<Self> {
        if size.is_sign_positive() && !size.is_zero() {
            Some(Direction::Long)
        } else if size.is_sign_negative() && !size.is_zero() {
            Some(Direction::Short)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("long"),
            Direction::Short => f.write_str("short"),
        }
    }
}

/// Stop-loss / take-profit pair for an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlTp {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

impl SlTp {
    pub fn new(stop_loss: Decimal, take_profit: Decimal) -> Self {
        Self {
            stop_loss,
            take_profit,
        }
    }

    /// Combine two pairs, keeping the stop and target that favor the position
    pub fn most_favorable(self, other: SlTp, direction: Direction) -> SlTp {
        match direction {
            Direction::Long => SlTp::new(
                self.stop_loss.max(other.stop_loss),
                self.take_profit.max(other.take_profit),
            ),
            Direction::Short => SlTp::new(
                self.stop_loss.min(other.stop_loss),
                self.take_profit.min(other.take_profit),
            ),
        }
    }

    /// Whether the pair brackets `entry` on the correct sides
    pub fn straddles(&self, entry: Decimal, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.stop_loss < entry && entry < self.take_profit,
            Direction::Short => self.take_profit < entry && entry < self.stop_loss,
        }
    }
}

/// Why capital-affecting operations are locked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockReason {
    /// Too many losing closes in a row
    ConsecutiveLosses(u32),
    /// Realized equity fell this fraction below its peak
    MaxDrawdownReached(Decimal),
    /// Cumulative realized loss reached this fraction of starting equity
    MaxTotalLossReached(Decimal),
    /// Free capital is gone
    CapitalExhausted(Decimal),
    /// Operator kill switch
    Manual(String),
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockReason::ConsecutiveLosses(n) => write!(f, "{n} consecutive losing trades"),
            LockReason::MaxDrawdownReached(pct) => {
                write!(f, "drawdown of {:.2}% from peak", pct * Decimal::ONE_HUNDRED)
            }
            LockReason::MaxTotalLossReached(pct) => {
                write!(f, "total loss of {:.2}%", pct * Decimal::ONE_HUNDRED)
            }
            LockReason::CapitalExhausted(capital) => write!(f, "capital exhausted ({capital})"),
            LockReason::Manual(reason) => write!(f, "manual lock: {reason}"),
        }
    }
}

/// Point-in-time view of the risk state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub locked: bool,
    pub lock_reason: Option<String>,
    pub locked_since: Option<DateTime<Utc>>,
    pub consecutive_losses: u32,
    pub cumulative_pnl: Decimal,
    pub peak_equity: Decimal,
    pub trade_count: u64,
    pub capital: Decimal,
}
