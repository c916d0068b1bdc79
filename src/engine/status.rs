//! Engine status snapshot

use rust_decimal::Decimal;
use serde::Serialize;

use super::Mode;
use crate::ledger::Order;
use crate::risk::{Direction, RiskSnapshot, SlTp};

/// Point-in-time engine state, taken under the exclusive section
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub mode: Mode,
    pub symbol: String,
    pub leverage: u32,
    /// Free capital
    pub capital: Decimal,
    /// Signed position size
    pub position_size: Decimal,
    /// Zero while flat
    pub entry_price: Decimal,
    pub direction: Option<Direction>,
    pub sltp: Option<SlTp>,
    pub open_orders: Vec<Order>,
    /// Most recent orders, oldest first
    pub history: Vec<Order>,
    pub locked: bool,
    pub lock_reason: Option<String>,
    pub risk: RiskSnapshot,
}

impl EngineStatus {
    /// Short multi-line summary for the operator console
    pub fn summary(&self) -> String {
        let position = match self.direction {
            Some(direction) => format!(
                "{} {} @ {}",
                direction,
                self.position_size.abs(),
                self.entry_price
            ),
            None => "flat".to_string(),
        };
        let sltp = match self.sltp {
            Some(sltp) => format!("SL {} / TP {}", sltp.stop_loss, sltp.take_profit),
            None => "-".to_string(),
        };
        let lock = match (&self.lock_reason, self.locked) {
            (Some(reason), true) => format!("LOCKED ({reason})"),
            (None, true) => "LOCKED".to_string(),
            _ => "unlocked".to_string(),
        };

        format!(
            "{} [{}] {}\n  Position: {}\n  SL/TP:    {}\n  Capital:  {} (leverage {}x)\n  P&L:      {} over {} trades\n  Risk:     {}",
            self.symbol,
            self.mode,
            if self.running { "running" } else { "stopped" },
            position,
            sltp,
            self.capital,
            self.leverage,
            self.risk.cumulative_pnl,
            self.risk.trade_count,
            lock,
        )
    }
}
