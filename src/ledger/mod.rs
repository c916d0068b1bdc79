//! Position ledger
//!
//! Owns the single position, free capital, open orders, order history and
//! the cached SL/TP pair. [`PositionLedger::open`] and
//! [`PositionLedger::close`] are the only writers of position and capital,
//! and the only place the risk policy learns about trade outcomes. Callers
//! are expected to hold the engine's exclusive section around every call.

mod types;

pub use types::{
    LedgerError, Order, OrderId, OrderKind, OrderStatus, ParseSideError, Position, Side,
};

use crate::risk::{Direction, RiskPolicy, SlTp};
use rust_decimal::Decimal;

/// History entries returned when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Position, capital and order bookkeeping for one instrument
#[derive(Debug, Clone)]
pub struct PositionLedger {
    symbol: String,
    position: Position,
    open_orders: Vec<Order>,
    history: Vec<Order>,
    sltp: Option<SlTp>,
}

impl PositionLedger {
    /// Create a flat ledger
    pub fn new(symbol: impl Into<String>, capital: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            position: Position::flat(capital),
            open_orders: vec![],
            history: vec![],
            sltp: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn set_symbol(&mut self, symbol: impl Into<String>) {
        self.symbol = symbol.into();
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn capital(&self) -> Decimal {
        self.position.capital
    }

    /// Overwrite free capital (operator reconfiguration)
    pub fn set_capital(&mut self, capital: Decimal) {
        self.position.capital = capital;
    }

    /// Cached SL/TP, present only while a position is open
    pub fn sltp(&self) -> Option<SlTp> {
        self.sltp
    }

    /// Cache the policy's latest SL/TP; ignored while flat
    pub fn set_sltp(&mut self, sltp: SlTp) {
        if !self.position.is_flat() {
            self.sltp = Some(sltp);
        }
    }

    pub fn open_orders(&self) -> &[Order] {
        &self.open_orders
    }

    /// The most recent `limit` orders, oldest first
    pub fn history(&self, limit: usize) -> &[Order] {
        let start = self.history.len().saturating_sub(limit);
        &self.history[start..]
    }

    /// Open or add to a position
    ///
    /// The entry price is set only when opening from flat; adding to a
    /// position keeps the first fill's price as the reference.
    pub fn open(
        &mut self,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        risk: &mut dyn RiskPolicy,
    ) -> Result<Order, LedgerError> {
        if risk.is_locked() {
            let reason = risk.lock_reason().unwrap_or_default();
            tracing::warn!(%side, reason = %reason, "Open blocked by risk lock");
            return Err(LedgerError::RiskLocked(reason));
        }
        validate(quantity, price)?;
        if let Some(direction) = self.position.direction() {
            if side == Side::closing(direction) {
                return Err(LedgerError::OpposingPosition { side });
            }
        }

        let signed = side.sign() * quantity;
        let (size, capital) = self
            .position
            .size
            .checked_add(signed)
            .zip(
                signed
                    .checked_mul(price)
                    .and_then(|cost| self.position.capital.checked_sub(cost)),
            )
            .ok_or_else(|| overflowed(quantity, price))?;

        if self.position.is_flat() {
            self.position.entry_price = price;
        }
        self.position.size = size;
        self.position.capital = capital;

        risk.update_on_trade(Decimal::ZERO, self.position.capital);

        let order = Order::filled(&self.symbol, side, OrderKind::Open, quantity, price, Decimal::ZERO);
        self.open_orders.push(order.clone());
        self.history.push(order.clone());

        tracing::info!(
            order_id = %order.id,
            %side,
            %quantity,
            %price,
            position = %self.position.size,
            capital = %self.position.capital,
            "Position opened"
        );
        Ok(order)
    }

    /// Reduce or flatten the position
    ///
    /// `atr` sizes the fresh SL/TP when part of the position remains.
    pub fn close(
        &mut self,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        atr: Decimal,
        risk: &mut dyn RiskPolicy,
    ) -> Result<Order, LedgerError> {
        if risk.is_locked() {
            let reason = risk.lock_reason().unwrap_or_default();
            tracing::warn!(%side, reason = %reason, "Close blocked by risk lock");
            return Err(LedgerError::RiskLocked(reason));
        }
        validate(quantity, price)?;

        let available = self.position.size.abs();
        let oversized = LedgerError::OversizedClose {
            requested: quantity,
            available,
        };
        if quantity > available {
            tracing::warn!(%quantity, %available, "Close larger than position");
            return Err(oversized);
        }
        let direction = self.position.direction().ok_or(oversized)?;
        if side != Side::closing(direction) {
            return Err(LedgerError::NotReducing { side });
        }

        let entry = self.position.entry_price;
        let capital = self.position.capital;
        let settled = match direction {
            Direction::Long => quantity
                .checked_mul(price)
                .and_then(|proceeds| capital.checked_add(proceeds))
                .zip(price.checked_sub(entry).and_then(|d| quantity.checked_mul(d))),
            // Approximate margin release, not an exact settlement
            Direction::Short => Decimal::TWO
                .checked_mul(entry)
                .and_then(|e| e.checked_sub(price))
                .and_then(|release| quantity.checked_mul(release))
                .and_then(|release| capital.checked_add(release))
                .zip(entry.checked_sub(price).and_then(|d| quantity.checked_mul(d))),
        };
        let (capital, realized_pnl) = settled.ok_or_else(|| overflowed(quantity, price))?;

        self.position.size -= direction_sign(direction) * quantity;
        self.position.capital = capital;

        risk.update_on_trade(realized_pnl, self.position.capital);

        if self.position.is_flat() {
            self.position.entry_price = Decimal::ZERO;
            self.sltp = None;
        } else {
            self.sltp = Some(risk.calculate_dynamic_sltp(entry, atr, direction));
        }

        let order = Order::filled(&self.symbol, side, OrderKind::Close, quantity, price, realized_pnl);
        self.history.push(order.clone());
        // Simplified settlement: drop every filled order on the closing side
        self.open_orders
            .retain(|o| !(o.status == OrderStatus::Filled && o.side == side));

        tracing::info!(
            order_id = %order.id,
            %side,
            %quantity,
            %price,
            pnl = %realized_pnl,
            position = %self.position.size,
            capital = %self.position.capital,
            "Position closed"
        );
        Ok(order)
    }
}

fn direction_sign(direction: Direction) -> Decimal {
    match direction {
        Direction::Long => Decimal::ONE,
        Direction::Short => Decimal::NEGATIVE_ONE,
    }
}

fn overflowed(quantity: Decimal, price: Decimal) -> LedgerError {
    tracing::warn!(%quantity, %price, "Order arithmetic overflowed");
    LedgerError::InvalidQuantity { quantity, price }
}

fn validate(quantity: Decimal, price: Decimal) -> Result<(), LedgerError> {
    if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
        return Err(LedgerError::InvalidQuantity { quantity, price });
    }
    Ok(())
}
