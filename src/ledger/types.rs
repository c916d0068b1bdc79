//! Order and position types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::risk::Direction;

/// Order identifier
pub type OrderId = Uuid;

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side that reduces a position in `direction`
    pub fn closing(direction: Direction) -> Self {
        match direction {
            Direction::Long => Side::Sell,
            Direction::Short => Side::Buy,
        }
    }

    /// Signed multiplier applied to position size
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// Error for a side string that is neither BUY nor SELL
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid side: {0:?}")]
pub struct ParseSideError(pub String);

impl FromStr for Side {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(ParseSideError(s.to_string())),
        }
    }
}

/// Whether an order opened or reduced the position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Open,
    Close,
}

/// Order status
///
/// Every order the ledger records is filled on the spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Filled,
}

/// A recorded order, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier
    pub id: OrderId,
    /// Traded symbol
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    /// Fill price
    pub price: Decimal,
    pub status: OrderStatus,
    /// Realized P&L, zero for opening orders
    pub pnl: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub(crate) fn filled(
        symbol: &str,
        side: Side,
        kind: OrderKind,
        quantity: Decimal,
        price: Decimal,
        pnl: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            kind,
            quantity,
            price,
            status: OrderStatus::Filled,
            pnl,
            timestamp: Utc::now(),
        }
    }
}

/// The single position held for the traded instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Signed size: positive long, negative short, zero flat
    pub size: Decimal,
    /// Entry price, zero while flat
    pub entry_price: Decimal,
    /// Free capital
    pub capital: Decimal,
}

impl Position {
    /// A flat position holding `capital`
    pub fn flat(capital: Decimal) -> Self {
        Self {
            size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            capital,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    /// Direction of the position, `None` while flat
    pub fn direction(&self) -> Option<Direction> {
        Direction::of(self.size)
    }
}

/// Ledger operation errors
///
/// None of these mutate the ledger.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    /// The risk policy refuses capital-affecting operations
    #[error("Risk locked: {0}")]
    RiskLocked(String),
    /// Close quantity exceeds the open position
    #[error("Close of {requested} exceeds position of {available}")]
    OversizedClose {
        requested: Decimal,
        available: Decimal,
    },
    /// The close side would grow the position instead of reducing it
    #[error("{side} does not reduce the current position")]
    NotReducing { side: Side },
    /// The open side is opposite to the current position
    #[error("{side} opposes the open position; close it first")]
    OpposingPosition { side: Side },
    /// Quantity or price is not positive
    #[error("Invalid quantity {quantity} at price {price}")]
    InvalidQuantity { quantity: Decimal, price: Decimal },
}
