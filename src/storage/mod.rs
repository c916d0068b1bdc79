//! Persistence module
//!
//! Records orders, position snapshots, the event log and backtest results.
//! Persistence is best effort: the engine logs a [`StorageError`] and keeps
//! the in-memory state it already committed.

mod equity;
mod jsonl;
mod memory;

pub use equity::{equity_schema, read_equity_curve, write_equity_curve};
pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::backtest::BacktestResult;
use crate::ledger::{Order, Position};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Blocking write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Severity of an event-log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.write_str("INFO"),
            LogLevel::Warning => f.write_str("WARNING"),
            LogLevel::Error => f.write_str("ERROR"),
        }
    }
}

/// Event-log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub symbol: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            symbol: symbol.into(),
            message: message.into(),
        }
    }
}

/// Position snapshot taken after a mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub capital: Decimal,
}

impl PositionRecord {
    pub fn snapshot(symbol: impl Into<String>, position: &Position) -> Self {
        Self {
            timestamp: Utc::now(),
            symbol: symbol.into(),
            size: position.size,
            entry_price: position.entry_price,
            capital: position.capital,
        }
    }
}

/// Trait for persistence backends
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Record a filled order
    async fn insert_order(&self, order: &Order) -> Result<(), StorageError>;

    /// Record the position after a mutation
    async fn update_position(&self, record: &PositionRecord) -> Result<(), StorageError>;

    /// Append an event-log entry
    async fn insert_log(&self, entry: &LogEntry) -> Result<(), StorageError>;

    /// Record a finished backtest
    async fn insert_backtest_result(&self, result: &BacktestResult) -> Result<(), StorageError>;
}
