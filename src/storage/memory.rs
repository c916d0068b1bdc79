//! In-memory store

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{LogEntry, PersistenceStore, PositionRecord, StorageError};
use crate::backtest::BacktestResult;
use crate::ledger::Order;

/// Store keeping every record in memory
///
/// `set_failing(true)` makes every write return an error, which lets callers
/// exercise their persistence failure paths.
#[derive(Default)]
pub struct MemoryStore {
    orders: RwLock<Vec<Order>>,
    positions: RwLock<Vec<PositionRecord>>,
    logs: RwLock<Vec<LogEntry>>,
    backtests: RwLock<Vec<BacktestResult>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }

    pub async fn positions(&self) -> Vec<PositionRecord> {
        self.positions.read().await.clone()
    }

    pub async fn logs(&self) -> Vec<LogEntry> {
        self.logs.read().await.clone()
    }

    pub async fn backtests(&self) -> Vec<BacktestResult> {
        self.backtests.read().await.clone()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "store unavailable",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
        self.check()?;
        self.orders.write().await.push(order.clone());
        Ok(())
    }

    async fn update_position(&self, record: &PositionRecord) -> Result<(), StorageError> {
        self.check()?;
        self.positions.write().await.push(record.clone());
        Ok(())
    }

    async fn insert_log(&self, entry: &LogEntry) -> Result<(), StorageError> {
        self.check()?;
        self.logs.write().await.push(entry.clone());
        Ok(())
    }

    async fn insert_backtest_result(&self, result: &BacktestResult) -> Result<(), StorageError> {
        self.check()?;
        self.backtests.write().await.push(result.clone());
        Ok(())
    }
}
