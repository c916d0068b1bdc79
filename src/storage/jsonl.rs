//! JSON-lines file store

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task;

use super::{write_equity_curve, LogEntry, PersistenceStore, PositionRecord, StorageError};
use crate::backtest::BacktestResult;
use crate::ledger::Order;

pub const ORDERS_FILE: &str = "orders.jsonl";
pub const POSITIONS_FILE: &str = "positions.jsonl";
pub const LOGS_FILE: &str = "logs.jsonl";
pub const BACKTESTS_FILE: &str = "backtests.jsonl";

/// Append-only store writing one JSON document per line
///
/// Each record kind gets its own file under `dir`. Backtest equity curves
/// are additionally written as `equity_<id>.parquet`.
pub struct JsonlStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        tracing::info!(dir = ?dir, "JSONL store opened");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the Parquet equity curve for a backtest
    pub fn equity_path(&self, result: &BacktestResult) -> PathBuf {
        self.dir.join(format!("equity_{}.parquet", result.id))
    }

    async fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .await?;
        handle.write_all(&line).await?;
        handle.flush().await?;
        Ok(())
    }

    async fn read_all<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StorageError> {
        let path = self.dir.join(file);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }

    /// All recorded orders, oldest first
    pub async fn orders(&self) -> Result<Vec<Order>, StorageError> {
        self.read_all(ORDERS_FILE).await
    }

    /// All recorded position snapshots, oldest first
    pub async fn positions(&self) -> Result<Vec<PositionRecord>, StorageError> {
        self.read_all(POSITIONS_FILE).await
    }

    /// The event log, oldest first
    pub async fn logs(&self) -> Result<Vec<LogEntry>, StorageError> {
        self.read_all(LOGS_FILE).await
    }

    /// All recorded backtests, oldest first
    pub async fn backtests(&self) -> Result<Vec<BacktestResult>, StorageError> {
        self.read_all(BACKTESTS_FILE).await
    }
}

#[async_trait]
impl PersistenceStore for JsonlStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
        self.append(ORDERS_FILE, order).await
    }

    async fn update_position(&self, record: &PositionRecord) -> Result<(), StorageError> {
        self.append(POSITIONS_FILE, record).await
    }

    async fn insert_log(&self, entry: &LogEntry) -> Result<(), StorageError> {
        self.append(LOGS_FILE, entry).await
    }

    async fn insert_backtest_result(&self, result: &BacktestResult) -> Result<(), StorageError> {
        self.append(BACKTESTS_FILE, result).await?;

        // Parquet writes are synchronous file I/O
        let path = self.equity_path(result);
        let curve = result.equity_curve.clone();
        task::spawn_blocking(move || write_equity_curve(&path, &curve)).await??;
        tracing::info!(id = %result.id, symbol = %result.symbol, "Backtest result stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{OrderKind, Side};
    use crate::storage::{LogLevel, PositionRecord};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("data").join("bot");

        let store = JsonlStore::open(&root).await.unwrap();

        assert!(root.is_dir());
        assert_eq!(store.dir(), root.as_path());
    }

    #[tokio::test]
    async fn test_empty_store_reads_nothing() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();

        assert!(store.orders().await.unwrap().is_empty());
        assert!(store.logs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orders_and_logs_append_in_order() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();

        let first = Order::filled("BTCUSDT", Side::Buy, OrderKind::Open, dec!(0.5), dec!(100), dec!(0));
        let second = Order::filled("BTCUSDT", Side::Sell, OrderKind::Close, dec!(0.5), dec!(110), dec!(5));
        store.insert_order(&first).await.unwrap();
        store.insert_order(&second).await.unwrap();
        store
            .insert_log(&LogEntry::new(LogLevel::Info, "BTCUSDT", "Bot started"))
            .await
            .unwrap();

        let orders = store.orders().await.unwrap();
        assert_eq!(orders, vec![first, second]);

        let logs = store.logs().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "Bot started");
        assert_eq!(logs[0].level, LogLevel::Info);
    }

    #[tokio::test]
    async fn test_position_snapshot_persisted() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();
        let position = crate::ledger::Position {
            size: dec!(-0.25),
            entry_price: dec!(42000),
            capital: dec!(20500),
        };

        store
            .update_position(&PositionRecord::snapshot("BTCUSDT", &position))
            .await
            .unwrap();

        let positions = store.positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].size, dec!(-0.25));
        assert_eq!(positions[0].entry_price, dec!(42000));
    }

    #[tokio::test]
    async fn test_backtest_result_writes_equity_file() {
        use crate::backtest::{BacktestSummary, EquityPoint};
        use chrono::{TimeZone, Utc};

        let dir = tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let equity_curve: Vec<EquityPoint> = (0..4)
            .map(|i| EquityPoint {
                timestamp: start + chrono::Duration::minutes(5 * (i + 1)),
                equity: dec!(1000),
            })
            .collect();
        let result = BacktestResult {
            id: uuid::Uuid::new_v4(),
            symbol: "BTCUSDT".into(),
            interval: crate::market::Interval::FiveMinutes,
            start,
            end: start + chrono::Duration::minutes(20),
            initial_capital: dec!(1000),
            summary: BacktestSummary::from_equity(&equity_curve),
            equity_curve,
        };

        store.insert_backtest_result(&result).await.unwrap();

        let stored = store.backtests().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, result.id);
        let curve = crate::storage::read_equity_curve(&store.equity_path(&result)).unwrap();
        assert_eq!(curve, result.equity_curve);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_reported() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join(LOGS_FILE), "not json\n")
            .await
            .unwrap();

        assert!(matches!(
            store.logs().await,
            Err(StorageError::Serialize(_))
        ));
    }
}
