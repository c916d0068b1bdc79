//! Equity curve Parquet files

use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::StorageError;
use crate::backtest::EquityPoint;

/// Equity curve schema fields
pub fn equity_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("equity", DataType::Utf8, false), // Store as string for Decimal precision
    ])
}

/// Write an equity curve to a Snappy-compressed Parquet file
pub fn write_equity_curve(path: &Path, curve: &[EquityPoint]) -> Result<(), StorageError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let schema = Arc::new(equity_schema());
    let file = File::create(path)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let timestamps: Vec<i64> = curve.iter().map(|p| p.timestamp.timestamp_micros()).collect();
    let equity: Vec<String> = curve.iter().map(|p| p.equity.to_string()).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")) as ArrayRef,
            Arc::new(StringArray::from(
                equity.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )) as ArrayRef,
        ],
    )?;

    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = ?path, count = curve.len(), "Wrote equity curve to Parquet");

    Ok(())
}

/// Read an equity curve written by [`write_equity_curve`]
pub fn read_equity_curve(path: &Path) -> Result<Vec<EquityPoint>, StorageError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut curve = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;

        let timestamps = batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .ok_or_else(|| StorageError::Corrupt("invalid timestamp column".into()))?;

        let equity = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StorageError::Corrupt("invalid equity column".into()))?;

        for i in 0..batch.num_rows() {
            let timestamp = DateTime::from_timestamp_micros(timestamps.value(i))
                .ok_or_else(|| StorageError::Corrupt("invalid timestamp".into()))?;
            let value = Decimal::from_str(equity.value(i))
                .map_err(|e| StorageError::Corrupt(e.to_string()))?;

            curve.push(EquityPoint {
                timestamp,
                equity: value,
            });
        }
    }

    Ok(curve)
}
