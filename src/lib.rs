//! guardrail-bot: Risk-gated single-instrument trading bot
//!
//! This library provides the core components for:
//! - A position ledger that is the only writer of position and capital
//! - A periodic trading loop with manual and automatic modes
//! - ATR volatility and RSI indicators
//! - A risk policy that gates, sizes and locks trading
//! - Binance REST and simulated market data
//! - JSON-lines and Parquet persistence
//! - Candle-replay backtesting
//! - Structured logging and Prometheus metrics

pub mod backtest;
pub mod cli;
pub mod config;
pub mod engine;
pub mod indicator;
pub mod ledger;
pub mod market;
pub mod risk;
pub mod storage;
pub mod telemetry;
