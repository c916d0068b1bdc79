//! Technical indicators
//!
//! Average True Range for SL/TP distances and RSI for entry triggers

mod atr;
mod rsi;

pub use atr::{average_true_range, true_range, VolatilityEstimator, DEFAULT_ATR_PERIOD};
pub use rsi::{relative_strength_index, DEFAULT_RSI_PERIOD};
