//! Backtest command implementation

use anyhow::bail;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;

use super::{build_market, open_store};
use crate::backtest::{BacktestRequest, BacktestRunner};
use crate::config::{Config, MarketSource};
use crate::market::Interval;

/// Result output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// Start time (YYYY-MM-DD, "YYYY-MM-DD HH:MM:SS" or RFC 3339, UTC)
    #[arg(long)]
    pub start: String,

    /// End time (same formats as --start)
    #[arg(long)]
    pub end: String,

    /// Symbol, defaults to the configured one
    #[arg(long)]
    pub symbol: Option<String>,

    /// Initial capital, defaults to the configured one
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Candle interval
    #[arg(long, default_value = "5m")]
    pub interval: Interval,

    /// Replay the simulated market
    #[arg(long)]
    pub paper: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl BacktestArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if self.paper {
            config.market.source = MarketSource::Paper;
        }

        let mut request = BacktestRequest::new(
            self.symbol.clone().unwrap_or_else(|| config.bot.symbol.clone()),
            parse_datetime(&self.start)?,
            parse_datetime(&self.end)?,
            self.capital.unwrap_or(config.bot.capital),
        );
        request.interval = self.interval;

        let mut runner = BacktestRunner::new(build_market(&config.market)?);
        if let Some(store) = open_store(&config.storage).await? {
            runner = runner.with_store(store);
        }

        let result = match runner.run(&request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, symbol = %request.symbol, "Backtest failed");
                return Err(e.into());
            }
        };

        match self.format {
            OutputFormat::Table => println!("{}", result.summary.format_table()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        }
        Ok(())
    }
}

/// Parse a UTC timestamp given as a date, a date-time or RFC 3339
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    bail!("invalid date: {s:?}")
}
