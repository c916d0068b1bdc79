//! CLI interface for guardrail-bot
//!
//! Provides subcommands for:
//! - `run`: Start the engine with an operator console
//! - `backtest`: Replay historical candles
//! - `status`: Show recorded state
//! - `config`: Show the effective configuration

mod backtest;
mod command;
mod run;
mod status;

pub use backtest::{parse_datetime, BacktestArgs, OutputFormat};
pub use command::{CommandError, OperatorCommand, HELP};
pub use run::RunArgs;
pub use status::StatusArgs;

use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::{MarketConfig, MarketSource, StorageConfig};
use crate::market::{BinanceClient, MarketDataClient, SimulatedMarket};
use crate::storage::{JsonlStore, PersistenceStore};

#[derive(Parser, Debug)]
#[command(name = "guardrail-bot")]
#[command(about = "Risk-gated single-instrument trading bot")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the engine and read operator commands from stdin
    Run(RunArgs),
    /// Replay historical candles
    Backtest(BacktestArgs),
    /// Show recorded position, orders and events
    Status(StatusArgs),
    /// Show the effective configuration
    Config,
}

/// Market data client for the configured source
pub fn build_market(config: &MarketConfig) -> anyhow::Result<Arc<dyn MarketDataClient>> {
    let market: Arc<dyn MarketDataClient> = match config.source {
        MarketSource::Binance => Arc::new(BinanceClient::with_config(config.binance())?),
        MarketSource::Paper => Arc::new(SimulatedMarket::with_wave(
            config.paper_base_price,
            config.paper_amplitude,
            config.paper_period_steps,
        )),
    };
    tracing::info!(source = ?config.source, "Market data source ready");
    Ok(market)
}

/// Persistence store, `None` when storage is disabled
pub async fn open_store(
    config: &StorageConfig,
) -> anyhow::Result<Option<Arc<dyn PersistenceStore>>> {
    if !config.enabled {
        tracing::info!("Storage disabled");
        return Ok(None);
    }
    let store = JsonlStore::open(&config.dir).await?;
    Ok(Some(Arc::new(store)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from(["guardrail-bot", "run", "--paper", "--mode", "auto"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert!(args.paper);
                assert_eq!(args.mode, Some(crate::engine::Mode::Auto));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.config, "config.toml");
    }

    #[test]
    fn test_parse_backtest_args() {
        let cli = Cli::try_parse_from([
            "guardrail-bot",
            "-c",
            "bot.toml",
            "backtest",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-02",
            "--capital",
            "2500",
        ])
        .unwrap();
        assert_eq!(cli.config, "bot.toml");
        assert!(matches!(cli.command, Commands::Backtest(_)));
    }

    #[tokio::test]
    async fn test_open_store_disabled() {
        let config = StorageConfig {
            enabled: false,
            ..StorageConfig::default()
        };
        assert!(open_store(&config).await.unwrap().is_none());
    }

    #[test]
    fn test_build_paper_market() {
        let config = MarketConfig {
            source: MarketSource::Paper,
            ..MarketConfig::default()
        };
        assert!(build_market(&config).is_ok());
    }
}
