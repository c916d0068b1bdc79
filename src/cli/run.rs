//! Run command implementation

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{build_market, open_store, OperatorCommand, HELP};
use crate::config::{Config, MarketSource};
use crate::engine::{ConfigUpdate, Mode, TradingEngine};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the configured trading mode (auto or manual)
    #[arg(long)]
    pub mode: Option<Mode>,

    /// Trade against the simulated market
    #[arg(long)]
    pub paper: bool,

    /// Wait for `start` before running the trading loop
    #[arg(long)]
    pub no_start: bool,
}

impl RunArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if let Some(mode) = self.mode {
            config.bot.mode = mode;
        }
        if self.paper {
            config.market.source = MarketSource::Paper;
        }

        let market = build_market(&config.market)?;
        let store = open_store(&config.storage).await?;
        let engine = TradingEngine::new(&config, market, store);

        tracing::info!(
            symbol = %config.bot.symbol,
            mode = %config.bot.mode,
            capital = %config.bot.capital,
            "Engine ready"
        );

        if !self.no_start {
            engine.start().await;
        }
        println!("{HELP}");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupt received, shutting down");
                    break;
                }
                line = lines.next_line(), if stdin_open => {
                    match line? {
                        Some(line) if line.trim().is_empty() => {}
                        Some(line) => {
                            if !handle_line(&engine, &line).await {
                                break;
                            }
                        }
                        None => {
                            tracing::info!("Console closed, running until interrupted");
                            stdin_open = false;
                        }
                    }
                }
            }
        }

        if engine.is_running() {
            engine.stop().await;
        }
        Ok(())
    }
}

/// Execute one console line; returns false when the operator quits
async fn handle_line(engine: &TradingEngine, line: &str) -> bool {
    let command = match line.parse::<OperatorCommand>() {
        Ok(command) => command,
        Err(e) => {
            println!("{e}");
            return true;
        }
    };

    match command {
        OperatorCommand::Order { side, quantity } => {
            match engine.execute_manual_order(&side, quantity).await {
                Ok(order) => println!(
                    "{:?} {} {} {} @ {} (P&L {})",
                    order.kind, order.side, order.quantity, order.symbol, order.price, order.pnl
                ),
                Err(e) => println!("Order rejected: {e}"),
            }
        }
        OperatorCommand::Mode(mode) => engine.set_mode(mode).await,
        OperatorCommand::Symbol(symbol) => {
            engine
                .update_config(ConfigUpdate {
                    symbol: Some(symbol),
                    ..ConfigUpdate::default()
                })
                .await
        }
        OperatorCommand::Capital(capital) => {
            engine
                .update_config(ConfigUpdate {
                    capital: Some(capital),
                    ..ConfigUpdate::default()
                })
                .await
        }
        OperatorCommand::Leverage(leverage) => {
            engine
                .update_config(ConfigUpdate {
                    leverage: Some(leverage),
                    ..ConfigUpdate::default()
                })
                .await
        }
        OperatorCommand::Start => engine.start().await,
        OperatorCommand::Stop => engine.stop().await,
        OperatorCommand::Status => println!("{}", engine.status().await.summary()),
        OperatorCommand::Lock(reason) => engine.lock(reason).await,
        OperatorCommand::Unlock => engine.unlock().await,
        OperatorCommand::Help => println!("{HELP}"),
        OperatorCommand::Quit => return false,
    }

    true
}
