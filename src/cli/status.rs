//! Status command implementation

use clap::Args;

use crate::config::Config;
use crate::ledger::DEFAULT_HISTORY_LIMIT;
use crate::storage::JsonlStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of recent events to show
    #[arg(long, default_value_t = 10)]
    pub events: usize,
}

impl StatusArgs {
    /// Print the last recorded position, orders and events
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if !config.storage.enabled {
            println!("Storage is disabled; no recorded state");
            return Ok(());
        }

        let store = JsonlStore::open(&config.storage.dir).await?;
        let positions = store.positions().await?;
        let orders = store.orders().await?;
        let logs = store.logs().await?;

        println!("guardrail-bot status ({})", store.dir().display());
        match positions.last() {
            Some(p) => println!(
                "  {}: size {} entry {} capital {} (as of {})",
                p.symbol, p.size, p.entry_price, p.capital, p.timestamp
            ),
            None => println!("  No position recorded"),
        }

        println!("Recent orders:");
        for order in orders.iter().rev().take(DEFAULT_HISTORY_LIMIT).rev() {
            println!(
                "  {} {:?} {} {} {} @ {} pnl {}",
                order.timestamp,
                order.kind,
                order.side,
                order.quantity,
                order.symbol,
                order.price,
                order.pnl
            );
        }

        println!("Recent events:");
        for entry in logs.iter().rev().take(self.events).rev() {
            println!("  {} [{}] {}", entry.timestamp, entry.level, entry.message);
        }

        Ok(())
    }
}
