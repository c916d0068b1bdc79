//! Example configuration

use guardrail_bot::config::{Config, MarketSource};
use guardrail_bot::engine::Mode;
use rust_decimal_macros::dec;
use std::io::Write;

#[test]
fn test_config_example_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");

    let config = Config::load(path).unwrap();

    assert_eq!(config.bot.symbol, "BTCUSDT");
    assert_eq!(config.bot.mode, Mode::Manual);
    assert_eq!(config.market.source, MarketSource::Binance);
    assert_eq!(config.risk.max_position_pct, dec!(0.01));
    assert_eq!(config.strategy.order_size_pct, dec!(0.01));
}

#[test]
fn test_invalid_config_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [strategy]
        rsi_oversold = 70
        rsi_overbought = 30
        "#
    )
    .unwrap();

    assert!(Config::load(file.path()).is_err());
}
