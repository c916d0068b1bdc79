//! End-to-end engine scenarios

use guardrail_bot::config::Config;
use guardrail_bot::engine::{EngineError, Mode, TickOutcome, TradingEngine};
use guardrail_bot::ledger::{LedgerError, OrderKind, Side};
use guardrail_bot::market::SimulatedMarket;
use guardrail_bot::risk::{Direction, RiskPolicy, RiskSnapshot, SlTp};
use guardrail_bot::storage::{LogLevel, MemoryStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn config(mode: Mode) -> Config {
    let mut config = Config::default();
    config.bot.capital = dec!(1000);
    config.bot.mode = mode;
    config.strategy.tick_interval_ms = 10;
    config.strategy.stop_timeout_secs = 1;
    config
}

/// Policy that never locks and accepts every entry
#[derive(Default)]
struct PermissivePolicy {
    trades: u64,
    capital: Decimal,
}

impl RiskPolicy for PermissivePolicy {
    fn is_locked(&self) -> bool {
        false
    }

    fn lock_reason(&self) -> Option<String> {
        None
    }

    fn check_position_size(&self, _proposed_size: Decimal, _capital: Decimal) -> bool {
        true
    }

    fn check_open_positions(&self, _open_count: usize) -> bool {
        true
    }

    fn should_cancel_trade(&self, _rsi: Decimal, _trend_confirmed: bool) -> bool {
        false
    }

    fn calculate_dynamic_sltp(&self, entry_price: Decimal, _atr: Decimal, direction: Direction) -> SlTp {
        match direction {
            Direction::Long => SlTp::new(entry_price - dec!(1), entry_price + dec!(2)),
            Direction::Short => SlTp::new(entry_price + dec!(1), entry_price - dec!(2)),
        }
    }

    fn update_sltp_if_trend_continues(
        &self,
        _current_price: Decimal,
        current: SlTp,
        _direction: Direction,
        _atr: Decimal,
    ) -> SlTp {
        current
    }

    fn update_on_trade(&mut self, _realized_pnl: Decimal, new_capital: Decimal) {
        self.trades += 1;
        self.capital = new_capital;
    }

    fn rebase_capital(&mut self, capital: Decimal) {
        self.capital = capital;
    }

    fn lock(&mut self, _reason: String) {}

    fn unlock(&mut self) {}

    fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            locked: false,
            lock_reason: None,
            locked_since: None,
            consecutive_losses: 0,
            cumulative_pnl: Decimal::ZERO,
            peak_equity: Decimal::ZERO,
            trade_count: self.trades,
            capital: self.capital,
        }
    }
}

#[tokio::test]
async fn test_oversold_tick_opens_long() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    market.set_rsi(dec!(25)).await;
    let engine = TradingEngine::new(&config(Mode::Auto), market, None);

    let outcome = assert_ok!(engine.tick().await);

    assert!(matches!(outcome, TickOutcome::Opened(ref o) if o.side == Side::Buy));
    let status = engine.status().await;
    assert_eq!(status.history.len(), 1);
    assert_eq!(status.open_orders.len(), 1);
    assert!(status.position_size > dec!(0));
    let order = &status.history[0];
    assert_eq!(status.capital, dec!(1000) - order.quantity * order.price);
    assert!(!status.locked);
}

#[tokio::test]
async fn test_entry_tick_sets_stop_and_target() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    market.set_rsi(dec!(75)).await;
    let engine = TradingEngine::new(&config(Mode::Auto), market, None);

    assert!(matches!(engine.tick().await.unwrap(), TickOutcome::Opened(_)));

    let status = engine.status().await;
    let sltp = status.sltp.unwrap();
    assert!(sltp.straddles(status.entry_price, Direction::Short));
}

#[tokio::test]
async fn test_locked_manual_order_fails() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    let engine = TradingEngine::new(&config(Mode::Manual), market, None);
    engine.execute_manual_order("BUY", dec!(1)).await.unwrap();
    engine.lock("halt").await;
    let before = engine.status().await.open_orders.len();

    let err = assert_err!(engine.execute_manual_order("BUY", dec!(1)).await);

    assert!(matches!(err, EngineError::Ledger(LedgerError::RiskLocked(_))));
    assert_eq!(engine.status().await.open_orders.len(), before);
}

#[tokio::test]
async fn test_close_long_realizes_pnl_and_resets() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    let engine = TradingEngine::new(&config(Mode::Auto), market.clone(), None);
    market.set_rsi(dec!(25)).await;
    engine.tick().await.unwrap();
    market.set_rsi(dec!(50)).await;
    engine.tick().await.unwrap();

    let status = engine.status().await;
    let size = status.position_size;
    let entry = status.entry_price;
    assert!(status.sltp.is_some());

    market.set_price(dec!(130)).await;
    let order = engine.close(Side::Sell, size).await.unwrap();

    assert_eq!(order.kind, OrderKind::Close);
    assert_eq!(order.pnl, size * (dec!(130) - entry));
    let status = engine.status().await;
    assert_eq!(status.position_size, dec!(0));
    assert_eq!(status.entry_price, dec!(0));
    assert!(status.sltp.is_none());
    assert!(status.direction.is_none());
}

#[tokio::test]
async fn test_full_cash_buy_can_be_closed() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    let engine = TradingEngine::new(&config(Mode::Manual), market, None);

    assert_ok!(engine.execute_manual_order("BUY", dec!(10)).await);
    let status = engine.status().await;
    assert_eq!(status.capital, dec!(0));
    assert!(!status.locked);

    let order = assert_ok!(engine.execute_manual_order("SELL", dec!(10)).await);

    assert_eq!(order.kind, OrderKind::Close);
    let status = engine.status().await;
    assert_eq!(status.position_size, dec!(0));
    assert_eq!(status.capital, dec!(1000));
}

#[tokio::test]
async fn test_custom_policy_is_used() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    market.set_rsi(dec!(5)).await;
    let engine = TradingEngine::with_policy(
        &config(Mode::Auto),
        market,
        None,
        Box::new(PermissivePolicy::default()),
    );

    // The standard policy would cancel at RSI 5; this one does not
    assert!(matches!(engine.tick().await.unwrap(), TickOutcome::Opened(_)));
    assert_eq!(
        engine.tick().await.unwrap(),
        TickOutcome::Trailed(SlTp::new(dec!(99), dec!(102)))
    );

    engine.lock("ignored").await;
    assert!(!engine.status().await.locked);
}

#[tokio::test]
async fn test_running_loop_trades_and_stops() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    market.set_rsi(dec!(75)).await;
    let store = Arc::new(MemoryStore::new());
    let engine = TradingEngine::new(&config(Mode::Auto), market, Some(store.clone()));

    engine.start().await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    engine.stop().await;

    let status = engine.status().await;
    assert!(!status.running);
    assert_eq!(status.direction, Some(Direction::Short));
    // One entry, then only SL/TP refreshes
    assert_eq!(status.history.len(), 1);
    assert!(status.sltp.is_some());

    let orders = store.orders().await;
    assert_eq!(orders.len(), 1);
    let history_after_stop = status.history.len();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(engine.status().await.history.len(), history_after_stop);
}

#[tokio::test]
async fn test_switching_to_manual_pauses_entries() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    market.set_rsi(dec!(25)).await;
    let engine = TradingEngine::new(&config(Mode::Auto), market, None);

    engine.set_mode(Mode::Manual).await;

    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Inactive);
    assert!(engine.status().await.history.is_empty());
}

#[tokio::test]
async fn test_consecutive_losses_lock_and_log() {
    let market = Arc::new(SimulatedMarket::new(dec!(100)));
    let store = Arc::new(MemoryStore::new());
    let engine = TradingEngine::new(&config(Mode::Manual), market.clone(), Some(store.clone()));

    for _ in 0..3 {
        market.set_price(dec!(100)).await;
        engine.execute_manual_order("buy", dec!(0.1)).await.unwrap();
        market.set_price(dec!(99)).await;
        engine.execute_manual_order("sell", dec!(0.1)).await.unwrap();
    }

    let status = engine.status().await;
    assert!(status.locked);
    assert_eq!(status.risk.consecutive_losses, 3);
    assert!(status
        .lock_reason
        .as_deref()
        .is_some_and(|r| r.contains("consecutive")));

    let err = engine.execute_manual_order("buy", dec!(0.1)).await.unwrap_err();
    assert!(matches!(err, EngineError::Ledger(LedgerError::RiskLocked(_))));
    let logs = store.logs().await;
    assert!(logs
        .iter()
        .any(|e| e.level == LogLevel::Warning && e.message.contains("rejected")));

    engine.unlock().await;
    assert!(engine.execute_manual_order("buy", dec!(0.1)).await.is_ok());
}
