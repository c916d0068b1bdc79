//! Backtest analytics and reporting

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::Interval;

/// Equity at the close of one candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Summary statistics from backtest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    /// Number of candles replayed
    pub candles: usize,
    /// Equity at the first candle
    pub start_equity: Decimal,
    /// Equity at the last candle
    pub end_equity: Decimal,
    /// End minus start equity
    pub net_pnl: Decimal,
    /// Net P&L as a fraction of start equity
    pub total_return: Decimal,
    /// Maximum drawdown (absolute)
    pub max_drawdown: Decimal,
    /// Maximum drawdown as a fraction of the running peak
    pub max_drawdown_pct: Decimal,
}

impl BacktestSummary {
    /// Compute summary statistics over an equity curve
    pub fn from_equity(curve: &[EquityPoint]) -> Self {
        let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
            return Self::default();
        };

        let mut peak = first.equity;
        let mut max_drawdown = Decimal::ZERO;
        let mut max_drawdown_pct = Decimal::ZERO;
        for point in curve {
            peak = peak.max(point.equity);
            let drawdown = peak - point.equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
            if peak > Decimal::ZERO {
                max_drawdown_pct = max_drawdown_pct.max(drawdown / peak);
            }
        }

        let net_pnl = last.equity - first.equity;
        let total_return = if first.equity.is_zero() {
            Decimal::ZERO
        } else {
            net_pnl / first.equity
        };

        Self {
            candles: curve.len(),
            start_equity: first.equity,
            end_equity: last.equity,
            net_pnl,
            total_return,
            max_drawdown,
            max_drawdown_pct,
        }
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST RESULTS
══════════════════════════════════════════════════════

PERFORMANCE
───────────────────────────────────────────────────────
Start Equity:     {:.2}
End Equity:       {:.2}
Net P&L:          {:+.2} ({:+.2}%)
Max Drawdown:     {:.2} ({:.2}%)

ACTIVITY
───────────────────────────────────────────────────────
Candles:          {}
══════════════════════════════════════════════════════
"#,
            self.start_equity,
            self.end_equity,
            self.net_pnl,
            self.total_return * dec!(100),
            self.max_drawdown,
            self.max_drawdown_pct * dec!(100),
            self.candles,
        )
    }
}

/// Complete backtest results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub id: Uuid,
    pub symbol: String,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub initial_capital: Decimal,
    /// Summary statistics
    pub summary: BacktestSummary,
    /// One point per replayed candle, oldest first
    pub equity_curve: Vec<EquityPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn curve(values: &[Decimal]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, equity)| EquityPoint {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 300, 0).unwrap(),
                equity: *equity,
            })
            .collect()
    }

    #[test]
    fn test_empty_curve() {
        assert_eq!(BacktestSummary::from_equity(&[]), BacktestSummary::default());
    }

    #[test]
    fn test_flat_curve() {
        let summary = BacktestSummary::from_equity(&curve(&[dec!(1000); 12]));

        assert_eq!(summary.candles, 12);
        assert_eq!(summary.net_pnl, dec!(0));
        assert_eq!(summary.total_return, dec!(0));
        assert_eq!(summary.max_drawdown, dec!(0));
    }

    #[test]
    fn test_drawdown_from_running_peak() {
        let summary = BacktestSummary::from_equity(&curve(&[
            dec!(1000),
            dec!(1200),
            dec!(900),
            dec!(1100),
        ]));

        assert_eq!(summary.max_drawdown, dec!(300));
        assert_eq!(summary.max_drawdown_pct, dec!(0.25));
        assert_eq!(summary.net_pnl, dec!(100));
        assert_eq!(summary.total_return, dec!(0.1));
    }

    #[test]
    fn test_format_table() {
        let summary = BacktestSummary::from_equity(&curve(&[dec!(1000), dec!(1010)]));
        let table = summary.format_table();

        assert!(table.contains("BACKTEST RESULTS"));
        assert!(table.contains("Candles:          2"));
    }
}
