//! Relative Strength Index (Wilder smoothing)

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Default RSI look-back
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// RSI of the last close in `closes`, oldest first
///
/// The first average gain/loss is the plain mean of the first `period`
/// changes; every later change is folded in with Wilder smoothing. Returns
/// `None` when fewer than `period + 1` closes are supplied. A series with no
/// movement at all reads as neutral (50).
pub fn relative_strength_index(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let n = Decimal::from(period as u64);
    let changes: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (seed, rest) = changes.split_at(period);
    let mut avg_gain = seed.iter().filter(|c| c.is_sign_positive()).copied().sum::<Decimal>() / n;
    let mut avg_loss = -seed.iter().filter(|c| c.is_sign_negative()).copied().sum::<Decimal>() / n;

    for &change in rest {
        let gain = change.max(Decimal::ZERO);
        let loss = (-change).max(Decimal::ZERO);
        avg_gain = (avg_gain * (n - Decimal::ONE) + gain) / n;
        avg_loss = (avg_loss * (n - Decimal::ONE) + loss) / n;
    }

    if avg_gain.is_zero() && avg_loss.is_zero() {
        return Some(dec!(50));
    }
    if avg_loss.is_zero() {
        return Some(dec!(100));
    }

    let rs = avg_gain / avg_loss;
    Some(dec!(100) - dec!(100) / (Decimal::ONE + rs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[i64]) -> Vec<Decimal> {
        values.iter().map(|&v| Decimal::from(v)).collect()
    }

    #[test]
    fn test_rsi_insufficient_data() {
        assert!(relative_strength_index(&series(&[1, 2, 3]), 14).is_none());
        assert!(relative_strength_index(&series(&[1, 2, 3]), 0).is_none());
    }

    #[test]
    fn test_rsi_only_gains() {
        let closes = series(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(relative_strength_index(&closes, 5), Some(dec!(100)));
    }

    #[test]
    fn test_rsi_only_losses() {
        let closes = series(&[6, 5, 4, 3, 2, 1]);
        assert_eq!(relative_strength_index(&closes, 5), Some(dec!(0)));
    }

    #[test]
    fn test_rsi_flat_is_neutral() {
        let closes = series(&[7; 20]);
        assert_eq!(relative_strength_index(&closes, 14), Some(dec!(50)));
    }

    #[test]
    fn test_rsi_balanced_moves() {
        // Equal gains and losses: RS = 1, RSI = 50
        let closes = series(&[10, 11, 10, 11, 10]);
        assert_eq!(relative_strength_index(&closes, 4), Some(dec!(50)));
    }

    #[test]
    fn test_rsi_wilder_smoothing() {
        // Seed 0.5/0.5, then four smoothed steps leave gain 0.34375, loss 0.65625
        let closes = series(&[1, 2, 1, 2, 1, 2, 1]);
        let rsi = relative_strength_index(&closes, 2).unwrap();
        assert!((rsi - dec!(34.375)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_rsi_stays_in_bounds() {
        let closes = series(&[44, 45, 43, 47, 46, 48, 45, 49, 50, 47, 46, 51, 52, 50, 49, 53]);
        let rsi = relative_strength_index(&closes, 14).unwrap();
        assert!(rsi > dec!(0) && rsi < dec!(100));
    }
}
