//! Indicator library.
//!
//! Reusable signal generators over a candle series. Each produces a single
//! scalar for the most recent candle; the strategy consumes exactly one
//! scalar per tick, selected by [`IndicatorKind`] in configuration.
//!
//! Short histories are an error, never a silent NaN or zero.

use crate::feed::Candle;
use anyhow::{ensure, Context, Result};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

/// Which scalar the strategy compares against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// Latest close price.
    Close,
    /// Lower Bollinger band (SMA minus `factor` standard deviations).
    BollingerLower,
    /// Relative strength index over `period` closes.
    Rsi,
    /// Commodity channel index with `factor` scaling (classically 0.015).
    Cci,
}

impl Default for IndicatorKind {
    fn default() -> Self {
        IndicatorKind::Close
    }
}

/// Bollinger band values for the latest window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

/// Latest close price.
pub fn latest_close(candles: &[Candle]) -> Result<Decimal> {
    candles
        .last()
        .map(|c| c.close)
        .context("no candles available")
}

/// Classic Bollinger bands over the trailing `period` closes: middle is the
/// SMA, the bands sit `factor` population standard deviations away.
pub fn bollinger_bands(candles: &[Candle], period: usize, factor: Decimal) -> Result<BollingerBands> {
    ensure!(period >= 1, "bollinger period must be >= 1");
    ensure!(
        candles.len() >= period,
        "bollinger needs {period} candles, have {}",
        candles.len()
    );

    let window: Vec<Decimal> = candles[candles.len() - period..]
        .iter()
        .map(|c| c.close)
        .collect();
    let middle = mean(&window);
    let std_dev = population_std_dev(&window, middle);

    Ok(BollingerBands {
        upper: middle + factor * std_dev,
        middle,
        lower: middle - factor * std_dev,
    })
}

/// Relative strength index over the trailing `period` close-to-close moves.
///
/// RSI = 100 - 100 / (1 + avg_gain / avg_loss); an all-gain window saturates
/// at 100, an all-loss window at 0.
pub fn rsi(candles: &[Candle], period: usize) -> Result<Decimal> {
    ensure!(period >= 1, "rsi period must be >= 1");
    ensure!(
        candles.len() > period,
        "rsi needs {} candles, have {}",
        period + 1,
        candles.len()
    );

    let closes: Vec<Decimal> = candles[candles.len() - period - 1..]
        .iter()
        .map(|c| c.close)
        .collect();

    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;
    for pair in closes.windows(2) {
        let change = pair[1] - pair[0];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses += -change;
        }
    }

    let hundred = Decimal::from(100);
    if losses == Decimal::ZERO {
        return Ok(hundred);
    }
    let rs = gains / losses;
    Ok(hundred - hundred / (Decimal::ONE + rs))
}

/// Commodity channel index over the trailing `period` candles.
///
/// CCI = (typical price - SMA) / (factor * mean absolute deviation), with
/// typical price = (high + low + close) / 3. A flat window yields zero.
pub fn cci(candles: &[Candle], period: usize, factor: Decimal) -> Result<Decimal> {
    ensure!(period >= 1, "cci period must be >= 1");
    ensure!(factor > Decimal::ZERO, "cci factor must be positive");
    ensure!(
        candles.len() >= period,
        "cci needs {period} candles, have {}",
        candles.len()
    );

    let typical: Vec<Decimal> = candles[candles.len() - period..]
        .iter()
        .map(|c| (c.high + c.low + c.close) / Decimal::from(3))
        .collect();
    let sma = mean(&typical);
    let mad = mean(
        &typical
            .iter()
            .map(|tp| (*tp - sma).abs())
            .collect::<Vec<_>>(),
    );

    if mad == Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    let latest = *typical.last().expect("period >= 1");
    Ok((latest - sma) / (factor * mad))
}

/// Compute the configured scalar for the latest candle.
pub fn compute(
    kind: IndicatorKind,
    candles: &[Candle],
    period: usize,
    factor: Decimal,
) -> Result<Decimal> {
    match kind {
        IndicatorKind::Close => latest_close(candles),
        IndicatorKind::BollingerLower => {
            bollinger_bands(candles, period, factor).map(|bands| bands.lower)
        }
        IndicatorKind::Rsi => rsi(candles, period),
        IndicatorKind::Cci => cci(candles, period, factor),
    }
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len() as u64)
}

fn population_std_dev(values: &[Decimal], mean: Decimal) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let variance = values
        .iter()
        .map(|v| (*v - mean) * (*v - mean))
        .sum::<Decimal>()
        / Decimal::from(values.len() as u64);
    variance.sqrt().unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn candles_from_closes(closes: &[Decimal]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: start + Duration::hours(i as i64),
                open: *close,
                high: *close + dec!(10),
                low: *close - dec!(10),
                close: *close,
                volume: dec!(1),
            })
            .collect()
    }

    #[test]
    fn test_latest_close() {
        let candles = candles_from_closes(&[dec!(39000), dec!(41000)]);
        assert_eq!(latest_close(&candles).unwrap(), dec!(41000));
        assert!(latest_close(&[]).is_err());
    }

    #[test]
    fn test_bollinger_constant_series_collapses_to_sma() {
        let candles = candles_from_closes(&[dec!(40000); 20]);
        let bands = bollinger_bands(&candles, 20, dec!(2)).unwrap();
        assert_eq!(bands.middle, dec!(40000));
        assert_eq!(bands.upper, dec!(40000));
        assert_eq!(bands.lower, dec!(40000));
    }

    #[test]
    fn test_bollinger_bands_spread_with_variance() {
        // closes 10 and 30 alternating: mean 20, population stdev 10
        let closes: Vec<Decimal> = (0..10)
            .map(|i| if i % 2 == 0 { dec!(10) } else { dec!(30) })
            .collect();
        let candles = candles_from_closes(&closes);
        let bands = bollinger_bands(&candles, 10, dec!(2)).unwrap();
        assert_eq!(bands.middle, dec!(20));
        assert_eq!(bands.upper, dec!(40));
        assert_eq!(bands.lower, dec!(0));
    }

    #[test]
    fn test_rsi_extremes_and_balance() {
        let rising = candles_from_closes(&[dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]);
        assert_eq!(rsi(&rising, 4).unwrap(), dec!(100));

        let falling = candles_from_closes(&[dec!(5), dec!(4), dec!(3), dec!(2), dec!(1)]);
        assert_eq!(rsi(&falling, 4).unwrap(), dec!(0));

        // equal gains and losses sit at the midpoint
        let churn = candles_from_closes(&[dec!(10), dec!(12), dec!(10), dec!(12), dec!(10)]);
        assert_eq!(rsi(&churn, 4).unwrap(), dec!(50));
    }

    #[test]
    fn test_cci_flat_window_is_zero() {
        let candles = candles_from_closes(&[dec!(40000); 14]);
        assert_eq!(cci(&candles, 14, dec!(0.015)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_cci_sign_tracks_latest_deviation() {
        let mut closes = vec![dec!(100); 13];
        closes.push(dec!(130));
        let candles = candles_from_closes(&closes);
        assert!(cci(&candles, 14, dec!(0.015)).unwrap() > Decimal::ZERO);

        let mut closes = vec![dec!(100); 13];
        closes.push(dec!(70));
        let candles = candles_from_closes(&closes);
        assert!(cci(&candles, 14, dec!(0.015)).unwrap() < Decimal::ZERO);
    }

    #[test]
    fn test_short_history_is_an_error() {
        let candles = candles_from_closes(&[dec!(1), dec!(2)]);
        assert!(bollinger_bands(&candles, 20, dec!(2)).is_err());
        assert!(rsi(&candles, 14).is_err());
        assert!(cci(&candles, 14, dec!(0.015)).is_err());
    }

    #[test]
    fn test_compute_dispatch() {
        let candles = candles_from_closes(&[dec!(39000); 20]);
        let close = compute(IndicatorKind::Close, &candles, 20, dec!(2)).unwrap();
        assert_eq!(close, dec!(39000));

        let lower = compute(IndicatorKind::BollingerLower, &candles, 20, dec!(2)).unwrap();
        assert_eq!(lower, dec!(39000));
    }
}
