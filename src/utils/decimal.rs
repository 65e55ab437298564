//! Decimal helpers for financial arithmetic.

use rust_decimal::Decimal;

/// Division that returns zero instead of panicking on a zero divisor.
///
/// Running ratios are undefined until capital has been risked; zero is the
/// recorded value for those rows.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Round down to a lot size, e.g. `0.00000001` for BTC order quantities.
///
/// Liquidation sells must never round a quantity above the held balance.
pub fn round_down_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size == Decimal::ZERO {
        return value;
    }
    (value / lot_size).floor() * lot_size
}
