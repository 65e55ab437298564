//! Shared types for venue clients and order routing.

use anyhow::{bail, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A base/quote asset pair, e.g. `BTC-USD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPair {
    pub base: String,
    pub quote: String,
}

impl AssetPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Product identifier in `BASE-QUOTE` form (Coinbase product_id format).
    pub fn product_id(&self) -> String {
        format!("{}-{}", self.base, self.quote)
    }
}

impl FromStr for AssetPair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('-')
            .with_context(|| format!("asset pair must be BASE-QUOTE, got {s:?}"))?;
        if base.is_empty() || quote.is_empty() {
            bail!("asset pair must be BASE-QUOTE, got {s:?}");
        }
        Ok(Self::new(base, quote))
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// How a market order is sized.
///
/// Buys commit a fixed amount of quote currency; sells liquidate a base-asset
/// quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderAmount {
    /// Quote-currency notional (e.g. USD "funds").
    Notional(Decimal),
    /// Base-asset quantity (e.g. BTC "size").
    Base(Decimal),
}

/// Terminal state of a placed market order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderState {
    Filled,
    /// Dry-run order: intent was logged, nothing was sent to the venue.
    Simulated,
    Rejected(String),
}

impl OrderState {
    pub fn is_success(&self) -> bool {
        matches!(self, OrderState::Filled | OrderState::Simulated)
    }
}

/// Response from placing a market order on a venue.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub side: Side,
    /// Fee charged by the venue in quote currency. Zero for simulated orders.
    pub fee: Decimal,
    pub status: OrderState,
}

impl OrderReceipt {
    /// Receipt shape returned by dry-run order placement.
    pub fn simulated(side: Side) -> Self {
        Self {
            side,
            fee: Decimal::ZERO,
            status: OrderState::Simulated,
        }
    }
}

/// Quote- and base-asset balances on a single venue, captured together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VenueBalances {
    pub quote_asset: Decimal,
    pub base_asset: Decimal,
}

/// A value held once per venue.
///
/// Typed replacement for positional per-venue columns: quotes, balances and
/// fees are always recorded for both venues on every history row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerVenue<T> {
    pub coinbase: T,
    pub falconx: T,
}

impl<T> PerVenue<T> {
    pub fn new(coinbase: T, falconx: T) -> Self {
        Self { coinbase, falconx }
    }

    pub fn get(&self, venue: super::Venue) -> &T {
        match venue {
            super::Venue::Coinbase => &self.coinbase,
            super::Venue::FalconX => &self.falconx,
        }
    }

    pub fn get_mut(&mut self, venue: super::Venue) -> &mut T {
        match venue {
            super::Venue::Coinbase => &mut self.coinbase,
            super::Venue::FalconX => &mut self.falconx,
        }
    }
}
