//! Venue-agnostic capability trait for market venues.
//!
//! Both venues expose the same minimal capability set: a price quote for the
//! traded pair, per-asset balances, and market order placement. The execution
//! router works exclusively against this trait, so venue selection stays a
//! pure price comparison.

use crate::exchange::types::{AssetPair, OrderAmount, OrderReceipt, Side};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Venue identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Venue {
    Coinbase,
    FalconX,
}

impl Venue {
    /// Both venues, in recording order.
    pub const ALL: [Venue; 2] = [Venue::Coinbase, Venue::FalconX];

    /// Stable lowercase label used in persisted rows.
    pub fn label(&self) -> &'static str {
        match self {
            Venue::Coinbase => "coinbase",
            Venue::FalconX => "falconx",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Coinbase => write!(f, "Coinbase"),
            Venue::FalconX => write!(f, "FalconX"),
        }
    }
}

impl FromStr for Venue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coinbase" => Ok(Venue::Coinbase),
            "falconx" => Ok(Venue::FalconX),
            other => anyhow::bail!("unrecognized venue label {other:?}"),
        }
    }
}

/// Capability set implemented once per venue.
///
/// `quote` returns the venue's current price for one unit of the base asset
/// in quote currency, before any fee adjustment; fee normalization is the
/// router's job since fee structures differ per venue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueClient: Send + Sync {
    fn venue(&self) -> Venue;

    /// Current price for one base unit of `pair`, in quote currency.
    async fn quote(&self, pair: &AssetPair) -> Result<Decimal>;

    /// Total balance of `asset` on this venue.
    async fn balance(&self, asset: &str) -> Result<Decimal>;

    /// Place a market order. In dry-run mode implementations log intent and
    /// return a `Simulated` receipt with zero fee instead of sending it.
    async fn place_market_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: OrderAmount,
    ) -> Result<OrderReceipt>;
}
