//! In-memory venue for tests and offline runs.
//!
//! Holds a settable quote and per-asset balances behind an async lock, fills
//! market orders instantly against the current quote, and supports failure
//! injection for exercising the router's abort paths.

use crate::exchange::traits::{Venue, VenueClient};
use crate::exchange::types::{AssetPair, OrderAmount, OrderReceipt, OrderState, Side};
use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct MockVenueState {
    quote: Decimal,
    balances: HashMap<String, Decimal>,
    /// Fee charged per filled order, in quote currency.
    fee_per_order: Decimal,
    fail_quotes: bool,
    fail_orders: bool,
    orders: Vec<RecordedOrder>,
}

/// Order captured by the mock for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOrder {
    pub pair: AssetPair,
    pub side: Side,
    pub amount: OrderAmount,
}

/// A simulated venue with instant fills.
pub struct MockVenue {
    venue: Venue,
    state: RwLock<MockVenueState>,
}

impl MockVenue {
    pub fn new(venue: Venue, quote: Decimal) -> Self {
        Self {
            venue,
            state: RwLock::new(MockVenueState {
                quote,
                ..Default::default()
            }),
        }
    }

    pub async fn set_quote(&self, quote: Decimal) {
        self.state.write().await.quote = quote;
    }

    pub async fn set_balance(&self, asset: &str, amount: Decimal) {
        self.state.write().await.balances.insert(asset.to_string(), amount);
    }

    pub async fn set_fee_per_order(&self, fee: Decimal) {
        self.state.write().await.fee_per_order = fee;
    }

    pub async fn fail_quotes(&self, fail: bool) {
        self.state.write().await.fail_quotes = fail;
    }

    pub async fn fail_orders(&self, fail: bool) {
        self.state.write().await.fail_orders = fail;
    }

    /// Orders placed so far, oldest first.
    pub async fn orders(&self) -> Vec<RecordedOrder> {
        self.state.read().await.orders.clone()
    }
}

#[async_trait]
impl VenueClient for MockVenue {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn quote(&self, _pair: &AssetPair) -> Result<Decimal> {
        let state = self.state.read().await;
        if state.fail_quotes {
            bail!("simulated quote outage on {}", self.venue);
        }
        Ok(state.quote)
    }

    async fn balance(&self, asset: &str) -> Result<Decimal> {
        let state = self.state.read().await;
        Ok(state.balances.get(asset).copied().unwrap_or(Decimal::ZERO))
    }

    async fn place_market_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: OrderAmount,
    ) -> Result<OrderReceipt> {
        let mut state = self.state.write().await;
        if state.fail_orders {
            return Ok(OrderReceipt {
                side,
                fee: Decimal::ZERO,
                status: OrderState::Rejected(format!("simulated rejection on {}", self.venue)),
            });
        }

        let quote = state.quote;
        let fee = state.fee_per_order;
        match (side, amount) {
            (Side::Buy, OrderAmount::Notional(funds)) => {
                let acquired = (funds - fee) / quote;
                *state.balances.entry(pair.quote.clone()).or_default() -= funds;
                *state.balances.entry(pair.base.clone()).or_default() += acquired;
            }
            (Side::Sell, OrderAmount::Base(quantity)) => {
                let proceeds = quantity * quote - fee;
                *state.balances.entry(pair.base.clone()).or_default() -= quantity;
                *state.balances.entry(pair.quote.clone()).or_default() += proceeds;
            }
            (side, amount) => bail!("unsupported order sizing {amount:?} for {side}"),
        }

        state.orders.push(RecordedOrder {
            pair: pair.clone(),
            side,
            amount,
        });
        debug!(venue = %self.venue, %side, "mock order filled");

        Ok(OrderReceipt {
            side,
            fee,
            status: OrderState::Filled,
        })
    }
}
