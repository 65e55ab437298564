//! Best-execution order routing.
//!
//! Quotes both venues, normalizes each quote with that venue's fee estimate
//! so the comparison is apples-to-apples, then places the decided action on
//! the venue the rules select: Buys go to the cheaper venue, Sells must go
//! to the venue holding the open position, Holds and NoActions place nothing.

use crate::error::TickError;
use crate::exchange::{
    AssetPair, OrderAmount, OrderReceipt, PerVenue, Side, Venue, VenueBalances, VenueClient,
};
use crate::history::{ExecutionFields, History};
use crate::strategy::PositionState;
use crate::utils::decimal::round_down_to_lot;
use anyhow::anyhow;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::info;

/// Smallest base-asset increment accepted on either venue.
const BASE_LOT_SIZE: Decimal = dec!(0.00000001);

/// Routes one tick's action to the best venue and records the outcome.
pub struct ExecutionRouter {
    pair: AssetPair,
    bet_size: Decimal,
    fee_estimates: PerVenue<Decimal>,
}

impl ExecutionRouter {
    pub fn new(pair: AssetPair, bet_size: Decimal, fee_estimates: PerVenue<Decimal>) -> Self {
        Self {
            pair,
            bet_size,
            fee_estimates,
        }
    }

    /// Execute `action` against the venue pair and return the execution
    /// fields for the row under construction.
    pub async fn execute(
        &self,
        action: PositionState,
        history: &History,
        venues: &PerVenue<Arc<dyn VenueClient>>,
    ) -> Result<ExecutionFields, TickError> {
        let quotes = self.fetch_quotes(venues).await?;

        let buy_costs = PerVenue::new(
            quotes.coinbase * (Decimal::ONE + self.fee_estimates.coinbase),
            quotes.falconx * (Decimal::ONE + self.fee_estimates.falconx),
        );
        info!(
            coinbase = %buy_costs.coinbase,
            falconx = %buy_costs.falconx,
            "fee-adjusted buy costs"
        );

        let mut capital_risked = Decimal::ZERO;
        let mut receipt: Option<OrderReceipt> = None;

        let venue = match action {
            PositionState::Buy => {
                // buy low: cheaper fee-adjusted cost wins
                let venue = if buy_costs.coinbase < buy_costs.falconx {
                    Venue::Coinbase
                } else {
                    Venue::FalconX
                };
                info!(%venue, bet = %self.bet_size, "routing buy to cheaper venue");

                capital_risked = self.bet_size;
                let placed = venues
                    .get(venue)
                    .place_market_order(&self.pair, Side::Buy, OrderAmount::Notional(self.bet_size))
                    .await
                    .map_err(|source| TickError::OrderPlacement { venue, source })?;
                receipt = Some(placed);
                Some(venue)
            }
            PositionState::Sell => {
                let venue = history
                    .open_position_venue()
                    .ok_or(TickError::VenueResolution)?;
                info!(%venue, "routing sell to the venue holding the position");

                let held = venues
                    .get(venue)
                    .balance(&self.pair.base)
                    .await
                    .map_err(|source| TickError::BalanceUnavailable { venue, source })?;
                let quantity = round_down_to_lot(held, BASE_LOT_SIZE);
                if quantity <= Decimal::ZERO {
                    return Err(TickError::OrderPlacement {
                        venue,
                        source: anyhow!("no {} balance to liquidate", self.pair.base),
                    });
                }

                let placed = venues
                    .get(venue)
                    .place_market_order(&self.pair, Side::Sell, OrderAmount::Base(quantity))
                    .await
                    .map_err(|source| TickError::OrderPlacement { venue, source })?;
                receipt = Some(placed);
                Some(venue)
            }
            PositionState::Hold => {
                // no order; venue inherited for bookkeeping continuity
                let venue = history
                    .open_position_venue()
                    .ok_or(TickError::VenueResolution)?;
                info!(%venue, "holding open position, no order placed");
                Some(venue)
            }
            PositionState::NoAction => {
                info!("flat, no order placed");
                None
            }
        };

        let mut fees = PerVenue::<Decimal>::default();
        if let (Some(venue), Some(receipt)) = (venue, receipt.as_ref()) {
            if !receipt.status.is_success() {
                return Err(TickError::OrderPlacement {
                    venue,
                    source: anyhow!("order status {:?}", receipt.status),
                });
            }
            *fees.get_mut(venue) = receipt.fee;
        }

        let balances = self.capture_balances(venues).await?;

        Ok(ExecutionFields {
            venue,
            capital_risked,
            quotes,
            balances,
            fees,
        })
    }

    async fn fetch_quotes(
        &self,
        venues: &PerVenue<Arc<dyn VenueClient>>,
    ) -> Result<PerVenue<Decimal>, TickError> {
        let (coinbase, falconx) = tokio::join!(
            venues.coinbase.quote(&self.pair),
            venues.falconx.quote(&self.pair),
        );
        Ok(PerVenue::new(
            coinbase.map_err(|source| TickError::QuoteUnavailable {
                venue: Venue::Coinbase,
                source,
            })?,
            falconx.map_err(|source| TickError::QuoteUnavailable {
                venue: Venue::FalconX,
                source,
            })?,
        ))
    }

    /// Post-trade quote/base balances on both venues.
    async fn capture_balances(
        &self,
        venues: &PerVenue<Arc<dyn VenueClient>>,
    ) -> Result<PerVenue<VenueBalances>, TickError> {
        let (coinbase_quote, coinbase_base, falconx_quote, falconx_base) = tokio::join!(
            venues.coinbase.balance(&self.pair.quote),
            venues.coinbase.balance(&self.pair.base),
            venues.falconx.balance(&self.pair.quote),
            venues.falconx.balance(&self.pair.base),
        );

        let balance_err = |venue: Venue| {
            move |source: anyhow::Error| TickError::BalanceUnavailable { venue, source }
        };

        Ok(PerVenue::new(
            VenueBalances {
                quote_asset: coinbase_quote.map_err(balance_err(Venue::Coinbase))?,
                base_asset: coinbase_base.map_err(balance_err(Venue::Coinbase))?,
            },
            VenueBalances {
                quote_asset: falconx_quote.map_err(balance_err(Venue::FalconX))?,
                base_asset: falconx_base.map_err(balance_err(Venue::FalconX))?,
            },
        ))
    }
}
