//! Tick orchestration.
//!
//! Wires one tick end to end: candle feed → indicator → strategy → execution
//! router → performance evaluator → persist. A tick either commits its full
//! updated history table or fails and persists nothing; the next scheduled
//! tick retries from the persisted state.

use crate::config::Config;
use crate::error::TickError;
use crate::exchange::{AssetPair, PerVenue, VenueClient};
use crate::execution::ExecutionRouter;
use crate::feed::CsvPriceFeed;
use crate::history::{HistoryRecord, HistoryStore};
use crate::indicators;
use crate::performance;
use crate::strategy::{self, PositionState};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// One-decision-per-tick trading bot.
pub struct TradingBot {
    config: Config,
    pair: AssetPair,
    venues: PerVenue<Arc<dyn VenueClient>>,
    router: ExecutionRouter,
    feed: CsvPriceFeed,
    store: HistoryStore,
}

impl TradingBot {
    pub fn new(
        config: Config,
        venues: PerVenue<Arc<dyn VenueClient>>,
        store: HistoryStore,
    ) -> Result<Self> {
        config.validate()?;
        let pair = config.asset_pair()?;
        let router = ExecutionRouter::new(
            pair.clone(),
            config.trading.bet_size,
            PerVenue::new(config.coinbase.fee_estimate, config.falconx.fee_estimate),
        );
        let feed = CsvPriceFeed::new(&config.feed.candles_path);

        Ok(Self {
            config,
            pair,
            venues,
            router,
            feed,
            store,
        })
    }

    /// Run a single decision tick.
    pub async fn run_tick(&self) -> Result<PositionState, TickError> {
        let started = Utc::now();
        info!(pair = %self.pair, "tick started");

        // Indicator
        let candles = self.feed.load().map_err(TickError::Feed)?;
        let indicator = indicators::compute(
            self.config.indicator.kind,
            &candles,
            self.config.indicator.period,
            self.config.indicator.factor,
        )
        .map_err(TickError::Feed)?;

        // Strategy
        let mut history = self.store.load().map_err(TickError::Persistence)?;
        let previous = history.last_state();
        let in_zone = strategy::in_trade_zone(indicator, self.config.trading.threshold);
        let action = strategy::next_state(previous, in_zone);
        info!(%indicator, %previous, %action, in_zone, "strategy decided");

        // Execution
        let draft = HistoryRecord::draft(started, indicator, action);
        let execution = self.router.execute(action, &history, &self.venues).await?;

        // Performance
        history.push(draft.complete(execution));
        performance::evaluate(&mut history, self.config.trading.bet_size);

        self.store
            .persist(&history)
            .map_err(TickError::Persistence)?;

        let last = history.last().expect("row was just appended");
        info!(
            %action,
            rows = history.len(),
            running_net_profit = %last.running_net_profit,
            running_raroi = %last.running_raroi,
            "tick complete"
        );
        Ok(action)
    }
}
