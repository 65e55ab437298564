//! Configuration management.
//!
//! Loads settings from an optional `config` file and `ZT`-prefixed
//! environment variables.

use crate::exchange::AssetPair;
use crate::indicators::IndicatorKind;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Strategy and scheduling parameters
    #[serde(default)]
    pub trading: TradingConfig,
    /// Indicator selection
    #[serde(default)]
    pub indicator: IndicatorConfig,
    /// Candle feed location
    #[serde(default)]
    pub feed: FeedConfig,
    /// Trade history location
    #[serde(default)]
    pub history: HistoryConfig,
    /// Coinbase API credentials and fee estimate
    #[serde(default)]
    pub coinbase: CoinbaseConfig,
    /// FalconX API credentials and fee estimate
    #[serde(default)]
    pub falconx: FalconxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Traded pair in BASE-QUOTE form
    #[serde(default = "default_asset_pair")]
    pub asset_pair: String,
    /// Quote-currency notional committed per Buy
    #[serde(default = "default_bet_size")]
    pub bet_size: Decimal,
    /// Indicator level below which the price is in the trade zone
    #[serde(default = "default_threshold")]
    pub threshold: Decimal,
    /// Live mode places real orders and loops on the tick interval;
    /// otherwise one dry-run tick is executed and the process exits
    #[serde(default)]
    pub live: bool,
    /// Seconds between ticks in live mode
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default)]
    pub kind: IndicatorKind,
    /// Lookback window in candles
    #[serde(default = "default_indicator_period")]
    pub period: usize,
    /// Std multiplier for Bollinger bands, scaling constant for CCI
    #[serde(default = "default_indicator_factor")]
    pub factor: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_candles_path")]
    pub candles_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinbaseConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub passphrase: String,
    /// Base64-encoded signing secret
    #[serde(default)]
    pub secret_key: String,
    /// Fee rate applied when normalizing quotes (oracle quotes carry no fee)
    #[serde(default = "default_coinbase_fee_estimate")]
    pub fee_estimate: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FalconxConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub passphrase: String,
    /// Base64-encoded signing secret
    #[serde(default)]
    pub secret_key: String,
    /// RFQ quotes already embed the basis-point fee, so this defaults to zero
    #[serde(default)]
    pub fee_estimate: Decimal,
}

// Default value functions
fn default_asset_pair() -> String {
    "BTC-USD".to_string()
}

fn default_bet_size() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_threshold() -> Decimal {
    Decimal::new(40_000, 0)
}

fn default_tick_interval_secs() -> u64 {
    3600
}

fn default_indicator_period() -> usize {
    20
}

fn default_indicator_factor() -> Decimal {
    Decimal::new(2, 0)
}

fn default_candles_path() -> String {
    "data/candles.csv".to_string()
}

fn default_db_path() -> String {
    "data/history.db".to_string()
}

fn default_coinbase_fee_estimate() -> Decimal {
    Decimal::new(5, 3) // 0.005
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("ZT"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        self.trading
            .asset_pair
            .parse::<AssetPair>()
            .context("trading.asset_pair is malformed")?;

        anyhow::ensure!(
            self.trading.bet_size > Decimal::ZERO,
            "trading.bet_size must be positive"
        );
        anyhow::ensure!(
            self.trading.threshold > Decimal::ZERO,
            "trading.threshold must be positive"
        );
        anyhow::ensure!(
            self.trading.tick_interval_secs > 0,
            "trading.tick_interval_secs must be positive"
        );
        anyhow::ensure!(
            self.indicator.period > 0,
            "indicator.period must be positive"
        );

        for (name, fee) in [
            ("coinbase", self.coinbase.fee_estimate),
            ("falconx", self.falconx.fee_estimate),
        ] {
            anyhow::ensure!(
                fee >= Decimal::ZERO && fee < Decimal::ONE,
                "{name}.fee_estimate must be in [0, 1)"
            );
        }

        Ok(())
    }

    /// Parsed traded pair; call after `validate`.
    pub fn asset_pair(&self) -> Result<AssetPair> {
        self.trading.asset_pair.parse()
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            asset_pair: default_asset_pair(),
            bet_size: default_bet_size(),
            threshold: default_threshold(),
            live: false,
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            kind: IndicatorKind::default(),
            period: default_indicator_period(),
            factor: default_indicator_factor(),
        }
    }
}

impl Default for CoinbaseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            passphrase: String::new(),
            secret_key: String::new(),
            fee_estimate: default_coinbase_fee_estimate(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            candles_path: default_candles_path(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.asset_pair().unwrap().base, "BTC");
    }

    #[test]
    fn test_bad_pair_rejected() {
        let mut config = Config::default();
        config.trading.asset_pair = "BTCUSD".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fee_estimate_bounds() {
        let mut config = Config::default();
        config.coinbase.fee_estimate = dec!(1);
        assert!(config.validate().is_err());

        config.coinbase.fee_estimate = dec!(-0.001);
        assert!(config.validate().is_err());

        config.coinbase.fee_estimate = dec!(0.005);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_bet_rejected() {
        let mut config = Config::default();
        config.trading.bet_size = Decimal::ZERO;
        assert!(config.validate().is_err());
    }
}
