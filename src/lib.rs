//! # Zone Trader
//!
//! A periodic decision loop that buys when a price indicator drops into the
//! trade zone and sells the moment it leaves, routing each order to whichever
//! venue quotes the better fee-adjusted price.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Coinbase and FalconX API clients behind one capability trait
//! - `feed`: CSV candle feed
//! - `indicators`: Signal library (close, Bollinger, RSI, CCI)
//! - `strategy`: Four-state position machine
//! - `execution`: Best-execution venue selection and order routing
//! - `performance`: Full-table P&L recomputation
//! - `history`: Append-only trade history persisted to SQLite
//! - `bot`: Tick orchestration
//! - `utils`: Decimal arithmetic helpers

pub mod bot;
pub mod config;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod feed;
pub mod history;
pub mod indicators;
pub mod performance;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use error::TickError;
