//! Append-only trade history and its SQLite store.
//!
//! One row per tick. Rows are written in three phases that share one builder:
//! the strategy phase drafts the row (timestamp, indicator, action), the
//! execution router completes every primal field, and the performance
//! evaluator owns the derived columns, recomputing them over the whole table
//! each tick. Insertion order is chronological order; rows are never
//! reordered or deleted.

use crate::exchange::{PerVenue, Venue, VenueBalances};
use crate::strategy::PositionState;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Win/loss classification of a closed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(Outcome::Win),
            "loss" => Ok(Outcome::Loss),
            other => anyhow::bail!("unrecognized outcome label {other:?}"),
        }
    }
}

/// Execution-phase fields of a history row, produced by the router.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionFields {
    /// Venue used for this action, or the venue that opened the currently
    /// held position on Sell/Hold rows. None on NoAction rows.
    pub venue: Option<Venue>,
    /// Quote-currency amount committed on a Buy, zero otherwise.
    pub capital_risked: Decimal,
    /// Raw venue quotes captured at decision time.
    pub quotes: PerVenue<Decimal>,
    /// Post-trade quote/base balances on both venues.
    pub balances: PerVenue<VenueBalances>,
    /// Fees incurred this tick on each venue.
    pub fees: PerVenue<Decimal>,
}

/// One row of the trade history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub indicator: Decimal,
    pub state: PositionState,
    pub venue: Option<Venue>,
    pub capital_risked: Decimal,
    pub quotes: PerVenue<Decimal>,
    pub balances: PerVenue<VenueBalances>,
    pub fees: PerVenue<Decimal>,

    // Derived columns, owned by the performance evaluator.
    pub running_capital_risked: Decimal,
    pub net_profit: Option<Decimal>,
    pub running_net_profit: Decimal,
    pub raroi: Option<Decimal>,
    pub running_raroi: Decimal,
    pub outcome_excluding_fees: Option<Outcome>,
    pub outcome_including_fees: Option<Outcome>,
}

impl HistoryRecord {
    /// Start a row for the current tick; execution fields land via
    /// [`DraftRecord::complete`].
    pub fn draft(timestamp: DateTime<Utc>, indicator: Decimal, state: PositionState) -> DraftRecord {
        DraftRecord {
            timestamp,
            indicator,
            state,
        }
    }

    /// Total fees across both venues for this row.
    pub fn total_fees(&self) -> Decimal {
        self.fees.coinbase + self.fees.falconx
    }
}

/// A strategy-phase row awaiting execution fields.
#[derive(Debug, Clone)]
pub struct DraftRecord {
    pub timestamp: DateTime<Utc>,
    pub indicator: Decimal,
    pub state: PositionState,
}

impl DraftRecord {
    pub fn complete(self, execution: ExecutionFields) -> HistoryRecord {
        HistoryRecord {
            timestamp: self.timestamp,
            indicator: self.indicator,
            state: self.state,
            venue: execution.venue,
            capital_risked: execution.capital_risked,
            quotes: execution.quotes,
            balances: execution.balances,
            fees: execution.fees,
            running_capital_risked: Decimal::ZERO,
            net_profit: None,
            running_net_profit: Decimal::ZERO,
            raroi: None,
            running_raroi: Decimal::ZERO,
            outcome_excluding_fees: None,
            outcome_including_fees: None,
        }
    }
}

/// The full trade history, ordered oldest to newest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    records: Vec<HistoryRecord>,
}

impl History {
    pub fn new(records: Vec<HistoryRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryRecord> {
        self.records.last()
    }

    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [HistoryRecord] {
        &mut self.records
    }

    /// Action recorded on the most recent tick; a fresh table is flat.
    pub fn last_state(&self) -> PositionState {
        self.last().map(|r| r.state).unwrap_or(PositionState::NoAction)
    }

    /// Venue that opened the currently held position, resolved by scanning
    /// backward from the most recent row.
    ///
    /// Hold rows carry the inherited venue; rows persisted by older runs may
    /// hold None there, in which case the scan continues to the opening Buy.
    /// A Sell or NoAction row means no position is open past it, so the scan
    /// stops; returning None is a data-integrity signal, never a default.
    pub fn open_position_venue(&self) -> Option<Venue> {
        for record in self.records.iter().rev() {
            match record.state {
                PositionState::Buy => return record.venue,
                PositionState::Hold => {
                    if record.venue.is_some() {
                        return record.venue;
                    }
                }
                PositionState::Sell | PositionState::NoAction => return None,
            }
        }
        None
    }
}

/// SQLite-backed history store.
///
/// Decimals are stored as TEXT and timestamps as RFC 3339, with an
/// autoincrement id preserving insertion order. `persist` rewrites the full
/// table inside one transaction: a tick either commits its complete updated
/// table (including recomputed derived columns) or leaves the previous table
/// untouched.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("failed to open history database at {:?}", db_path.as_ref()))?;
        let store = Self { conn };
        store.init_schema()?;
        info!("history store ready at {:?}", db_path.as_ref());
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                indicator TEXT NOT NULL,
                state TEXT NOT NULL,
                venue TEXT,
                capital_risked TEXT NOT NULL,
                running_capital_risked TEXT NOT NULL,
                coinbase_quote TEXT NOT NULL,
                falconx_quote TEXT NOT NULL,
                coinbase_quote_balance TEXT NOT NULL,
                coinbase_base_balance TEXT NOT NULL,
                falconx_quote_balance TEXT NOT NULL,
                falconx_base_balance TEXT NOT NULL,
                coinbase_fee TEXT NOT NULL,
                falconx_fee TEXT NOT NULL,
                net_profit TEXT,
                running_net_profit TEXT NOT NULL,
                raroi TEXT,
                running_raroi TEXT NOT NULL,
                outcome_excluding_fees TEXT,
                outcome_including_fees TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp);
            "#,
        )?;
        debug!("history schema initialized");
        Ok(())
    }

    /// Load the full table, oldest row first.
    pub fn load(&self) -> Result<History> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT timestamp, indicator, state, venue, capital_risked,
                   running_capital_risked, coinbase_quote, falconx_quote,
                   coinbase_quote_balance, coinbase_base_balance,
                   falconx_quote_balance, falconx_base_balance,
                   coinbase_fee, falconx_fee, net_profit, running_net_profit,
                   raroi, running_raroi, outcome_excluding_fees,
                   outcome_including_fees
            FROM history
            ORDER BY id
            "#,
        )?;

        let raw_rows: Vec<RawRow> = stmt
            .query_map([], |row| {
                Ok(RawRow {
                    timestamp: row.get(0)?,
                    indicator: row.get(1)?,
                    state: row.get(2)?,
                    venue: row.get(3)?,
                    capital_risked: row.get(4)?,
                    running_capital_risked: row.get(5)?,
                    coinbase_quote: row.get(6)?,
                    falconx_quote: row.get(7)?,
                    coinbase_quote_balance: row.get(8)?,
                    coinbase_base_balance: row.get(9)?,
                    falconx_quote_balance: row.get(10)?,
                    falconx_base_balance: row.get(11)?,
                    coinbase_fee: row.get(12)?,
                    falconx_fee: row.get(13)?,
                    net_profit: row.get(14)?,
                    running_net_profit: row.get(15)?,
                    raroi: row.get(16)?,
                    running_raroi: row.get(17)?,
                    outcome_excluding_fees: row.get(18)?,
                    outcome_including_fees: row.get(19)?,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;

        let records = raw_rows
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                raw.into_record()
                    .with_context(|| format!("corrupt history row at position {i}"))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(rows = records.len(), "loaded trade history");
        Ok(History::new(records))
    }

    /// Persist the full table in one transaction.
    pub fn persist(&self, history: &History) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM history", [])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO history (
                    timestamp, indicator, state, venue, capital_risked,
                    running_capital_risked, coinbase_quote, falconx_quote,
                    coinbase_quote_balance, coinbase_base_balance,
                    falconx_quote_balance, falconx_base_balance,
                    coinbase_fee, falconx_fee, net_profit, running_net_profit,
                    raroi, running_raroi, outcome_excluding_fees,
                    outcome_including_fees
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                        ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                "#,
            )?;

            for record in history.records() {
                stmt.execute(params![
                    record.timestamp.to_rfc3339(),
                    record.indicator.to_string(),
                    record.state.label(),
                    record.venue.map(|v| v.label()),
                    record.capital_risked.to_string(),
                    record.running_capital_risked.to_string(),
                    record.quotes.coinbase.to_string(),
                    record.quotes.falconx.to_string(),
                    record.balances.coinbase.quote_asset.to_string(),
                    record.balances.coinbase.base_asset.to_string(),
                    record.balances.falconx.quote_asset.to_string(),
                    record.balances.falconx.base_asset.to_string(),
                    record.fees.coinbase.to_string(),
                    record.fees.falconx.to_string(),
                    record.net_profit.map(|v| v.to_string()),
                    record.running_net_profit.to_string(),
                    record.raroi.map(|v| v.to_string()),
                    record.running_raroi.to_string(),
                    record.outcome_excluding_fees.map(|o| o.label()),
                    record.outcome_including_fees.map(|o| o.label()),
                ])?;
            }
        }

        tx.commit()?;
        debug!(rows = history.len(), "trade history persisted");
        Ok(())
    }
}

/// Raw TEXT columns as stored; converted with loud failures so a corrupt or
/// unrecognized label never silently becomes a default.
struct RawRow {
    timestamp: String,
    indicator: String,
    state: String,
    venue: Option<String>,
    capital_risked: String,
    running_capital_risked: String,
    coinbase_quote: String,
    falconx_quote: String,
    coinbase_quote_balance: String,
    coinbase_base_balance: String,
    falconx_quote_balance: String,
    falconx_base_balance: String,
    coinbase_fee: String,
    falconx_fee: String,
    net_profit: Option<String>,
    running_net_profit: String,
    raroi: Option<String>,
    running_raroi: String,
    outcome_excluding_fees: Option<String>,
    outcome_including_fees: Option<String>,
}

impl RawRow {
    fn into_record(self) -> Result<HistoryRecord> {
        Ok(HistoryRecord {
            timestamp: DateTime::parse_from_rfc3339(&self.timestamp)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("bad timestamp {:?}", self.timestamp))?,
            indicator: parse_decimal("indicator", &self.indicator)?,
            state: self.state.parse()?,
            venue: self.venue.as_deref().map(Venue::from_str).transpose()?,
            capital_risked: parse_decimal("capital_risked", &self.capital_risked)?,
            quotes: PerVenue::new(
                parse_decimal("coinbase_quote", &self.coinbase_quote)?,
                parse_decimal("falconx_quote", &self.falconx_quote)?,
            ),
            balances: PerVenue::new(
                VenueBalances {
                    quote_asset: parse_decimal("coinbase_quote_balance", &self.coinbase_quote_balance)?,
                    base_asset: parse_decimal("coinbase_base_balance", &self.coinbase_base_balance)?,
                },
                VenueBalances {
                    quote_asset: parse_decimal("falconx_quote_balance", &self.falconx_quote_balance)?,
                    base_asset: parse_decimal("falconx_base_balance", &self.falconx_base_balance)?,
                },
            ),
            fees: PerVenue::new(
                parse_decimal("coinbase_fee", &self.coinbase_fee)?,
                parse_decimal("falconx_fee", &self.falconx_fee)?,
            ),
            running_capital_risked: parse_decimal(
                "running_capital_risked",
                &self.running_capital_risked,
            )?,
            net_profit: self
                .net_profit
                .as_deref()
                .map(|v| parse_decimal("net_profit", v))
                .transpose()?,
            running_net_profit: parse_decimal("running_net_profit", &self.running_net_profit)?,
            raroi: self
                .raroi
                .as_deref()
                .map(|v| parse_decimal("raroi", v))
                .transpose()?,
            running_raroi: parse_decimal("running_raroi", &self.running_raroi)?,
            outcome_excluding_fees: self
                .outcome_excluding_fees
                .as_deref()
                .map(Outcome::from_str)
                .transpose()?,
            outcome_including_fees: self
                .outcome_including_fees
                .as_deref()
                .map(Outcome::from_str)
                .transpose()?,
        })
    }
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).with_context(|| format!("bad decimal in {column}: {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(state: PositionState, venue: Option<Venue>) -> HistoryRecord {
        HistoryRecord::draft(Utc::now(), dec!(39000), state).complete(ExecutionFields {
            venue,
            capital_risked: if state == PositionState::Buy {
                dec!(1000)
            } else {
                Decimal::ZERO
            },
            quotes: PerVenue::new(dec!(39000), dec!(39010)),
            balances: PerVenue::new(
                VenueBalances {
                    quote_asset: dec!(5000),
                    base_asset: dec!(0.5),
                },
                VenueBalances::default(),
            ),
            fees: PerVenue::default(),
        })
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let store = HistoryStore::new(":memory:").unwrap();

        let mut history = History::default();
        history.push(record(PositionState::Buy, Some(Venue::FalconX)));
        history.push(record(PositionState::Hold, Some(Venue::FalconX)));
        history.push(record(PositionState::Sell, Some(Venue::FalconX)));
        store.persist(&history).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.records()[0].state, PositionState::Buy);
        assert_eq!(loaded.records()[0].venue, Some(Venue::FalconX));
        assert_eq!(loaded.records()[0].capital_risked, dec!(1000));
        assert_eq!(loaded.records()[2].balances.coinbase.quote_asset, dec!(5000));
    }

    #[test]
    fn test_load_preserves_insertion_order() {
        let store = HistoryStore::new(":memory:").unwrap();

        let mut history = History::default();
        for i in 0..5 {
            let mut r = record(PositionState::NoAction, None);
            r.indicator = Decimal::from(41000 + i);
            history.push(r);
        }
        store.persist(&history).unwrap();

        let loaded = store.load().unwrap();
        let indicators: Vec<Decimal> = loaded.records().iter().map(|r| r.indicator).collect();
        assert_eq!(
            indicators,
            (0..5).map(|i| Decimal::from(41000 + i)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_unknown_state_label_fails_load() {
        let store = HistoryStore::new(":memory:").unwrap();
        let mut history = History::default();
        history.push(record(PositionState::Buy, Some(Venue::Coinbase)));
        store.persist(&history).unwrap();

        store
            .conn
            .execute("UPDATE history SET state = 'Long'", [])
            .unwrap();

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("corrupt history row"));
    }

    #[test]
    fn test_persist_replaces_previous_table() {
        let store = HistoryStore::new(":memory:").unwrap();

        let mut history = History::default();
        history.push(record(PositionState::Buy, Some(Venue::Coinbase)));
        store.persist(&history).unwrap();

        history.push(record(PositionState::Sell, Some(Venue::Coinbase)));
        store.persist(&history).unwrap();

        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn test_open_position_venue_resolves_through_holds() {
        let mut history = History::default();
        history.push(record(PositionState::Buy, Some(Venue::FalconX)));
        history.push(record(PositionState::Hold, Some(Venue::FalconX)));
        history.push(record(PositionState::Hold, Some(Venue::FalconX)));
        assert_eq!(history.open_position_venue(), Some(Venue::FalconX));
    }

    #[test]
    fn test_open_position_venue_reconstructs_from_bare_holds() {
        // rows persisted before venues were inherited onto Hold rows
        let mut history = History::default();
        history.push(record(PositionState::Buy, Some(Venue::Coinbase)));
        history.push(record(PositionState::Hold, None));
        assert_eq!(history.open_position_venue(), Some(Venue::Coinbase));
    }

    #[test]
    fn test_open_position_venue_none_when_flat() {
        let mut history = History::default();
        assert_eq!(history.open_position_venue(), None);

        history.push(record(PositionState::Buy, Some(Venue::Coinbase)));
        history.push(record(PositionState::Sell, Some(Venue::Coinbase)));
        assert_eq!(history.open_position_venue(), None);

        history.push(record(PositionState::NoAction, None));
        assert_eq!(history.open_position_venue(), None);
    }

    #[test]
    fn test_last_state_defaults_to_flat() {
        let history = History::default();
        assert_eq!(history.last_state(), PositionState::NoAction);
    }
}
