//! Position state machine.
//!
//! One discrete action per tick, derived from the previous tick's action and
//! whether the indicator sits inside the trade zone (below the configured
//! threshold). The machine opens on zone entry, holds while the indicator
//! stays in the zone, closes the moment it leaves, and re-opens immediately
//! on re-entry.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Action decided on a tick.
///
/// `Buy` and `Sell` mark the tick that opened/closed a position; `Hold` marks
/// an open position left unchanged; `NoAction` means flat. Exactly one
/// lifecycle spans a `Buy`…`Hold`*…`Sell` run of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    NoAction,
    Buy,
    Sell,
    Hold,
}

impl PositionState {
    /// Stable lowercase label used in persisted rows.
    pub fn label(&self) -> &'static str {
        match self {
            PositionState::NoAction => "no_action",
            PositionState::Buy => "buy",
            PositionState::Sell => "sell",
            PositionState::Hold => "hold",
        }
    }

    /// Whether a position is open after a tick with this action.
    pub fn position_open(&self) -> bool {
        matches!(self, PositionState::Buy | PositionState::Hold)
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PositionState {
    type Err = anyhow::Error;

    // Unrecognized labels are rejected rather than defaulted to NoAction: a
    // row with a bad state would silently misalign every later lifecycle.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_action" => Ok(PositionState::NoAction),
            "buy" => Ok(PositionState::Buy),
            "sell" => Ok(PositionState::Sell),
            "hold" => Ok(PositionState::Hold),
            other => anyhow::bail!("unrecognized position state {other:?}"),
        }
    }
}

/// Whether the indicator sits in the trade zone (attractively low price).
pub fn in_trade_zone(indicator: Decimal, threshold: Decimal) -> bool {
    indicator < threshold
}

/// Transition function of the four-state machine.
///
/// | previous | in zone | out of zone |
/// |----------|---------|-------------|
/// | NoAction | Buy     | NoAction    |
/// | Buy      | Hold    | Sell        |
/// | Sell     | Buy     | NoAction    |
/// | Hold     | Hold    | Sell        |
pub fn next_state(previous: PositionState, in_zone: bool) -> PositionState {
    use PositionState::*;
    match (previous, in_zone) {
        (NoAction, true) => Buy,
        (NoAction, false) => NoAction,
        (Buy, true) => Hold,
        (Buy, false) => Sell,
        (Sell, true) => Buy,
        (Sell, false) => NoAction,
        (Hold, true) => Hold,
        (Hold, false) => Sell,
    }
}
