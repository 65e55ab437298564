//! Realized P&L accounting over the trade history.
//!
//! Every derived column is recomputed over the full table on every tick, as a
//! deterministic function of the table's primal fields. Nothing is maintained
//! incrementally, so a corrected historical row can never leave downstream
//! aggregates stale, and re-evaluating an already-evaluated table is a no-op.

use crate::history::{History, Outcome};
use crate::strategy::PositionState;
use crate::utils::decimal::safe_div;
use rust_decimal::Decimal;

/// Recompute all derived columns in place.
///
/// For a Sell row, `net_profit` is the one-row lag delta of the closing
/// venue's quote-asset balance minus the configured bet. The lag assumes no
/// other balance-affecting activity hit that venue between the Buy and the
/// Sell; an unrelated deposit or withdrawal in that window shows up as
/// misattributed profit or loss.
pub fn evaluate(history: &mut History, bet_size: Decimal) {
    let records = history.records_mut();
    let mut running_capital_risked = Decimal::ZERO;
    let mut running_net_profit = Decimal::ZERO;

    for i in 0..records.len() {
        running_capital_risked += records[i].capital_risked;

        // Start from a clean slate so evaluation is a pure function of the
        // primal fields, whatever an earlier run wrote here.
        records[i].net_profit = None;
        records[i].raroi = None;
        records[i].outcome_excluding_fees = None;
        records[i].outcome_including_fees = None;

        if records[i].state == PositionState::Sell && i > 0 {
            if let Some(venue) = records[i].venue {
                let pre_trade = records[i - 1].balances.get(venue).quote_asset;
                let post_trade = records[i].balances.get(venue).quote_asset;
                let net_profit = post_trade - pre_trade - bet_size;
                let fees = records[i].total_fees();

                records[i].net_profit = Some(net_profit);
                records[i].raroi = Some(safe_div(net_profit, bet_size));
                // Fees are already embedded in the balance delta, so the
                // fee-free view adds them back.
                records[i].outcome_excluding_fees = classify(net_profit + fees);
                records[i].outcome_including_fees = classify(net_profit);
            }
        }

        running_net_profit += records[i].net_profit.unwrap_or(Decimal::ZERO);
        records[i].running_capital_risked = running_capital_risked;
        records[i].running_net_profit = running_net_profit;
        records[i].running_raroi = safe_div(running_net_profit, running_capital_risked);
    }
}

fn classify(value: Decimal) -> Option<Outcome> {
    if value > Decimal::ZERO {
        Some(Outcome::Win)
    } else if value < Decimal::ZERO {
        Some(Outcome::Loss)
    } else {
        None
    }
}
