//! Tick-level error taxonomy.
//!
//! None of these are retried within a tick. Each aborts the current tick
//! before anything is persisted, leaving the history store at its
//! last-known-good table; the next scheduled tick retries from there.

use crate::exchange::Venue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TickError {
    /// A venue's quote call failed. Best execution needs both quotes, so the
    /// tick aborts rather than guessing.
    #[error("{venue} could not supply a quote")]
    QuoteUnavailable {
        venue: Venue,
        #[source]
        source: anyhow::Error,
    },

    /// A Sell or Hold could not resolve the venue that opened the position.
    /// The history no longer describes a coherent lifecycle; aborting loudly
    /// beats liquidating on a guessed venue.
    #[error("cannot resolve the opening venue for the current position")]
    VenueResolution,

    /// The market order call errored or returned a non-success status. The
    /// position state is left unresolved for the next tick to retry.
    #[error("order placement failed on {venue}")]
    OrderPlacement {
        venue: Venue,
        #[source]
        source: anyhow::Error,
    },

    /// Post-trade balance capture failed; the row cannot be completed.
    #[error("{venue} could not supply a balance")]
    BalanceUnavailable {
        venue: Venue,
        #[source]
        source: anyhow::Error,
    },

    /// The price feed or indicator computation failed before any decision.
    #[error("price feed error")]
    Feed(#[source] anyhow::Error),

    /// History load or save failed. Data is never silently dropped: the save
    /// path either commits the full updated table or nothing.
    #[error("history persistence error")]
    Persistence(#[source] anyhow::Error),
}
