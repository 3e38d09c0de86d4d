//! # Vela-Data
//! Market data feeds that act as the heartbeat of Vela trading systems.
//!
//! A feed yields [`MarketEvent`](event::MarketEvent)s through the [`MarketGenerator`] trait.
//! The [`HistoricalFeed`](historical::HistoricalFeed) replays bars loaded from a
//! [`HistoricalStore`](store::HistoricalStore) in strict timestamp order, bundling
//! co-timestamped bars of different symbols into a single event - this ordering is what makes
//! backtests deterministic. The [`LiveFeed`](live::LiveFeed) serves the identical interface
//! from a streaming channel.
//!
//! Both feeds answer `latest(symbol, n)` with the most recent `n` *emitted* bars, so a
//! strategy can never observe data ahead of the event it is handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validated OHLCV [`Bar`](bar::Bar).
pub mod bar;

/// [`MarketEvent`](event::MarketEvent) bundling co-timestamped bars.
pub mod event;

/// Historical [`Feed`] replaying bars from a [`HistoricalStore`](store::HistoricalStore).
pub mod historical;

/// Live [`Feed`] of market events arriving from an external stream.
pub mod live;

/// Logical interface to a historical bar store, and the [`Timeframe`](store::Timeframe) of
/// the bars it serves.
pub mod store;

/// Fixed-capacity ring buffer of recently emitted bars.
pub mod window;

/// Bar & event constructors for tests.
pub mod test_utils;

/// Generates the latest market `Event` (eg/ the next historical bar set in a backtest).
pub trait MarketGenerator<Event> {
    /// Return the latest market `Event`.
    fn next(&mut self) -> Feed<Event>;
}

/// Communicates the state of a market data [`Feed`].
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum Feed<Event> {
    Next(Event),
    Unhealthy,
    Finished,
}

/// All errors generated by `vela-data` components.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("invalid bar: {0}")]
    InvalidBar(String),

    #[error("bar series for {symbol} is not in ascending timestamp order")]
    UnorderedSeries { symbol: String },

    #[error("no bars available for {symbol} in the requested range")]
    EmptySeries { symbol: String },

    #[error("unsupported timeframe: {0}")]
    UnsupportedTimeframe(String),
}
