//! Performance statistics over equity curves and trade lists.
//!
//! Metrics follow the one-pass/pure-function style: small `calculate` constructors with
//! explicit special-case handling, scaled across [`TimeInterval`](time::TimeInterval)s
//! under the IID assumption.

/// Measures of dispersion (range, variance, standard deviation).
pub mod dispersion;

/// Individual performance metrics.
pub mod metric;

/// [`TradingSummary`](summary::TradingSummary) aggregation.
pub mod summary;

/// Time intervals used to scale metrics.
pub mod time;

/// FIFO round-trip pairing of fills.
pub mod trade;
