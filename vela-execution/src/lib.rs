//! # Vela-Execution
//! Order and fill primitives shared by the simulated and live execution paths, the
//! [`ExchangeClient`](client::ExchangeClient) capability a live venue must provide, and the
//! stateful execution algorithms ([`Twap`](algo::twap::Twap), [`Iceberg`](algo::iceberg::Iceberg))
//! that decompose parent orders into child orders.
//!
//! The [`Order`](order::Order) state machine is the semantic contract both paths share: a
//! backtest fill and a live venue fill drive an order through the identical transitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution algorithms decomposing parent orders into child orders.
pub mod algo;

/// [`ExchangeClient`](client::ExchangeClient) capability and supporting venue types.
pub mod client;

/// Immutable [`Fill`](fill::Fill) record.
pub mod fill;

/// Live order execution with retries and idempotent client order ids.
pub mod live;

/// Mock venue used in tests and dry-runs.
pub mod mock;

/// [`Order`](order::Order) model and its status state machine.
pub mod order;

/// All errors generated by `vela-execution` components.
#[derive(Debug, Clone, PartialEq, Error, Deserialize, Serialize)]
pub enum ExecutionError {
    #[error("invalid order request: {0}")]
    InvalidRequest(String),

    #[error("invalid order status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("fill quantity {fill} exceeds order remainder {remaining}")]
    Overfill { fill: String, remaining: String },

    #[error("insufficient position to sell: requested {requested}, held {held}")]
    InsufficientPosition { requested: String, held: String },

    #[error("venue rejected order: {0}")]
    Rejected(String),

    #[error("venue rate limit hit")]
    RateLimit,

    #[error("network failure communicating with venue: {0}")]
    Network(String),

    #[error("venue request timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("market data unavailable for {0}")]
    MarketDataUnavailable(String),
}

impl ExecutionError {
    /// Is it worth retrying the request that produced this error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutionError::Network(_) | ExecutionError::RateLimit | ExecutionError::Timeout { .. }
        )
    }
}
