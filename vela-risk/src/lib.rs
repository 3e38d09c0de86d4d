//! # Vela-Risk
//! Risk management for Vela trading systems: an ordered rule engine gating every order, a
//! position & PnL monitor scanning live portfolios, an alert store with webhook fan-out,
//! and the emergency stop that flattens a user when critical thresholds are crossed.
//!
//! Rules are pure functions over a [`RiskContext`](context::RiskContext), so the shared
//! [`RuleEngine`](rule::RuleEngine) needs no locking to evaluate; only
//! [`RiskLimits`](limits::RiskLimits) reconfiguration takes a write lock.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Alert model, store, and webhook publisher.
pub mod alert;

/// [`RiskContext`](context::RiskContext) evaluated by the rules.
pub mod context;

/// Emergency stop: cancel everything, flatten everything.
pub mod emergency;

/// Tunable [`RiskLimits`](limits::RiskLimits) bundle.
pub mod limits;

/// Periodic position & PnL monitor loops.
pub mod monitor;

/// Per-user risk report assembly.
pub mod report;

/// Persistence interface for positions, equity marks, alerts and rate counters.
pub mod repository;

/// [`RiskRule`](rule::RiskRule) trait, the individual rules, and the [`RuleEngine`](rule::RuleEngine).
pub mod rule;

/// Unique identifier for a platform user.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct UserId(pub SmolStr);

impl UserId {
    pub fn new<S>(id: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(id.into())
    }
}

/// Ordinal severity derived from metric utilization against its configured limit.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Severity ladder shared by every rule's pass-side report: utilization >= 90% is
    /// critical, >= 70% high, >= 50% medium, else low.
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization >= 0.9 {
            RiskLevel::Critical
        } else if utilization >= 0.7 {
            RiskLevel::High
        } else if utilization >= 0.5 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// All errors generated by `vela-risk` components.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("rule {rule} precondition failed: missing context field {field}")]
    RulePrecondition { rule: String, field: String },

    #[error("malformed risk limits: {0}")]
    ConfigError(String),

    #[error("repository interaction failed: {0}")]
    Repository(String),

    #[error("order gateway failure: {0}")]
    Gateway(String),

    #[error("alert {0} not found")]
    AlertNotFound(String),
}

impl From<redis::RedisError> for RiskError {
    fn from(error: redis::RedisError) -> Self {
        Self::Repository(error.to_string())
    }
}

impl From<serde_json::Error> for RiskError {
    fn from(error: serde_json::Error) -> Self {
        Self::Repository(error.to_string())
    }
}
