use crate::{
    RiskError, UserId,
    alert::{AlertId, RiskAlert},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vela_instrument::{PositionSide, Symbol};

/// In-memory twin of the Redis-backed repository.
pub mod in_memory;

/// Redis-backed repository.
pub mod redis;

/// Point-in-time view of one position, as persisted per user.
///
/// The monitor loops and the rule engine consume these snapshots; they never share the
/// live portfolio objects.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PositionSnapshot {
    pub symbol: Symbol,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

impl PositionSnapshot {
    /// Current value of this position.
    pub fn notional(&self) -> Decimal {
        self.quantity * self.current_price
    }
}

/// Persistence interface for the shared mutable state of the risk subsystem: per-user
/// position snapshots, equity marks, the alert log, and order-frequency counters.
///
/// Logical layout (mirrored by the Redis implementation's key scheme):
/// - `positions:{user}` - JSON map of [`PositionSnapshot`]s
/// - `equity:{user}`, `peak_equity:{user}`, `day_start_equity:{user}` - scalars
/// - `alerts:{user}:{alert_id}` + sorted index `alerts:list:{user}` (score = timestamp)
/// - `rl:{user}:{minute}` / `rl:{user}:{symbol}:{minute}` - counters with 60s expiry
pub trait RiskRepository: Send + Sync + 'static {
    fn register_user(&self, user: &UserId) -> Result<(), RiskError>;

    fn users(&self) -> Result<Vec<UserId>, RiskError>;

    fn get_positions(
        &self,
        user: &UserId,
    ) -> Result<FnvHashMap<Symbol, PositionSnapshot>, RiskError>;

    fn set_positions(
        &self,
        user: &UserId,
        positions: &FnvHashMap<Symbol, PositionSnapshot>,
    ) -> Result<(), RiskError>;

    fn get_equity(&self, user: &UserId) -> Result<Option<Decimal>, RiskError>;

    fn set_equity(&self, user: &UserId, equity: Decimal) -> Result<(), RiskError>;

    fn get_peak_equity(&self, user: &UserId) -> Result<Option<Decimal>, RiskError>;

    fn set_peak_equity(&self, user: &UserId, equity: Decimal) -> Result<(), RiskError>;

    fn get_day_start_equity(&self, user: &UserId) -> Result<Option<Decimal>, RiskError>;

    fn set_day_start_equity(&self, user: &UserId, equity: Decimal) -> Result<(), RiskError>;

    /// Record an order submission against the trailing-minute counters.
    fn record_order(
        &self,
        user: &UserId,
        symbol: &Symbol,
        time: DateTime<Utc>,
    ) -> Result<(), RiskError>;

    /// `(global, per_symbol)` order counts over the trailing minute.
    fn order_counts(
        &self,
        user: &UserId,
        symbol: &Symbol,
        time: DateTime<Utc>,
    ) -> Result<(u32, u32), RiskError>;

    fn push_alert(&self, alert: &RiskAlert, ttl: Duration) -> Result<(), RiskError>;

    fn update_alert(&self, alert: &RiskAlert, ttl: Duration) -> Result<(), RiskError>;

    fn get_alert(&self, user: &UserId, id: &AlertId) -> Result<Option<RiskAlert>, RiskError>;

    /// `(total, page)` of a user's alerts ordered newest first. `page` is 1-indexed.
    fn alert_page(
        &self,
        user: &UserId,
        page: usize,
        page_size: usize,
    ) -> Result<(usize, Vec<RiskAlert>), RiskError>;
}
