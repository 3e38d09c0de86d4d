use crate::order::{ClientOrderId, OrderKind, TimeInForce};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vela_instrument::{Side, Symbol};

/// Iceberg visible-slice replenishment.
pub mod iceberg;

/// Time-sliced TWAP decomposition.
pub mod twap;

/// Decimal places child quantities are truncated to.
pub(crate) const CHILD_QUANTITY_SCALE: u32 = 8;

/// Child order emitted by an execution algorithm.
///
/// Carries the deterministic [`ClientOrderId`] derived from
/// `(strategy, parent, sequence)`, so resubmission after a failure is idempotent.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChildRequest {
    pub sequence: usize,
    pub cid: ClientOrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,
}
