use crate::ExecutionError;
use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use uuid::Uuid;
use vela_instrument::{ExchangeId, Side, Symbol};

/// Unique identifier for an [`Order`].
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct OrderId(pub SmolStr);

impl OrderId {
    pub fn new<S>(id: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(id.into())
    }

    /// Generate a random [`OrderId`].
    pub fn random() -> Self {
        Self(SmolStr::new(Uuid::new_v4().to_string()))
    }
}

/// Venue-facing identifier for an [`Order`], chosen by us.
///
/// Deterministic for algorithm children (`strategy:parent:sequence`), so a retried
/// submission after a network failure reuses the same id and cannot double-execute.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct ClientOrderId(pub SmolStr);

impl ClientOrderId {
    pub fn new<S>(id: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(id.into())
    }

    pub fn random() -> Self {
        Self(SmolStr::new(Uuid::new_v4().to_string()))
    }

    /// Deterministic id for the `sequence`-th child of an algorithm parent order.
    pub fn for_child(strategy: &StrategyId, parent: &OrderId, sequence: usize) -> Self {
        Self(SmolStr::new(format!("{strategy}:{parent}:{sequence}")))
    }
}

/// Unique identifier for the strategy that emitted an [`Order`].
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From,
)]
pub struct StrategyId(pub SmolStr);

impl StrategyId {
    pub fn new<S>(id: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(id.into())
    }

    /// [`StrategyId`] for orders generated by the system itself (eg/ emergency flattening).
    pub fn system() -> Self {
        Self::new("system")
    }
}

/// Type of an [`Order`].
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
    StopLimit,
    Twap,
    Iceberg,
}

impl OrderKind {
    /// Algorithm kinds decompose into child orders rather than being routed directly.
    pub fn is_algorithm(&self) -> bool {
        matches!(self, OrderKind::Twap | OrderKind::Iceberg)
    }
}

/// Order lifetime policy.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Rest on the book until filled or cancelled.
    GoodUntilCancelled,
    /// Fill what is immediately available, cancel the remainder.
    ImmediateOrCancel,
    /// Fill the entire quantity immediately, or cancel.
    FillOrKill,
}

/// Lifecycle state of an [`Order`].
///
/// Transitions form a DAG terminating in `Filled`, `Cancelled` or `Rejected`:
/// ```text
/// Pending ─> Submitted ─> PartiallyFilled ─> Filled
///     │          │     ╲        │       ╲
///     │          │      ╲> Cancelling ──╲──> Filled | Cancelled
///     ╰> Rejected╯
/// ```
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Submitted,
    PartiallyFilled,
    Cancelling,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses never mutate again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// Request to create an [`Order`], as emitted by the signal router or an API caller.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct OrderRequest {
    pub strategy: StrategyId,
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Market order request with [`TimeInForce::GoodUntilCancelled`].
    pub fn market(
        strategy: StrategyId,
        exchange: ExchangeId,
        symbol: Symbol,
        side: Side,
        quantity: Decimal,
    ) -> Self {
        Self {
            strategy,
            exchange,
            symbol,
            side,
            kind: OrderKind::Market,
            quantity,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::GoodUntilCancelled,
        }
    }

    /// Limit order request with [`TimeInForce::GoodUntilCancelled`].
    pub fn limit(
        strategy: StrategyId,
        exchange: ExchangeId,
        symbol: Symbol,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            strategy,
            exchange,
            symbol,
            side,
            kind: OrderKind::Limit,
            quantity,
            price: Some(price),
            stop_price: None,
            time_in_force: TimeInForce::GoodUntilCancelled,
        }
    }

    /// Validate this request is internally consistent.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.quantity <= Decimal::ZERO {
            return Err(ExecutionError::InvalidRequest(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }

        match self.kind {
            OrderKind::Limit | OrderKind::StopLimit | OrderKind::Iceberg
                if self.price.is_none() =>
            {
                Err(ExecutionError::InvalidRequest(format!(
                    "{} order requires a limit price",
                    self.kind
                )))
            }
            OrderKind::Stop | OrderKind::StopLimit if self.stop_price.is_none() => {
                Err(ExecutionError::InvalidRequest(format!(
                    "{} order requires a stop price",
                    self.kind
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Mutable order record tracking the lifecycle from strategy emission to terminal status.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub cid: ClientOrderId,
    pub parent: Option<OrderId>,
    pub strategy: StrategyId,
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub average_fill_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Open a new [`Order`] in `Pending` status from the provided request.
    pub fn open(request: OrderRequest, time: DateTime<Utc>) -> Result<Self, ExecutionError> {
        request.validate()?;

        let id = OrderId::random();
        Ok(Self {
            cid: ClientOrderId::new(id.0.clone()),
            id,
            parent: None,
            strategy: request.strategy,
            exchange: request.exchange,
            symbol: request.symbol,
            side: request.side,
            kind: request.kind,
            quantity: request.quantity,
            price: request.price,
            stop_price: request.stop_price,
            time_in_force: request.time_in_force,
            status: OrderStatus::Pending,
            filled_quantity: Decimal::ZERO,
            average_fill_price: Decimal::ZERO,
            created_at: time,
        })
    }

    /// Open a child [`Order`] of an algorithm parent, with a deterministic
    /// [`ClientOrderId`] derived from `(strategy, parent, sequence)`.
    pub fn open_child(
        request: OrderRequest,
        parent: OrderId,
        sequence: usize,
        time: DateTime<Utc>,
    ) -> Result<Self, ExecutionError> {
        let mut order = Self::open(request, time)?;
        order.cid = ClientOrderId::for_child(&order.strategy, &parent, sequence);
        order.parent = Some(parent);
        Ok(order)
    }

    /// Unfilled remainder of this order.
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition `Pending` -> `Submitted`.
    pub fn submit(&mut self) -> Result<(), ExecutionError> {
        match self.status {
            OrderStatus::Pending => {
                self.status = OrderStatus::Submitted;
                Ok(())
            }
            from => Err(self.invalid_transition(from, OrderStatus::Submitted)),
        }
    }

    /// Transition `Pending` | `Submitted` -> `Rejected`.
    pub fn reject(&mut self) -> Result<(), ExecutionError> {
        match self.status {
            OrderStatus::Pending | OrderStatus::Submitted => {
                self.status = OrderStatus::Rejected;
                Ok(())
            }
            from => Err(self.invalid_transition(from, OrderStatus::Rejected)),
        }
    }

    /// Apply a fill, updating `filled_quantity` (non-decreasing) and the quantity-weighted
    /// `average_fill_price`.
    ///
    /// A fill that lands while `Cancelling` is still applied; the order becomes `Filled`
    /// if it completes the quantity. Fills against a terminal order are an error.
    pub fn apply_fill(&mut self, quantity: Decimal, price: Decimal) -> Result<(), ExecutionError> {
        if self.is_terminal() || self.status == OrderStatus::Pending {
            return Err(self.invalid_transition(self.status, OrderStatus::PartiallyFilled));
        }

        let remaining = self.remaining_quantity();
        if quantity > remaining {
            return Err(ExecutionError::Overfill {
                fill: quantity.to_string(),
                remaining: remaining.to_string(),
            });
        }

        let filled_total = self.filled_quantity + quantity;
        self.average_fill_price = (self.filled_quantity * self.average_fill_price
            + quantity * price)
            / filled_total;
        self.filled_quantity = filled_total;

        if self.filled_quantity == self.quantity {
            self.status = OrderStatus::Filled;
        } else if self.status != OrderStatus::Cancelling {
            self.status = OrderStatus::PartiallyFilled;
        }

        Ok(())
    }

    /// Begin cancellation: `Submitted` | `PartiallyFilled` -> `Cancelling`.
    ///
    /// Idempotent: repeat requests and requests against terminal orders are no-ops
    /// returning `false`.
    pub fn begin_cancel(&mut self) -> bool {
        match self.status {
            OrderStatus::Pending | OrderStatus::Submitted | OrderStatus::PartiallyFilled => {
                self.status = OrderStatus::Cancelling;
                true
            }
            _ => false,
        }
    }

    /// Complete cancellation: `Cancelling` -> `Cancelled`, preserving any partial fill.
    pub fn complete_cancel(&mut self) -> Result<(), ExecutionError> {
        match self.status {
            OrderStatus::Cancelling => {
                self.status = OrderStatus::Cancelled;
                Ok(())
            }
            // already terminal via a racing fill
            OrderStatus::Filled | OrderStatus::Cancelled => Ok(()),
            from => Err(self.invalid_transition(from, OrderStatus::Cancelled)),
        }
    }

    fn invalid_transition(&self, from: OrderStatus, to: OrderStatus) -> ExecutionError {
        ExecutionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
