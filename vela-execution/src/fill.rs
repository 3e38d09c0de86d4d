use crate::{ExecutionError, order::OrderId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use uuid::Uuid;
use vela_instrument::{ExchangeId, Side, Symbol};

/// Unique identifier for a [`Fill`].
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
pub struct FillId(pub SmolStr);

impl FillId {
    pub fn random() -> Self {
        Self(SmolStr::new(Uuid::new_v4().to_string()))
    }
}

/// Immutable record of an execution against an [`Order`](crate::order::Order).
///
/// `commission` and `slippage` are quote-denominated costs attributed to this fill.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fill {
    pub id: FillId,
    pub order_id: OrderId,
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub slippage: Decimal,
    pub time: DateTime<Utc>,
}

impl Fill {
    /// Construct a checked [`Fill`]: `quantity` and `price` strictly positive, costs
    /// non-negative.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        exchange: ExchangeId,
        symbol: Symbol,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        commission: Decimal,
        slippage: Decimal,
        time: DateTime<Utc>,
    ) -> Result<Self, ExecutionError> {
        if quantity <= Decimal::ZERO {
            return Err(ExecutionError::InvalidRequest(format!(
                "fill quantity must be positive, got {quantity}"
            )));
        }
        if price <= Decimal::ZERO {
            return Err(ExecutionError::InvalidRequest(format!(
                "fill price must be positive, got {price}"
            )));
        }
        if commission < Decimal::ZERO || slippage < Decimal::ZERO {
            return Err(ExecutionError::InvalidRequest(String::from(
                "fill costs must be non-negative",
            )));
        }

        Ok(Self {
            id: FillId::random(),
            order_id,
            exchange,
            symbol,
            side,
            quantity,
            price,
            commission,
            slippage,
            time,
        })
    }

    /// Total cost of this fill attributed against cash (commission + slippage).
    pub fn cost(&self) -> Decimal {
        self.commission + self.slippage
    }
}
