use crate::{
    ExecutionError,
    algo::{CHILD_QUANTITY_SCALE, ChildRequest},
    order::{ClientOrderId, Order, OrderId, OrderKind, StrategyId, TimeInForce},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vela_instrument::{Side, Symbol};

/// Configuration of an [`Iceberg`] decomposition.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct IcebergConfig {
    /// Fraction of the parent quantity visible on the book at once, in `(0, 1]`.
    pub visible_ratio: Decimal,
}

/// Child limit order currently resting on the book.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
struct ActiveChild {
    sequence: usize,
    cid: ClientOrderId,
    remaining: Decimal,
}

/// Iceberg execution: keeps at most one visible child limit order on the book,
/// replenishing at the same limit price as each child completes, until the parent
/// quantity is exhausted.
///
/// Pure state machine: [`Iceberg::poll`] emits the next child when none is resting,
/// [`Iceberg::record_fill`] consumes book fills. Cancellation freezes the remaining
/// quantity and hands back the resting child for the caller to cancel on the venue.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Iceberg {
    strategy: StrategyId,
    parent: OrderId,
    symbol: Symbol,
    side: Side,
    limit_price: Decimal,
    total_quantity: Decimal,
    remaining: Decimal,
    visible_quantity: Decimal,
    active: Option<ActiveChild>,
    next_sequence: usize,
    cancelled: bool,
}

impl Iceberg {
    /// Initialise an [`Iceberg`] for the provided parent [`Order`].
    pub fn new(parent: &Order, config: IcebergConfig) -> Result<Self, ExecutionError> {
        if parent.kind != OrderKind::Iceberg {
            return Err(ExecutionError::InvalidRequest(format!(
                "cannot run iceberg for a {} order",
                parent.kind
            )));
        }
        let Some(limit_price) = parent.price else {
            return Err(ExecutionError::InvalidRequest(String::from(
                "iceberg requires a limit price",
            )));
        };
        if config.visible_ratio <= Decimal::ZERO || config.visible_ratio > Decimal::ONE {
            return Err(ExecutionError::InvalidRequest(format!(
                "visible ratio must be in (0, 1], got {}",
                config.visible_ratio
            )));
        }

        let visible_quantity = (parent.quantity * config.visible_ratio)
            .trunc_with_scale(CHILD_QUANTITY_SCALE);
        if visible_quantity <= Decimal::ZERO {
            return Err(ExecutionError::InvalidRequest(format!(
                "visible slice of {} x {} is not routable",
                parent.quantity, config.visible_ratio
            )));
        }

        Ok(Self {
            strategy: parent.strategy.clone(),
            parent: parent.id.clone(),
            symbol: parent.symbol.clone(),
            side: parent.side,
            limit_price,
            total_quantity: parent.quantity,
            remaining: parent.quantity,
            visible_quantity,
            active: None,
            next_sequence: 0,
            cancelled: false,
        })
    }

    /// Emit the next visible child if none is resting and quantity remains.
    pub fn poll(&mut self) -> Option<ChildRequest> {
        if self.cancelled || self.active.is_some() || self.remaining <= Decimal::ZERO {
            return None;
        }

        let sequence = self.next_sequence;
        let quantity = self.visible_quantity.min(self.remaining);
        let cid = ClientOrderId::for_child(&self.strategy, &self.parent, sequence);

        self.next_sequence += 1;
        self.active = Some(ActiveChild {
            sequence,
            cid: cid.clone(),
            remaining: quantity,
        });

        Some(ChildRequest {
            sequence,
            cid,
            symbol: self.symbol.clone(),
            side: self.side,
            kind: OrderKind::Limit,
            quantity,
            price: Some(self.limit_price),
            time_in_force: TimeInForce::GoodUntilCancelled,
        })
    }

    /// Consume a book fill against the resting child.
    pub fn record_fill(&mut self, quantity: Decimal) -> Result<(), ExecutionError> {
        let Some(active) = self.active.as_mut() else {
            return Err(ExecutionError::InvalidRequest(String::from(
                "iceberg fill without a resting child",
            )));
        };

        if quantity > active.remaining {
            return Err(ExecutionError::Overfill {
                fill: quantity.to_string(),
                remaining: active.remaining.to_string(),
            });
        }

        active.remaining -= quantity;
        self.remaining -= quantity;

        if active.remaining == Decimal::ZERO {
            self.active = None;
        }

        Ok(())
    }

    /// Stop replenishing, freeze the remaining quantity, and hand back the resting child
    /// (if any) for the caller to cancel on the venue.
    pub fn cancel(&mut self) -> Option<ClientOrderId> {
        self.cancelled = true;
        self.active.take().map(|active| active.cid)
    }

    /// Client order id of the resting child, if one is on the book.
    pub fn active_child(&self) -> Option<&ClientOrderId> {
        self.active.as_ref().map(|active| &active.cid)
    }

    pub fn remaining(&self) -> Decimal {
        self.remaining
    }

    pub fn filled_quantity(&self) -> Decimal {
        self.total_quantity - self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == Decimal::ZERO
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;
    use vela_instrument::ExchangeId;

    fn iceberg(quantity: Decimal, visible_ratio: Decimal) -> Iceberg {
        let parent = Order::open(
            crate::order::OrderRequest::new(
                StrategyId::new("strat_a"),
                ExchangeId::Simulated,
                Symbol::new("btc_usdt"),
                Side::Buy,
                OrderKind::Iceberg,
                quantity,
                Some(dec!(50000)),
                None,
                TimeInForce::GoodUntilCancelled,
            ),
            DateTime::<Utc>::MIN_UTC,
        )
        .unwrap();

        Iceberg::new(&parent, IcebergConfig { visible_ratio }).unwrap()
    }

    #[test]
    fn test_iceberg_replenishes_until_exhausted() {
        let mut iceberg = iceberg(dec!(1.0), dec!(0.1));
        let mut total = Decimal::ZERO;
        let mut children = 0;

        while let Some(child) = iceberg.poll() {
            // at most one resting child at any instant
            assert!(iceberg.poll().is_none());
            assert_eq!(child.quantity, dec!(0.1));
            assert_eq!(child.price, Some(dec!(50000)));

            iceberg.record_fill(child.quantity).unwrap();
            total += child.quantity;
            children += 1;
        }

        assert_eq!(children, 10);
        assert_eq!(total, dec!(1.0));
        assert!(iceberg.is_complete());
        assert_eq!(iceberg.remaining(), dec!(0));
    }

    #[test]
    fn test_iceberg_partial_child_fill_keeps_child_resting() {
        let mut iceberg = iceberg(dec!(1.0), dec!(0.2));

        let child = iceberg.poll().unwrap();
        assert_eq!(child.quantity, dec!(0.2));

        iceberg.record_fill(dec!(0.05)).unwrap();
        // child still resting: no replenishment yet
        assert!(iceberg.poll().is_none());
        assert_eq!(iceberg.remaining(), dec!(0.95));

        iceberg.record_fill(dec!(0.15)).unwrap();
        // child complete: next slice becomes available
        assert!(iceberg.poll().is_some());
    }

    #[test]
    fn test_iceberg_final_slice_clamps_to_remaining() {
        let mut iceberg = iceberg(dec!(0.5), dec!(0.3));
        let mut quantities = Vec::new();

        while let Some(child) = iceberg.poll() {
            quantities.push(child.quantity);
            iceberg.record_fill(child.quantity).unwrap();
        }

        assert_eq!(quantities, vec![dec!(0.15), dec!(0.15), dec!(0.15), dec!(0.05)]);
    }

    #[test]
    fn test_iceberg_cancel_freezes_remaining() {
        let mut iceberg = iceberg(dec!(1.0), dec!(0.1));

        let child = iceberg.poll().unwrap();
        iceberg.record_fill(dec!(0.04)).unwrap();

        let cancelled_child = iceberg.cancel();
        assert_eq!(cancelled_child, Some(child.cid));
        assert_eq!(iceberg.remaining(), dec!(0.96));

        // no further children after cancellation
        assert!(iceberg.poll().is_none());
        assert!(iceberg.active_child().is_none());
    }
}
