use crate::{
    ExecutionError,
    algo::{CHILD_QUANTITY_SCALE, ChildRequest},
    order::{ClientOrderId, Order, OrderId, OrderKind, StrategyId, TimeInForce},
};
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use vela_instrument::{Side, Symbol};

/// Configuration of a [`Twap`] decomposition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TwapConfig {
    pub slices: u32,
    pub interval: TimeDelta,
}

/// Time-weighted average price execution: fires equal-sized child market orders at fixed
/// intervals until the parent quantity is exhausted.
///
/// Pure state machine: [`Twap::on_tick`] consumes the current time (event time in a
/// backtest, wall-clock when live) and emits the child orders that are due. The last slice
/// absorbs quantisation, so child quantities always sum to the parent quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct Twap {
    strategy: StrategyId,
    parent: OrderId,
    symbol: Symbol,
    side: Side,
    total_quantity: Decimal,
    slice_quantity: Decimal,
    slices: u32,
    interval: TimeDelta,
    start: DateTime<Utc>,
    fired_slices: u32,
    filled_quantity: Decimal,
    cancelled: bool,
}

impl Twap {
    /// Initialise a [`Twap`] for the provided parent [`Order`], scheduled from `start`.
    pub fn new(parent: &Order, config: TwapConfig, start: DateTime<Utc>) -> Result<Self, ExecutionError> {
        if parent.kind != OrderKind::Twap {
            return Err(ExecutionError::InvalidRequest(format!(
                "cannot run TWAP for a {} order",
                parent.kind
            )));
        }
        if config.slices == 0 {
            return Err(ExecutionError::InvalidRequest(String::from(
                "TWAP requires at least one slice",
            )));
        }

        let slice_quantity = (parent.quantity / Decimal::from(config.slices))
            .trunc_with_scale(CHILD_QUANTITY_SCALE);
        if slice_quantity <= Decimal::ZERO {
            return Err(ExecutionError::InvalidRequest(format!(
                "quantity {} cannot be split into {} slices",
                parent.quantity, config.slices
            )));
        }

        Ok(Self {
            strategy: parent.strategy.clone(),
            parent: parent.id.clone(),
            symbol: parent.symbol.clone(),
            side: parent.side,
            total_quantity: parent.quantity,
            slice_quantity,
            slices: config.slices,
            interval: config.interval,
            start,
            fired_slices: 0,
            filled_quantity: Decimal::ZERO,
            cancelled: false,
        })
    }

    /// Time the next unfired slice is due, if any remain.
    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        (!self.cancelled && self.fired_slices < self.slices)
            .then(|| self.start + self.interval * self.fired_slices as i32)
    }

    /// Emit every child order due at `now`. Catches up if ticks were missed.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> Vec<ChildRequest> {
        let mut children = Vec::new();

        while let Some(due) = self.next_fire_time() {
            if now < due {
                break;
            }

            let sequence = self.fired_slices as usize;
            let quantity = if self.fired_slices == self.slices - 1 {
                // last slice absorbs quantisation remainder
                self.total_quantity - self.slice_quantity * Decimal::from(self.slices - 1)
            } else {
                self.slice_quantity
            };

            children.push(ChildRequest {
                sequence,
                cid: ClientOrderId::for_child(&self.strategy, &self.parent, sequence),
                symbol: self.symbol.clone(),
                side: self.side,
                kind: OrderKind::Market,
                quantity,
                price: None,
                time_in_force: TimeInForce::GoodUntilCancelled,
            });

            self.fired_slices += 1;
        }

        children
    }

    /// Record a child fill against the parent quantity.
    pub fn record_fill(&mut self, quantity: Decimal) {
        self.filled_quantity += quantity;
    }

    /// Completed share of the schedule, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.fired_slices as f64 / self.slices as f64
    }

    /// Stop firing further slices. Already-submitted children are cancelled by the caller
    /// through the execution engine.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Have all slices been fired?
    pub fn is_exhausted(&self) -> bool {
        self.fired_slices == self.slices
    }

    pub fn filled_quantity(&self) -> Decimal {
        self.filled_quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use vela_instrument::ExchangeId;

    fn twap_parent(quantity: Decimal) -> Order {
        Order::open(
            crate::order::OrderRequest::new(
                StrategyId::new("strat_a"),
                ExchangeId::Simulated,
                Symbol::new("btc_usdt"),
                Side::Buy,
                OrderKind::Twap,
                quantity,
                None,
                None,
                TimeInForce::GoodUntilCancelled,
            ),
            DateTime::<Utc>::MIN_UTC,
        )
        .unwrap()
    }

    #[test]
    fn test_twap_fires_on_schedule_and_conserves_quantity() {
        let start = DateTime::<Utc>::MIN_UTC + TimeDelta::days(1);
        let parent = twap_parent(dec!(1.0));
        let mut twap = Twap::new(
            &parent,
            TwapConfig {
                slices: 4,
                interval: TimeDelta::seconds(60),
            },
            start,
        )
        .unwrap();

        // nothing due before start
        assert!(twap.on_tick(start - TimeDelta::seconds(1)).is_empty());

        let mut emitted = Vec::new();
        for index in 0..4 {
            let children = twap.on_tick(start + TimeDelta::seconds(60 * index));
            assert_eq!(children.len(), 1);
            assert_eq!(children[0].sequence, index as usize);
            assert_eq!(children[0].quantity, dec!(0.25));
            emitted.extend(children);
        }

        assert!(twap.is_exhausted());
        assert_eq!(twap.progress(), 1.0);
        assert_eq!(
            emitted.iter().map(|child| child.quantity).sum::<Decimal>(),
            dec!(1.0)
        );

        // no further slices
        assert!(twap.on_tick(start + TimeDelta::seconds(600)).is_empty());
    }

    #[test]
    fn test_twap_last_slice_absorbs_rounding() {
        let parent = twap_parent(dec!(1.0));
        let mut twap = Twap::new(
            &parent,
            TwapConfig {
                slices: 3,
                interval: TimeDelta::seconds(60),
            },
            DateTime::<Utc>::MIN_UTC,
        )
        .unwrap();

        let children = twap.on_tick(DateTime::<Utc>::MIN_UTC + TimeDelta::seconds(600));
        assert_eq!(children.len(), 3);
        assert_eq!(
            children.iter().map(|child| child.quantity).sum::<Decimal>(),
            dec!(1.0)
        );
        assert!(children[2].quantity > children[0].quantity);
    }

    #[test]
    fn test_twap_catches_up_missed_ticks() {
        let start = DateTime::<Utc>::MIN_UTC;
        let parent = twap_parent(dec!(1.0));
        let mut twap = Twap::new(
            &parent,
            TwapConfig {
                slices: 4,
                interval: TimeDelta::seconds(60),
            },
            start,
        )
        .unwrap();

        // a late tick fires every due slice at once
        let children = twap.on_tick(start + TimeDelta::seconds(130));
        assert_eq!(children.len(), 3);
        assert_eq!(twap.progress(), 0.75);
    }

    #[test]
    fn test_twap_cancel_stops_unfired_slices() {
        let start = DateTime::<Utc>::MIN_UTC;
        let parent = twap_parent(dec!(1.0));
        let mut twap = Twap::new(
            &parent,
            TwapConfig {
                slices: 4,
                interval: TimeDelta::seconds(60),
            },
            start,
        )
        .unwrap();

        twap.on_tick(start);
        twap.cancel();

        assert!(twap.on_tick(start + TimeDelta::seconds(600)).is_empty());
        assert!(!twap.is_exhausted());
        assert_eq!(twap.next_fire_time(), None);
    }

    #[test]
    fn test_twap_rejects_unsliceable_quantity() {
        let parent = twap_parent(dec!(0.00000001));
        let result = Twap::new(
            &parent,
            TwapConfig {
                slices: 10,
                interval: TimeDelta::seconds(60),
            },
            DateTime::<Utc>::MIN_UTC,
        );
        assert!(result.is_err());
    }
}
