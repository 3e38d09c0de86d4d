use crate::{
    portfolio::position::Position,
    strategy::{Signal, SignalKind},
};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Decimal places order quantities are truncated to.
const QUANTITY_SCALE: u32 = 8;

/// How entry order quantities are sized.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizing {
    /// Spend this fraction of current equity per full-strength signal.
    PercentOfEquity(Decimal),
    /// Spend this quote-denominated value per full-strength signal.
    FixedNotional(Decimal),
}

/// Converts advisory signals into order quantities.
///
/// Entries are scaled by signal strength and haircut by `cost_buffer` (the combined
/// commission and slippage rate) so the resulting fill cannot overdraw cash. Exits close
/// the full held quantity. Quantities below `min_quantity` are not routable and the
/// caller drops the signal.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct DefaultAllocator {
    pub sizing: PositionSizing,
    pub cost_buffer: Decimal,
    pub min_quantity: Decimal,
}

impl DefaultAllocator {
    pub fn new(sizing: PositionSizing, cost_buffer: Decimal) -> Self {
        Self {
            sizing,
            cost_buffer,
            min_quantity: Decimal::new(1, QUANTITY_SCALE),
        }
    }

    /// Order quantity for the provided signal, or zero when nothing should be routed.
    pub fn allocate(
        &self,
        signal: &Signal,
        reference_price: Decimal,
        equity: Decimal,
        position: Option<&Position>,
    ) -> Decimal {
        match signal.kind {
            SignalKind::Hold => Decimal::ZERO,
            SignalKind::Sell => position
                .map(|position| position.quantity)
                .unwrap_or(Decimal::ZERO),
            SignalKind::Buy => {
                if reference_price <= Decimal::ZERO {
                    return Decimal::ZERO;
                }

                let notional = match self.sizing {
                    PositionSizing::PercentOfEquity(fraction) => equity * fraction,
                    PositionSizing::FixedNotional(value) => value,
                };

                let strength =
                    Decimal::from_f64(signal.strength.value()).unwrap_or(Decimal::ZERO);

                let quantity = (notional * strength)
                    / (reference_price * (Decimal::ONE + self.cost_buffer));
                quantity.trunc_with_scale(QUANTITY_SCALE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;
    use vela_instrument::Symbol;

    fn signal(kind: SignalKind, strength: f64) -> Signal {
        Signal::new(DateTime::<Utc>::MIN_UTC, Symbol::new("btc_usdt"), kind, strength)
    }

    #[test]
    fn test_buy_sized_by_equity_and_strength() {
        let allocator =
            DefaultAllocator::new(PositionSizing::PercentOfEquity(dec!(0.5)), dec!(0));

        let quantity = allocator.allocate(
            &signal(SignalKind::Buy, 1.0),
            dec!(100),
            dec!(10_000),
            None,
        );
        assert_eq!(quantity, dec!(50));

        let half = allocator.allocate(&signal(SignalKind::Buy, 0.5), dec!(100), dec!(10_000), None);
        assert_eq!(half, dec!(25));
    }

    #[test]
    fn test_cost_buffer_prevents_overdraw() {
        let allocator =
            DefaultAllocator::new(PositionSizing::PercentOfEquity(dec!(1.0)), dec!(0.0015));

        let quantity = allocator.allocate(
            &signal(SignalKind::Buy, 1.0),
            dec!(100),
            dec!(10_000),
            None,
        );

        // quantity * price * (1 + costs) stays within equity
        assert!(quantity * dec!(100) * dec!(1.0015) <= dec!(10_000));
        assert!(quantity > dec!(99.8));
    }

    #[test]
    fn test_sell_closes_full_position() {
        let allocator =
            DefaultAllocator::new(PositionSizing::FixedNotional(dec!(1_000)), dec!(0));
        let position = Position::enter(Symbol::new("btc_usdt"), dec!(2), dec!(100));

        let quantity = allocator.allocate(
            &signal(SignalKind::Sell, 1.0),
            dec!(110),
            dec!(10_000),
            Some(&position),
        );
        assert_eq!(quantity, dec!(2));

        // flat book: nothing to sell
        let quantity =
            allocator.allocate(&signal(SignalKind::Sell, 1.0), dec!(110), dec!(10_000), None);
        assert_eq!(quantity, dec!(0));
    }

    #[test]
    fn test_hold_allocates_nothing() {
        let allocator =
            DefaultAllocator::new(PositionSizing::PercentOfEquity(dec!(1.0)), dec!(0));
        let quantity = allocator.allocate(
            &signal(SignalKind::Hold, 1.0),
            dec!(100),
            dec!(10_000),
            None,
        );
        assert_eq!(quantity, dec!(0));
    }
}
