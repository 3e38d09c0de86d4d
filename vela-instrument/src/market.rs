use crate::{ExchangeId, Symbol};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Venue-published trading constraints for a [`Symbol`], as returned by a venue's market
/// metadata endpoint.
///
/// Orders sized below `min_quantity` or below `min_notional` are not routable and must be
/// dropped before submission.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Market {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub base: Symbol,
    pub quote: Symbol,
    pub min_quantity: Decimal,
    pub min_notional: Decimal,
    pub price_precision: u32,
    pub quantity_precision: u32,
}

impl Market {
    /// Round the provided quantity down to this market's `quantity_precision`.
    pub fn round_quantity(&self, quantity: Decimal) -> Decimal {
        quantity.trunc_with_scale(self.quantity_precision)
    }

    /// Is an order of the provided quantity and reference price routable on this market?
    pub fn is_routable(&self, quantity: Decimal, price: Decimal) -> bool {
        quantity >= self.min_quantity && quantity * price >= self.min_notional
    }
}
