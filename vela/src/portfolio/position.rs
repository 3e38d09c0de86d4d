use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vela_instrument::{PositionSide, Symbol};
use vela_risk::repository::PositionSnapshot;

/// A held position in one symbol. Long-only: created by the first buy fill, destroyed
/// when the quantity returns to zero.
///
/// Invariant: `side == Flat` exactly when `quantity == 0`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

impl Position {
    /// Enter a new long position from the first buy fill.
    pub fn enter(symbol: Symbol, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol,
            side: PositionSide::Long,
            quantity,
            average_price: price,
            current_price: price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    /// Add to the position, rolling the weighted-average entry price forward.
    pub fn add(&mut self, quantity: Decimal, price: Decimal) {
        let total = self.quantity + quantity;
        self.average_price =
            (self.quantity * self.average_price + quantity * price) / total;
        self.quantity = total;
        self.mark(price);
    }

    /// Reduce the position by a sell fill, returning the realized PnL for the sold
    /// quantity. The caller clips `quantity` to the held amount beforehand.
    pub fn reduce(&mut self, quantity: Decimal, price: Decimal) -> Decimal {
        let realized = (price - self.average_price) * quantity;
        self.quantity -= quantity;
        self.realized_pnl += realized;

        if self.quantity.is_zero() {
            self.side = PositionSide::Flat;
        }
        self.mark(price);

        realized
    }

    /// Update the mark price and unrealized PnL.
    pub fn mark(&mut self, price: Decimal) {
        self.current_price = price;
        self.unrealized_pnl = (price - self.average_price) * self.quantity;
    }

    /// Current value of the position.
    pub fn notional(&self) -> Decimal {
        self.quantity * self.current_price
    }

    /// Copy-on-read snapshot handed to the risk subsystem.
    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            symbol: self.symbol.clone(),
            side: self.side,
            quantity: self.quantity,
            average_price: self.average_price,
            current_price: self.current_price,
            unrealized_pnl: self.unrealized_pnl,
            realized_pnl: self.realized_pnl,
        }
    }
}
