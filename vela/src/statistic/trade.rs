use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use vela_execution::fill::Fill;
use vela_instrument::{Side, Symbol};

/// An open buy lot awaiting FIFO consumption.
#[derive(Debug, Clone, Copy)]
struct Lot {
    quantity: Decimal,
    price: Decimal,
}

/// A matched buy+sell pair closing some quantity of a position.
///
/// `pnl` is net of the closing fill's costs; entry costs were already charged against
/// cash when the lots were opened.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RoundTrip {
    pub symbol: Symbol,
    pub quantity: Decimal,
    /// Quantity-weighted entry price of the consumed lots.
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub pnl: Decimal,
    pub time_exit: DateTime<Utc>,
}

/// Pair fills into round-trips using FIFO lot matching per symbol. Long-only: each sell
/// consumes the oldest open buy lots of its symbol; sells with no open lots are skipped.
pub fn fifo_round_trips(fills: &[Fill]) -> Vec<RoundTrip> {
    let mut lots: FnvHashMap<Symbol, VecDeque<Lot>> = FnvHashMap::default();
    let mut round_trips = Vec::new();

    for fill in fills {
        match fill.side {
            Side::Buy => {
                lots.entry(fill.symbol.clone()).or_default().push_back(Lot {
                    quantity: fill.quantity,
                    price: fill.price,
                });
            }
            Side::Sell => {
                let Some(open_lots) = lots.get_mut(&fill.symbol) else {
                    continue;
                };

                let mut remaining = fill.quantity;
                let mut matched = Decimal::ZERO;
                let mut entry_value = Decimal::ZERO;

                while remaining > Decimal::ZERO {
                    let Some(lot) = open_lots.front_mut() else {
                        break;
                    };

                    let consumed = lot.quantity.min(remaining);
                    matched += consumed;
                    entry_value += consumed * lot.price;
                    remaining -= consumed;
                    lot.quantity -= consumed;

                    if lot.quantity.is_zero() {
                        open_lots.pop_front();
                    }
                }

                if matched.is_zero() {
                    continue;
                }

                let entry_price = entry_value / matched;
                let pnl = (fill.price - entry_price) * matched - fill.cost();

                round_trips.push(RoundTrip {
                    symbol: fill.symbol.clone(),
                    quantity: matched,
                    entry_price,
                    exit_price: fill.price,
                    pnl,
                    time_exit: fill.time,
                });
            }
        }
    }

    round_trips
}
