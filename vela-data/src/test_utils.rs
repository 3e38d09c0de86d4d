use crate::{bar::Bar, event::MarketEvent};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use vela_instrument::{ExchangeId, Symbol};

/// Flat [`Bar`] closing at the provided integer price, with a one-unit high/low spread.
pub fn bar_at(time: DateTime<Utc>, close: i64) -> Bar {
    let close = Decimal::from(close);
    Bar::builder()
        .time(time)
        .open(close)
        .high(close + Decimal::ONE)
        .low(close - Decimal::ONE)
        .close(close)
        .volume(Decimal::from(1000))
        .build()
        .unwrap()
}

/// Single-symbol [`MarketEvent`] wrapping the provided [`Bar`].
pub fn market_event(symbol: Symbol, bar: Bar) -> MarketEvent {
    MarketEvent::new(bar.time, ExchangeId::Simulated, IndexMap::from([(symbol, bar)]))
}
