use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use vela_data::{bar::Bar, event::MarketEvent};
use vela_execution::{fill::Fill, order::OrderId};
use vela_instrument::{ExchangeId, Side, Symbol};

/// Base timestamp used by deterministic fixtures.
pub fn time_base() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

/// [`Fill`] against a fixed order id, for driving the portfolio directly.
pub fn fill(
    symbol: &str,
    side: Side,
    quantity: Decimal,
    price: Decimal,
    commission: Decimal,
    slippage: Decimal,
) -> Fill {
    Fill::new(
        OrderId::new("order_1"),
        ExchangeId::Simulated,
        Symbol::new(symbol),
        side,
        quantity,
        price,
        commission,
        slippage,
        time_base(),
    )
    .unwrap()
}

/// Flat bar closing at `close` with a one-unit high/low spread, `hours` after the base
/// timestamp.
pub fn bar_at(hours: i64, close: i64) -> Bar {
    let close = Decimal::from(close);
    Bar::builder()
        .time(time_base() + TimeDelta::hours(hours))
        .open(close)
        .high(close + Decimal::ONE)
        .low(close - Decimal::ONE)
        .close(close)
        .volume(Decimal::from(1000))
        .build()
        .unwrap()
}

/// Single-symbol [`MarketEvent`] `hours` after the base timestamp.
pub fn market_event_at(symbol: &str, hours: i64, close: i64) -> MarketEvent {
    let bar = bar_at(hours, close);
    MarketEvent::new(
        bar.time,
        ExchangeId::Simulated,
        indexmap::IndexMap::from([(Symbol::new(symbol), bar)]),
    )
}
