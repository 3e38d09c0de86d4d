use crate::{portfolio::EquityPoint, strategy::Signal};
use chrono::{DateTime, Utc};
use serde::Serialize;
use vela_data::event::MarketEvent;
use vela_execution::{fill::Fill, order::Order};

/// Events that drive the trading sequence: market data in, signals, orders, fills, and
/// the equity snapshots recording work done by the system.
///
/// Every event carries its own timestamp, which is what orders it on the
/// [`EventBus`](crate::engine::bus::EventBus).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Event {
    Market(MarketEvent),
    Signal(Signal),
    Order(Order),
    Fill(Fill),
    Equity(EquityPoint),
}

impl Event {
    /// Timestamp ordering this event on the bus.
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Event::Market(market) => market.time,
            Event::Signal(signal) => signal.time,
            Event::Order(order) => order.created_at,
            Event::Fill(fill) => fill.time,
            Event::Equity(point) => point.time,
        }
    }

    /// Short label for audit logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Market(_) => "market",
            Event::Signal(_) => "signal",
            Event::Order(_) => "order",
            Event::Fill(_) => "fill",
            Event::Equity(_) => "equity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fill, market_event_at};
    use rust_decimal_macros::dec;
    use vela_instrument::Side;

    #[test]
    fn test_event_time_follows_payload() {
        let market = market_event_at("btc_usdt", 3, 100);
        assert_eq!(Event::Market(market.clone()).time(), market.time);

        let fill = fill("btc_usdt", Side::Buy, dec!(1), dec!(100), dec!(0), dec!(0));
        let event = Event::Fill(fill.clone());
        assert_eq!(event.time(), fill.time);
        assert_eq!(event.kind(), "fill");
    }
}
