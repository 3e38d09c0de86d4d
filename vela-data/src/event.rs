use crate::bar::Bar;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use vela_instrument::{ExchangeId, Symbol};

/// Market data produced by a feed for the Strategy & Portfolio to interpret.
///
/// Bundles every [`Bar`] that closed at `time` - co-timestamped bars of different symbols
/// always travel together, and `bars` iterates in deterministic insertion order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct MarketEvent {
    pub time: DateTime<Utc>,
    pub exchange: ExchangeId,
    pub bars: IndexMap<Symbol, Bar>,
}

impl MarketEvent {
    /// [`Bar`] of the provided [`Symbol`], if one closed at this event's `time`.
    pub fn bar(&self, symbol: &Symbol) -> Option<&Bar> {
        self.bars.get(symbol)
    }

    /// Close price of the provided [`Symbol`], if present.
    pub fn close(&self, symbol: &Symbol) -> Option<rust_decimal::Decimal> {
        self.bars.get(symbol).map(|bar| bar.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_event_bar_lookup() {
        let bar = Bar::builder()
            .time(DateTime::<Utc>::MIN_UTC)
            .open(dec!(100))
            .high(dec!(110))
            .low(dec!(90))
            .close(dec!(105))
            .volume(dec!(1000))
            .build()
            .unwrap();

        let event = MarketEvent::new(
            bar.time,
            ExchangeId::Simulated,
            IndexMap::from([(Symbol::new("btc_usdt"), bar)]),
        );

        assert_eq!(event.close(&Symbol::new("btc_usdt")), Some(dec!(105)));
        assert_eq!(event.close(&Symbol::new("eth_usdt")), None);
    }
}
