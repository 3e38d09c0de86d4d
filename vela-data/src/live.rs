use crate::{Feed, MarketGenerator, bar::Bar, event::MarketEvent, window::BarWindow};
use fnv::FnvHashMap;
use tokio::sync::mpsc;
use vela_instrument::Symbol;

/// Number of streamed bars retained per symbol for `latest` queries.
const DEFAULT_WINDOW_CAPACITY: usize = 512;

/// Live [`Feed`] of market events arriving from an external stream.
///
/// Serves the same interface as the historical feed: events are yielded through
/// [`MarketGenerator::next`] and `latest` is backed by per-symbol ring buffers populated as
/// events are consumed. An empty channel yields [`Feed::Unhealthy`] so the caller can decide
/// whether to spin, sleep, or surface the stall.
#[derive(Debug)]
pub struct LiveFeed {
    market_rx: mpsc::UnboundedReceiver<MarketEvent>,
    windows: FnvHashMap<Symbol, BarWindow>,
}

impl LiveFeed {
    /// Initialise a [`LiveFeed`] that yields market events from the provided
    /// [`mpsc::UnboundedReceiver`].
    ///
    /// The transmitting half is typically owned by one ingest task per subscribed
    /// (exchange, symbol) stream.
    pub fn new(market_rx: mpsc::UnboundedReceiver<MarketEvent>) -> Self {
        Self {
            market_rx,
            windows: FnvHashMap::default(),
        }
    }

    /// Most recent `n` consumed bars of the provided [`Symbol`], oldest first.
    pub fn latest(&self, symbol: &Symbol, n: usize) -> Vec<Bar> {
        self.windows
            .get(symbol)
            .map(|window| window.latest(n))
            .unwrap_or_default()
    }

    /// Close price of the most recent consumed bar of the provided [`Symbol`].
    pub fn current_price(&self, symbol: &Symbol) -> Option<rust_decimal::Decimal> {
        self.windows
            .get(symbol)
            .and_then(|window| window.last())
            .map(|bar| bar.close)
    }
}

impl MarketGenerator<MarketEvent> for LiveFeed {
    fn next(&mut self) -> Feed<MarketEvent> {
        match self.market_rx.try_recv() {
            Ok(event) => {
                for (symbol, bar) in &event.bars {
                    self.windows
                        .entry(symbol.clone())
                        .or_insert_with(|| BarWindow::new(DEFAULT_WINDOW_CAPACITY))
                        .push(*bar);
                }
                Feed::Next(event)
            }
            Err(mpsc::error::TryRecvError::Empty) => Feed::Unhealthy,
            Err(mpsc::error::TryRecvError::Disconnected) => Feed::Finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bar_at, market_event};
    use chrono::{DateTime, Utc};

    #[test]
    fn test_live_feed_yields_then_reports_stall_and_finish() {
        let (market_tx, market_rx) = mpsc::unbounded_channel();
        let mut feed = LiveFeed::new(market_rx);

        let symbol = Symbol::new("btc_usdt");
        market_tx
            .send(market_event(symbol.clone(), bar_at(DateTime::<Utc>::MIN_UTC, 100)))
            .unwrap();

        assert!(matches!(feed.next(), Feed::Next(_)));
        assert_eq!(feed.latest(&symbol, 5).len(), 1);

        // channel drained but transmitter alive
        assert_eq!(feed.next(), Feed::Unhealthy);

        drop(market_tx);
        assert_eq!(feed.next(), Feed::Finished);
    }
}
