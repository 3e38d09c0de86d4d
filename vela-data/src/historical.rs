use crate::{
    DataError, Feed, MarketGenerator,
    bar::Bar,
    event::MarketEvent,
    store::{HistoricalStore, Timeframe},
    window::BarWindow,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use vela_instrument::{ExchangeId, Symbol};

/// Number of emitted bars retained per symbol for `latest` queries.
const DEFAULT_WINDOW_CAPACITY: usize = 512;

/// Configuration for constructing a [`HistoricalFeed`] via the new() constructor method.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub exchange: ExchangeId,
    pub symbols: Vec<Symbol>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timeframe: Timeframe,
}

/// Per-symbol bar series with a replay cursor.
#[derive(Debug, Clone)]
struct SymbolSeries {
    bars: Vec<Bar>,
    cursor: usize,
    window: BarWindow,
}

impl SymbolSeries {
    fn pending(&self) -> Option<&Bar> {
        self.bars.get(self.cursor)
    }
}

/// Historical [`Feed`] of market events replayed in strict timestamp order.
///
/// Each call to [`MarketGenerator::next`] finds the minimum pending timestamp across all
/// symbol series and emits a single [`MarketEvent`] bundling every symbol whose next bar
/// closed at that instant. Symbols are visited in construction order, so two replays of the
/// same series produce identical event sequences.
#[derive(Debug, Clone)]
pub struct HistoricalFeed {
    exchange: ExchangeId,
    series: IndexMap<Symbol, SymbolSeries>,
}

impl HistoricalFeed {
    /// Construct a [`HistoricalFeed`] by loading every configured symbol from the provided
    /// [`HistoricalStore`].
    pub fn new<Store>(store: &Store, config: Config) -> Result<Self, DataError>
    where
        Store: HistoricalStore,
    {
        let mut series = IndexMap::with_capacity(config.symbols.len());

        for symbol in &config.symbols {
            let bars = store.range_ohlcv(symbol, config.start, config.end, config.timeframe)?;

            if bars.windows(2).any(|pair| pair[0].time >= pair[1].time) {
                return Err(DataError::UnorderedSeries {
                    symbol: symbol.to_string(),
                });
            }

            series.insert(
                symbol.clone(),
                SymbolSeries {
                    bars,
                    cursor: 0,
                    window: BarWindow::new(DEFAULT_WINDOW_CAPACITY),
                },
            );
        }

        info!(
            exchange = %config.exchange,
            symbols = ?config.symbols,
            timeframe = %config.timeframe,
            total_bars = series.values().map(|series| series.bars.len()).sum::<usize>(),
            "loaded historical feed"
        );

        Ok(Self {
            exchange: config.exchange,
            series,
        })
    }

    /// Most recent `n` emitted bars of the provided [`Symbol`], oldest first.
    pub fn latest(&self, symbol: &Symbol, n: usize) -> Vec<Bar> {
        self.series
            .get(symbol)
            .map(|series| series.window.latest(n))
            .unwrap_or_default()
    }

    /// Close price of the most recent emitted bar of the provided [`Symbol`].
    pub fn current_price(&self, symbol: &Symbol) -> Option<rust_decimal::Decimal> {
        self.series
            .get(symbol)
            .and_then(|series| series.window.last())
            .map(|bar| bar.close)
    }

    /// Symbols this feed replays, in deterministic construction order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.series.keys()
    }
}

impl MarketGenerator<MarketEvent> for HistoricalFeed {
    fn next(&mut self) -> Feed<MarketEvent> {
        let Some(next_time) = self
            .series
            .values()
            .filter_map(|series| series.pending().map(|bar| bar.time))
            .min()
        else {
            return Feed::Finished;
        };

        let mut bars = IndexMap::new();
        for (symbol, series) in self.series.iter_mut() {
            let Some(pending) = series.pending().copied() else {
                continue;
            };

            if pending.time == next_time {
                series.cursor += 1;
                series.window.push(pending);
                bars.insert(symbol.clone(), pending);
            }
        }

        Feed::Next(MarketEvent::new(next_time, self.exchange, bars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::InMemoryStore, test_utils::bar_at};
    use chrono::{TimeDelta, TimeZone};

    fn config(symbols: Vec<Symbol>) -> Config {
        Config {
            exchange: ExchangeId::Simulated,
            symbols,
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
            timeframe: Timeframe::H1,
        }
    }

    #[test]
    fn test_feed_merges_co_timestamped_bars() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let btc = Symbol::new("btc_usdt");
        let eth = Symbol::new("eth_usdt");

        // btc has bars at t0, t1, t2; eth only at t1
        let store = InMemoryStore::new([
            (
                btc.clone(),
                vec![
                    bar_at(base, 100),
                    bar_at(base + TimeDelta::hours(1), 101),
                    bar_at(base + TimeDelta::hours(2), 102),
                ],
            ),
            (eth.clone(), vec![bar_at(base + TimeDelta::hours(1), 2000)]),
        ]);

        let mut feed =
            HistoricalFeed::new(&store, config(vec![btc.clone(), eth.clone()])).unwrap();

        let Feed::Next(event) = feed.next() else {
            panic!("expected first event")
        };
        assert_eq!(event.time, base);
        assert_eq!(event.bars.len(), 1);
        assert!(event.bar(&btc).is_some());

        let Feed::Next(event) = feed.next() else {
            panic!("expected second event")
        };
        assert_eq!(event.time, base + TimeDelta::hours(1));
        assert_eq!(event.bars.len(), 2);
        assert!(event.bar(&btc).is_some());
        assert!(event.bar(&eth).is_some());

        let Feed::Next(event) = feed.next() else {
            panic!("expected third event")
        };
        assert_eq!(event.bars.len(), 1);

        assert_eq!(feed.next(), Feed::Finished);
    }

    #[test]
    fn test_latest_never_looks_ahead() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let btc = Symbol::new("btc_usdt");

        let store = InMemoryStore::new([(
            btc.clone(),
            (0..4)
                .map(|index| bar_at(base + TimeDelta::hours(index), 100 + index))
                .collect(),
        )]);

        let mut feed = HistoricalFeed::new(&store, config(vec![btc.clone()])).unwrap();

        assert!(feed.latest(&btc, 10).is_empty());

        feed.next();
        feed.next();

        let latest = feed.latest(&btc, 10);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest.last().unwrap().time, base + TimeDelta::hours(1));
        assert_eq!(
            feed.current_price(&btc),
            Some(rust_decimal::Decimal::from(101))
        );
    }

    #[test]
    fn test_unordered_series_rejected() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let btc = Symbol::new("btc_usdt");

        let store = InMemoryStore::new([(
            btc.clone(),
            vec![bar_at(base + TimeDelta::hours(1), 101), bar_at(base, 100)],
        )]);

        let result = HistoricalFeed::new(&store, config(vec![btc]));
        assert!(matches!(result, Err(DataError::UnorderedSeries { .. })));
    }
}
