use crate::{
    engine::{bus::EventBus, error::EngineError},
    event::Event,
    execution::SimulatedExecution,
    portfolio::{FillUpdater, MarketUpdater, OrderGenerator, Portfolio},
    strategy::{HistoryView, Signal, Strategy},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vela_data::{Feed, MarketGenerator, bar::Bar, event::MarketEvent, historical::HistoricalFeed};
use vela_execution::fill::Fill;
use vela_instrument::Symbol;

/// Time-ordered [`EventBus`](bus::EventBus).
pub mod bus;

/// Engine error types.
pub mod error;

impl HistoryView for HistoricalFeed {
    fn latest(&self, symbol: &Symbol, n: usize) -> Vec<Bar> {
        HistoricalFeed::latest(self, symbol, n)
    }
}

/// Output of a completed backtest run.
#[derive(Debug)]
pub struct BacktestOutput {
    /// Final portfolio state, including the full equity curve.
    pub portfolio: Portfolio,
    /// Every fill generated, in execution order.
    pub fills: Vec<Fill>,
    /// Total events dispatched over the bus.
    pub events_processed: u64,
}

/// Deterministic single-threaded backtest engine.
///
/// Each feed step publishes one market event onto the [`EventBus`](bus::EventBus) and
/// drains the resulting cascade - signals, orders, fills - in `(time, insertion)` order
/// before the next step. Handler failures are logged and do not abort the run. Given
/// identical bars, strategy, and configuration, two runs produce identical equity curves
/// and fill sequences.
#[derive(Debug)]
pub struct BacktestEngine<S> {
    feed: HistoricalFeed,
    strategy: S,
    portfolio: Portfolio,
    execution: SimulatedExecution,
    bus: EventBus,
    audit: Option<mpsc::UnboundedSender<Event>>,
    fills: Vec<Fill>,
}

impl<S> BacktestEngine<S>
where
    S: Strategy,
{
    pub fn new(
        feed: HistoricalFeed,
        strategy: S,
        portfolio: Portfolio,
        execution: SimulatedExecution,
    ) -> Self {
        Self {
            feed,
            strategy,
            portfolio,
            execution,
            bus: EventBus::new(),
            audit: None,
            fills: Vec::new(),
        }
    }

    /// Mirror every dispatched [`Event`] onto an audit channel, for event-sourcing or a
    /// live dashboard. The run itself never depends on the consumer keeping up.
    pub fn with_audit(mut self, audit_tx: mpsc::UnboundedSender<Event>) -> Self {
        self.audit = Some(audit_tx);
        self
    }

    /// Best-effort audit mirror. A dropped consumer stops the mirroring for the rest of
    /// the run without disturbing it.
    fn audit(&mut self, event: &Event) {
        let Some(audit_tx) = &self.audit else {
            return;
        };

        if audit_tx.send(event.clone()).is_err() {
            warn!(
                kind = event.kind(),
                "audit receiver dropped, disabling event mirroring"
            );
            self.audit = None;
        }
    }

    /// Replay the feed to exhaustion and return the results.
    pub fn run(mut self) -> Result<BacktestOutput, EngineError> {
        info!("backtest started");

        loop {
            match self.feed.next() {
                Feed::Next(market) => self.process_market(market),
                Feed::Unhealthy => {
                    warn!("market feed unhealthy, continuing");
                    continue;
                }
                Feed::Finished => break,
            }
        }

        info!(
            events = self.bus.published(),
            fills = self.fills.len(),
            final_equity = %self.portfolio.equity(),
            "backtest finished"
        );

        Ok(BacktestOutput {
            portfolio: self.portfolio,
            fills: self.fills,
            events_processed: self.bus.published(),
        })
    }

    /// Publish one market event and drain the cascade it produces.
    fn process_market(&mut self, market: MarketEvent) {
        if let Err(event_error) = self.portfolio.update_from_market(&market) {
            error!(error = %event_error, "portfolio market update failed");
        }

        let time = market.time;
        self.bus.publish(Event::Market(market.clone()));

        while let Some(event) = self.bus.pop() {
            self.audit(&event);

            if let Err(event_error) = self.handle(event, &market) {
                // a failing handler never aborts dispatch
                error!(error = %event_error, "event handler failed");
            }
        }

        let point = self.portfolio.record_equity(time);
        self.audit(&Event::Equity(point));
    }

    fn handle(&mut self, event: Event, market: &MarketEvent) -> Result<(), EngineError> {
        match event {
            Event::Market(event) => {
                for fill in self.execution.on_market(&event) {
                    self.bus.publish(Event::Fill(fill));
                }

                let view = self.portfolio.view();
                for signal in self.strategy.signals(&event, &self.feed, &view) {
                    debug!(symbol = %signal.symbol, kind = ?signal.kind, "signal generated");
                    self.bus.publish(Event::Signal(signal));
                }
            }
            Event::Signal(signal) => self.handle_signal(signal, market)?,
            Event::Order(_) => {
                // informational: execution happened at submission
            }
            Event::Fill(fill) => {
                self.portfolio.update_from_fill(&fill)?;
                self.fills.push(fill);
            }
            Event::Equity(_) => {}
        }

        Ok(())
    }

    fn handle_signal(&mut self, signal: Signal, market: &MarketEvent) -> Result<(), EngineError> {
        let Some(reference_price) = self.feed.current_price(&signal.symbol) else {
            return Err(EngineError::MarketDataUnavailable(signal.symbol.to_string()));
        };

        let Some(request) = self.portfolio.generate_order(&signal, reference_price)? else {
            return Ok(());
        };

        let (order, fills) = self.execution.submit(request, market)?;
        self.bus.publish(Event::Order(order));

        for fill in fills {
            self.bus.publish(Event::Fill(fill));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimConfig,
        portfolio::allocator::{DefaultAllocator, PositionSizing},
        strategy::{SignalKind, Strategy},
    };
    use chrono::{DateTime, TimeDelta, Utc};
    use rust_decimal_macros::dec;
    use vela_data::{
        historical::Config as FeedConfig,
        store::{InMemoryStore, Timeframe},
        test_utils::bar_at,
    };
    use vela_execution::order::StrategyId;
    use vela_instrument::ExchangeId;

    /// Buys the full allocation on the first bar, then holds.
    struct BuyOnce {
        bought: bool,
    }

    impl Strategy for BuyOnce {
        fn id(&self) -> &str {
            "buy_once"
        }

        fn signals(
            &mut self,
            market: &MarketEvent,
            _: &dyn HistoryView,
            _: &crate::portfolio::PortfolioView,
        ) -> Vec<Signal> {
            if self.bought {
                return Vec::new();
            }
            self.bought = true;

            market
                .bars
                .keys()
                .map(|symbol| Signal::new(market.time, symbol.clone(), SignalKind::Buy, 1.0))
                .collect()
        }
    }

    fn engine(bars: Vec<vela_data::bar::Bar>) -> BacktestEngine<BuyOnce> {
        let symbol = Symbol::new("btc_usdt");
        let store = InMemoryStore::new([(symbol.clone(), bars)]);
        let feed = HistoricalFeed::new(
            &store,
            FeedConfig {
                exchange: ExchangeId::Simulated,
                symbols: vec![symbol],
                start: DateTime::<Utc>::MIN_UTC,
                end: DateTime::<Utc>::MAX_UTC,
                timeframe: Timeframe::H1,
            },
        )
        .unwrap();

        let portfolio = Portfolio::new(
            StrategyId::new("buy_once"),
            ExchangeId::Simulated,
            DefaultAllocator::new(PositionSizing::PercentOfEquity(dec!(1.0)), dec!(0.0015)),
            dec!(10_000),
        );

        BacktestEngine::new(
            feed,
            BuyOnce { bought: false },
            portfolio,
            SimulatedExecution::new(SimConfig::default()),
        )
    }

    #[test]
    fn test_audit_channel_mirrors_dispatched_events() {
        let base = DateTime::<Utc>::MIN_UTC;
        let bars = (0..3)
            .map(|index| bar_at(base + TimeDelta::hours(index), 100 + index))
            .collect();

        let (audit_tx, mut audit_rx) = mpsc::unbounded_channel();
        let output = engine(bars).with_audit(audit_tx).run().unwrap();

        let mut events = Vec::new();
        while let Ok(event) = audit_rx.try_recv() {
            events.push(event);
        }

        let count = |kind: &str| events.iter().filter(|event| event.kind() == kind).count();
        assert_eq!(count("market"), 3);
        assert_eq!(count("signal"), 1);
        assert_eq!(count("order"), 1);
        assert_eq!(count("fill"), 1);
        assert_eq!(count("equity"), 3);
        assert_eq!(output.fills.len(), 1);
    }

    #[test]
    fn test_dropped_audit_receiver_does_not_disturb_run() {
        let base = DateTime::<Utc>::MIN_UTC;
        let bars = (0..3)
            .map(|index| bar_at(base + TimeDelta::hours(index), 100 + index))
            .collect();

        let (audit_tx, audit_rx) = mpsc::unbounded_channel();
        drop(audit_rx);

        let output = engine(bars).with_audit(audit_tx).run().unwrap();
        assert_eq!(output.fills.len(), 1);
        assert_eq!(output.portfolio.equity_curve().len(), 3);
    }

    #[test]
    fn test_engine_records_one_equity_point_per_bar() {
        let base = DateTime::<Utc>::MIN_UTC;
        let bars = (0..10)
            .map(|index| bar_at(base + TimeDelta::hours(index), 100 + index))
            .collect();

        let output = engine(bars).run().unwrap();

        assert_eq!(output.portfolio.equity_curve().len(), 10);
        assert_eq!(output.fills.len(), 1);
        // rising prices: equity grows monotonically after entry
        let curve = output.portfolio.equity_curve();
        assert!(curve.windows(2).all(|pair| pair[0].equity <= pair[1].equity));
    }
}
