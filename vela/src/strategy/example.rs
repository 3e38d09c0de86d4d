use crate::{
    portfolio::PortfolioView,
    strategy::{HistoryView, Signal, SignalKind, Strategy},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vela_data::{bar::Bar, event::MarketEvent};

/// Configuration for constructing an [`SmaCrossStrategy`] via the new() constructor
/// method.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
        }
    }
}

/// Example strategy: buys when the fast simple moving average crosses above the slow one,
/// sells an open position on the cross back below.
#[derive(Debug, Clone)]
pub struct SmaCrossStrategy {
    config: Config,
}

impl SmaCrossStrategy {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn sma(bars: &[Bar], period: usize) -> Option<Decimal> {
        if bars.len() < period {
            return None;
        }

        let sum: Decimal = bars[bars.len() - period..]
            .iter()
            .map(|bar| bar.close)
            .sum();
        Some(sum / Decimal::from(period as u64))
    }
}

impl Strategy for SmaCrossStrategy {
    fn id(&self) -> &str {
        "sma_cross"
    }

    fn signals(
        &mut self,
        market: &MarketEvent,
        history: &dyn HistoryView,
        portfolio: &PortfolioView,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();

        for symbol in market.bars.keys() {
            let bars = history.latest(symbol, self.config.slow_period + 1);
            let Some(fast) = Self::sma(&bars, self.config.fast_period) else {
                continue;
            };
            let Some(slow) = Self::sma(&bars, self.config.slow_period) else {
                continue;
            };

            let holding = portfolio.position(symbol).is_some();

            let kind = if fast > slow && !holding {
                SignalKind::Buy
            } else if fast < slow && holding {
                SignalKind::Sell
            } else {
                continue;
            };

            signals.push(Signal::new(market.time, symbol.clone(), kind, 1.0));
        }

        signals
    }
}
