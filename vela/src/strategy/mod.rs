use crate::portfolio::PortfolioView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vela_data::{bar::Bar, event::MarketEvent};
use vela_instrument::Symbol;

/// Example moving-average crossover strategy.
pub mod example;

/// Advisory direction of a [`Signal`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

/// Conviction of a [`Signal`], clamped to `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct SignalStrength(f64);

impl SignalStrength {
    pub fn new(strength: f64) -> Self {
        Self(strength.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Advisory signal produced by a strategy for the portfolio to interpret.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Signal {
    pub time: DateTime<Utc>,
    pub symbol: Symbol,
    pub kind: SignalKind,
    pub strength: SignalStrength,
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl Signal {
    pub fn new(time: DateTime<Utc>, symbol: Symbol, kind: SignalKind, strength: f64) -> Self {
        Self {
            time,
            symbol,
            kind,
            strength: SignalStrength::new(strength),
            meta: serde_json::Map::new(),
        }
    }
}

/// Read-only view of recently emitted market history, backed by the feed's ring buffers.
pub trait HistoryView {
    /// Most recent `n` emitted bars of `symbol`, oldest first. Never includes data ahead
    /// of the event being handled.
    fn latest(&self, symbol: &Symbol, n: usize) -> Vec<Bar>;
}

/// Generates advisory [`Signal`]s from market events and read-only views of history and
/// portfolio state.
pub trait Strategy {
    /// Stable identifier recorded on every order this strategy's signals produce.
    fn id(&self) -> &str;

    /// Analyse the market event and emit zero or more signals.
    fn signals(
        &mut self,
        market: &MarketEvent,
        history: &dyn HistoryView,
        portfolio: &PortfolioView,
    ) -> Vec<Signal>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_strength_clamps() {
        assert_eq!(SignalStrength::new(1.5).value(), 1.0);
        assert_eq!(SignalStrength::new(-0.5).value(), 0.0);
        assert_eq!(SignalStrength::new(0.25).value(), 0.25);
    }
}
