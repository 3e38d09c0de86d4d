use serde::{Deserialize, Serialize};

/// Unique identifier for a trading venue.
///
/// ### Notes
/// `Simulated` is the venue used by the backtest execution engine, and `Mock` by test
/// doubles standing in for a live venue.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeId {
    Other,
    Simulated,
    Mock,
    BinanceSpot,
    BinanceFuturesUsd,
    Coinbase,
    Kraken,
    Okx,
    Bybit,
}

impl ExchangeId {
    /// Return the &str representation of this [`ExchangeId`]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Other => "other",
            ExchangeId::Simulated => "simulated",
            ExchangeId::Mock => "mock",
            ExchangeId::BinanceSpot => "binance_spot",
            ExchangeId::BinanceFuturesUsd => "binance_futures_usd",
            ExchangeId::Coinbase => "coinbase",
            ExchangeId::Kraken => "kraken",
            ExchangeId::Okx => "okx",
            ExchangeId::Bybit => "bybit",
        }
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_id_serde_round_trip() {
        let exchange = ExchangeId::BinanceSpot;
        let json = serde_json::to_string(&exchange).unwrap();
        assert_eq!(json, r#""binance_spot""#);
        assert_eq!(serde_json::from_str::<ExchangeId>(&json).unwrap(), exchange);
    }
}
