//! # Vela-Instrument
//! Core market definitions shared by every Vela trading component: the [`Symbol`] of a traded
//! pair, the [`ExchangeId`] of the venue it trades on, the [`Side`] of an order or position,
//! and the venue-published [`Market`] trading constraints.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Unique identifier for a trading venue.
pub mod exchange;

/// Venue-published trading constraints for a [`Symbol`].
pub mod market;

/// `SmolStr` identifier for a traded pair.
pub mod symbol;

pub use exchange::ExchangeId;
pub use market::Market;
pub use symbol::Symbol;

/// [`Side`] of a trade, order, or position - Buy or Sell.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[serde(alias = "BUY", alias = "b")]
    Buy,
    #[serde(alias = "SELL", alias = "s")]
    Sell,
}

impl Side {
    /// Opposite [`Side`], used when flattening a position.
    pub fn inverse(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }
        )
    }
}

/// Direction of a held position.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

impl PositionSide {
    /// Order [`Side`] that reduces a position held in this direction, if any.
    pub fn exit_side(self) -> Option<Side> {
        match self {
            Self::Long => Some(Side::Sell),
            Self::Short => Some(Side::Buy),
            Self::Flat => None,
        }
    }
}

impl Display for PositionSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PositionSide::Long => "long",
                PositionSide::Short => "short",
                PositionSide::Flat => "flat",
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_side_exit() {
        assert_eq!(PositionSide::Long.exit_side(), Some(Side::Sell));
        assert_eq!(PositionSide::Short.exit_side(), Some(Side::Buy));
        assert_eq!(PositionSide::Flat.exit_side(), None);
    }

    #[test]
    fn test_side_inverse() {
        assert_eq!(Side::Buy.inverse(), Side::Sell);
        assert_eq!(Side::Sell.inverse(), Side::Buy);
    }

    #[test]
    fn test_side_de() {
        assert_eq!(
            serde_json::from_str::<Side>(r#""buy""#).unwrap(),
            Side::Buy
        );
        assert_eq!(
            serde_json::from_str::<Side>(r#""SELL""#).unwrap(),
            Side::Sell
        );
    }
}
