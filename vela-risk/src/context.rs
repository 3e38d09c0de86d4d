use crate::{RiskError, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vela_instrument::{Side, Symbol};

/// Evaluation context assembled by the caller before running the rule engine.
///
/// Fields are optional because not every caller can supply every metric; each rule
/// declares the fields it requires and the engine fails closed when one is missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RiskContext {
    pub user: Option<UserId>,
    pub symbol: Option<Symbol>,
    pub side: Option<Side>,

    /// Value of the order under evaluation.
    pub order_notional: Option<Decimal>,
    /// Current position value in the order's symbol.
    pub current_position_notional: Option<Decimal>,
    /// Current total position value across all symbols.
    pub total_position_notional: Option<Decimal>,

    /// Realized + unrealized PnL since the daily reset.
    pub daily_pnl: Option<Decimal>,
    /// Equity at the daily reset.
    pub initial_equity: Option<Decimal>,
    /// Current equity.
    pub current_equity: Option<Decimal>,
    /// Highest equity observed.
    pub peak_equity: Option<Decimal>,

    /// Leverage requested for the order.
    pub leverage: Option<Decimal>,

    /// Orders submitted in the trailing 60 seconds, across all symbols.
    pub orders_last_minute: Option<u32>,
    /// Orders submitted in the trailing 60 seconds, in the order's symbol.
    pub symbol_orders_last_minute: Option<u32>,
}

impl RiskContext {
    /// Is the named field populated? Used by the engine's rule pre-checks.
    pub fn has(&self, field: &str) -> bool {
        match field {
            "user" => self.user.is_some(),
            "symbol" => self.symbol.is_some(),
            "side" => self.side.is_some(),
            "order_notional" => self.order_notional.is_some(),
            "current_position_notional" => self.current_position_notional.is_some(),
            "total_position_notional" => self.total_position_notional.is_some(),
            "daily_pnl" => self.daily_pnl.is_some(),
            "initial_equity" => self.initial_equity.is_some(),
            "current_equity" => self.current_equity.is_some(),
            "peak_equity" => self.peak_equity.is_some(),
            "leverage" => self.leverage.is_some(),
            "orders_last_minute" => self.orders_last_minute.is_some(),
            "symbol_orders_last_minute" => self.symbol_orders_last_minute.is_some(),
            _ => false,
        }
    }

    /// Fetch a required [`Decimal`] field, failing with [`RiskError::RulePrecondition`].
    pub(crate) fn require(
        &self,
        rule: &str,
        field: &'static str,
        value: Option<Decimal>,
    ) -> Result<Decimal, RiskError> {
        value.ok_or_else(|| RiskError::RulePrecondition {
            rule: rule.to_string(),
            field: field.to_string(),
        })
    }

    /// Symbol under evaluation, or "unknown" for report text.
    pub(crate) fn symbol_label(&self) -> &str {
        self.symbol.as_ref().map(Symbol::as_str).unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_has_tracks_population() {
        let mut context = RiskContext::default();
        assert!(!context.has("order_notional"));
        assert!(!context.has("not_a_field"));

        context.order_notional = Some(dec!(100));
        assert!(context.has("order_notional"));
    }
}
