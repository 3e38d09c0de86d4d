use crate::{
    RiskError, RiskLevel,
    context::RiskContext,
    limits::{RiskLimits, utilization},
    rule::{RiskRule, RuleOutcome},
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Rejects orders that would push a symbol position, the total position, or the
/// portfolio concentration past their limits.
#[derive(Debug)]
pub struct PositionLimitRule {
    limits: Arc<RwLock<RiskLimits>>,
}

impl PositionLimitRule {
    pub fn new(limits: Arc<RwLock<RiskLimits>>) -> Self {
        Self { limits }
    }
}

impl RiskRule for PositionLimitRule {
    fn id(&self) -> &'static str {
        "position_limit"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[
            "current_position_notional",
            "total_position_notional",
            "order_notional",
        ]
    }

    fn check(&self, context: &RiskContext) -> Result<RuleOutcome, RiskError> {
        let limits = self.limits.read();
        let current = context.require(
            self.id(),
            "current_position_notional",
            context.current_position_notional,
        )?;
        let total = context.require(
            self.id(),
            "total_position_notional",
            context.total_position_notional,
        )?;
        let order = context.require(self.id(), "order_notional", context.order_notional)?;

        let new_position = current + order;
        let new_total = total + order;

        if new_position > limits.max_position_per_symbol {
            return Ok(RuleOutcome::fail(
                format!(
                    "Position size limit exceeded for {}: new {new_position}, max {}",
                    context.symbol_label(),
                    limits.max_position_per_symbol
                ),
                RiskLevel::High,
            ));
        }

        if new_total > limits.max_total_position {
            return Ok(RuleOutcome::fail(
                format!(
                    "Total position limit exceeded: new {new_total}, max {}",
                    limits.max_total_position
                ),
                RiskLevel::Critical,
            ));
        }

        // concentration is only meaningful once other exposure exists; a first order
        // into an empty book is trivially 100% concentrated
        if total > Decimal::ZERO && new_total > Decimal::ZERO {
            let concentration = new_position / new_total;
            if concentration > limits.max_concentration {
                return Ok(RuleOutcome::fail(
                    format!(
                        "Position concentration too high for {}: {concentration:.4}, max {}",
                        context.symbol_label(),
                        limits.max_concentration
                    ),
                    RiskLevel::Medium,
                ));
            }
        }

        let level = RiskLevel::from_utilization(
            utilization(new_position, limits.max_position_per_symbol)
                .max(utilization(new_total, limits.max_total_position)),
        );

        Ok(RuleOutcome::pass(level))
    }
}
