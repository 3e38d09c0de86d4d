use crate::{
    RiskError, RiskLevel,
    context::RiskContext,
    limits::{RiskLimits, utilization},
    rule::{RiskRule, RuleOutcome},
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Rejects orders whose value falls outside the configured `[min, max]` order size band.
#[derive(Debug)]
pub struct OrderSizeRule {
    limits: Arc<RwLock<RiskLimits>>,
}

impl OrderSizeRule {
    pub fn new(limits: Arc<RwLock<RiskLimits>>) -> Self {
        Self { limits }
    }
}

impl RiskRule for OrderSizeRule {
    fn id(&self) -> &'static str {
        "order_size_limit"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["order_notional"]
    }

    fn check(&self, context: &RiskContext) -> Result<RuleOutcome, RiskError> {
        let limits = self.limits.read();
        let order = context.require(self.id(), "order_notional", context.order_notional)?;

        if order < limits.min_order_size {
            return Ok(RuleOutcome::fail(
                format!(
                    "Order size too small for {}: {order}, min {}",
                    context.symbol_label(),
                    limits.min_order_size
                ),
                RiskLevel::Low,
            ));
        }

        if order > limits.max_order_size {
            return Ok(RuleOutcome::fail(
                format!(
                    "Order size too large for {}: {order}, max {}",
                    context.symbol_label(),
                    limits.max_order_size
                ),
                RiskLevel::High,
            ));
        }

        Ok(RuleOutcome::pass(RiskLevel::from_utilization(utilization(
            order,
            limits.max_order_size,
        ))))
    }
}
