use crate::{
    RiskError, RiskLevel,
    context::RiskContext,
    limits::{RiskLimits, utilization},
    rule::{RiskRule, RuleOutcome},
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Rejects orders requesting more leverage than the configured maximum.
#[derive(Debug)]
pub struct LeverageRule {
    limits: Arc<RwLock<RiskLimits>>,
}

impl LeverageRule {
    pub fn new(limits: Arc<RwLock<RiskLimits>>) -> Self {
        Self { limits }
    }
}

impl RiskRule for LeverageRule {
    fn id(&self) -> &'static str {
        "leverage_limit"
    }

    fn priority(&self) -> u8 {
        5
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["leverage"]
    }

    fn check(&self, context: &RiskContext) -> Result<RuleOutcome, RiskError> {
        let limits = self.limits.read();
        let leverage = context.require(self.id(), "leverage", context.leverage)?;

        if leverage > limits.max_leverage {
            return Ok(RuleOutcome::fail(
                format!(
                    "Leverage too high: requested {leverage}, max {}",
                    limits.max_leverage
                ),
                RiskLevel::High,
            ));
        }

        Ok(RuleOutcome::pass(RiskLevel::from_utilization(utilization(
            leverage,
            limits.max_leverage,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn check(leverage: rust_decimal::Decimal) -> RuleOutcome {
        let rule = LeverageRule::new(Arc::new(RwLock::new(RiskLimits::default())));
        rule.check(&RiskContext {
            leverage: Some(leverage),
            ..RiskContext::default()
        })
        .unwrap()
    }

    #[test]
    fn test_leverage_within_limit() {
        let outcome = check(dec!(3));
        assert!(outcome.passed);
        assert_eq!(outcome.level, RiskLevel::Low);
    }

    #[test]
    fn test_leverage_exceeds_limit() {
        let outcome = check(dec!(15));
        assert!(!outcome.passed);
        assert!(outcome.reason.unwrap().contains("Leverage too high"));
        assert_eq!(outcome.level, RiskLevel::High);
    }
}
