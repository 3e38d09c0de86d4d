use crate::{
    RiskError, RiskLevel,
    context::RiskContext,
    limits::RiskLimits,
    rule::{RiskRule, RuleOutcome},
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Rejects orders once the trailing-minute submission count reaches the global or
/// per-symbol ceiling.
#[derive(Debug)]
pub struct FrequencyRule {
    limits: Arc<RwLock<RiskLimits>>,
}

impl FrequencyRule {
    pub fn new(limits: Arc<RwLock<RiskLimits>>) -> Self {
        Self { limits }
    }
}

impl RiskRule for FrequencyRule {
    fn id(&self) -> &'static str {
        "order_frequency"
    }

    fn priority(&self) -> u8 {
        6
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["orders_last_minute", "symbol_orders_last_minute"]
    }

    fn check(&self, context: &RiskContext) -> Result<RuleOutcome, RiskError> {
        let limits = self.limits.read();
        let global = context
            .orders_last_minute
            .ok_or_else(|| RiskError::RulePrecondition {
                rule: self.id().to_string(),
                field: String::from("orders_last_minute"),
            })?;
        let per_symbol =
            context
                .symbol_orders_last_minute
                .ok_or_else(|| RiskError::RulePrecondition {
                    rule: self.id().to_string(),
                    field: String::from("symbol_orders_last_minute"),
                })?;

        if global >= limits.max_orders_per_minute {
            return Ok(RuleOutcome::fail(
                format!(
                    "Order frequency limit reached: {global} orders in the last minute, max {}",
                    limits.max_orders_per_minute
                ),
                RiskLevel::Medium,
            ));
        }

        if per_symbol >= limits.max_orders_per_symbol_minute {
            return Ok(RuleOutcome::fail(
                format!(
                    "Order frequency limit reached for {}: {per_symbol} orders in the last minute, max {}",
                    context.symbol_label(),
                    limits.max_orders_per_symbol_minute
                ),
                RiskLevel::Medium,
            ));
        }

        let global_utilization = global as f64 / limits.max_orders_per_minute.max(1) as f64;
        let symbol_utilization =
            per_symbol as f64 / limits.max_orders_per_symbol_minute.max(1) as f64;

        Ok(RuleOutcome::pass(RiskLevel::from_utilization(
            global_utilization.max(symbol_utilization),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(global: u32, per_symbol: u32) -> RuleOutcome {
        let rule = FrequencyRule::new(Arc::new(RwLock::new(RiskLimits::default())));
        rule.check(&RiskContext {
            orders_last_minute: Some(global),
            symbol_orders_last_minute: Some(per_symbol),
            ..RiskContext::default()
        })
        .unwrap()
    }

    #[test]
    fn test_frequency_within_limits() {
        let outcome = check(10, 2);
        assert!(outcome.passed);
        assert_eq!(outcome.level, RiskLevel::Low);
    }

    #[test]
    fn test_global_frequency_breached() {
        let outcome = check(100, 2);
        assert!(!outcome.passed);
        assert_eq!(outcome.level, RiskLevel::Medium);
    }

    #[test]
    fn test_symbol_frequency_breached() {
        let outcome = check(30, 20);
        assert!(!outcome.passed);
        assert!(outcome.reason.unwrap().contains("for unknown"));
        assert_eq!(outcome.level, RiskLevel::Medium);
    }
}
