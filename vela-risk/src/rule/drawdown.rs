use crate::{
    RiskError, RiskLevel,
    context::RiskContext,
    limits::{RiskLimits, utilization},
    rule::{RiskRule, RuleOutcome},
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Rejects further orders once the decline from peak equity breaches the drawdown limit.
#[derive(Debug)]
pub struct DrawdownRule {
    limits: Arc<RwLock<RiskLimits>>,
}

impl DrawdownRule {
    pub fn new(limits: Arc<RwLock<RiskLimits>>) -> Self {
        Self { limits }
    }
}

impl RiskRule for DrawdownRule {
    fn id(&self) -> &'static str {
        "drawdown_limit"
    }

    fn priority(&self) -> u8 {
        4
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["current_equity", "peak_equity"]
    }

    fn check(&self, context: &RiskContext) -> Result<RuleOutcome, RiskError> {
        let limits = self.limits.read();
        let current = context.require(self.id(), "current_equity", context.current_equity)?;
        let peak = context.require(self.id(), "peak_equity", context.peak_equity)?;

        if current >= peak || peak <= Decimal::ZERO {
            return Ok(RuleOutcome::pass(RiskLevel::Low));
        }

        let drawdown = (peak - current) / peak;

        if drawdown >= limits.max_drawdown_pct {
            return Ok(RuleOutcome::fail(
                format!(
                    "Maximum drawdown exceeded: {drawdown:.4}, max {}",
                    limits.max_drawdown_pct
                ),
                RiskLevel::Critical,
            ));
        }

        Ok(RuleOutcome::pass(RiskLevel::from_utilization(utilization(
            drawdown,
            limits.max_drawdown_pct,
        ))))
    }
}
