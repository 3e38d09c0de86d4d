use crate::{
    RiskError, RiskLevel,
    context::RiskContext,
    limits::{RiskLimits, utilization},
    rule::{RiskRule, RuleOutcome},
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Rejects further orders once the day's loss breaches the absolute or percentage limit.
///
/// A profitable day always passes at [`RiskLevel::Low`].
#[derive(Debug)]
pub struct DailyLossRule {
    limits: Arc<RwLock<RiskLimits>>,
}

impl DailyLossRule {
    pub fn new(limits: Arc<RwLock<RiskLimits>>) -> Self {
        Self { limits }
    }
}

impl RiskRule for DailyLossRule {
    fn id(&self) -> &'static str {
        "daily_loss_limit"
    }

    fn priority(&self) -> u8 {
        3
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["daily_pnl", "initial_equity"]
    }

    fn check(&self, context: &RiskContext) -> Result<RuleOutcome, RiskError> {
        let limits = self.limits.read();
        let daily_pnl = context.require(self.id(), "daily_pnl", context.daily_pnl)?;
        let initial_equity =
            context.require(self.id(), "initial_equity", context.initial_equity)?;

        if daily_pnl >= Decimal::ZERO {
            return Ok(RuleOutcome::pass(RiskLevel::Low));
        }

        let loss = daily_pnl.abs();
        let loss_pct = if initial_equity > Decimal::ZERO {
            loss / initial_equity
        } else {
            Decimal::ZERO
        };

        if loss >= limits.max_daily_loss {
            return Ok(RuleOutcome::fail(
                format!(
                    "Daily loss limit exceeded: loss {loss}, max {}",
                    limits.max_daily_loss
                ),
                RiskLevel::Critical,
            ));
        }

        if loss_pct >= limits.max_daily_loss_pct {
            return Ok(RuleOutcome::fail(
                format!(
                    "Daily loss percentage limit exceeded: loss {loss_pct:.4}, max {}",
                    limits.max_daily_loss_pct
                ),
                RiskLevel::Critical,
            ));
        }

        let level = RiskLevel::from_utilization(
            utilization(loss, limits.max_daily_loss)
                .max(utilization(loss_pct, limits.max_daily_loss_pct)),
        );

        Ok(RuleOutcome::pass(level))
    }
}
