use crate::{RiskError, RiskLevel, context::RiskContext, limits::RiskLimits};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Daily-loss limit rule.
pub mod daily_loss;

/// Drawdown limit rule.
pub mod drawdown;

/// Order-frequency limit rule.
pub mod frequency;

/// Leverage limit rule.
pub mod leverage;

/// Order-size limit rule.
pub mod order_size;

/// Position limit rule.
pub mod position_limit;

pub use daily_loss::DailyLossRule;
pub use drawdown::DrawdownRule;
pub use frequency::FrequencyRule;
pub use leverage::LeverageRule;
pub use order_size::OrderSizeRule;
pub use position_limit::PositionLimitRule;

/// Outcome of a single rule check.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleOutcome {
    pub passed: bool,
    pub reason: Option<String>,
    pub level: RiskLevel,
}

impl RuleOutcome {
    /// Passing outcome reporting the provided utilization-derived level.
    pub fn pass(level: RiskLevel) -> Self {
        Self {
            passed: true,
            reason: None,
            level,
        }
    }

    /// Failing outcome with the provided reason and severity.
    pub fn fail(reason: String, level: RiskLevel) -> Self {
        Self {
            passed: false,
            reason: Some(reason),
            level,
        }
    }
}

/// A pure predicate over a [`RiskContext`].
///
/// Rules are registered with `(id, priority, required_fields, check)`; evaluation order is
/// `(priority asc, id asc)` for stability, so adding a rule never perturbs the verdicts of
/// existing ones.
pub trait RiskRule: Send + Sync {
    /// Stable identifier, surfaced in rejection reasons.
    fn id(&self) -> &'static str;

    /// Evaluation priority: lower runs earlier.
    fn priority(&self) -> u8;

    /// Context fields that must be populated before [`RiskRule::check`] runs.
    fn required_fields(&self) -> &'static [&'static str];

    /// Evaluate the rule. Only called once the required fields are present.
    fn check(&self, context: &RiskContext) -> Result<RuleOutcome, RiskError>;
}

/// Verdict of a full rule-engine evaluation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Validation {
    pub valid: bool,
    /// Id of the rule that rejected, when invalid.
    pub rejected_by: Option<String>,
    pub reason: Option<String>,
    /// Maximum severity reported across all evaluated rules.
    pub level: RiskLevel,
    /// Pass-side observations worth surfacing (eg/ a limit above 70% utilization).
    pub warnings: Vec<String>,
}

/// Ordered set of [`RiskRule`]s evaluated against every order.
///
/// Evaluation short-circuits on the first failing rule. A rule whose required context
/// fields are missing fails closed. On a full pass, the returned level is the maximum
/// reported across rules.
pub struct RuleEngine {
    rules: Vec<Box<dyn RiskRule>>,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field(
                "rules",
                &self.rules.iter().map(|rule| rule.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RuleEngine {
    /// Empty engine; every evaluation passes at [`RiskLevel::Low`].
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Engine loaded with the standard rule set, all sharing the provided limits.
    pub fn with_default_rules(limits: Arc<RwLock<RiskLimits>>) -> Self {
        let mut engine = Self::new();
        engine.register(Box::new(PositionLimitRule::new(Arc::clone(&limits))));
        engine.register(Box::new(OrderSizeRule::new(Arc::clone(&limits))));
        engine.register(Box::new(DailyLossRule::new(Arc::clone(&limits))));
        engine.register(Box::new(DrawdownRule::new(Arc::clone(&limits))));
        engine.register(Box::new(LeverageRule::new(Arc::clone(&limits))));
        engine.register(Box::new(FrequencyRule::new(limits)));
        engine
    }

    /// Register a rule, keeping the set ordered by `(priority, id)`.
    pub fn register(&mut self, rule: Box<dyn RiskRule>) {
        self.rules.push(rule);
        self.rules
            .sort_by_key(|rule| (rule.priority(), rule.id()));
    }

    /// Evaluate every rule against the provided context.
    pub fn evaluate(&self, context: &RiskContext) -> Validation {
        let mut level = RiskLevel::Low;
        let mut warnings = Vec::new();

        for rule in &self.rules {
            if let Some(missing) = rule
                .required_fields()
                .iter()
                .copied()
                .find(|field| !context.has(field))
            {
                // fail closed when a rule cannot see the data it needs
                warn!(rule = rule.id(), field = missing, "rule precondition failed");
                return Validation {
                    valid: false,
                    rejected_by: Some(rule.id().to_string()),
                    reason: Some(format!(
                        "rule {} missing required context field {missing}",
                        rule.id()
                    )),
                    level: RiskLevel::High,
                    warnings,
                };
            }

            let outcome = match rule.check(context) {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(rule = rule.id(), %error, "rule check errored, failing closed");
                    return Validation {
                        valid: false,
                        rejected_by: Some(rule.id().to_string()),
                        reason: Some(error.to_string()),
                        level: RiskLevel::High,
                        warnings,
                    };
                }
            };

            if !outcome.passed {
                return Validation {
                    valid: false,
                    rejected_by: Some(rule.id().to_string()),
                    reason: outcome.reason,
                    level: outcome.level,
                    warnings,
                };
            }

            if outcome.level >= RiskLevel::High {
                warnings.push(format!(
                    "rule {} reports {} utilization",
                    rule.id(),
                    outcome.level
                ));
            }

            level = level.max(outcome.level);
        }

        Validation {
            valid: true,
            rejected_by: None,
            reason: None,
            level,
            warnings,
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}
