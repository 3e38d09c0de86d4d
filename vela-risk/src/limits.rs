use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::RiskError;

/// Tunable risk limit bundle, quote-denominated (eg/ USDT).
///
/// Defaults boot a sim deployment without any environment configuration. Reconfiguration
/// at runtime goes through the `RwLock` owned by the rule engine's creator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Largest position value held in a single symbol.
    pub max_position_per_symbol: Decimal,
    /// Largest total position value across all symbols.
    pub max_total_position: Decimal,
    /// Largest share of the total position a single symbol may represent, in `[0, 1]`.
    pub max_concentration: Decimal,

    /// Largest single order value.
    pub max_order_size: Decimal,
    /// Smallest single order value.
    pub min_order_size: Decimal,
    /// Orders allowed per trailing minute, across all symbols.
    pub max_orders_per_minute: u32,
    /// Orders allowed per trailing minute, per symbol.
    pub max_orders_per_symbol_minute: u32,

    /// Largest tolerated daily loss, absolute.
    pub max_daily_loss: Decimal,
    /// Largest tolerated daily loss as a fraction of initial equity, in `[0, 1]`.
    pub max_daily_loss_pct: Decimal,
    /// Largest tolerated drawdown from peak equity, in `[0, 1]`.
    pub max_drawdown_pct: Decimal,

    /// Largest requested leverage.
    pub max_leverage: Decimal,
    /// Leverage assumed when a request does not specify one.
    pub default_leverage: Decimal,

    /// Is the emergency stop armed?
    pub emergency_stop_enabled: bool,
    /// Drawdown triggering the emergency stop, in `[0, 1]`.
    pub emergency_stop_drawdown: Decimal,
    /// Daily loss triggering the emergency stop, absolute.
    pub emergency_stop_daily_loss: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_per_symbol: Decimal::from(100_000),
            max_total_position: Decimal::from(500_000),
            max_concentration: Decimal::new(3, 1), // 0.3
            max_order_size: Decimal::from(50_000),
            min_order_size: Decimal::from(10),
            max_orders_per_minute: 100,
            max_orders_per_symbol_minute: 20,
            max_daily_loss: Decimal::from(10_000),
            max_daily_loss_pct: Decimal::new(5, 2), // 0.05
            max_drawdown_pct: Decimal::new(15, 2),  // 0.15
            max_leverage: Decimal::from(10),
            default_leverage: Decimal::from(3),
            emergency_stop_enabled: true,
            emergency_stop_drawdown: Decimal::new(20, 2), // 0.20
            emergency_stop_daily_loss: Decimal::from(15_000),
        }
    }
}

impl RiskLimits {
    /// Validate internal consistency of the limit bundle.
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.min_order_size > self.max_order_size {
            return Err(RiskError::ConfigError(format!(
                "min_order_size {} exceeds max_order_size {}",
                self.min_order_size, self.max_order_size
            )));
        }

        for (name, fraction) in [
            ("max_concentration", self.max_concentration),
            ("max_daily_loss_pct", self.max_daily_loss_pct),
            ("max_drawdown_pct", self.max_drawdown_pct),
            ("emergency_stop_drawdown", self.emergency_stop_drawdown),
        ] {
            if fraction < Decimal::ZERO || fraction > Decimal::ONE {
                return Err(RiskError::ConfigError(format!(
                    "{name} must lie in [0, 1], got {fraction}"
                )));
            }
        }

        if self.max_leverage <= Decimal::ZERO {
            return Err(RiskError::ConfigError(String::from(
                "max_leverage must be positive",
            )));
        }

        Ok(())
    }
}

/// Monitor loop cadence and alerting behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between position scans.
    pub position_check_interval: Duration,
    /// Interval between PnL scans.
    pub pnl_check_interval: Duration,
    /// Fraction of a limit at which a warning alert is raised.
    pub warn_utilization: f64,
    /// Window within which duplicate (user, alert type, level) alerts are suppressed.
    pub alert_cooldown: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            position_check_interval: Duration::from_secs(5),
            pnl_check_interval: Duration::from_secs(10),
            warn_utilization: 0.9,
            alert_cooldown: Duration::from_secs(60),
        }
    }
}

/// Convert a [`Decimal`] utilization ratio into an `f64` for severity laddering.
pub(crate) fn utilization(value: Decimal, limit: Decimal) -> f64 {
    if limit.is_zero() {
        return 0.0;
    }
    rust_decimal::prelude::ToPrimitive::to_f64(&(value / limit)).unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_limits_are_valid() {
        assert!(RiskLimits::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_order_sizes() {
        let limits = RiskLimits {
            min_order_size: dec!(100),
            max_order_size: dec!(10),
            ..RiskLimits::default()
        };
        assert!(matches!(limits.validate(), Err(RiskError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_fractions() {
        let limits = RiskLimits {
            max_drawdown_pct: dec!(1.5),
            ..RiskLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_utilization_guards_zero_limit() {
        assert_eq!(utilization(dec!(10), dec!(0)), 0.0);
        assert_eq!(utilization(dec!(50), dec!(100)), 0.5);
    }
}
