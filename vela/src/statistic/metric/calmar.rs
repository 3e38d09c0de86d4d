use crate::statistic::time::TimeInterval;
use serde::{Deserialize, Serialize};

/// Represents a Calmar Ratio value over a specific [`TimeInterval`].
///
/// A risk-adjusted return measure dividing excess return (over the risk-free rate) by
/// Maximum Drawdown risk, instead of the standard deviation the Sharpe and Sortino
/// ratios use.
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct CalmarRatio<Interval> {
    pub value: f64,
    pub interval: Interval,
}

impl<Interval> CalmarRatio<Interval>
where
    Interval: TimeInterval,
{
    /// Calculate the [`CalmarRatio`] over the provided [`TimeInterval`].
    pub fn calculate(
        risk_free_return: f64,
        mean_return: f64,
        max_drawdown: f64,
        returns_period: Interval,
    ) -> Self {
        if max_drawdown == 0.0 {
            Self {
                value: if mean_return > risk_free_return {
                    // +ve excess returns with no drawdown risk (very good)
                    f64::INFINITY
                } else if mean_return < risk_free_return {
                    // -ve excess returns with no drawdown risk (very bad)
                    f64::NEG_INFINITY
                } else {
                    0.0
                },
                interval: returns_period,
            }
        } else {
            Self {
                value: (mean_return - risk_free_return) / max_drawdown.abs(),
                interval: returns_period,
            }
        }
    }

    /// Scale the [`CalmarRatio`] from the current [`TimeInterval`] to the provided one.
    ///
    /// This scaling assumes the returns are independently and identically distributed,
    /// although maximum drawdown may not scale with the square root of time.
    pub fn scale<TargetInterval>(self, target: TargetInterval) -> CalmarRatio<TargetInterval>
    where
        TargetInterval: TimeInterval,
    {
        let scale = (target.interval().num_seconds() as f64
            / self.interval.interval().num_seconds() as f64)
            .sqrt();

        CalmarRatio {
            value: self.value * scale,
            interval: target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistic::time::Daily;

    #[test]
    fn test_calmar_ratio_normal_case() {
        let actual = CalmarRatio::calculate(0.0015, 0.0025, 0.02, Daily);
        assert_eq!(actual.value, 0.05);
    }

    #[test]
    fn test_calmar_ratio_zero_drawdown_special_cases() {
        let actual = CalmarRatio::calculate(0.001, 0.002, 0.0, Daily);
        assert!(actual.value.is_infinite() && actual.value.is_sign_positive());

        let actual = CalmarRatio::calculate(0.002, 0.001, 0.0, Daily);
        assert!(actual.value.is_infinite() && actual.value.is_sign_negative());

        let actual = CalmarRatio::calculate(0.001, 0.001, 0.0, Daily);
        assert_eq!(actual.value, 0.0);
    }

    #[test]
    fn test_calmar_ratio_uses_absolute_drawdown() {
        let actual = CalmarRatio::calculate(0.001, 0.002, -0.015, Daily);
        assert_eq!(actual.value, (0.002 - 0.001) / 0.015);
    }
}
