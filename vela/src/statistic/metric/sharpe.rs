use crate::statistic::time::TimeInterval;
use serde::{Deserialize, Serialize};

/// Represents a Sharpe Ratio value over a specific [`TimeInterval`].
///
/// Sharpe Ratio measures the risk-adjusted return of an investment by comparing its
/// excess returns (over the risk-free rate) to its standard deviation.
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct SharpeRatio<Interval> {
    pub value: f64,
    pub interval: Interval,
}

impl<Interval> SharpeRatio<Interval>
where
    Interval: TimeInterval,
{
    /// Calculate the [`SharpeRatio`] over the provided [`TimeInterval`].
    pub fn calculate(
        risk_free_return: f64,
        mean_return: f64,
        std_dev_returns: f64,
        returns_period: Interval,
    ) -> Self {
        if std_dev_returns == 0.0 {
            Self {
                value: 0.0,
                interval: returns_period,
            }
        } else {
            Self {
                value: (mean_return - risk_free_return) / std_dev_returns,
                interval: returns_period,
            }
        }
    }

    /// Scale the [`SharpeRatio`] from the current [`TimeInterval`] to the provided one.
    ///
    /// This scaling assumes the returns are independently and identically distributed.
    pub fn scale<TargetInterval>(self, target: TargetInterval) -> SharpeRatio<TargetInterval>
    where
        TargetInterval: TimeInterval,
    {
        let scale = (target.interval().num_seconds() as f64
            / self.interval.interval().num_seconds() as f64)
            .sqrt();

        SharpeRatio {
            value: self.value * scale,
            interval: target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistic::time::{Annual365, Daily};
    use approx::assert_relative_eq;

    #[test]
    fn test_sharpe_ratio_with_zero_std_dev() {
        let actual = SharpeRatio::calculate(0.001, 0.002, 0.0, Daily);
        assert_eq!(actual.value, 0.0);
    }

    #[test]
    fn test_sharpe_ratio_normal_case() {
        let actual = SharpeRatio::calculate(0.0015, 0.0025, 0.02, Daily);
        assert_relative_eq!(actual.value, 0.05, epsilon = 1e-4);
    }

    #[test]
    fn test_sharpe_ratio_scale_daily_to_annual() {
        let daily = SharpeRatio {
            value: 0.05,
            interval: Daily,
        };

        let actual = daily.scale(Annual365);
        assert_relative_eq!(actual.value, 0.05 * 365.0_f64.sqrt(), epsilon = 1e-4);
    }
}
