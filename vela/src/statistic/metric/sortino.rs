use crate::statistic::time::TimeInterval;
use serde::{Deserialize, Serialize};

/// Represents a Sortino Ratio value over a specific [`TimeInterval`].
///
/// Similar to the Sharpe Ratio, but only considers downside volatility (standard
/// deviation of negative returns) rather than total volatility.
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct SortinoRatio<Interval> {
    pub value: f64,
    pub interval: Interval,
}

impl<Interval> SortinoRatio<Interval>
where
    Interval: TimeInterval,
{
    /// Calculate the [`SortinoRatio`] over the provided [`TimeInterval`].
    pub fn calculate(
        risk_free_return: f64,
        mean_return: f64,
        std_dev_loss_returns: f64,
        returns_period: Interval,
    ) -> Self {
        if std_dev_loss_returns == 0.0 {
            Self {
                value: if mean_return > risk_free_return {
                    // +ve excess returns with no downside risk (very good)
                    f64::INFINITY
                } else if mean_return < risk_free_return {
                    // -ve excess returns with no downside risk (very bad)
                    f64::NEG_INFINITY
                } else {
                    0.0
                },
                interval: returns_period,
            }
        } else {
            Self {
                value: (mean_return - risk_free_return) / std_dev_loss_returns,
                interval: returns_period,
            }
        }
    }

    /// Scale the [`SortinoRatio`] from the current [`TimeInterval`] to the provided one.
    ///
    /// This scaling assumes the returns are independently and identically distributed,
    /// an assumption that is debatable for downside deviation.
    pub fn scale<TargetInterval>(self, target: TargetInterval) -> SortinoRatio<TargetInterval>
    where
        TargetInterval: TimeInterval,
    {
        let scale = (target.interval().num_seconds() as f64
            / self.interval.interval().num_seconds() as f64)
            .sqrt();

        SortinoRatio {
            value: self.value * scale,
            interval: target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistic::time::Daily;
    use approx::assert_relative_eq;

    #[test]
    fn test_sortino_ratio_normal_case() {
        let actual = SortinoRatio::calculate(0.0015, 0.0025, 0.02, Daily);
        assert_relative_eq!(actual.value, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_sortino_ratio_zero_downside_special_cases() {
        // +ve excess with no downside risk
        let actual = SortinoRatio::calculate(0.001, 0.002, 0.0, Daily);
        assert!(actual.value.is_infinite() && actual.value.is_sign_positive());

        // -ve excess with no downside risk
        let actual = SortinoRatio::calculate(0.002, 0.001, 0.0, Daily);
        assert!(actual.value.is_infinite() && actual.value.is_sign_negative());

        // no excess with no downside risk
        let actual = SortinoRatio::calculate(0.001, 0.001, 0.0, Daily);
        assert_eq!(actual.value, 0.0);
    }
}
