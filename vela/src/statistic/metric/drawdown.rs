use crate::portfolio::EquityPoint;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Peak-to-trough decline of equity during a specific period. A measure of downside
/// volatility.
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct Drawdown {
    /// Relative decline from the peak, in `[0, 1]`.
    pub value: f64,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
}

impl Drawdown {
    /// Time period of the [`Drawdown`].
    pub fn duration(&self) -> TimeDelta {
        self.time_end.signed_duration_since(self.time_start)
    }
}

/// Maximum [`Drawdown`] over an equity series: the largest value of
/// `(running_max - equity) / running_max` across the series.
#[derive(Debug, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct MaxDrawdown(pub Drawdown);

impl MaxDrawdown {
    /// Scan the equity curve for its maximum drawdown, if any decline occurred.
    pub fn calculate(equity_curve: &[EquityPoint]) -> Option<Self> {
        let first = equity_curve.first()?;

        let mut running_max = first.equity;
        let mut time_peak = first.time;
        let mut max_drawdown = Drawdown::default();

        for point in equity_curve {
            if point.equity > running_max {
                running_max = point.equity;
                time_peak = point.time;
                continue;
            }

            if running_max <= Decimal::ZERO {
                continue;
            }

            let drawdown = ((running_max - point.equity) / running_max)
                .to_f64()
                .unwrap_or(0.0);

            if drawdown > max_drawdown.value {
                max_drawdown = Drawdown {
                    value: drawdown,
                    time_start: time_peak,
                    time_end: point.time,
                };
            }
        }

        (max_drawdown.value > 0.0).then_some(Self(max_drawdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn curve(values: &[i64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(index, value)| EquityPoint {
                time: DateTime::<Utc>::MIN_UTC + TimeDelta::days(index as i64),
                equity: Decimal::from(*value),
                cash: dec!(0),
                realized_pnl: dec!(0),
                unrealized_pnl: dec!(0),
            })
            .collect()
    }

    #[test]
    fn test_max_drawdown_scans_running_max() {
        // peak 110, trough 88: (110 - 88) / 110 = 0.2
        let curve = curve(&[100, 110, 99, 88, 95, 115, 112]);

        let max_drawdown = MaxDrawdown::calculate(&curve).unwrap();
        assert_relative_eq!(max_drawdown.0.value, 0.2, epsilon = 1e-12);
        assert_eq!(max_drawdown.0.duration(), TimeDelta::days(2));
    }

    #[test]
    fn test_monotonic_curve_has_no_drawdown() {
        let curve = curve(&[100, 105, 110, 120]);
        assert_eq!(MaxDrawdown::calculate(&curve), None);
    }

    #[test]
    fn test_empty_curve() {
        assert_eq!(MaxDrawdown::calculate(&[]), None);
    }
}
