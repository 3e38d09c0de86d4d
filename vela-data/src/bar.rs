use crate::DataError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Validated OHLCV candlestick for a single time interval.
///
/// Construct via [`Bar::builder`], which enforces `low <= open,close <= high` and
/// non-negative prices & volume.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Returns a [`BarBuilder`] instance.
    pub fn builder() -> BarBuilder {
        BarBuilder::new()
    }
}

/// Builder to construct validated [`Bar`] instances.
#[derive(Debug, Default)]
pub struct BarBuilder {
    pub time: Option<DateTime<Utc>>,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<Decimal>,
}

impl BarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time(self, value: DateTime<Utc>) -> Self {
        Self {
            time: Some(value),
            ..self
        }
    }

    pub fn open(self, value: Decimal) -> Self {
        Self {
            open: Some(value),
            ..self
        }
    }

    pub fn high(self, value: Decimal) -> Self {
        Self {
            high: Some(value),
            ..self
        }
    }

    pub fn low(self, value: Decimal) -> Self {
        Self {
            low: Some(value),
            ..self
        }
    }

    pub fn close(self, value: Decimal) -> Self {
        Self {
            close: Some(value),
            ..self
        }
    }

    pub fn volume(self, value: Decimal) -> Self {
        Self {
            volume: Some(value),
            ..self
        }
    }

    pub fn build(self) -> Result<Bar, DataError> {
        let (Some(time), Some(open), Some(high), Some(low), Some(close), Some(volume)) =
            (self.time, self.open, self.high, self.low, self.close, self.volume)
        else {
            return Err(DataError::InvalidBar(String::from("builder incomplete")));
        };

        if open < Decimal::ZERO
            || high < Decimal::ZERO
            || low < Decimal::ZERO
            || close < Decimal::ZERO
        {
            return Err(DataError::InvalidBar(String::from("negative price")));
        }

        if volume < Decimal::ZERO {
            return Err(DataError::InvalidBar(String::from("negative volume")));
        }

        if low > open || low > close || low > high || high < open || high < close {
            return Err(DataError::InvalidBar(format!(
                "open, close must lie within [low, high]: o={open} h={high} l={low} c={close}"
            )));
        }

        Ok(Bar {
            time,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn build(
        (open, high, low, close, volume): (Decimal, Decimal, Decimal, Decimal, Decimal),
    ) -> Result<Bar, DataError> {
        Bar::builder()
            .time(DateTime::<Utc>::MIN_UTC)
            .open(open)
            .high(high)
            .low(low)
            .close(close)
            .volume(volume)
            .build()
    }

    #[test]
    fn test_bar_builder_validation() {
        let valid_records = vec![
            // open, high, low, close, volume
            (dec!(20.0), dec!(25.0), dec!(15.0), dec!(21.0), dec!(7500.0)),
            (dec!(10.0), dec!(10.0), dec!(10.0), dec!(10.0), dec!(10.0)),
            (dec!(0.0), dec!(0.0), dec!(0.0), dec!(0.0), dec!(0.0)),
        ];
        for record in valid_records {
            assert!(build(record).is_ok(), "{record:?} should be valid");
        }

        let invalid_records = vec![
            // negative fields
            (dec!(-1.0), dec!(25.0), dec!(15.0), dec!(21.0), dec!(7500.0)),
            (dec!(20.0), dec!(25.0), dec!(15.0), dec!(21.0), dec!(-1.0)),
            // open outside [low, high]
            (dec!(14.9), dec!(25.0), dec!(15.0), dec!(21.0), dec!(7500.0)),
            (dec!(25.1), dec!(25.0), dec!(15.0), dec!(21.0), dec!(7500.0)),
            // close outside [low, high]
            (dec!(20.0), dec!(25.0), dec!(15.0), dec!(14.9), dec!(7500.0)),
            (dec!(20.0), dec!(25.0), dec!(15.0), dec!(25.1), dec!(7500.0)),
            // low above high
            (dec!(20.0), dec!(15.0), dec!(25.0), dec!(21.0), dec!(7500.0)),
        ];
        for record in invalid_records {
            assert!(build(record).is_err(), "{record:?} should be invalid");
        }
    }

    #[test]
    fn test_bar_builder_incomplete() {
        let result = Bar::builder()
            .time(DateTime::<Utc>::MIN_UTC)
            .open(dec!(1.0))
            .build();
        assert!(result.is_err());
    }
}
