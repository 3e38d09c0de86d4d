use crate::{DataError, bar::Bar};
use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use vela_instrument::Symbol;

/// Time interval of the bars served by a [`HistoricalStore`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Duration of a single bar at this [`Timeframe`].
    pub fn interval(&self) -> TimeDelta {
        match self {
            Timeframe::M1 => TimeDelta::minutes(1),
            Timeframe::M5 => TimeDelta::minutes(5),
            Timeframe::M15 => TimeDelta::minutes(15),
            Timeframe::H1 => TimeDelta::hours(1),
            Timeframe::H4 => TimeDelta::hours(4),
            Timeframe::D1 => TimeDelta::days(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = DataError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(DataError::UnsupportedTimeframe(other.to_string())),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logical interface to a store of historical bars (eg/ a timeseries database, a flat file
/// archive, or an in-memory fixture).
pub trait HistoricalStore {
    /// Fetch the ordered [`Bar`] sequence for `symbol` in `[start, end]` at the provided
    /// [`Timeframe`].
    fn range_ohlcv(
        &self,
        symbol: &Symbol,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, DataError>;
}

/// [`HistoricalStore`] backed by in-memory bar series. Used by backtests fed from fixtures
/// and by unit tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    series: FnvHashMap<Symbol, Vec<Bar>>,
}

impl InMemoryStore {
    pub fn new(series: impl IntoIterator<Item = (Symbol, Vec<Bar>)>) -> Self {
        Self {
            series: series.into_iter().collect(),
        }
    }
}

impl HistoricalStore for InMemoryStore {
    fn range_ohlcv(
        &self,
        symbol: &Symbol,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _: Timeframe,
    ) -> Result<Vec<Bar>, DataError> {
        let bars = self
            .series
            .get(symbol)
            .ok_or_else(|| DataError::EmptySeries {
                symbol: symbol.to_string(),
            })?
            .iter()
            .filter(|bar| bar.time >= start && bar.time <= end)
            .copied()
            .collect::<Vec<Bar>>();

        if bars.is_empty() {
            return Err(DataError::EmptySeries {
                symbol: symbol.to_string(),
            });
        }

        Ok(bars)
    }
}
