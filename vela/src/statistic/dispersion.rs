use serde::{Deserialize, Serialize};

/// Welford Online algorithms for calculating running values such as mean and variance in
/// one pass through.
pub mod welford_online {
    /// Calculates the next mean.
    pub fn calculate_mean(mut prev_mean: f64, next_value: f64, count: f64) -> f64 {
        prev_mean += (next_value - prev_mean) / count;
        prev_mean
    }

    /// Calculates the next Welford Online recurrence relation M.
    pub fn calculate_recurrence_relation_m(
        prev_m: f64,
        prev_mean: f64,
        new_value: f64,
        new_mean: f64,
    ) -> f64 {
        prev_m + ((new_value - prev_mean) * (new_value - new_mean))
    }

    /// Calculates the next biased 'Population' Variance using the Welford Online
    /// recurrence relation M.
    pub fn calculate_population_variance(recurrence_relation_m: f64, count: f64) -> f64 {
        if count < 1.0 {
            0.0
        } else {
            recurrence_relation_m / count
        }
    }
}

/// One-pass summary of a dataset: count, sum, mean and dispersion.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default, Deserialize, Serialize)]
pub struct DataSummary {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub dispersion: Dispersion,
}

impl DataSummary {
    pub fn update(&mut self, next_value: f64) {
        self.count += 1;
        self.sum += next_value;

        let prev_mean = self.mean;
        self.mean = welford_online::calculate_mean(self.mean, next_value, self.count as f64);

        self.dispersion
            .update(prev_mean, self.mean, next_value, self.count as f64);
    }

    pub fn std_dev(&self) -> f64 {
        self.dispersion.std_dev
    }
}

/// Representation of a dataset using measures of dispersion - range, variance & standard
/// deviation.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default, Deserialize, Serialize)]
pub struct Dispersion {
    pub range: Range,
    pub recurrence_relation_m: f64,
    pub variance: f64,
    pub std_dev: f64,
}

impl Dispersion {
    /// Iteratively updates the measures of Dispersion given the previous mean, new mean,
    /// new value, and the dataset count.
    pub fn update(&mut self, prev_mean: f64, new_mean: f64, new_value: f64, value_count: f64) {
        self.range.update(new_value);

        self.recurrence_relation_m = welford_online::calculate_recurrence_relation_m(
            self.recurrence_relation_m,
            prev_mean,
            new_value,
            new_mean,
        );

        self.variance =
            welford_online::calculate_population_variance(self.recurrence_relation_m, value_count);

        self.std_dev = self.variance.abs().sqrt();
    }
}

/// Measure of dispersion providing the highest and lowest value of a dataset.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default, Deserialize, Serialize)]
pub struct Range {
    pub activated: bool,
    pub high: f64,
    pub low: f64,
}

impl Range {
    /// Iteratively updates the Range given the next value in the dataset.
    pub fn update(&mut self, new_value: f64) {
        if self.activated {
            if new_value > self.high {
                self.high = new_value;
            }
            if new_value < self.low {
                self.low = new_value;
            }
        } else {
            self.activated = true;
            self.high = new_value;
            self.low = new_value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_data_summary_matches_two_pass_statistics() {
        // Dataset = [1.1, 1.2, 1.3, 1.4, 0.6]
        let values = [1.1, 1.2, 1.3, 1.4, 0.6];
        let mut summary = DataSummary::default();

        for value in values {
            summary.update(value);
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / values.len() as f64;

        assert_eq!(summary.count, 5);
        assert_relative_eq!(summary.mean, mean, epsilon = 1e-12);
        assert_relative_eq!(summary.dispersion.variance, variance, epsilon = 1e-12);
        assert_relative_eq!(summary.std_dev(), variance.sqrt(), epsilon = 1e-12);
        assert_eq!(summary.dispersion.range.high, 1.4);
        assert_eq!(summary.dispersion.range.low, 0.6);
    }
}
