use crate::stats::Statistic;
use crate::time::SimTime;
use serde::Serialize;
use std::fmt::Display;

///
/// The type to collect a accumulated value, provinding
/// standartised metrics like e.g. standart derivation.
///
#[derive(Debug, Clone, PartialEq)]
pub struct StdDev {
    min: f64,
    max: f64,

    num_values: usize,
    sum: f64,
    sum_weights: f64,
    sqrtsum: f64,
    sqrtsum_weights: f64,
}

impl StdDev {
    ///
    /// Creates  a new instance of StdDev.
    ///
    #[must_use]
    pub fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,

            num_values: 0,
            sum: 0.0,
            sum_weights: 0.0,
            sqrtsum: 0.0,
            sqrtsum_weights: 0.0,
        }
    }

    ///
    /// A serializable snapshot of the accumulated values.
    ///
    #[must_use]
    pub fn report(&self) -> StdDevReport {
        if self.is_empty() {
            return StdDevReport::default();
        }
        StdDevReport {
            count: self.num_values,
            mean: self.mean(),
            std_dev: self.std_derivation(),
            min: self.min,
            max: self.max,
        }
    }
}

impl Default for StdDev {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistic for StdDev {
    type Value = f64;

    fn collect_weighted_at(&mut self, value: Self::Value, weight: f64, _sim_time: SimTime) {
        self.num_values += 1;

        if self.min > value {
            self.min = value;
        }
        if self.max < value {
            self.max = value;
        }

        self.sum += weight * value;
        self.sum_weights += weight;

        self.sqrtsum += weight * value * value;
        self.sqrtsum_weights += weight * weight;
    }

    fn len(&self) -> usize {
        self.num_values
    }

    fn sum(&self) -> Self::Value {
        self.sum
    }

    fn min(&self) -> Self::Value {
        self.min
    }

    fn max(&self) -> Self::Value {
        self.max
    }

    fn mean(&self) -> Self::Value {
        self.sum / self.sum_weights
    }

    fn std_derivation(&self) -> Self::Value {
        self.variance().sqrt()
    }

    fn variance(&self) -> Self::Value {
        if self.num_values == 0 {
            f64::NAN
        } else if self.num_values == 1 {
            0.0
        } else {
            let var = (self.sum_weights * self.sqrtsum - self.sum * self.sum)
                / (self.sum_weights * self.sum_weights - self.sqrtsum_weights);
            var.max(0.0)
        }
    }
}

impl Display for StdDev {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Mean: {:>7.3} with derivation {:>7.3} (min: {:>7.3} max: {:>7.3} len: {})",
            self.mean(),
            self.std_derivation(),
            self.min(),
            self.max(),
            self.num_values
        )
    }
}

///
/// The exported form of a [`StdDev`]. All zero if nothing was collected.
///
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StdDevReport {
    /// Number of samples.
    pub count: usize,
    /// Sample mean.
    pub mean: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
}
