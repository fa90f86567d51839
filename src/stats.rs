use chrono::TimeDelta;

/// Running mean and variance of a sample (Welford's algorithm).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    /// Sample variance (`n - 1` denominator).
    pub var: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            var: if self.n_vals > 1 {
                self.diff_2_sum / (self.n_vals as f64 - 1.0)
            } else {
                f64::NAN
            },
        }
    }
}

impl FromIterator<f64> for Accumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::new();
        for val in iter {
            acc.add(val);
        }
        acc
    }
}

/// Drop missing (NaN) values from a sample.
pub fn finite(sample: &[f64]) -> Vec<f64> {
    sample.iter().copied().filter(|val| !val.is_nan()).collect()
}

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Exact running mean of time intervals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationMean {
    n_vals: usize,
    total_nanos: i128,
}

impl DurationMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: TimeDelta) {
        self.n_vals += 1;
        self.total_nanos += i128::from(val.num_seconds()) * NANOS_PER_SEC
            + i128::from(val.subsec_nanos());
    }

    pub fn merge(&mut self, other: &Self) {
        self.n_vals += other.n_vals;
        self.total_nanos += other.total_nanos;
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    /// Mean rounded to the nearest whole second, ties to even.
    ///
    /// Returns `None` if no value was added.
    pub fn rounded_mean(&self) -> Option<TimeDelta> {
        if self.n_vals == 0 {
            return None;
        }
        let denom = self.n_vals as i128 * NANOS_PER_SEC;
        let mut secs = self.total_nanos.div_euclid(denom);
        let twice_rem = 2 * self.total_nanos.rem_euclid(denom);
        if twice_rem > denom || (twice_rem == denom && secs % 2 != 0) {
            secs += 1;
        }
        i64::try_from(secs).ok().and_then(TimeDelta::try_seconds)
    }
}
