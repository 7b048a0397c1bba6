//! Online mean/variance/confidence-interval accumulator (Welford).
//!
//! Tracks a single scalar metric stream with O(1) memory and O(1) work per
//! observation. No history is retained: the running mean and the sum of
//! squared deviations `m2` are updated in place,
//!
//! ```text
//! n    += 1
//! δ     = x - mean
//! mean += δ / n
//! m2   += δ · (x - mean)
//! ```
//!
//! which is numerically equivalent (to floating tolerance) to a two-pass
//! recomputation over the full history.

use serde::{Deserialize, Serialize};

use super::t_dist::two_sided_critical;
use super::{InsufficientData, StatsResult};

/// Default two-sided confidence level for interval statistics.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Online statistics for one metric.
///
/// # Example
///
/// ```rust
/// use simrep::stats::MetricAccumulator;
///
/// let mut acc = MetricAccumulator::new("mean_waiting_time");
/// for x in [10.0, 8.0, 12.0, 9.0, 11.0] {
///     acc.update(x);
/// }
/// assert_eq!(acc.count(), 5);
/// assert!((acc.mean().unwrap() - 10.0).abs() < 1e-12);
/// assert!((acc.variance().unwrap() - 2.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAccumulator {
    /// Metric identifier.
    name: String,
    /// Observations folded so far.
    n: usize,
    /// Running mean (meaningless while `n == 0`).
    mean: f64,
    /// Sum of squared deviations from the running mean.
    m2: f64,
    /// Two-sided confidence level used by the interval statistics.
    confidence_level: f64,
}

impl MetricAccumulator {
    /// Create an empty accumulator at the default 95% confidence level.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_confidence(name, DEFAULT_CONFIDENCE_LEVEL)
    }

    /// Create an empty accumulator at the given two-sided confidence level.
    ///
    /// The level is expected in (0, 1); outside that range every interval
    /// statistic evaluates to NaN, which never satisfies a precision check.
    #[must_use]
    pub fn with_confidence(name: impl Into<String>, confidence_level: f64) -> Self {
        Self {
            name: name.into(),
            n: 0,
            mean: 0.0,
            m2: 0.0,
            confidence_level,
        }
    }

    /// Fold one observation into the running state.
    pub fn update(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// By-value form of [`update`](Self::update).
    #[must_use]
    pub fn updated(mut self, x: f64) -> Self {
        self.update(x);
        self
    }

    /// Metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of observations folded so far.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.n
    }

    /// Configured two-sided confidence level.
    #[must_use]
    pub const fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Running sum of squared deviations.
    #[must_use]
    pub const fn m2(&self) -> f64 {
        self.m2
    }

    /// Running mean.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] before the first observation.
    pub fn mean(&self) -> StatsResult<f64> {
        self.require(1)?;
        Ok(self.mean)
    }

    /// Sample variance, `m2 / (n - 1)`.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] while fewer than two observations exist.
    pub fn variance(&self) -> StatsResult<f64> {
        self.require(2)?;
        // m2 can drift a hair below zero on constant streams
        Ok((self.m2 / (self.n - 1) as f64).max(0.0))
    }

    /// Sample standard deviation.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] while fewer than two observations exist.
    pub fn std_dev(&self) -> StatsResult<f64> {
        self.variance().map(f64::sqrt)
    }

    /// Standard error of the mean, `s / √n`.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] while fewer than two observations exist.
    pub fn std_error(&self) -> StatsResult<f64> {
        Ok(self.std_dev()? / (self.n as f64).sqrt())
    }

    /// Half-width of the t-based interval at the configured confidence level.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] while fewer than two observations exist.
    pub fn half_width(&self) -> StatsResult<f64> {
        self.half_width_at(self.confidence_level)
    }

    /// Half-width `t_{1-α/2, n-1} · s/√n` at an explicit confidence level.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] while fewer than two observations exist.
    pub fn half_width_at(&self, confidence_level: f64) -> StatsResult<f64> {
        let std_error = self.std_error()?;
        Ok(two_sided_critical(confidence_level, self.n - 1) * std_error)
    }

    /// Lower confidence bound.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] while fewer than two observations exist.
    pub fn ci_lower(&self) -> StatsResult<f64> {
        Ok(self.mean - self.half_width()?)
    }

    /// Upper confidence bound.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] while fewer than two observations exist.
    pub fn ci_upper(&self) -> StatsResult<f64> {
        Ok(self.mean + self.half_width()?)
    }

    /// Relative half-width, `half_width / |mean|`.
    ///
    /// This is the quantity compared against a desired precision. A mean of
    /// (numerically) zero yields `f64::INFINITY`: the interval can never be
    /// tight relative to it.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientData`] while fewer than two observations exist.
    pub fn deviation(&self) -> StatsResult<f64> {
        let half_width = self.half_width()?;
        let magnitude = self.mean.abs();
        if magnitude < f64::EPSILON {
            return Ok(f64::INFINITY);
        }
        Ok(half_width / magnitude)
    }

    /// Point-in-time view of every statistic; `None` where not yet defined.
    #[must_use]
    pub fn summary(&self) -> AccumulatorSummary {
        AccumulatorSummary {
            count: self.n,
            mean: self.mean().ok(),
            std_dev: self.std_dev().ok(),
            ci_lower: self.ci_lower().ok(),
            ci_upper: self.ci_upper().ok(),
            deviation: self.deviation().ok(),
        }
    }

    fn require(&self, required: usize) -> StatsResult<()> {
        if self.n < required {
            return Err(InsufficientData {
                required,
                available: self.n,
            });
        }
        Ok(())
    }
}

/// Statistics of an accumulator at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorSummary {
    /// Observations folded.
    pub count: usize,
    /// Running mean.
    pub mean: Option<f64>,
    /// Sample standard deviation.
    pub std_dev: Option<f64>,
    /// Lower confidence bound.
    pub ci_lower: Option<f64>,
    /// Upper confidence bound.
    pub ci_upper: Option<f64>,
    /// Relative half-width.
    pub deviation: Option<f64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn filled(values: &[f64]) -> MetricAccumulator {
        values
            .iter()
            .fold(MetricAccumulator::new("metric"), |acc, &x| acc.updated(x))
    }

    #[test]
    fn test_empty_accumulator_has_no_statistics() {
        let acc = MetricAccumulator::new("wait");
        assert_eq!(acc.count(), 0);
        assert_eq!(
            acc.mean(),
            Err(InsufficientData {
                required: 1,
                available: 0
            })
        );
        assert!(acc.variance().is_err());
        assert!(acc.deviation().is_err());
    }

    #[test]
    fn test_single_observation_has_mean_only() {
        let acc = filled(&[4.2]);
        assert!((acc.mean().unwrap() - 4.2).abs() < f64::EPSILON);
        assert_eq!(
            acc.std_dev(),
            Err(InsufficientData {
                required: 2,
                available: 1
            })
        );
        assert!(acc.half_width().is_err());
        assert!(acc.ci_lower().is_err());
        assert!(acc.ci_upper().is_err());
    }

    #[test]
    fn test_reference_sequence() {
        let acc = filled(&[10.0, 8.0, 12.0, 9.0, 11.0]);
        assert_eq!(acc.count(), 5);
        assert!((acc.mean().unwrap() - 10.0).abs() < 1e-12);
        assert!((acc.variance().unwrap() - 2.5).abs() < 1e-12);
        assert!((acc.std_dev().unwrap() - 1.581_138_83).abs() < 1e-6);
        assert!((acc.std_error().unwrap() - 0.707_106_78).abs() < 1e-6);
    }

    #[test]
    fn test_half_width_and_interval() {
        let acc = filled(&[10.0, 8.0, 12.0, 9.0, 11.0]);
        // t_{0.975, 4} = 2.776445105, se = √0.5
        let expected = 2.776_445_105 * 0.5_f64.sqrt();
        let hw = acc.half_width().unwrap();
        assert!((hw - expected).abs() < 1e-6);
        assert!((acc.ci_lower().unwrap() - (10.0 - expected)).abs() < 1e-6);
        assert!((acc.ci_upper().unwrap() - (10.0 + expected)).abs() < 1e-6);
        assert!((acc.deviation().unwrap() - expected / 10.0).abs() < 1e-7);
    }

    #[test]
    fn test_half_width_at_other_level() {
        let acc = filled(&[10.0, 8.0]);
        // t_{0.95, 1} = 6.313751515, se = 1
        let hw = acc.half_width_at(0.90).unwrap();
        assert!((hw - 6.313_751_515).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_level_is_used() {
        let wide = MetricAccumulator::with_confidence("m", 0.99)
            .updated(1.0)
            .updated(2.0)
            .updated(4.0);
        let narrow = MetricAccumulator::with_confidence("m", 0.80)
            .updated(1.0)
            .updated(2.0)
            .updated(4.0);
        assert!(wide.half_width().unwrap() > narrow.half_width().unwrap());
        assert!((wide.confidence_level() - 0.99).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_mean_deviation_is_infinite() {
        let acc = filled(&[-1.0, 1.0]);
        assert!(acc.deviation().unwrap().is_infinite());
    }

    #[test]
    fn test_negative_mean_deviation_is_non_negative() {
        let acc = filled(&[-10.0, -8.0, -12.0]);
        let dev = acc.deviation().unwrap();
        assert!(dev >= 0.0);
        let positive = filled(&[10.0, 8.0, 12.0]);
        assert!((dev - positive.deviation().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_stream_has_zero_width() {
        let acc = filled(&[3.0; 10]);
        assert!(acc.variance().unwrap().abs() < f64::EPSILON);
        assert!(acc.deviation().unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_fields() {
        let single = filled(&[5.0]).summary();
        assert_eq!(single.count, 1);
        assert_eq!(single.mean, Some(5.0));
        assert!(single.std_dev.is_none());
        assert!(single.deviation.is_none());

        let many = filled(&[5.0, 7.0, 6.0]).summary();
        assert_eq!(many.count, 3);
        assert!(many.ci_lower.unwrap() < 6.0 && many.ci_upper.unwrap() > 6.0);
    }

    #[test]
    fn test_count_increments_by_one() {
        let mut acc = MetricAccumulator::new("m");
        for i in 1..=20 {
            acc.update(i as f64);
            assert_eq!(acc.count(), i);
        }
    }

    #[test]
    fn test_accumulator_serialization() {
        let acc = filled(&[1.0, 2.0]);
        let json = serde_json::to_string(&acc).expect("serialize");
        assert!(json.contains("\"name\":\"metric\""));
        let back: MetricAccumulator = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, acc);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn two_pass(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let ss = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
        (mean, ss / (n - 1.0))
    }

    proptest! {
        /// Falsification test: incremental moments equal two-pass moments.
        #[test]
        fn prop_welford_matches_two_pass(values in prop::collection::vec(-1.0e6f64..1.0e6, 2..200)) {
            let acc = values
                .iter()
                .fold(MetricAccumulator::new("m"), |acc, &x| acc.updated(x));
            let (mean, variance) = two_pass(&values);

            let scale = values.iter().fold(1.0_f64, |m, x| m.max(x.abs()));
            let mean_tol = 1e-9 * scale;
            let var_tol = 1e-9 * scale * scale;
            prop_assert!((acc.mean().unwrap() - mean).abs() <= mean_tol);
            prop_assert!((acc.variance().unwrap() - variance).abs() <= var_tol);
        }

        /// Falsification test: m2 never goes negative.
        #[test]
        fn prop_m2_non_negative(values in prop::collection::vec(-1.0e3f64..1.0e3, 1..100)) {
            let acc = values
                .iter()
                .fold(MetricAccumulator::new("m"), |acc, &x| acc.updated(x));
            prop_assert!(acc.m2() >= -1e-9);
        }

        /// Falsification test: deviation is non-negative for a positive mean.
        #[test]
        fn prop_deviation_non_negative(values in prop::collection::vec(0.1f64..1.0e3, 2..100)) {
            let acc = values
                .iter()
                .fold(MetricAccumulator::new("m"), |acc, &x| acc.updated(x));
            prop_assert!(acc.deviation().unwrap() >= 0.0);
        }

        /// Falsification test: two fresh accumulators fed the same order agree exactly.
        #[test]
        fn prop_deterministic(values in prop::collection::vec(-1.0e3f64..1.0e3, 0..100)) {
            let a = values.iter().fold(MetricAccumulator::new("m"), |acc, &x| acc.updated(x));
            let b = values.iter().fold(MetricAccumulator::new("m"), |acc, &x| acc.updated(x));
            prop_assert_eq!(a, b);
        }
    }
}
