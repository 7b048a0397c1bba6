//! Statistics primitives for replication analysis.
//!
//! - [`accumulator`]: online (Welford) mean, variance and t-intervals
//! - [`t_dist`]: Student's t CDF and quantile
//!
//! Statistics that need more observations than are available return
//! [`InsufficientData`]. Callers deciding whether a metric has reached its
//! precision treat that as "not yet evaluable", never as a failure.

pub mod accumulator;
pub mod t_dist;

pub use accumulator::{AccumulatorSummary, MetricAccumulator, DEFAULT_CONFIDENCE_LEVEL};

/// Result type for statistics that may be undefined on small samples.
pub type StatsResult<T> = Result<T, InsufficientData>;

/// Too few observations to compute a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient data: need at least {required} observations, have {available}")]
pub struct InsufficientData {
    /// Observations the statistic needs.
    pub required: usize,
    /// Observations available.
    pub available: usize,
}

/// Sample mean and standard deviation of a slice, recomputed from scratch.
///
/// Returns `None` for the standard deviation when fewer than two values are
/// given, and `None` for both on an empty slice.
#[must_use]
pub fn two_pass_moments(values: &[f64]) -> Option<(f64, Option<f64>)> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return Some((mean, None));
    }

    let ss: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    Some((mean, Some((ss / (n - 1.0)).sqrt())))
}
