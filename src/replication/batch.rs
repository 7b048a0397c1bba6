//! Batch precision estimation over a pre-run block of replications.
//!
//! The non-adaptive sibling of the controller. Given N observations that
//! already exist, every prefix `1..=i` is recomputed from scratch and the
//! first prefix whose percentage deviation
//!
//! ```text
//! 100 · (ci_upper - mean) / |mean|
//! ```
//!
//! is at or below the desired precision (as a percentage) is reported. No
//! look-ahead is applied and no accumulator is reused; it is O(N²) and meant
//! for blocks of a few hundred replications at most.
//!
//! Metrics whose raw mean is below 1 in magnitude (utilisation-style values
//! in `[0, 1]`) are multiplied by 100 first and reported under the key
//! `<metric>_x100`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SimError, SimResult};
use crate::simulation::{Simulation, WorkStealingDispatcher};
use crate::stats::t_dist::two_sided_critical;
use crate::stats::{two_pass_moments, DEFAULT_CONFIDENCE_LEVEL};

/// Suffix appended to the key of a rescaled metric.
pub const RESCALED_SUFFIX: &str = "_x100";

const RESCALE_FACTOR: f64 = 100.0;

/// Cumulative statistics of one prefix of the block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeRow {
    /// Prefix length.
    pub replications: usize,
    /// Last observation of the prefix (after rescaling).
    pub observation: f64,
    /// Prefix mean.
    pub mean: f64,
    /// Prefix sample standard deviation.
    pub std_dev: Option<f64>,
    /// Lower confidence bound.
    pub ci_lower: Option<f64>,
    /// Upper confidence bound.
    pub ci_upper: Option<f64>,
    /// Relative half-width as a percentage.
    pub perc_deviation: Option<f64>,
}

/// Outcome of one metric's batch analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionEstimate {
    /// Reporting key (`<metric>_x100` when rescaled).
    pub metric: String,
    /// Whether the values were multiplied by 100.
    pub rescaled: bool,
    /// One row per prefix length.
    pub rows: Vec<CumulativeRow>,
    /// First qualifying prefix length.
    pub required: Option<usize>,
    /// Set when no prefix qualified.
    pub warning: Option<String>,
}

/// Non-incremental precision check.
///
/// # Example
///
/// ```rust
/// use simrep::replication::BatchPrecisionEstimator;
///
/// let block = [10.0, 8.0, 12.0, 9.0, 11.0, 7.0, 13.0, 10.0, 9.0, 11.0];
/// let estimate = BatchPrecisionEstimator::new(0.5).estimate("wait", &block).unwrap();
/// assert_eq!(estimate.required, Some(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchPrecisionEstimator {
    desired_precision: f64,
    confidence_level: f64,
    min_replications: usize,
}

impl BatchPrecisionEstimator {
    /// Estimator at 95% confidence with no lower bound on the prefix.
    #[must_use]
    pub const fn new(desired_precision: f64) -> Self {
        Self {
            desired_precision,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            min_replications: 1,
        }
    }

    /// Set the two-sided confidence level.
    #[must_use]
    pub const fn with_confidence(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    /// Never report a prefix shorter than `min_replications`.
    #[must_use]
    pub const fn with_min_replications(mut self, min_replications: usize) -> Self {
        self.min_replications = min_replications;
        self
    }

    /// Desired precision as a fraction.
    #[must_use]
    pub const fn desired_precision(&self) -> f64 {
        self.desired_precision
    }

    /// Confidence level.
    #[must_use]
    pub const fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Lower bound on the reported prefix.
    #[must_use]
    pub const fn min_replications(&self) -> usize {
        self.min_replications
    }

    /// # Errors
    ///
    /// [`SimError::Config`] for a non-positive precision or a confidence
    /// level outside (0, 1).
    pub fn validate(&self) -> SimResult<()> {
        if !(self.desired_precision.is_finite() && self.desired_precision > 0.0) {
            return Err(SimError::config(format!(
                "desired precision must be positive, got {}",
                self.desired_precision
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(SimError::config(format!(
                "confidence level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    /// Analyse one metric's block.
    ///
    /// # Errors
    ///
    /// - [`SimError::Config`] for an empty block or invalid settings
    /// - [`SimError::NonFiniteValue`] if any observation is NaN or infinite
    pub fn estimate(&self, metric: &str, raw: &[f64]) -> SimResult<PrecisionEstimate> {
        self.validate()?;
        if let Some(i) = raw.iter().position(|x| !x.is_finite()) {
            return Err(SimError::non_finite(metric, i + 1));
        }
        let Some((raw_mean, _)) = two_pass_moments(raw) else {
            return Err(SimError::config(format!(
                "no observations to analyse for metric '{metric}'"
            )));
        };

        let rescaled = raw_mean.abs() < 1.0;
        let (key, values): (String, Vec<f64>) = if rescaled {
            warn!(metric, raw_mean, "rescaling metric by 100 before analysis");
            (
                format!("{metric}{RESCALED_SUFFIX}"),
                raw.iter().map(|x| x * RESCALE_FACTOR).collect(),
            )
        } else {
            (metric.to_string(), raw.to_vec())
        };

        let rows: Vec<CumulativeRow> = (1..=values.len())
            .filter_map(|i| self.prefix_row(&values[..i]))
            .collect();

        let threshold = self.desired_precision * 100.0;
        let required = rows
            .iter()
            .filter(|r| r.replications >= self.min_replications)
            .find(|r| r.perc_deviation.is_some_and(|d| d <= threshold))
            .map(|r| r.replications);

        let warning = if required.is_none() {
            let message = format!(
                "{key}: no prefix of {} replications reached {threshold}% deviation",
                values.len()
            );
            warn!(metric = key.as_str(), replications = values.len(), "{message}");
            Some(message)
        } else {
            debug!(metric = key.as_str(), required, "qualifying prefix found");
            None
        };

        Ok(PrecisionEstimate {
            metric: key,
            rescaled,
            rows,
            required,
            warning,
        })
    }

    fn prefix_row(&self, prefix: &[f64]) -> Option<CumulativeRow> {
        let (mean, std_dev) = two_pass_moments(prefix)?;
        let n = prefix.len();
        let half_width =
            std_dev.map(|s| two_sided_critical(self.confidence_level, n - 1) * s / (n as f64).sqrt());
        let perc_deviation = half_width
            .filter(|_| mean.abs() >= f64::EPSILON)
            .map(|hw| hw / mean.abs() * 100.0);

        Some(CumulativeRow {
            replications: n,
            observation: prefix[n - 1],
            mean,
            std_dev,
            ci_lower: half_width.map(|hw| mean - hw),
            ci_upper: half_width.map(|hw| mean + hw),
            perc_deviation,
        })
    }

    /// Analyse every metric of a keyed table, in table order.
    ///
    /// The result is keyed by reporting key.
    ///
    /// # Errors
    ///
    /// Fails on the first metric [`estimate`](Self::estimate) rejects.
    pub fn estimate_all(
        &self,
        table: &IndexMap<String, Vec<f64>>,
    ) -> SimResult<IndexMap<String, PrecisionEstimate>> {
        table
            .iter()
            .map(|(metric, values)| {
                let estimate = self.estimate(metric, values)?;
                Ok((estimate.metric.clone(), estimate))
            })
            .collect()
    }
}

/// Exploration result: the raw block and its per-metric estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationReport {
    /// Block size.
    pub replications: usize,
    /// Raw observations per tracked metric, replication order.
    pub raw: IndexMap<String, Vec<f64>>,
    /// Estimates keyed by reporting key.
    pub estimates: IndexMap<String, PrecisionEstimate>,
}

/// Run `replications` replications on the pool and estimate each metric.
///
/// # Errors
///
/// Propagates simulation failures, missing or non-finite metrics, and
/// estimator configuration errors. Fails before running anything if
/// `metrics` is empty or `replications` is zero.
pub fn explore<S: Simulation>(
    sim: &S,
    params: &S::Params,
    metrics: &[String],
    replications: usize,
    dispatcher: &WorkStealingDispatcher,
    estimator: &BatchPrecisionEstimator,
) -> SimResult<ExplorationReport> {
    estimator.validate()?;
    if metrics.is_empty() {
        return Err(SimError::config("at least one tracked metric is required"));
    }
    if replications == 0 {
        return Err(SimError::config("exploration needs at least one replication"));
    }

    let block = sim.run_replications_parallel(params, replications, dispatcher)?;

    let mut raw: IndexMap<String, Vec<f64>> = metrics
        .iter()
        .map(|m| (m.clone(), Vec::with_capacity(replications)))
        .collect();
    for (i, observation) in block.iter().enumerate() {
        for (metric, column) in &mut raw {
            column.push(observation.require(metric, i + 1)?);
        }
    }

    let estimates = estimator.estimate_all(&raw)?;
    Ok(ExplorationReport {
        replications,
        raw,
        estimates,
    })
}
