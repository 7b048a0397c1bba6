//! Simulation collaborator contract.
//!
//! The replication controller treats the simulation as an opaque function:
//! given a parameter set and a 1-based replication index it returns one
//! realization's per-metric scalar observations. Implementations must be
//! deterministic in `(parameters, replication)` for results to be
//! reproducible.
//!
//! - [`Simulation`]: the contract
//! - [`FnSimulation`]: adapts a closure to the contract
//! - [`dispatch`]: work-stealing pool for batch-parallel replications
//! - [`queue`]: reference M/M/c queueing model

pub mod dispatch;
pub mod queue;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

pub use dispatch::{ReplicationTask, WorkStealingDispatcher};
pub use queue::{QueueModel, QueueParams};

/// Per-metric scalar results of one replication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation {
    values: IndexMap<String, f64>,
}

impl Observation {
    /// Create an empty observation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.insert(metric, value);
        self
    }

    /// Record a metric value, replacing any previous one.
    pub fn insert(&mut self, metric: impl Into<String>, value: f64) {
        self.values.insert(metric.into(), value);
    }

    /// Value reported for a metric.
    #[must_use]
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }

    /// Value for a tracked metric, validated for use in statistics.
    ///
    /// # Errors
    ///
    /// - [`SimError::MissingMetric`] if the metric was not reported
    /// - [`SimError::NonFiniteValue`] if the value is NaN or infinite
    pub fn require(&self, metric: &str, replication: usize) -> SimResult<f64> {
        let value = self.get(metric).ok_or_else(|| SimError::MissingMetric {
            metric: metric.to_string(),
            replication,
        })?;
        if !value.is_finite() {
            return Err(SimError::non_finite(metric, replication));
        }
        Ok(value)
    }

    /// Metric names in report order.
    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of metrics reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no metrics were reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Observation {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A stochastic simulation that can be replicated.
pub trait Simulation: Sync {
    /// Parameter set passed through opaquely by the controller.
    type Params: Sync;

    /// Run replication `replication` (1-based) and report its metrics.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the caller: a replication that cannot complete
    /// leaves no way to verify the budget.
    fn run_replication(&self, params: &Self::Params, replication: usize) -> SimResult<Observation>;

    /// Run replications `1..=count` on the dispatcher's worker pool.
    ///
    /// Results are ordered by replication index regardless of completion
    /// order. If several replications fail, the lowest-indexed failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Propagates the first (by index) replication failure, and fails if the
    /// dispatcher returns fewer than `count` results.
    fn run_replications_parallel(
        &self,
        params: &Self::Params,
        count: usize,
        dispatcher: &WorkStealingDispatcher,
    ) -> SimResult<Vec<Observation>> {
        let block = dispatcher
            .execute(count, |task| self.run_replication(params, task.replication))
            .into_iter()
            .collect::<SimResult<Vec<Observation>>>()?;
        ensure_complete(block, count)
    }
}

/// Reject a block that is missing replications.
fn ensure_complete(block: Vec<Observation>, count: usize) -> SimResult<Vec<Observation>> {
    if block.len() == count {
        Ok(block)
    } else {
        Err(SimError::replication(
            block.len() + 1,
            format!("dispatcher returned {} of {count} results", block.len()),
        ))
    }
}

/// Adapts a closure `Fn(replication) -> SimResult<Observation>` to [`Simulation`].
///
/// # Example
///
/// ```rust
/// use simrep::simulation::{FnSimulation, Observation, Simulation};
///
/// let sim = FnSimulation::new(|k: usize| Ok(Observation::new().with("k", k as f64)));
/// let obs = sim.run_replication(&(), 3).unwrap();
/// assert_eq!(obs.get("k"), Some(3.0));
/// ```
#[derive(Debug, Clone)]
pub struct FnSimulation<F> {
    run: F,
}

impl<F> FnSimulation<F>
where
    F: Fn(usize) -> SimResult<Observation> + Sync,
{
    /// Wrap a closure.
    pub const fn new(run: F) -> Self {
        Self { run }
    }
}

impl<F> Simulation for FnSimulation<F>
where
    F: Fn(usize) -> SimResult<Observation> + Sync,
{
    type Params = ();

    fn run_replication(&self, _params: &(), replication: usize) -> SimResult<Observation> {
        (self.run)(replication)
    }
}
