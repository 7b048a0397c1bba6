//! Experiment configuration with YAML schema and validation.
//!
//! Implements Poka-Yoke (mistake-proofing) through:
//! - Type-safe configuration structs
//! - Schema validation via `validator`
//! - Runtime semantic validation before any replication runs
//!
//! ```yaml
//! name: "M/M/2 staffing study"
//! reproducibility:
//!   seed: 42
//! model:
//!   arrival_rate: 1.6
//!   service_rate: 1.0
//!   servers: 2
//!   warm_up: 200.0
//!   run_length: 2000.0
//! replications:
//!   metrics: [mean_waiting_time, mean_utilisation]
//!   desired_precision: 0.05
//!   initial_replications: 5
//! exploration:
//!   replications: 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::error::{SimError, SimResult};
use crate::replication::{BatchPrecisionEstimator, ReplicationSettings};
use crate::replication::controller::{
    DEFAULT_CONTROLLER_CONFIDENCE, DEFAULT_LOOK_AHEAD, DEFAULT_REPLICATION_BUDGET,
};
use crate::simulation::queue::QUEUE_METRICS;
use crate::simulation::QueueParams;
use crate::stats::DEFAULT_CONFIDENCE_LEVEL;

/// Top-level experiment configuration.
///
/// Loaded from YAML files with full schema validation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Schema version for forward compatibility.
    #[validate(length(min = 1))]
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Experiment name.
    #[serde(default)]
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Reproducibility settings.
    #[validate(nested)]
    #[serde(default)]
    pub reproducibility: ReproducibilityConfig,

    /// Queueing model parameters.
    #[serde(default)]
    pub model: QueueParams,

    /// Adaptive controller settings.
    #[validate(nested)]
    #[serde(default)]
    pub replications: ReplicationsConfig,

    /// Batch exploration settings.
    #[validate(nested)]
    #[serde(default)]
    pub exploration: ExplorationConfig,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: String::new(),
            description: String::new(),
            reproducibility: ReproducibilityConfig::default(),
            model: QueueParams::default(),
            replications: ReplicationsConfig::default(),
            exploration: ExplorationConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;

        // Poka-Yoke: validate all constraints
        config.validate()?;

        // Additional semantic validation
        config.validate_semantic()?;

        Ok(config)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the config cannot be rendered.
    pub fn to_yaml(&self) -> SimResult<String> {
        serde_yaml::to_string(self).map_err(|e| SimError::serialization(e.to_string()))
    }

    /// Create a builder for configuration.
    #[must_use]
    pub fn builder() -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::default()
    }

    /// Validate semantic constraints beyond schema.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unrunnable model, invalid
    /// controller or estimator settings, or a metric the model never reports.
    pub fn validate_semantic(&self) -> SimResult<()> {
        self.model.validate_semantic()?;
        self.replication_settings().validate()?;
        self.batch_estimator().validate()?;

        if let Some(unknown) = self
            .replications
            .metrics
            .iter()
            .find(|m| !QUEUE_METRICS.contains(&m.as_str()))
        {
            return Err(SimError::config(format!(
                "unknown metric '{unknown}'; the model reports: {}",
                QUEUE_METRICS.join(", ")
            )));
        }
        Ok(())
    }

    /// Override the master seed.
    pub fn set_seed(&mut self, seed: u64) {
        self.reproducibility.seed = seed;
    }

    /// Model parameters with the master seed applied.
    #[must_use]
    pub fn queue_params(&self) -> QueueParams {
        QueueParams {
            seed: self.reproducibility.seed,
            ..self.model.clone()
        }
    }

    /// Controller settings.
    #[must_use]
    pub fn replication_settings(&self) -> ReplicationSettings {
        let r = &self.replications;
        ReplicationSettings::new(r.metrics.iter().cloned(), r.desired_precision)
            .initial_replications(r.initial_replications)
            .look_ahead(r.look_ahead)
            .replication_budget(r.replication_budget)
            .confidence_level(r.confidence_level)
            .workers(r.workers)
    }

    /// Batch estimator for exploration.
    #[must_use]
    pub fn batch_estimator(&self) -> BatchPrecisionEstimator {
        let e = &self.exploration;
        BatchPrecisionEstimator::new(e.desired_precision)
            .with_confidence(e.confidence_level)
            .with_min_replications(e.min_replications)
    }
}

/// Configuration builder for programmatic construction.
#[derive(Debug, Default)]
pub struct ExperimentConfigBuilder {
    seed: Option<u64>,
    model: Option<QueueParams>,
    metrics: Option<Vec<String>>,
    desired_precision: Option<f64>,
    initial_replications: Option<usize>,
    look_ahead: Option<usize>,
    replication_budget: Option<usize>,
    workers: Option<usize>,
}

impl ExperimentConfigBuilder {
    /// Set the random seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the model parameters.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // QueueParams isn't Copy
    pub fn model(mut self, model: QueueParams) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the tracked metrics.
    #[must_use]
    pub fn metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    /// Set the controller's desired precision.
    #[must_use]
    pub const fn desired_precision(mut self, precision: f64) -> Self {
        self.desired_precision = Some(precision);
        self
    }

    /// Set the initial block size.
    #[must_use]
    pub const fn initial_replications(mut self, k0: usize) -> Self {
        self.initial_replications = Some(k0);
        self
    }

    /// Set the look-ahead length.
    #[must_use]
    pub const fn look_ahead(mut self, look_ahead: usize) -> Self {
        self.look_ahead = Some(look_ahead);
        self
    }

    /// Set the replication budget.
    #[must_use]
    pub const fn replication_budget(mut self, budget: usize) -> Self {
        self.replication_budget = Some(budget);
        self
    }

    /// Set the worker pool size.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ExperimentConfig {
        let mut config = ExperimentConfig::default();

        if let Some(seed) = self.seed {
            config.reproducibility.seed = seed;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(metrics) = self.metrics {
            config.replications.metrics = metrics;
        }
        if let Some(precision) = self.desired_precision {
            config.replications.desired_precision = precision;
        }
        if let Some(k0) = self.initial_replications {
            config.replications.initial_replications = k0;
        }
        if let Some(look_ahead) = self.look_ahead {
            config.replications.look_ahead = look_ahead;
        }
        if let Some(budget) = self.replication_budget {
            config.replications.replication_budget = budget;
        }
        if let Some(workers) = self.workers {
            config.replications.workers = workers;
        }

        config
    }
}

/// Reproducibility settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReproducibilityConfig {
    /// Master seed for all replication streams.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn default_seed() -> u64 {
    42
}

impl Default for ReproducibilityConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

/// Adaptive controller settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReplicationsConfig {
    /// Metrics that must all reach precision.
    #[validate(length(min = 1))]
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    /// Target relative half-width.
    #[serde(default = "default_desired_precision")]
    pub desired_precision: f64,
    /// Fixed block run before adaptive control.
    #[serde(default)]
    pub initial_replications: usize,
    /// Consecutive in-precision evaluations required.
    #[serde(default = "default_look_ahead")]
    pub look_ahead: usize,
    /// Hard cap on replications; must cover the initial block.
    #[serde(default = "default_replication_budget")]
    pub replication_budget: usize,
    /// Two-sided confidence level.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_controller_confidence")]
    pub confidence_level: f64,
    /// Worker pool size for the initial block (`0` = one per CPU).
    #[serde(default)]
    pub workers: usize,
}

fn default_metrics() -> Vec<String> {
    QUEUE_METRICS.iter().map(ToString::to_string).collect()
}

const fn default_desired_precision() -> f64 {
    0.05
}

const fn default_look_ahead() -> usize {
    DEFAULT_LOOK_AHEAD
}

const fn default_replication_budget() -> usize {
    DEFAULT_REPLICATION_BUDGET
}

const fn default_controller_confidence() -> f64 {
    DEFAULT_CONTROLLER_CONFIDENCE
}

impl Default for ReplicationsConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            desired_precision: default_desired_precision(),
            initial_replications: 0,
            look_ahead: default_look_ahead(),
            replication_budget: default_replication_budget(),
            confidence_level: default_controller_confidence(),
            workers: 0,
        }
    }
}

/// Batch exploration settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ExplorationConfig {
    /// Block size N.
    #[validate(range(min = 1))]
    #[serde(default = "default_exploration_replications")]
    pub replications: usize,
    /// Target relative half-width.
    #[serde(default = "default_desired_precision")]
    pub desired_precision: f64,
    /// Two-sided confidence level.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_exploration_confidence")]
    pub confidence_level: f64,
    /// Lower bound on the reported prefix.
    #[validate(range(min = 1))]
    #[serde(default = "default_min_replications")]
    pub min_replications: usize,
}

const fn default_exploration_replications() -> usize {
    50
}

const fn default_exploration_confidence() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

const fn default_min_replications() -> usize {
    1
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            replications: default_exploration_replications(),
            desired_precision: default_desired_precision(),
            confidence_level: default_exploration_confidence(),
            min_replications: default_min_replications(),
        }
    }
}
