//! Adaptive replication controller.
//!
//! Decides how many independent replications are needed before every tracked
//! metric's confidence interval is within a relative precision of its mean.
//!
//! ```text
//! Initializing ──begin──► RunningInitial ──(k0 folded)──► RunningAdaptive
//!       │                       │                               │
//!       └────(k0 = 0)───────────┼──────────────────────────────►│
//!                               ▼                               ▼
//!                       Solved | BudgetExhausted ◄──────────────┘
//! ```
//!
//! A metric is solved once its deviation has stayed at or below the desired
//! precision for `look_ahead_window(r)` consecutive evaluations. The count it
//! reports is the replication at which that streak began.
//!
//! [`ControllerState::step`] is a pure transition over one observation; the
//! [`ReplicationController`] only decides where observations come from.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::tabulizer::{ReplicationSnapshot, ReplicationTabuliser};
use crate::error::{SimError, SimResult};
use crate::simulation::{Observation, Simulation, WorkStealingDispatcher};
use crate::stats::AccumulatorSummary;

/// Default number of consecutive in-precision evaluations required.
pub const DEFAULT_LOOK_AHEAD: usize = 5;
/// Default hard cap on replications.
pub const DEFAULT_REPLICATION_BUDGET: usize = 1000;
/// Default two-sided confidence level for the stopping rule.
pub const DEFAULT_CONTROLLER_CONFIDENCE: f64 = 0.90;

/// Replication count above which the look-ahead window scales.
const LOOK_AHEAD_SCALE_THRESHOLD: usize = 100;

/// Stability window after `replications` replications.
///
/// `look_ahead` up to 100 replications, then `look_ahead · r / 100`
/// rounded half up. Saturates instead of overflowing.
///
/// ```rust
/// use simrep::replication::look_ahead_window;
///
/// assert_eq!(look_ahead_window(5, 50), 5);
/// assert_eq!(look_ahead_window(5, 100), 5);
/// assert_eq!(look_ahead_window(5, 200), 10);
/// ```
#[must_use]
pub const fn look_ahead_window(look_ahead: usize, replications: usize) -> usize {
    if replications <= LOOK_AHEAD_SCALE_THRESHOLD {
        look_ahead
    } else {
        look_ahead
            .saturating_mul(replications)
            .saturating_add(LOOK_AHEAD_SCALE_THRESHOLD / 2)
            / LOOK_AHEAD_SCALE_THRESHOLD
    }
}

/// Immutable controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationSettings {
    /// Metrics that must all reach precision.
    pub metrics: Vec<String>,
    /// Target relative half-width (0.05 = ±5%).
    pub desired_precision: f64,
    /// Replications run as one block before adaptive control.
    pub initial_replications: usize,
    /// Consecutive in-precision evaluations required.
    pub look_ahead: usize,
    /// Hard cap on replications.
    pub replication_budget: usize,
    /// Two-sided confidence level of the interval.
    pub confidence_level: f64,
    /// Worker pool size for the initial block (`0` = one per CPU).
    pub workers: usize,
}

impl ReplicationSettings {
    /// Settings with default look-ahead, budget and confidence level.
    #[must_use]
    pub fn new<I, S>(metrics: I, desired_precision: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metrics: metrics.into_iter().map(Into::into).collect(),
            desired_precision,
            initial_replications: 0,
            look_ahead: DEFAULT_LOOK_AHEAD,
            replication_budget: DEFAULT_REPLICATION_BUDGET,
            confidence_level: DEFAULT_CONTROLLER_CONFIDENCE,
            workers: 0,
        }
    }

    /// Set the initial block size.
    #[must_use]
    pub const fn initial_replications(mut self, k0: usize) -> Self {
        self.initial_replications = k0;
        self
    }

    /// Set the look-ahead length.
    #[must_use]
    pub const fn look_ahead(mut self, look_ahead: usize) -> Self {
        self.look_ahead = look_ahead;
        self
    }

    /// Set the replication budget.
    #[must_use]
    pub const fn replication_budget(mut self, budget: usize) -> Self {
        self.replication_budget = budget;
        self
    }

    /// Set the confidence level.
    #[must_use]
    pub const fn confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    /// Set the worker pool size.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Reject configurations the controller cannot run.
    ///
    /// # Errors
    ///
    /// [`SimError::Config`] for an empty or duplicated metric set, a
    /// non-positive or non-finite precision, a budget below the initial
    /// block, or a confidence level outside (0, 1).
    pub fn validate(&self) -> SimResult<()> {
        if self.metrics.is_empty() {
            return Err(SimError::config("at least one tracked metric is required"));
        }
        for (i, metric) in self.metrics.iter().enumerate() {
            if self.metrics[..i].contains(metric) {
                return Err(SimError::config(format!(
                    "metric '{metric}' is tracked more than once"
                )));
            }
        }
        if !(self.desired_precision.is_finite() && self.desired_precision > 0.0) {
            return Err(SimError::config(format!(
                "desired precision must be positive, got {}",
                self.desired_precision
            )));
        }
        if self.replication_budget < self.initial_replications {
            return Err(SimError::config(format!(
                "replication budget ({}) is smaller than initial replications ({})",
                self.replication_budget, self.initial_replications
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
}

/// Controller state-machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    /// Configured, nothing run.
    Initializing,
    /// Folding the fixed initial block.
    RunningInitial,
    /// One replication at a time.
    RunningAdaptive,
    /// Every metric solved.
    Solved,
    /// Budget reached with metrics unsolved.
    BudgetExhausted,
}

impl ControllerPhase {
    /// Whether no further transitions occur.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Solved | Self::BudgetExhausted)
    }
}

impl std::fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::RunningInitial => "running initial block",
            Self::RunningAdaptive => "running adaptive",
            Self::Solved => "solved",
            Self::BudgetExhausted => "budget exhausted",
        };
        f.write_str(name)
    }
}

/// Stopping-rule progress of one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricProgress {
    /// Consecutive evaluations within precision.
    pub target_met: usize,
    /// Replication at which the qualifying streak began.
    pub solved_at: Option<usize>,
}

impl MetricProgress {
    /// Whether the metric has been solved.
    #[must_use]
    pub const fn is_solved(&self) -> bool {
        self.solved_at.is_some()
    }

    /// Apply one precision evaluation at `replication`.
    ///
    /// `deviation` is `None` while the metric cannot be evaluated yet; that
    /// and an infinite deviation both count as a miss. Solved is sticky.
    #[must_use]
    pub fn evaluate(
        self,
        deviation: Option<f64>,
        desired_precision: f64,
        required: usize,
        replication: usize,
    ) -> Self {
        if self.is_solved() {
            return self;
        }
        let within = deviation.is_some_and(|d| d.is_finite() && d <= desired_precision);
        if !within {
            return Self::default();
        }
        let target_met = self.target_met + 1;
        let solved_at = (target_met >= required).then(|| replication + 1 - target_met);
        Self {
            target_met,
            solved_at,
        }
    }
}

/// Full controller state; advanced by [`step`](Self::step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    phase: ControllerPhase,
    replications: usize,
    progress: IndexMap<String, MetricProgress>,
    tabuliser: ReplicationTabuliser,
}

impl ControllerState {
    /// Validate the settings and create the `Initializing` state.
    ///
    /// # Errors
    ///
    /// Returns the configuration error from [`ReplicationSettings::validate`].
    pub fn new(settings: &ReplicationSettings) -> SimResult<Self> {
        settings.validate()?;
        Ok(Self {
            phase: ControllerPhase::Initializing,
            replications: 0,
            progress: settings
                .metrics
                .iter()
                .map(|m| (m.clone(), MetricProgress::default()))
                .collect(),
            tabuliser: ReplicationTabuliser::new(settings.confidence_level),
        })
    }

    /// Leave `Initializing`.
    #[must_use]
    pub fn begin(mut self, settings: &ReplicationSettings) -> Self {
        if self.phase != ControllerPhase::Initializing {
            return self;
        }
        self.phase = if settings.initial_replications > 0 {
            ControllerPhase::RunningInitial
        } else if settings.replication_budget == 0 {
            ControllerPhase::BudgetExhausted
        } else {
            ControllerPhase::RunningAdaptive
        };
        self
    }

    /// Fold the observation of the next replication and evaluate the
    /// stopping rule.
    ///
    /// Stepping an `Initializing` state begins it first; stepping a terminal
    /// state returns it unchanged.
    ///
    /// # Errors
    ///
    /// [`SimError::MissingMetric`] or [`SimError::NonFiniteValue`] if the
    /// observation does not carry a finite value for every tracked metric.
    pub fn step(self, settings: &ReplicationSettings, observation: &Observation) -> SimResult<Self> {
        let mut state = self.begin(settings);
        if state.phase.is_terminal() {
            return Ok(state);
        }

        let replication = state.replications + 1;
        let values = settings
            .metrics
            .iter()
            .map(|m| observation.require(m, replication))
            .collect::<SimResult<Vec<f64>>>()?;

        for (metric, value) in settings.metrics.iter().zip(values) {
            let row = state.tabuliser.update(metric, value);
            debug!(
                replication,
                metric = metric.as_str(),
                value,
                deviation = row.deviation,
                "folded observation"
            );
        }
        state.replications = replication;

        let in_initial_block = state.phase == ControllerPhase::RunningInitial
            && replication < settings.initial_replications;
        if !in_initial_block {
            state.evaluate(settings);
        }

        let phase = if state.all_solved() {
            info!(replications = replication, "all metrics within precision");
            ControllerPhase::Solved
        } else if replication >= settings.replication_budget {
            let unsolved: Vec<&str> = state.unsolved().collect();
            warn!(
                budget = settings.replication_budget,
                unsolved = %unsolved.join(", "),
                "replication budget exhausted"
            );
            ControllerPhase::BudgetExhausted
        } else if in_initial_block {
            ControllerPhase::RunningInitial
        } else {
            ControllerPhase::RunningAdaptive
        };
        state.phase = phase;
        Ok(state)
    }

    fn evaluate(&mut self, settings: &ReplicationSettings) {
        let required = look_ahead_window(settings.look_ahead, self.replications);
        for (metric, progress) in &mut self.progress {
            let deviation = self
                .tabuliser
                .accumulator(metric)
                .and_then(|acc| acc.deviation().ok());
            let was_solved = progress.is_solved();
            *progress = progress.evaluate(
                deviation,
                settings.desired_precision,
                required,
                self.replications,
            );
            if let (false, Some(solved_at)) = (was_solved, progress.solved_at) {
                info!(
                    metric = metric.as_str(),
                    solved_at,
                    confirmed_at = self.replications,
                    "metric solved"
                );
            }
        }
    }

    fn all_solved(&self) -> bool {
        self.progress.values().all(MetricProgress::is_solved)
    }

    fn unsolved(&self) -> impl Iterator<Item = &str> {
        self.progress
            .iter()
            .filter(|(_, p)| !p.is_solved())
            .map(|(m, _)| m.as_str())
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Whether the run has finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Replications folded so far.
    #[must_use]
    pub const fn replications(&self) -> usize {
        self.replications
    }

    /// Stopping-rule progress of a metric.
    #[must_use]
    pub fn progress(&self, metric: &str) -> Option<MetricProgress> {
        self.progress.get(metric).copied()
    }

    /// Statistics history so far.
    #[must_use]
    pub const fn tabuliser(&self) -> &ReplicationTabuliser {
        &self.tabuliser
    }

    /// Close the run into a report.
    #[must_use]
    pub fn into_report(self) -> ReplicationReport {
        let mut warnings = Vec::new();

        if self.phase == ControllerPhase::BudgetExhausted {
            let unsolved: Vec<&str> = self.unsolved().collect();
            warnings.push(format!(
                "replication budget exhausted after {} replications; not reached: {}",
                self.replications,
                unsolved.join(", ")
            ));
        }

        let summaries: IndexMap<String, AccumulatorSummary> = self
            .progress
            .keys()
            .map(|m| {
                let summary = self
                    .tabuliser
                    .accumulator(m)
                    .map(crate::stats::MetricAccumulator::summary)
                    .unwrap_or_default();
                (m.clone(), summary)
            })
            .collect();

        for (metric, summary) in &summaries {
            if summary.deviation.is_some_and(f64::is_infinite) {
                warnings.push(format!(
                    "metric '{metric}' has a zero mean; relative precision is undefined"
                ));
            }
        }

        let solved = self
            .progress
            .iter()
            .map(|(m, p)| {
                let count = p
                    .solved_at
                    .map_or(ReplicationCount::NotReached, ReplicationCount::Reached);
                (m.clone(), count)
            })
            .collect();

        ReplicationReport {
            status: self.phase,
            solved,
            final_replications: self.replications,
            history: self.tabuliser.summary_table(),
            summaries,
            warnings,
        }
    }
}

/// Replications a metric needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationCount {
    /// Precision reached; the streak began at this replication.
    Reached(usize),
    /// Budget exhausted first.
    NotReached,
}

impl ReplicationCount {
    /// The count, if reached.
    #[must_use]
    pub const fn reached(self) -> Option<usize> {
        match self {
            Self::Reached(n) => Some(n),
            Self::NotReached => None,
        }
    }
}

impl std::fmt::Display for ReplicationCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reached(n) => write!(f, "{n}"),
            Self::NotReached => f.write_str("not reached"),
        }
    }
}

/// Result of one controller run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationReport {
    /// Terminal phase.
    pub status: ControllerPhase,
    /// Per-metric required replications, in tracked order.
    pub solved: IndexMap<String, ReplicationCount>,
    /// Replications actually run.
    pub final_replications: usize,
    /// Every statistics snapshot, in insertion order.
    pub history: Vec<ReplicationSnapshot>,
    /// Per-metric statistics after the last replication.
    pub summaries: IndexMap<String, AccumulatorSummary>,
    /// Non-fatal conditions worth reporting.
    pub warnings: Vec<String>,
}

impl ReplicationReport {
    /// Whether every metric reached precision.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.status == ControllerPhase::Solved
    }

    /// Required replications for one metric.
    #[must_use]
    pub fn required(&self, metric: &str) -> Option<ReplicationCount> {
        self.solved.get(metric).copied()
    }

    /// History rows of one metric.
    pub fn history_for<'a>(
        &'a self,
        metric: &'a str,
    ) -> impl Iterator<Item = &'a ReplicationSnapshot> + 'a {
        self.history.iter().filter(move |r| r.metric == metric)
    }
}

/// Runs the adaptive replication algorithm against a simulation.
///
/// # Example
///
/// ```rust
/// use simrep::replication::{ReplicationController, ReplicationCount, ReplicationSettings};
/// use simrep::simulation::{FnSimulation, Observation};
///
/// let data = [10.0, 8.0, 12.0, 9.0, 11.0];
/// let sim = FnSimulation::new(|k: usize| Ok(Observation::new().with("wait", data[(k - 1) % 5])));
/// let settings = ReplicationSettings::new(["wait"], 1.0).look_ahead(0);
/// let report = ReplicationController::new(settings).unwrap().select(&sim, &()).unwrap();
/// assert_eq!(report.required("wait"), Some(ReplicationCount::Reached(2)));
/// ```
#[derive(Debug, Clone)]
pub struct ReplicationController {
    settings: ReplicationSettings,
    dispatcher: WorkStealingDispatcher,
}

impl ReplicationController {
    /// Validate settings and build a controller.
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any replication runs.
    pub fn new(settings: ReplicationSettings) -> SimResult<Self> {
        settings.validate()?;
        let dispatcher = WorkStealingDispatcher::with_workers(settings.workers);
        Ok(Self {
            settings,
            dispatcher,
        })
    }

    /// The settings in force.
    #[must_use]
    pub const fn settings(&self) -> &ReplicationSettings {
        &self.settings
    }

    /// Run replications until every metric is solved or the budget is spent.
    ///
    /// The initial block may run on the worker pool; its results are folded
    /// in replication order. The adaptive phase is strictly sequential.
    ///
    /// # Errors
    ///
    /// Propagates simulation failures and observation contract violations.
    /// Budget exhaustion is not an error; see [`ReplicationReport::status`].
    pub fn select<S: Simulation>(&self, sim: &S, params: &S::Params) -> SimResult<ReplicationReport> {
        let settings = &self.settings;
        let mut state = ControllerState::new(settings)?.begin(settings);

        if state.phase() == ControllerPhase::RunningInitial {
            debug!(
                count = settings.initial_replications,
                workers = self.dispatcher.num_workers(),
                "dispatching initial block"
            );
            let block =
                sim.run_replications_parallel(params, settings.initial_replications, &self.dispatcher)?;
            for observation in &block {
                state = state.step(settings, observation)?;
            }
        }

        while !state.is_terminal() {
            let observation = sim.run_replication(params, state.replications() + 1)?;
            state = state.step(settings, &observation)?;
        }

        let report = state.into_report();
        info!(
            status = %report.status,
            replications = report.final_replications,
            "replication analysis finished"
        );
        Ok(report)
    }
}
