//! # simrep
//!
//! Adaptive replication control for reproducible stochastic simulation studies.
//!
//! Answers one question: how many independent replications does a noisy
//! simulation need before each summary metric is known to a given relative
//! precision? Implements:
//! - Online (Welford) statistics with t-based confidence intervals
//! - A per-metric statistics history recorded after every observation
//! - An adaptive stopping rule with a look-ahead stability window, expressed
//!   as an explicit state machine
//! - A batch estimator that recomputes every prefix of a pre-run block
//! - A reference M/M/c queueing model and a work-stealing replication pool
//!
//! ## Example
//!
//! ```rust
//! use simrep::prelude::*;
//!
//! let params = QueueParams {
//!     run_length: 300.0,
//!     warm_up: 30.0,
//!     ..QueueParams::default()
//! };
//! let settings = ReplicationSettings::new(["mean_utilisation"], 0.10)
//!     .initial_replications(5)
//!     .replication_budget(100);
//!
//! let report = ReplicationController::new(settings)?.select(&QueueModel, &params)?;
//! assert!(report.final_replications >= 5);
//! # Ok::<(), SimError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops,  // Manual Horner's method is intentional
    clippy::imprecise_flops,   // Numerical code choices are intentional
    clippy::too_many_lines,
    clippy::missing_const_for_fn,  // Many functions can't be const in stable Rust
    clippy::needless_range_loop,   // Sometimes range loops are clearer
    clippy::manual_midpoint,       // Manual midpoint is intentional in numerical code
)]

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod replication;
pub mod simulation;
pub mod stats;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{ExperimentConfig, ExperimentConfigBuilder};
    pub use crate::engine::rng::SimRng;
    pub use crate::engine::SimTime;
    pub use crate::error::{SimError, SimResult};
    pub use crate::replication::{
        BatchPrecisionEstimator, ControllerPhase, ControllerState, PrecisionEstimate,
        ReplicationController, ReplicationCount, ReplicationReport, ReplicationSettings,
        ReplicationTabuliser,
    };
    pub use crate::simulation::{
        FnSimulation, Observation, QueueModel, QueueParams, Simulation, WorkStealingDispatcher,
    };
    pub use crate::stats::MetricAccumulator;
}

/// Re-export for public API
pub use error::{SimError, SimResult};
