//! Replication analysis.
//!
//! - [`tabulizer`]: per-metric accumulators and their snapshot history
//! - [`controller`]: adaptive stopping rule as an explicit state machine
//! - [`batch`]: from-scratch prefix analysis of a pre-run block
//!
//! The controller and the batch estimator answer the same question with
//! different recomputation strategies and deviation units (fraction vs
//! percentage). They agree only coarsely and are tested separately.

pub mod batch;
pub mod controller;
pub mod tabulizer;

pub use batch::{
    explore, BatchPrecisionEstimator, CumulativeRow, ExplorationReport, PrecisionEstimate,
};
pub use controller::{
    look_ahead_window, ControllerPhase, ControllerState, MetricProgress, ReplicationController,
    ReplicationCount, ReplicationReport, ReplicationSettings,
};
pub use tabulizer::{ReplicationSnapshot, ReplicationTabuliser};
