//! Deterministic simulation primitives.
//!
//! - [`rng`]: PCG random streams derived from `(master seed, replication)`
//! - [`scheduler`]: time-ordered event queue with insertion-order tie-breaking
//! - [`SimTime`]: fixed-point simulation clock
//!
//! Together these make a replication a pure function of its seed and index,
//! which is what lets replications run on any number of workers and still
//! reproduce bit for bit.

pub mod rng;
pub mod scheduler;

use serde::{Deserialize, Serialize};

pub use rng::SimRng;
pub use scheduler::{EventScheduler, ScheduledEvent};

/// Fixed-point ticks per model time unit.
const TICKS_PER_UNIT: f64 = 1_000_000_000.0;

/// Simulation time.
///
/// Stored as integer ticks (10⁻⁹ model time units) so that event ordering
/// does not depend on floating-point comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SimTime {
    ticks: u64,
}

impl SimTime {
    /// Zero time (simulation start).
    pub const ZERO: Self = Self { ticks: 0 };

    /// Create a time from model time units.
    ///
    /// Negative and NaN inputs map to zero; values beyond the representable
    /// range saturate.
    #[must_use]
    pub fn from_units(units: f64) -> Self {
        if units.is_nan() || units <= 0.0 {
            return Self::ZERO;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = (units * TICKS_PER_UNIT).min(u64::MAX as f64) as u64;
        Self { ticks }
    }

    /// Create a time from raw ticks.
    #[must_use]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Time in model units.
    #[must_use]
    pub fn as_units(&self) -> f64 {
        self.ticks as f64 / TICKS_PER_UNIT
    }

    /// Raw ticks.
    #[must_use]
    pub const fn as_ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance by a duration in model units.
    #[must_use]
    pub fn after(self, units: f64) -> Self {
        self + Self::from_units(units)
    }
}

impl std::ops::Add for SimTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            ticks: self.ticks.saturating_add(rhs.ticks),
        }
    }
}

impl std::ops::Sub for SimTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            ticks: self.ticks.saturating_sub(rhs.ticks),
        }
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}", self.as_units())
    }
}
