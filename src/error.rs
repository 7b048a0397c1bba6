//! Error types for simrep.
//!
//! Every fallible operation returns `Result<T, SimError>` instead of panicking.
//! Conditions that the replication algorithm resolves locally (too few
//! observations, a zero mean, an exhausted budget) are NOT errors; they are
//! reflected in result fields. Only configuration mistakes and collaborator
//! failures surface here.

use thiserror::Error;

use crate::stats::InsufficientData;

/// Result type alias for simrep operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all simrep operations.
#[derive(Debug, Error)]
pub enum SimError {
    // ===== Jidoka Violations =====
    /// A simulation produced NaN or Inf for a tracked metric.
    #[error("Jidoka: non-finite value detected at {location}")]
    NonFiniteValue {
        /// Metric and replication where the value was observed.
        location: String,
    },

    // ===== Configuration Errors =====
    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    // ===== Collaborator Errors =====
    /// A replication could not be completed by the simulation.
    #[error("Replication {replication} failed: {message}")]
    Replication {
        /// 1-based replication index.
        replication: usize,
        /// Failure description from the simulation.
        message: String,
    },

    /// A replication result did not report a tracked metric.
    #[error("Replication {replication} did not report metric '{metric}'")]
    MissingMetric {
        /// Name of the absent metric.
        metric: String,
        /// 1-based replication index.
        replication: usize,
    },

    // ===== Statistics =====
    /// Not enough observations to compute a statistic.
    #[error(transparent)]
    InsufficientData(#[from] InsufficientData),

    // ===== I/O Errors =====
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a replication failure for the given 1-based index.
    #[must_use]
    pub fn replication(replication: usize, message: impl Into<String>) -> Self {
        Self::Replication {
            replication,
            message: message.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a non-finite value error for a metric observed at a replication.
    #[must_use]
    pub fn non_finite(metric: &str, replication: usize) -> Self {
        Self::NonFiniteValue {
            location: format!("{metric} (replication {replication})"),
        }
    }

    /// Check if this error is a Jidoka violation (requires immediate stop).
    #[must_use]
    pub const fn is_jidoka_violation(&self) -> bool {
        matches!(self, Self::NonFiniteValue { .. })
    }

    /// Check if this error was raised before any simulation work was dispatched.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::Validation(_) | Self::YamlParse(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_jidoka_violation_detection() {
        let non_finite = SimError::non_finite("mean_waiting_time", 7);
        assert!(non_finite.is_jidoka_violation());
        assert!(!non_finite.is_configuration_error());

        let config = SimError::config("invalid");
        assert!(!config.is_jidoka_violation());
        assert!(config.is_configuration_error());
    }

    #[test]
    fn test_error_non_finite_display() {
        let err = SimError::non_finite("mean_utilisation", 12);
        let msg = err.to_string();
        assert!(msg.contains("non-finite value"));
        assert!(msg.contains("mean_utilisation"));
        assert!(msg.contains("replication 12"));
    }

    #[test]
    fn test_error_config() {
        let err = SimError::config("desired precision must be positive");
        let msg = err.to_string();
        assert!(msg.contains("Configuration error"));
        assert!(msg.contains("desired precision"));
    }

    #[test]
    fn test_error_replication() {
        let err = SimError::replication(4, "server crashed");
        assert!(!err.is_configuration_error());
        let msg = err.to_string();
        assert!(msg.contains("Replication 4 failed"));
        assert!(msg.contains("server crashed"));
    }

    #[test]
    fn test_error_missing_metric() {
        let err = SimError::MissingMetric {
            metric: "mean_queue_length".to_string(),
            replication: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("mean_queue_length"));
        assert!(msg.contains("Replication 3"));
    }

    #[test]
    fn test_error_insufficient_data_is_transparent() {
        let err: SimError = InsufficientData {
            required: 2,
            available: 1,
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("insufficient data"));
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_error_serialization() {
        let err = SimError::serialization("failed to serialize");
        let msg = err.to_string();
        assert!(msg.contains("Serialization error"));
        assert!(msg.contains("failed to serialize"));
    }

    #[test]
    fn test_error_yaml_is_configuration_error() {
        let yaml_err = serde_yaml::from_str::<u32>("[not, a, number]");
        let err: SimError = match yaml_err {
            Err(e) => e.into(),
            Ok(_) => SimError::config("unreachable in practice"),
        };
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_error_io() {
        let err: SimError = std::io::Error::other("file not found").into();
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_error_debug() {
        let err = SimError::config("test");
        let debug = format!("{:?}", err);
        assert!(debug.contains("Config"));
    }
}
