//! Per-metric statistics history.
//!
//! The tabuliser owns one [`MetricAccumulator`] per tracked metric together
//! with the snapshots recorded after each of its updates, so the
//! "one snapshot per update" invariant lives in a single struct.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::stats::accumulator::{MetricAccumulator, DEFAULT_CONFIDENCE_LEVEL};

/// Statistics of one metric immediately after one update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationSnapshot {
    /// Global insertion order across all metrics.
    pub sequence: u64,
    /// 1-based count of updates made to this metric so far.
    pub replication: usize,
    /// Metric identifier.
    pub metric: String,
    /// The observation that produced this row.
    pub observation: f64,
    /// Cumulative mean.
    pub mean: f64,
    /// Cumulative sample standard deviation (`None` until two observations).
    pub std_dev: Option<f64>,
    /// Lower confidence bound.
    pub ci_lower: Option<f64>,
    /// Upper confidence bound.
    pub ci_upper: Option<f64>,
    /// Relative half-width.
    pub deviation: Option<f64>,
}

/// Accumulator and its snapshot history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MetricTrack {
    accumulator: MetricAccumulator,
    snapshots: Vec<ReplicationSnapshot>,
}

/// Records the trajectory of every metric's statistics.
///
/// # Example
///
/// ```rust
/// use simrep::replication::ReplicationTabuliser;
///
/// let mut tab = ReplicationTabuliser::new(0.95);
/// tab.update("wait", 10.0);
/// tab.update("wait", 8.0);
/// let table = tab.summary_table();
/// assert_eq!(table.len(), 2);
/// assert_eq!(table[1].replication, 2);
/// assert!((table[1].mean - 9.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationTabuliser {
    confidence_level: f64,
    tracks: IndexMap<String, MetricTrack>,
    next_sequence: u64,
}

impl Default for ReplicationTabuliser {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_LEVEL)
    }
}

impl ReplicationTabuliser {
    /// Create an empty tabuliser whose accumulators use `confidence_level`.
    #[must_use]
    pub fn new(confidence_level: f64) -> Self {
        Self {
            confidence_level,
            tracks: IndexMap::new(),
            next_sequence: 0,
        }
    }

    /// Confidence level used for new accumulators.
    #[must_use]
    pub const fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Fold `value` into the metric's accumulator and record the post-update
    /// state. Returns the recorded row.
    pub fn update(&mut self, metric: &str, value: f64) -> &ReplicationSnapshot {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let confidence_level = self.confidence_level;
        let track = self
            .tracks
            .entry(metric.to_string())
            .or_insert_with(|| MetricTrack {
                accumulator: MetricAccumulator::with_confidence(metric, confidence_level),
                snapshots: Vec::new(),
            });

        track.accumulator.update(value);
        let summary = track.accumulator.summary();
        track.snapshots.push(ReplicationSnapshot {
            sequence,
            replication: summary.count,
            metric: metric.to_string(),
            observation: value,
            mean: summary.mean.unwrap_or(value),
            std_dev: summary.std_dev,
            ci_lower: summary.ci_lower,
            ci_upper: summary.ci_upper,
            deviation: summary.deviation,
        });

        debug_assert_eq!(track.snapshots.len(), track.accumulator.count());
        &track.snapshots[track.snapshots.len() - 1]
    }

    /// Accumulator for a metric, if it has received any observation.
    #[must_use]
    pub fn accumulator(&self, metric: &str) -> Option<&MetricAccumulator> {
        self.tracks.get(metric).map(|t| &t.accumulator)
    }

    /// Snapshot history of one metric, in update order.
    #[must_use]
    pub fn metric_table(&self, metric: &str) -> &[ReplicationSnapshot] {
        self.tracks
            .get(metric)
            .map_or(&[], |t| t.snapshots.as_slice())
    }

    /// Metrics seen so far, in first-update order.
    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.tracks.keys().map(String::as_str)
    }

    /// Total number of recorded rows across all metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.values().map(|t| t.snapshots.len()).sum()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every recorded row across all metrics, in insertion order.
    ///
    /// Non-destructive; may be called at any point.
    #[must_use]
    pub fn summary_table(&self) -> Vec<ReplicationSnapshot> {
        let mut rows: Vec<ReplicationSnapshot> = self
            .tracks
            .values()
            .flat_map(|t| t.snapshots.iter().cloned())
            .collect();
        rows.sort_by_key(|r| r.sequence);
        rows
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification test: snapshot count equals update count for every metric.
        #[test]
        fn prop_snapshot_count_equals_updates(
            updates in prop::collection::vec((0usize..3, -100.0f64..100.0), 0..60)
        ) {
            let names = ["a", "b", "c"];
            let mut tab = ReplicationTabuliser::default();
            let mut counts = [0usize; 3];
            for (m, v) in &updates {
                tab.update(names[*m], *v);
                counts[*m] += 1;
            }
            for (i, name) in names.iter().enumerate() {
                prop_assert_eq!(tab.metric_table(name).len(), counts[i]);
                let acc_count = tab.accumulator(name).map_or(0, MetricAccumulator::count);
                prop_assert_eq!(acc_count, counts[i]);
            }
            prop_assert_eq!(tab.summary_table().len(), updates.len());
        }

        /// Falsification test: the last snapshot mirrors the accumulator.
        #[test]
        fn prop_last_snapshot_matches_accumulator(values in prop::collection::vec(1.0f64..100.0, 2..50)) {
            let mut tab = ReplicationTabuliser::default();
            for v in &values {
                tab.update("m", *v);
            }
            let last = tab.metric_table("m").last().cloned();
            let acc = tab.accumulator("m").cloned();
            prop_assert!(last.is_some() && acc.is_some());
            if let (Some(last), Some(acc)) = (last, acc) {
                prop_assert_eq!(last.replication, acc.count());
                prop_assert_eq!(Some(last.mean), acc.mean().ok());
                prop_assert_eq!(last.deviation, acc.deviation().ok());
            }
        }
    }
}
