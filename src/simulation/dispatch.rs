//! Work-stealing replication dispatcher.
//!
//! Runs a block of independent replications on a fixed-size worker pool.
//! Replications can have very different durations (a queue near saturation
//! runs far longer than an idle one), so workers that finish early steal
//! queued replications from busy ones instead of idling.
//!
//! Completion order is arbitrary. Results are keyed by replication index and
//! re-sorted before they are returned; callers never see arrival order.

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use std::sync::{Mutex, PoisonError};

/// One replication to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationTask {
    /// 1-based replication index.
    pub replication: usize,
}

/// Work-stealing pool for batch-parallel replications.
#[derive(Debug, Clone)]
pub struct WorkStealingDispatcher {
    /// Number of worker threads.
    num_workers: usize,
}

impl Default for WorkStealingDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkStealingDispatcher {
    /// Create with one worker per available CPU.
    #[must_use]
    pub fn new() -> Self {
        Self {
            num_workers: std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4),
        }
    }

    /// Create with a fixed number of workers; `0` means one per CPU.
    #[must_use]
    pub fn with_workers(num_workers: usize) -> Self {
        if num_workers == 0 {
            return Self::new();
        }
        Self { num_workers }
    }

    /// Number of workers.
    #[must_use]
    pub const fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Run replications `1..=count`, returning results in replication order.
    pub fn execute<F, R>(&self, count: usize, simulate: F) -> Vec<R>
    where
        F: Fn(ReplicationTask) -> R + Sync,
        R: Send,
    {
        if count == 0 {
            return Vec::new();
        }

        if self.num_workers <= 1 {
            return (1..=count)
                .map(|replication| simulate(ReplicationTask { replication }))
                .collect();
        }

        let injector: Injector<ReplicationTask> = Injector::new();
        for replication in 1..=count {
            injector.push(ReplicationTask { replication });
        }

        let workers: Vec<Worker<ReplicationTask>> = (0..self.num_workers.min(count))
            .map(|_| Worker::new_fifo())
            .collect();
        let stealers: Vec<Stealer<ReplicationTask>> =
            workers.iter().map(Worker::stealer).collect();

        let results: Mutex<Vec<(usize, R)>> = Mutex::new(Vec::with_capacity(count));

        std::thread::scope(|s| {
            for (worker_id, worker) in workers.into_iter().enumerate() {
                let injector = &injector;
                let stealers = &stealers;
                let results = &results;
                let simulate = &simulate;

                s.spawn(move || {
                    while let Some(task) = find_task(&worker, injector, stealers, worker_id) {
                        let result = simulate(task);
                        results
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push((task.replication, result));
                    }
                });
            }
        });

        let mut indexed = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        indexed.sort_by_key(|(replication, _)| *replication);
        indexed.into_iter().map(|(_, r)| r).collect()
    }
}

/// Local queue first, then the global queue, then the other workers.
fn find_task(
    worker: &Worker<ReplicationTask>,
    injector: &Injector<ReplicationTask>,
    stealers: &[Stealer<ReplicationTask>],
    worker_id: usize,
) -> Option<ReplicationTask> {
    if let Some(task) = worker.pop() {
        return Some(task);
    }

    loop {
        match injector.steal_batch_and_pop(worker) {
            Steal::Success(task) => return Some(task),
            Steal::Empty => break,
            Steal::Retry => {}
        }
    }

    for offset in 1..stealers.len() {
        let victim = &stealers[(worker_id + offset) % stealers.len()];
        loop {
            match victim.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => {}
            }
        }
    }

    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::rng::SimRng;

    #[test]
    fn test_dispatcher_results_in_replication_order() {
        let dispatcher = WorkStealingDispatcher::with_workers(4);
        let results = dispatcher.execute(100, |task| task.replication);
        let expected: Vec<usize> = (1..=100).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_dispatcher_returns_every_result_under_contention() {
        for workers in [2, 8, 32] {
            let results = WorkStealingDispatcher::with_workers(workers).execute(2_000, |task| task);
            assert_eq!(results.len(), 2_000);
            assert!(results
                .iter()
                .enumerate()
                .all(|(i, task)| task.replication == i + 1));
        }
    }

    #[test]
    fn test_dispatcher_zero_count() {
        let dispatcher = WorkStealingDispatcher::with_workers(4);
        let results: Vec<usize> = dispatcher.execute(0, |task| task.replication);
        assert!(results.is_empty());
    }

    #[test]
    fn test_dispatcher_sequential_path() {
        let dispatcher = WorkStealingDispatcher::with_workers(1);
        let results = dispatcher.execute(5, |task| task.replication * 10);
        assert_eq!(results, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_dispatcher_zero_workers_means_available_parallelism() {
        let dispatcher = WorkStealingDispatcher::with_workers(0);
        assert!(dispatcher.num_workers() >= 1);
    }

    #[test]
    fn test_dispatcher_variable_duration() {
        let dispatcher = WorkStealingDispatcher::with_workers(4);
        let results = dispatcher.execute(40, |task| {
            // Uneven work per replication
            let spins = (task.replication % 7) * 2_000;
            let mut rng = SimRng::for_replication(1, task.replication);
            let mut acc = 0.0;
            for _ in 0..spins {
                acc += rng.gen_f64();
            }
            (task.replication, acc)
        });
        assert_eq!(results.len(), 40);
        for (i, (replication, _)) in results.iter().enumerate() {
            assert_eq!(*replication, i + 1);
        }
    }

    #[test]
    fn test_dispatcher_worker_count_does_not_change_results() {
        let run = |workers: usize| {
            WorkStealingDispatcher::with_workers(workers)
                .execute(30, |task| SimRng::for_replication(42, task.replication).gen_f64())
        };
        let one = run(1);
        assert_eq!(one, run(2));
        assert_eq!(one, run(8));
    }
}
