//! Reference queueing model: M/G/c with warm-up.
//!
//! ```text
//! arrivals   ~ Poisson(λ)
//! service    ~ mean 1/μ, coefficient of variation c_s   (c_s = 1: M/M/c)
//! servers    = c
//! ρ          = λ / (c μ)
//! ```
//!
//! Statistics are collected over `[warm_up, warm_up + run_length]`; the
//! warm-up interval lets the queue leave its empty-and-idle start state
//! before anything is recorded. Only customers arriving after warm-up count
//! towards the waiting and system time metrics; utilisation and queue length
//! are time averages over the collection window.
//!
//! Replication `k` draws from the stream `SimRng::for_replication(seed, k)`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{Observation, Simulation};
use crate::engine::rng::SimRng;
use crate::engine::scheduler::EventScheduler;
use crate::engine::SimTime;
use crate::error::{SimError, SimResult};

/// Mean time a customer waits before service starts.
pub const MEAN_WAITING_TIME: &str = "mean_waiting_time";
/// Mean time from arrival to departure.
pub const MEAN_SYSTEM_TIME: &str = "mean_system_time";
/// Time-averaged fraction of servers busy.
pub const MEAN_UTILISATION: &str = "mean_utilisation";
/// Time-averaged number waiting (excluding those in service).
pub const MEAN_QUEUE_LENGTH: &str = "mean_queue_length";

/// Every metric the model reports, in report order.
pub const QUEUE_METRICS: [&str; 4] = [
    MEAN_WAITING_TIME,
    MEAN_SYSTEM_TIME,
    MEAN_UTILISATION,
    MEAN_QUEUE_LENGTH,
];

/// Smallest accepted service coefficient of variation.
pub const MIN_SERVICE_CV: f64 = 0.05;

/// Parameters of the queueing model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueParams {
    /// Arrival rate λ (customers per time unit).
    pub arrival_rate: f64,
    /// Service rate μ per server (customers per time unit).
    pub service_rate: f64,
    /// Number of parallel servers c.
    #[serde(default = "default_servers")]
    pub servers: usize,
    /// Interval excluded from collection.
    #[serde(default)]
    pub warm_up: f64,
    /// Length of the collection window.
    pub run_length: f64,
    /// Coefficient of variation of service times.
    #[serde(default = "default_service_cv")]
    pub service_cv: f64,
    /// Master seed for replication streams; set from the experiment's
    /// reproducibility section, never from the model block.
    #[serde(skip, default = "default_seed")]
    pub seed: u64,
}

const fn default_servers() -> usize {
    1
}

const fn default_service_cv() -> f64 {
    1.0
}

const fn default_seed() -> u64 {
    42
}

impl Default for QueueParams {
    fn default() -> Self {
        Self {
            arrival_rate: 0.8,
            service_rate: 1.0,
            servers: default_servers(),
            warm_up: 100.0,
            run_length: 1_000.0,
            service_cv: default_service_cv(),
            seed: default_seed(),
        }
    }
}

impl QueueParams {
    /// Offered load ρ = λ / (c μ).
    #[must_use]
    pub fn utilisation(&self) -> f64 {
        self.arrival_rate / (self.servers as f64 * self.service_rate)
    }

    /// Check that the model can be run.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for non-positive rates, zero servers, a
    /// negative warm-up, a non-positive run length, or a service CV below
    /// [`MIN_SERVICE_CV`].
    pub fn validate_semantic(&self) -> SimResult<()> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SimError::config(format!(
                    "model.{name} must be positive and finite, got {value}"
                )))
            }
        };
        positive("arrival_rate", self.arrival_rate)?;
        positive("service_rate", self.service_rate)?;
        positive("run_length", self.run_length)?;
        positive("service_cv", self.service_cv)?;
        if self.service_cv < MIN_SERVICE_CV {
            return Err(SimError::config(format!(
                "model.service_cv must be at least {MIN_SERVICE_CV}, got {}",
                self.service_cv
            )));
        }

        if self.servers == 0 {
            return Err(SimError::config("model.servers must be at least 1"));
        }
        if !(self.warm_up.is_finite() && self.warm_up >= 0.0) {
            return Err(SimError::config(format!(
                "model.warm_up must be non-negative, got {}",
                self.warm_up
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum QueueEvent {
    Arrival,
    Departure { server: usize, arrived: SimTime },
}

/// Running state of one replication.
struct QueueRun<'a> {
    params: &'a QueueParams,
    rng: SimRng,
    scheduler: EventScheduler<QueueEvent>,
    busy: Vec<bool>,
    waiting: VecDeque<SimTime>,
    warm_up_end: SimTime,
    end: SimTime,
    last_event: SimTime,
    busy_area: f64,
    queue_area: f64,
    waits: (f64, usize),
    system_times: (f64, usize),
}

impl<'a> QueueRun<'a> {
    fn new(params: &'a QueueParams, replication: usize) -> Self {
        Self {
            params,
            rng: SimRng::for_replication(params.seed, replication),
            scheduler: EventScheduler::new(),
            busy: vec![false; params.servers],
            waiting: VecDeque::new(),
            warm_up_end: SimTime::from_units(params.warm_up),
            end: SimTime::from_units(params.warm_up + params.run_length),
            last_event: SimTime::ZERO,
            busy_area: 0.0,
            queue_area: 0.0,
            waits: (0.0, 0),
            system_times: (0.0, 0),
        }
    }

    fn run(mut self) -> Observation {
        self.schedule_arrival(SimTime::ZERO);

        while let Some(scheduled) = self.scheduler.next_before(self.end) {
            self.integrate_until(scheduled.time);
            match scheduled.event {
                QueueEvent::Arrival => self.on_arrival(scheduled.time),
                QueueEvent::Departure { server, arrived } => {
                    self.on_departure(scheduled.time, server, arrived);
                }
            }
        }
        self.integrate_until(self.end);

        self.observation()
    }

    fn schedule_arrival(&mut self, now: SimTime) {
        let gap = self.rng.gen_exponential(1.0 / self.params.arrival_rate);
        self.scheduler.schedule(now.after(gap), QueueEvent::Arrival);
    }

    fn start_service(&mut self, now: SimTime, server: usize, arrived: SimTime) {
        self.busy[server] = true;
        if arrived >= self.warm_up_end {
            self.waits.0 += (now - arrived).as_units();
            self.waits.1 += 1;
        }
        let service = self
            .rng
            .gen_with_cv(1.0 / self.params.service_rate, self.params.service_cv);
        self.scheduler
            .schedule(now.after(service), QueueEvent::Departure { server, arrived });
    }

    fn on_arrival(&mut self, now: SimTime) {
        match self.busy.iter().position(|&b| !b) {
            Some(server) => self.start_service(now, server, now),
            None => self.waiting.push_back(now),
        }
        self.schedule_arrival(now);
    }

    fn on_departure(&mut self, now: SimTime, server: usize, arrived: SimTime) {
        if arrived >= self.warm_up_end {
            self.system_times.0 += (now - arrived).as_units();
            self.system_times.1 += 1;
        }
        self.busy[server] = false;
        if let Some(next) = self.waiting.pop_front() {
            self.start_service(now, server, next);
        }
    }

    /// Accumulate time-weighted areas over the part of `[last, to]` inside the window.
    fn integrate_until(&mut self, to: SimTime) {
        let from = self.last_event.max(self.warm_up_end);
        let to_clipped = to.min(self.end);
        if to_clipped > from {
            let dt = (to_clipped - from).as_units();
            let busy = self.busy.iter().filter(|&&b| b).count();
            self.busy_area += busy as f64 * dt;
            self.queue_area += self.waiting.len() as f64 * dt;
        }
        self.last_event = self.last_event.max(to);
    }

    fn observation(&self) -> Observation {
        let mean = |(sum, n): (f64, usize)| if n == 0 { 0.0 } else { sum / n as f64 };
        let window = self.params.run_length;

        Observation::new()
            .with(MEAN_WAITING_TIME, mean(self.waits))
            .with(MEAN_SYSTEM_TIME, mean(self.system_times))
            .with(
                MEAN_UTILISATION,
                self.busy_area / (window * self.params.servers as f64),
            )
            .with(MEAN_QUEUE_LENGTH, self.queue_area / window)
    }
}

/// Discrete-event M/G/c queue.
///
/// # Example
///
/// ```rust
/// use simrep::simulation::{QueueModel, QueueParams, Simulation};
///
/// let params = QueueParams { run_length: 200.0, ..QueueParams::default() };
/// let obs = QueueModel.run_replication(&params, 1).unwrap();
/// assert!(obs.get("mean_utilisation").unwrap() > 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueModel;

impl Simulation for QueueModel {
    type Params = QueueParams;

    fn run_replication(&self, params: &QueueParams, replication: usize) -> SimResult<Observation> {
        params
            .validate_semantic()
            .map_err(|e| SimError::replication(replication, e.to_string()))?;
        Ok(QueueRun::new(params, replication).run())
    }
}
