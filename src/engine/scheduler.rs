//! Event scheduler with deterministic ordering.
//!
//! Implements a priority queue that ensures:
//! - Events are processed in time order
//! - Ties are broken by insertion order (sequence number)
//! - Reproducible across runs

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::engine::SimTime;

/// A scheduled event with time and sequence number.
#[derive(Debug, Clone)]
pub struct ScheduledEvent<E> {
    /// Scheduled time.
    pub time: SimTime,
    /// Sequence number for deterministic tie-breaking.
    pub sequence: u64,
    /// The event payload.
    pub event: E,
}

// Ordering ignores the payload: (time, sequence) is unique per scheduler
impl<E> PartialEq for ScheduledEvent<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl<E> Eq for ScheduledEvent<E> {}

impl<E> PartialOrd for ScheduledEvent<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for ScheduledEvent<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// Priority-ordered event queue.
///
/// # Example
///
/// ```rust
/// use simrep::engine::scheduler::EventScheduler;
/// use simrep::engine::SimTime;
///
/// let mut scheduler = EventScheduler::new();
/// scheduler.schedule(SimTime::from_units(2.0), "departure");
/// scheduler.schedule(SimTime::from_units(1.0), "arrival");
///
/// let first = scheduler.next().map(|e| e.event);
/// assert_eq!(first, Some("arrival"));
/// ```
#[derive(Debug)]
pub struct EventScheduler<E> {
    /// Min-heap ordered by (time, sequence).
    queue: BinaryHeap<Reverse<ScheduledEvent<E>>>,
    /// Monotonic sequence counter for tie-breaking.
    sequence: u64,
}

impl<E> Default for EventScheduler<E> {
    fn default() -> Self {
        Self {
            queue: BinaryHeap::new(),
            sequence: 0,
        }
    }
}

impl<E> EventScheduler<E> {
    /// Create a new event scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event at the given time.
    pub fn schedule(&mut self, time: SimTime, event: E) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.queue.push(Reverse(ScheduledEvent {
            time,
            sequence,
            event,
        }));
    }

    /// Remove and return the earliest event.
    #[must_use]
    #[allow(clippy::should_implement_trait)] // Not an Iterator, different semantics
    pub fn next(&mut self) -> Option<ScheduledEvent<E>> {
        self.queue.pop().map(|Reverse(e)| e)
    }

    /// Peek at the next event without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&ScheduledEvent<E>> {
        self.queue.peek().map(|Reverse(e)| e)
    }

    /// Remove and return the next event if it is due at or before `time`.
    #[must_use]
    pub fn next_before(&mut self, time: SimTime) -> Option<ScheduledEvent<E>> {
        match self.peek() {
            Some(e) if e.time <= time => self.next(),
            _ => None,
        }
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
