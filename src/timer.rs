//! Cancellable one-shot timers on a host-driven clock
//!
//! The scheduler never reads the wall clock. Whoever owns it (the tokio
//! driver, the CLI simulator, tests) tells it what time it is, and due tasks
//! are handed back in deadline order.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Handle to a scheduled task, used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), T>,
    deadlines: HashMap<u64, Duration>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Scheduler {
            now: Duration::ZERO,
            next_id: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time the scheduler was last advanced to
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Run `task` once, `delay` after the current time
    pub fn schedule(&mut self, delay: Duration, task: T) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        let deadline = self.now + delay;
        self.queue.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        TimerHandle(id)
    }

    /// Drop a pending task; returns `false` if it already ran or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => self.queue.remove(&(deadline, handle.0)).is_some(),
            None => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pop the earliest task due at or before `until`
    ///
    /// The clock moves to that task's deadline so anything it schedules is
    /// relative to when it fired. Returns `None` once nothing is due, leaving
    /// the clock at `until`.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerHandle, T)> {
        let key = match self.queue.keys().next() {
            Some(&key) if key.0 <= until => key,
            _ => {
                self.now = self.now.max(until);
                return None;
            }
        };

        let task = self.queue.remove(&key)?;
        self.deadlines.remove(&key.1);
        self.now = self.now.max(key.0);
        Some((TimerHandle(key.1), task))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
