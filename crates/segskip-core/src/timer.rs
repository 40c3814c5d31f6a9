//! Cancellable one-shot timers.
//!
//! The engine never sleeps itself. It asks a [`Timers`] implementation to
//! arm a timer, remembers the returned [`TimerId`], and is later handed that
//! id back by the host when the deadline passes. Cancelling is explicit and
//! an id that was cancelled or replaced is ignored if it still shows up.

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

pub trait Timers {
    fn arm(&mut self, delay: Duration) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// Holds at most one armed timer; arming replaces (and cancels) the old one.
#[derive(Debug, Default)]
pub struct TimerSlot {
    armed: Option<TimerId>,
}

impl TimerSlot {
    pub fn arm(&mut self, timers: &mut dyn Timers, delay: Duration) -> TimerId {
        self.cancel(timers);
        let id = timers.arm(delay);
        self.armed = Some(id);
        id
    }

    pub fn cancel(&mut self, timers: &mut dyn Timers) {
        if let Some(id) = self.armed.take() {
            timers.cancel(id);
        }
    }

    /// Claim a fired timer. Returns false for ids this slot does not own.
    pub fn take_if(&mut self, id: TimerId) -> bool {
        if self.armed == Some(id) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

/// Timer queue driven by an explicit clock instead of wall time.
///
/// Used wherever deterministic time is wanted: `advance` moves the clock and
/// hands back the ids whose deadlines passed, in deadline order.
#[derive(Debug, Default)]
pub struct ManualTimers {
    now: Duration,
    next_id: u64,
    armed: BTreeMap<TimerId, Duration>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.armed.contains_key(&id)
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.armed.values().min().copied()
    }

    /// Move the clock to the earliest deadline within `limit` and return the
    /// timers due at that instant. Empty when nothing is due before `limit`.
    pub fn fire_next(&mut self, limit: Duration) -> Vec<TimerId> {
        let Some(deadline) = self.next_deadline().filter(|d| *d <= limit) else {
            return Vec::new();
        };
        self.now = self.now.max(deadline);
        let due: Vec<TimerId> = self
            .armed
            .iter()
            .filter(|(_, d)| **d <= deadline)
            .map(|(id, _)| *id)
            .collect();
        for id in &due {
            self.armed.remove(id);
        }
        due
    }

    /// Move the clock forward by `by`, returning every timer that expired.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerId> {
        let target = self.now + by;
        let mut expired: Vec<(Duration, TimerId)> = self
            .armed
            .iter()
            .filter(|(_, d)| **d <= target)
            .map(|(id, d)| (*d, *id))
            .collect();
        expired.sort();
        for (_, id) in &expired {
            self.armed.remove(id);
        }
        self.now = target;
        expired.into_iter().map(|(_, id)| id).collect()
    }
}

impl Timers for ManualTimers {
    fn arm(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.armed.insert(id, self.now + delay);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.armed.remove(&id);
    }
}
