//! Timer backends
//!
//! The session decides *what* fires; a backend only decides *when*. The
//! host arms real wall-clock timers, tests and headless runs use the
//! virtual clock below.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::time::Duration;

/// Handle for one armed one-shot timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that can deliver a one-shot timer back to the session.
///
/// When a timer elapses the owner of the backend must call
/// [`SparkletSession::fire`](crate::engine::SparkletSession::fire) with its
/// id. `disarm` is best effort: the session ignores ids it no longer
/// tracks, so a firing that races a cancel is harmless.
pub trait TimerBackend {
    fn arm(&mut self, id: TimerId, delay: Duration);
    fn disarm(&mut self, id: TimerId);
}

/// Deterministic clock driven by [`VirtualTimers::pop_due`]
#[derive(Debug, Default)]
pub struct VirtualTimers {
    now_ms: u64,
    seq: u64,
    queue: BinaryHeap<Reverse<(u64, u64, TimerId)>>,
    armed: HashSet<TimerId>,
}

impl VirtualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Number of timers armed and not yet fired
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Due time of the earliest armed timer
    pub fn next_due_ms(&mut self) -> Option<u64> {
        self.discard_disarmed();
        self.queue.peek().map(|Reverse((due, _, _))| *due)
    }

    /// Take the earliest timer due at or before `until_ms`, moving the clock
    /// to its due time. Timers due at the same instant pop in arming order.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<TimerId> {
        self.discard_disarmed();
        let Reverse((due, _, id)) = *self.queue.peek()?;
        if due > until_ms {
            return None;
        }
        self.queue.pop();
        self.armed.remove(&id);
        self.now_ms = self.now_ms.max(due);
        Some(id)
    }

    /// Move the clock forward without firing anything
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    fn discard_disarmed(&mut self) {
        while let Some(Reverse((_, _, id))) = self.queue.peek() {
            if self.armed.contains(id) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl TimerBackend for VirtualTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) {
        let due = self.now_ms.saturating_add(delay.as_millis() as u64);
        self.seq += 1;
        self.queue.push(Reverse((due, self.seq, id)));
        self.armed.insert(id);
    }

    fn disarm(&mut self, id: TimerId) {
        self.armed.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_due_in_time_order() {
        let mut timers = VirtualTimers::new();
        timers.arm(TimerId(1), Duration::from_millis(300));
        timers.arm(TimerId(2), Duration::from_millis(100));
        timers.arm(TimerId(3), Duration::from_millis(100));

        assert_eq!(timers.pop_due(50), None);
        assert_eq!(timers.pop_due(1_000), Some(TimerId(2)));
        assert_eq!(timers.now_ms(), 100);
        assert_eq!(timers.pop_due(1_000), Some(TimerId(3)));
        assert_eq!(timers.pop_due(1_000), Some(TimerId(1)));
        assert_eq!(timers.now_ms(), 300);
        assert_eq!(timers.pop_due(1_000), None);
    }

    #[test]
    fn test_disarmed_timer_never_pops() {
        let mut timers = VirtualTimers::new();
        timers.arm(TimerId(1), Duration::from_millis(10));
        timers.arm(TimerId(2), Duration::from_millis(20));
        timers.disarm(TimerId(1));

        assert_eq!(timers.armed_count(), 1);
        assert_eq!(timers.next_due_ms(), Some(20));
        assert_eq!(timers.pop_due(100), Some(TimerId(2)));
    }

    #[test]
    fn test_arm_relative_to_current_time() {
        let mut timers = VirtualTimers::new();
        timers.set_now(1_000);
        timers.arm(TimerId(7), Duration::from_millis(500));
        assert_eq!(timers.next_due_ms(), Some(1_500));
    }
}
