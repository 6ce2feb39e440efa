//! Name-keyed one-shot schedules (`scheduleAction` / `cancelAction`)
//!
//! At most one schedule is pending per action name. Scheduling a name that
//! is already pending disarms the old timer first, so a burst of requests
//! coalesces into the last one.

use crate::engine::timers::{TimerBackend, TimerId};
use crate::runtime::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::trace;

/// A schedule waiting for its timer
#[derive(Debug, Clone)]
pub struct PendingSchedule {
    pub timer: TimerId,
    pub params: Value,
    pub delay_ms: u64,
}

#[derive(Debug)]
pub struct Scheduler<T: TimerBackend> {
    backend: T,
    next_id: u64,
    pending: HashMap<String, PendingSchedule>,
    by_timer: HashMap<TimerId, String>,
}

impl<T: TimerBackend> Scheduler<T> {
    pub fn new(backend: T) -> Self {
        Scheduler {
            backend,
            next_id: 1,
            pending: HashMap::new(),
            by_timer: HashMap::new(),
        }
    }

    /// Replace any pending schedule for `name` with a new one
    pub fn schedule(&mut self, name: &str, params: Value, delay_ms: u64) -> TimerId {
        self.cancel(name);

        let timer = TimerId(self.next_id);
        self.next_id += 1;
        self.backend.arm(timer, Duration::from_millis(delay_ms));
        self.by_timer.insert(timer, name.to_string());
        self.pending.insert(
            name.to_string(),
            PendingSchedule {
                timer,
                params,
                delay_ms,
            },
        );
        trace!(action = %name, %timer, delay_ms, "Armed");
        timer
    }

    /// Cancel the pending schedule for `name`. Returns false if none.
    pub fn cancel(&mut self, name: &str) -> bool {
        match self.pending.remove(name) {
            Some(pending) => {
                self.backend.disarm(pending.timer);
                self.by_timer.remove(&pending.timer);
                trace!(action = %name, timer = %pending.timer, "Disarmed");
                true
            }
            None => false,
        }
    }

    /// Claim a timer that elapsed. Yields the action and its params only if
    /// `timer` is still the live schedule for that action.
    pub fn take_fired(&mut self, timer: TimerId) -> Option<(String, Value)> {
        let name = self.by_timer.remove(&timer)?;
        let pending = self.pending.remove(&name)?;
        Some((name, pending.params))
    }

    /// Cancel everything (session teardown). Returns how many were pending.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, pending) in self.pending.drain() {
            self.backend.disarm(pending.timer);
        }
        self.by_timer.clear();
        count
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PendingSchedule> {
        self.pending.get(name)
    }

    /// Pending schedules sorted by action name
    pub fn pending(&self) -> Vec<(&str, &PendingSchedule)> {
        let mut list: Vec<_> = self
            .pending
            .iter()
            .map(|(name, pending)| (name.as_str(), pending))
            .collect();
        list.sort_by(|a, b| a.0.cmp(b.0));
        list
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn backend(&self) -> &T {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut T {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::timers::VirtualTimers;

    #[test]
    fn test_reschedule_replaces_pending() {
        let mut scheduler = Scheduler::new(VirtualTimers::new());
        let first = scheduler.schedule("tick", Value::Number(1.0), 1_000);
        let second = scheduler.schedule("tick", Value::Number(2.0), 1_000);

        assert_ne!(first, second);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.backend().armed_count(), 1);
        assert_eq!(scheduler.take_fired(first), None);
        assert_eq!(
            scheduler.take_fired(second),
            Some(("tick".to_string(), Value::Number(2.0)))
        );
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::new(VirtualTimers::new());
        let timer = scheduler.schedule("tick", Value::Null, 10);

        assert!(scheduler.cancel("tick"));
        assert!(!scheduler.cancel("tick"));
        assert_eq!(scheduler.take_fired(timer), None);
        assert_eq!(scheduler.backend().armed_count(), 0);
    }

    #[test]
    fn test_cancel_all() {
        let mut scheduler = Scheduler::new(VirtualTimers::new());
        scheduler.schedule("a", Value::Null, 10);
        scheduler.schedule("b", Value::Null, 20);

        assert_eq!(
            scheduler.pending().iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(scheduler.cancel_all(), 2);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.backend().armed_count(), 0);
    }
}
