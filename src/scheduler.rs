//! Simulation clock and cooldown timers.
//!
//! Every cooldown in the simulation (duplication recall, conjugation recall,
//! attack recall) is a pending entry keyed by `(organism, timer)`. Scheduling
//! a timer that is already pending replaces it, so two resumptions for the
//! same flag can never both fire.
//!
//! Timers run on simulation time: while the clock is paused it does not
//! advance, so no cooldown makes progress.

use crate::organism::OrganismId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of cooldown an organism can be waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timer {
    DuplicationRecall,
    ConjugationRecall,
    AttackRecall,
}

/// Fixed-step simulation clock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    time: f64,
    tick: u64,
    dt: f64,
    paused: bool,
}

impl SimClock {
    pub fn new(dt: f64) -> Self {
        Self {
            time: 0.0,
            tick: 0,
            dt,
            paused: false,
        }
    }

    /// Current simulation time in seconds
    #[inline]
    pub fn now(&self) -> f64 {
        self.time
    }

    /// Number of ticks simulated so far
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Seconds per tick
    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Advance by one tick. Returns false (and does nothing) while paused.
    pub fn advance(&mut self) -> bool {
        if self.paused {
            return false;
        }
        self.tick += 1;
        self.time = self.tick as f64 * self.dt;
        true
    }
}

/// Pending timer resumptions
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    pending: BTreeMap<(OrganismId, Timer), f64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `timer` for `id` to fire at `at`, cancelling any pending one
    pub fn schedule(&mut self, id: OrganismId, timer: Timer, at: f64) {
        self.pending.insert((id, timer), at);
    }

    /// Cancel a pending timer. Returns true if one was pending.
    pub fn cancel(&mut self, id: OrganismId, timer: Timer) -> bool {
        self.pending.remove(&(id, timer)).is_some()
    }

    /// Cancel every pending timer of an organism
    pub fn cancel_all(&mut self, id: OrganismId) {
        self.pending.retain(|&(owner, _), _| owner != id);
    }

    #[inline]
    pub fn is_pending(&self, id: OrganismId, timer: Timer) -> bool {
        self.pending.contains_key(&(id, timer))
    }

    /// Time at which a pending timer fires
    pub fn due_at(&self, id: OrganismId, timer: Timer) -> Option<f64> {
        self.pending.get(&(id, timer)).copied()
    }

    /// Remove and return every timer due at or before `now`, earliest first
    pub fn drain_due(&mut self, now: f64) -> Vec<(OrganismId, Timer)> {
        let mut due: Vec<(f64, OrganismId, Timer)> = self
            .pending
            .iter()
            .filter(|&(_, &at)| at <= now)
            .map(|(&(id, timer), &at)| (at, id, timer))
            .collect();

        for &(_, id, timer) in &due {
            self.pending.remove(&(id, timer));
        }

        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        due.into_iter().map(|(_, id, timer)| (id, timer)).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advance_and_pause() {
        let mut clock = SimClock::new(0.5);
        assert!(clock.advance());
        assert!(clock.advance());
        assert_eq!(clock.tick(), 2);
        assert!((clock.now() - 1.0).abs() < 1e-9);

        clock.set_paused(true);
        assert!(!clock.advance());
        assert_eq!(clock.tick(), 2);
    }

    #[test]
    fn test_reschedule_replaces_pending() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(7, Timer::DuplicationRecall, 1.0);
        scheduler.schedule(7, Timer::DuplicationRecall, 5.0);

        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.drain_due(2.0).is_empty());
        assert_eq!(scheduler.drain_due(5.0), vec![(7, Timer::DuplicationRecall)]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_drain_due_orders_by_time() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(3, Timer::AttackRecall, 2.0);
        scheduler.schedule(1, Timer::ConjugationRecall, 1.5);
        scheduler.schedule(2, Timer::DuplicationRecall, 9.0);

        let due = scheduler.drain_due(2.0);
        assert_eq!(due, vec![(1, Timer::ConjugationRecall), (3, Timer::AttackRecall)]);
        assert!(scheduler.is_pending(2, Timer::DuplicationRecall));
    }

    #[test]
    fn test_cancel_all() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(4, Timer::AttackRecall, 1.0);
        scheduler.schedule(4, Timer::DuplicationRecall, 1.0);
        scheduler.schedule(5, Timer::AttackRecall, 1.0);

        scheduler.cancel_all(4);
        assert_eq!(scheduler.len(), 1);
        assert!(!scheduler.cancel(4, Timer::AttackRecall));
        assert_eq!(scheduler.due_at(5, Timer::AttackRecall), Some(1.0));
    }
}
