// ============================================================
// Layer 5 — Unit State Tracker
// ============================================================
// Every WorkUnit moves through a small state machine:
//
//   Pending ──▶ Running ──▶ Completed
//      │                └─▶ Failed
//      └──────▶ Cancelled            (fatal abort before start)
//
// Terminal states never change again. The tracker is shared by
// the worker threads and the coordinator; a worker that finds
// its unit already Cancelled skips it without reporting.

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Completed | UnitState::Failed | UnitState::Cancelled)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: UnitState) -> bool {
        use UnitState::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Cancelled) | (Running, Completed) | (Running, Failed)
        )
    }
}

/// Per-state totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub pending:   usize,
    pub running:   usize,
    pub completed: usize,
    pub failed:    usize,
    pub cancelled: usize,
}

/// Thread-safe state table indexed by canonical unit index.
pub struct UnitTracker {
    states: Mutex<Vec<UnitState>>,
}

impl UnitTracker {
    pub fn new(units: usize) -> Self {
        Self {
            states: Mutex::new(vec![UnitState::Pending; units]),
        }
    }

    /// Move `unit` to `next`. Returns false (and changes nothing) when
    /// the transition is not allowed from the unit's current state.
    pub fn advance(&self, unit: usize, next: UnitState) -> bool {
        let mut states = self.states.lock();
        match states.get_mut(unit) {
            Some(state) if state.can_advance_to(next) => {
                *state = next;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, unit: usize) -> Option<UnitState> {
        self.states.lock().get(unit).copied()
    }

    /// Cancel every unit that has not started. Returns how many
    /// were cancelled.
    pub fn cancel_pending(&self) -> usize {
        let mut states = self.states.lock();
        let mut cancelled = 0;
        for state in states.iter_mut().filter(|s| **s == UnitState::Pending) {
            *state = UnitState::Cancelled;
            cancelled += 1;
        }
        cancelled
    }

    pub fn counts(&self) -> StateCounts {
        let states = self.states.lock();
        let mut counts = StateCounts::default();
        for state in states.iter() {
            match state {
                UnitState::Pending   => counts.pending += 1,
                UnitState::Running   => counts.running += 1,
                UnitState::Completed => counts.completed += 1,
                UnitState::Failed    => counts.failed += 1,
                UnitState::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_transitions_are_accepted() {
        let tracker = UnitTracker::new(2);

        assert!(!tracker.advance(0, UnitState::Completed));
        assert!(tracker.advance(0, UnitState::Running));
        assert!(!tracker.advance(0, UnitState::Cancelled));
        assert!(tracker.advance(0, UnitState::Failed));
        assert!(!tracker.advance(0, UnitState::Completed));
        assert_eq!(tracker.state(0), Some(UnitState::Failed));
        assert!(tracker.state(0).unwrap().is_terminal());
    }

    #[test]
    fn cancel_only_touches_pending_units() {
        let tracker = UnitTracker::new(3);
        tracker.advance(0, UnitState::Running);

        assert_eq!(tracker.cancel_pending(), 2);
        assert!(!tracker.advance(1, UnitState::Running));
        assert_eq!(
            tracker.counts(),
            StateCounts { running: 1, cancelled: 2, ..StateCounts::default() }
        );
    }

    #[test]
    fn out_of_range_units_are_ignored() {
        let tracker = UnitTracker::new(1);
        assert!(!tracker.advance(5, UnitState::Running));
        assert_eq!(tracker.state(5), None);
    }
}
