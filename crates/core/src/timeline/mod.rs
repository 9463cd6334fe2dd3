//! Deadline bookkeeping shared by the animator and the refresh debouncer.
//!
//! Nothing in here sleeps. Owners arm a [`TimerSlot`], expose its deadline to
//! whoever drives the clock, and call [`TimerSlot::take_due`] when that
//! deadline has passed.

use std::time::Duration;

use tokio::time::Instant;

/// A single timer that is either disarmed, armed once, or armed periodically.
///
/// Re-arming replaces whatever was armed before, so an owner can never have
/// two deadlines in flight through the same slot.
#[derive(Debug, Clone, Default)]
pub struct TimerSlot {
    deadline: Option<Instant>,
    period: Option<Duration>,
    generation: u64,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot timer `delay` after `now`, returning the new generation.
    pub fn arm_once(&mut self, now: Instant, delay: Duration) -> u64 {
        self.arm(now + delay, None)
    }

    /// Arms a periodic timer whose first tick lands one `period` after `now`.
    pub fn arm_periodic(&mut self, now: Instant, period: Duration) -> u64 {
        self.arm(now + period, Some(period))
    }

    /// Disarms the slot. Safe to call when nothing is armed.
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            self.generation += 1;
        }
        self.period = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Bumped every time the slot is armed or cancelled.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Consumes one elapsed tick if the deadline is at or before `now`.
    ///
    /// Periodic timers are rescheduled one period later; ticks that fell
    /// further behind than that are skipped rather than replayed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if deadline > now {
            return false;
        }

        match self.period {
            Some(period) => {
                let next = deadline + period;
                self.deadline = Some(if next <= now { now + period } else { next });
            }
            None => self.deadline = None,
        }
        true
    }

    fn arm(&mut self, deadline: Instant, period: Option<Duration>) -> u64 {
        self.generation += 1;
        self.deadline = Some(deadline);
        self.period = period;
        self.generation
    }
}

/// Earliest of two optional deadlines.
pub fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once() {
        let start = Instant::now();
        let mut slot = TimerSlot::new();
        slot.arm_once(start, Duration::from_millis(300));

        assert!(!slot.take_due(start + Duration::from_millis(299)));
        assert!(slot.take_due(start + Duration::from_millis(300)));
        assert!(!slot.is_armed());
        assert!(!slot.take_due(start + Duration::from_secs(10)));
    }

    #[test]
    fn periodic_reschedules_and_skips_missed_ticks() {
        let start = Instant::now();
        let period = Duration::from_millis(10);
        let mut slot = TimerSlot::new();
        slot.arm_periodic(start, period);

        assert!(slot.take_due(start + period));
        assert_eq!(slot.deadline(), Some(start + period * 2));

        let late = start + Duration::from_millis(95);
        assert!(slot.take_due(late));
        assert_eq!(slot.deadline(), Some(late + period));
    }

    #[test]
    fn rearming_replaces_the_previous_deadline() {
        let start = Instant::now();
        let mut slot = TimerSlot::new();
        let first = slot.arm_once(start, Duration::from_millis(300));
        let second = slot.arm_once(start + Duration::from_millis(50), Duration::from_millis(300));

        assert!(second > first);
        assert_eq!(slot.deadline(), Some(start + Duration::from_millis(350)));
    }

    #[test]
    fn cancel_is_a_no_op_when_disarmed() {
        let mut slot = TimerSlot::new();
        slot.cancel();
        slot.cancel();

        assert_eq!(slot.generation(), 0);
        assert!(!slot.is_armed());
    }

    #[test]
    fn earliest_prefers_the_sooner_deadline() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);

        assert_eq!(earliest(Some(later), Some(now)), Some(now));
        assert_eq!(earliest(None, Some(later)), Some(later));
        assert_eq!(earliest(None, None), None);
    }
}
