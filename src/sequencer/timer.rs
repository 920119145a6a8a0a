// Timer - Cooperative host timers
// Owned, cancellable one-shot and periodic deadlines polled by a single driver

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Wall-clock time source for timers, in seconds
pub trait HostClock {
    fn now(&self) -> f64;
}

/// Monotonic host clock counting from its creation
#[derive(Debug, Clone, Copy)]
pub struct SystemHostClock {
    origin: Instant,
}

impl SystemHostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for SystemHostClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Host clock moved by hand; clones share the same time.
/// Used by offline rendering and simulations.
#[derive(Debug, Clone, Default)]
pub struct ManualHostClock {
    now: Rc<Cell<f64>>,
}

impl ManualHostClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, time: f64) {
        debug_assert!(time >= self.now.get(), "host time must not go backwards");
        self.now.set(time);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now.get() + seconds);
    }
}

impl HostClock for ManualHostClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Schedule {
    Idle,
    Timeout { due: f64 },
    Interval { due: f64, period: f64 },
}

/// Single owned timer slot.
/// Arming always replaces whatever was armed before.
#[derive(Debug, Clone)]
pub struct TimerToken {
    schedule: Schedule,
}

impl TimerToken {
    pub fn new() -> Self {
        Self {
            schedule: Schedule::Idle,
        }
    }

    /// Fires once, `delay` seconds after `now` (negative delays fire immediately)
    pub fn set_timeout(&mut self, now: f64, delay: f64) {
        self.schedule = Schedule::Timeout {
            due: now + delay.max(0.0),
        };
    }

    /// Fires every `period` seconds, first at `now + period`
    pub fn set_interval(&mut self, now: f64, period: f64) {
        self.set_interval_at(now + period, period);
    }

    /// Fires every `period` seconds, first at `due`
    pub fn set_interval_at(&mut self, due: f64, period: f64) {
        debug_assert!(period > 0.0, "interval period must be positive");
        self.schedule = Schedule::Interval { due, period };
    }

    pub fn cancel(&mut self) {
        self.schedule = Schedule::Idle;
    }

    pub fn is_armed(&self) -> bool {
        self.schedule != Schedule::Idle
    }

    pub fn deadline(&self) -> Option<f64> {
        match self.schedule {
            Schedule::Idle => None,
            Schedule::Timeout { due } | Schedule::Interval { due, .. } => Some(due),
        }
    }

    /// Period of an armed interval
    pub fn period(&self) -> Option<f64> {
        match self.schedule {
            Schedule::Interval { period, .. } => Some(period),
            _ => None,
        }
    }

    /// Consumes a due deadline and returns it.
    /// A timeout disarms; an interval moves to its next slot, skipping slots
    /// that are already in the past.
    pub fn take_due(&mut self, now: f64) -> Option<f64> {
        match self.schedule {
            Schedule::Timeout { due } if due <= now => {
                self.schedule = Schedule::Idle;
                Some(due)
            }
            Schedule::Interval { due, period } if due <= now => {
                let mut next = due + period;
                if next <= now {
                    next = now + period;
                }
                self.schedule = Schedule::Interval { due: next, period };
                Some(due)
            }
            _ => None,
        }
    }
}

impl Default for TimerToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Earliest of several optional deadlines
pub fn earliest(deadlines: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    deadlines.into_iter().flatten().reduce(f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_fires_once() {
        let mut timer = TimerToken::new();
        assert!(!timer.is_armed());

        timer.set_timeout(1.0, 0.5);
        assert_eq!(timer.deadline(), Some(1.5));
        assert_eq!(timer.take_due(1.4), None);
        assert_eq!(timer.take_due(1.6), Some(1.5));
        assert!(!timer.is_armed());
        assert_eq!(timer.take_due(2.0), None);
    }

    #[test]
    fn test_negative_delay_fires_immediately() {
        let mut timer = TimerToken::new();
        timer.set_timeout(3.0, -1.0);
        assert_eq!(timer.take_due(3.0), Some(3.0));
    }

    #[test]
    fn test_interval_keeps_phase() {
        let mut timer = TimerToken::new();
        timer.set_interval(0.0, 1.0);
        assert_eq!(timer.period(), Some(1.0));

        // Late fire does not shift the following slots
        assert_eq!(timer.take_due(1.004), Some(1.0));
        assert_eq!(timer.deadline(), Some(2.0));
        assert_eq!(timer.take_due(2.0), Some(2.0));
        assert_eq!(timer.deadline(), Some(3.0));
    }

    #[test]
    fn test_interval_at_explicit_phase() {
        let mut timer = TimerToken::new();
        timer.set_interval_at(1.5, 0.5);
        assert_eq!(timer.deadline(), Some(1.5));
        assert_eq!(timer.take_due(1.503), Some(1.5));
        assert_eq!(timer.deadline(), Some(2.0));
    }

    #[test]
    fn test_interval_skips_missed_slots() {
        let mut timer = TimerToken::new();
        timer.set_interval(0.0, 1.0);
        assert_eq!(timer.take_due(5.5), Some(1.0));
        assert_eq!(timer.deadline(), Some(6.5));
    }

    #[test]
    fn test_rearm_replaces_and_cancel_clears() {
        let mut timer = TimerToken::new();
        timer.set_interval(0.0, 1.0);
        timer.set_timeout(0.0, 0.25);
        assert_eq!(timer.period(), None);
        assert_eq!(timer.deadline(), Some(0.25));

        timer.cancel();
        assert_eq!(timer.deadline(), None);
        assert_eq!(timer.take_due(10.0), None);
    }

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualHostClock::new(1.0);
        let other = clock.clone();
        clock.advance(0.5);
        assert_eq!(other.now(), 1.5);
    }

    #[test]
    fn test_earliest() {
        assert_eq!(earliest([None, Some(2.0), Some(1.0)]), Some(1.0));
        assert_eq!(earliest([None, None]), None);
    }
}
