// Stopwatch - Drift-corrected note emitter
// Fires a host timer per note, measures it against the audio clock and re-arms to cancel drift

use super::cursor::{Position, PositionCursor, TaskPlan};
use super::task::{Accent, TransitionLevel};
use super::timer::{HostClock, TimerToken};
use crate::audio::AudioClock;
use crate::config::DriftConfig;
use crate::messaging::event::EventControl;
use crate::messaging::notification::{ClickEvent, TransitionEvent};
use std::sync::Arc;

/// Spacings closer than this are the same interval
const INTERVAL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchState {
    Running,
    Suspended,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StopwatchError {
    #[error("stopwatch is already running")]
    AlreadyRunning,

    #[error("stopwatch is not running")]
    NotRunning,

    #[error("stopwatch has finished")]
    Finished,
}

/// Signed timing error accumulated between corrections
#[derive(Debug, Clone, Copy, Default)]
struct ErrorAccumulator {
    sum: f64,
    count: u32,
}

impl ErrorAccumulator {
    fn push(&mut self, error: f64) {
        self.sum += error;
        self.count += 1;
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Emits every note of a task at its audio clock time.
///
/// The host timer runs as an interval at the note spacing; each fire is
/// compared with the note's nominal time, and when the average error leaves
/// the tolerated band the timer is re-armed as a one-shot that lands on the
/// next note minus a damped share of that error.
pub struct Stopwatch<C, H> {
    clock: C,
    host: H,
    config: DriftConfig,
    cursor: PositionCursor,
    state: StopwatchState,
    timer: TimerToken,
    errors: ErrorAccumulator,
    /// Audio time the elapsed counter starts from
    origin: f64,
    /// Audio time of the task end
    end: f64,
    last_note: Option<Position>,
    corrections: u64,
    clicks: EventControl<ClickEvent>,
    transitions: EventControl<TransitionEvent>,
    finished: EventControl<()>,
}

impl<C: AudioClock, H: HostClock> Stopwatch<C, H> {
    /// Starts emitting right away; the first note plays at `start_time` on `clock`
    pub fn start(clock: C, host: H, plan: Arc<TaskPlan>, start_time: f64, config: DriftConfig) -> Self {
        let cursor = PositionCursor::new(plan, start_time);
        let mut stopwatch = Self {
            clock,
            host,
            config,
            end: cursor.end_time(),
            cursor,
            state: StopwatchState::Running,
            timer: TimerToken::new(),
            errors: ErrorAccumulator::default(),
            origin: start_time,
            last_note: None,
            corrections: 0,
            clicks: EventControl::new(),
            transitions: EventControl::new(),
            finished: EventControl::new(),
        };
        stopwatch.arm_to_next_note();
        stopwatch
    }

    pub fn state(&self) -> StopwatchState {
        self.state
    }

    pub fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    /// Position of the next note to emit
    pub fn position(&self) -> Position {
        self.cursor.position()
    }

    pub fn last_note(&self) -> Option<Position> {
        self.last_note
    }

    /// Drift corrections applied so far
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    /// Audio seconds played since the first note, capped at the task end
    pub fn elapsed_seconds(&self) -> f64 {
        (self.clock.current_time().min(self.end) - self.origin).max(0.0)
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.timer.deadline()
    }

    pub fn on_click(&self) -> &EventControl<ClickEvent> {
        &self.clicks
    }

    pub fn on_transition(&self) -> &EventControl<TransitionEvent> {
        &self.transitions
    }

    /// Invoked once when the task end has passed on the audio clock
    pub fn on_finish(&self) -> &EventControl<()> {
        &self.finished
    }

    /// Handles the timer if it is due; returns whether it fired
    pub fn poll(&mut self) -> bool {
        if self.timer.take_due(self.host.now()).is_none() {
            return false;
        }
        if self.state == StopwatchState::Running {
            self.fire();
        }
        true
    }

    pub fn suspend(&mut self) -> Result<(), StopwatchError> {
        match self.state {
            StopwatchState::Running => {
                self.timer.cancel();
                self.state = StopwatchState::Suspended;
                log::debug!("Stopwatch suspended before {}", self.cursor.position());
                Ok(())
            }
            StopwatchState::Suspended => Err(StopwatchError::NotRunning),
            StopwatchState::Finished => Err(StopwatchError::Finished),
        }
    }

    pub fn resume(&mut self) -> Result<(), StopwatchError> {
        match self.state {
            StopwatchState::Suspended => {
                self.state = StopwatchState::Running;
                self.arm_to_next_note();
                log::debug!("Stopwatch resumed at {}", self.cursor.position());
                Ok(())
            }
            StopwatchState::Running => Err(StopwatchError::AlreadyRunning),
            StopwatchState::Finished => Err(StopwatchError::Finished),
        }
    }

    /// Swaps in an edited task while suspended
    pub fn update_task(&mut self, plan: Arc<TaskPlan>) -> Result<(), StopwatchError> {
        self.ensure_suspended()?;
        self.cursor.retarget(plan);
        self.end = self.cursor.end_time();
        self.errors.reset();
        Ok(())
    }

    /// Moves to another audio clock while suspended; the next note is placed
    /// `start_delay` seconds after the new clock's current time.
    pub fn rebase(&mut self, clock: C, start_delay: f64) -> Result<(), StopwatchError> {
        self.ensure_suspended()?;
        let delta = clock.current_time() + start_delay - self.cursor.note_start_time();
        self.cursor.shift_times(delta);
        self.origin += delta;
        self.end += delta;
        self.clock = clock;
        self.errors.reset();
        Ok(())
    }

    fn ensure_suspended(&self) -> Result<(), StopwatchError> {
        match self.state {
            StopwatchState::Suspended => Ok(()),
            StopwatchState::Running => Err(StopwatchError::AlreadyRunning),
            StopwatchState::Finished => Err(StopwatchError::Finished),
        }
    }

    fn arm_timeout(&mut self, delay: f64) {
        self.timer.set_timeout(self.host.now(), delay);
    }

    fn arm_to_next_note(&mut self) {
        let delay = self.cursor.note_start_time() - self.clock.current_time();
        self.arm_timeout(delay);
    }

    fn fire(&mut self) {
        if self.cursor.finished() {
            self.poll_finish();
            return;
        }

        let now = self.clock.current_time();
        let expected = self.cursor.note_start_time();
        self.errors.push(now - expected);

        let position = self.cursor.position();
        let part_start_time = self.cursor.part_start_time();
        let mut accent = self.cursor.note_accent();

        if let Some(level) = self.cursor.measure_transition() {
            if level == TransitionLevel::Stop {
                accent = Accent::Silent;
            }
            self.transitions.invoke(&TransitionEvent {
                level,
                time: expected,
                part_index: position.part_index,
            });
        }

        let was_interval = self.timer.period();
        self.cursor.advance_note();
        self.last_note = Some(position);

        log::trace!(
            "Note {position} accent {} at {expected:.4}s, late {:.2}ms",
            u8::from(accent),
            (now - expected) * 1000.0
        );
        self.clicks.invoke(&ClickEvent {
            position,
            part_start_time,
            accent,
            time: expected,
        });

        if self.cursor.finished() {
            let end = self.cursor.measure_start_time();
            self.transitions.invoke(&TransitionEvent {
                level: TransitionLevel::Stop,
                time: end,
                part_index: self.cursor.plan().parts().len(),
            });
            self.arm_timeout((end - now).max(self.config.finish_poll));
            return;
        }

        self.rearm(now, expected, was_interval);
    }

    /// Keeps the interval running, or replaces it when the spacing changes
    fn rearm(&mut self, now: f64, expected: f64, was_interval: Option<f64>) {
        let next = self.cursor.note_start_time();
        let gap = next - expected;
        let Some(interval) = self.cursor.note_interval() else {
            return;
        };
        let regular = (gap - interval).abs() < INTERVAL_EPSILON;

        match was_interval {
            Some(period) if regular && (period - interval).abs() < INTERVAL_EPSILON => {}
            Some(period) => {
                log::debug!("Note interval changed from {period:.4}s to {gap:.4}s");
                self.errors.reset();
                self.arm_timeout(next - now);
                return;
            }
            // Phase comes from the next note, not from this late fire
            None if regular => self
                .timer
                .set_interval_at(self.host.now() + (next - now), interval),
            None => {
                self.arm_timeout(next - now);
                return;
            }
        }

        self.correct_drift(now, next, interval);
    }

    fn correct_drift(&mut self, now: f64, next: f64, interval: f64) {
        let average = self.errors.average();
        let count = self.errors.count;
        let config = &self.config;

        let out_of_band = count >= config.min_error_samples && average.abs() > config.error_threshold;
        let too_far = average.abs() > config.interval_fraction * interval;

        if out_of_band || too_far {
            let correction = if average > 0.0 { average } else { average / 2.0 } / config.correction_damping;
            log::debug!(
                "Drift correction after {count} notes: average {:.2}ms, correcting {:.2}ms",
                average * 1000.0,
                correction * 1000.0
            );
            self.errors.reset();
            self.corrections += 1;
            self.arm_timeout(next - now - correction);
        } else if count >= config.max_error_samples {
            self.errors.reset();
        }
    }

    fn poll_finish(&mut self) {
        let now = self.clock.current_time();
        let end = self.cursor.measure_start_time();
        if now < end {
            self.arm_timeout((end - now).max(self.config.finish_poll));
            return;
        }

        self.state = StopwatchState::Finished;
        self.timer.cancel();
        log::info!("Task finished after {:.3}s", self.elapsed_seconds());
        self.finished.invoke(&());
    }
}
