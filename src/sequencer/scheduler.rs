// Scheduler - Look-ahead queueing of clicks into a player
// Wakes up every few seconds and queues everything due before the horizon

use super::cursor::PositionCursor;
use super::task::{Accent, TransitionLevel};
use super::timer::{HostClock, TimerToken, earliest};
use crate::audio::Player;
use crate::config::LookaheadConfig;
use std::collections::VecDeque;

/// Shortest wait for a sound in flight
const MIN_DEFERRAL: f64 = 0.001;

/// Queue slots one note can take: its transition cue and its click
const NOTE_SLOTS: usize = 2;

/// Shortest wait before topping up a full player queue
const MIN_REFILL: f64 = 0.05;

/// Player operation waiting for the sound in flight to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Suspend,
    Close,
}

/// Walks its own cursor ahead of the stopwatch and feeds the player queue.
///
/// Clicks are handed over up to `lookahead.horizon()` seconds early, so a
/// stalled host timer never starves the audio side.
pub struct NoteScheduler<P, H> {
    player: P,
    host: H,
    cursor: PositionCursor,
    config: LookaheadConfig,
    fill_timer: TimerToken,
    deferred_timer: TimerToken,
    deferred: Option<Deferred>,
    /// `(start, finish)` of queued sounds, in queue order
    sounds: VecDeque<(f64, f64)>,
    player_suspended: bool,
    closed: bool,
    /// The task end cue has been queued
    ended: bool,
}

impl<P: Player, H: HostClock> NoteScheduler<P, H> {
    /// Fills the player right away and keeps filling every `config.interval`
    pub fn new(player: P, host: H, cursor: PositionCursor, config: LookaheadConfig) -> Self {
        let mut scheduler = Self {
            player,
            host,
            cursor,
            config,
            fill_timer: TimerToken::new(),
            deferred_timer: TimerToken::new(),
            deferred: None,
            sounds: VecDeque::new(),
            player_suspended: false,
            closed: false,
            ended: false,
        };
        scheduler.start_filling();
        scheduler
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    pub fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The player queue holds everything up to the task end
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn next_deadline(&self) -> Option<f64> {
        earliest([self.fill_timer.deadline(), self.deferred_timer.deadline()])
    }

    /// Handles whichever timer is due; returns whether one fired
    pub fn poll(&mut self) -> bool {
        let now = self.host.now();
        let fill_due = self.fill_timer.deadline().filter(|due| *due <= now);
        let deferred_due = self.deferred_timer.deadline().filter(|due| *due <= now);

        match (fill_due, deferred_due) {
            (Some(fill), Some(deferred)) if deferred < fill => {
                self.deferred_timer.cancel();
                self.apply_deferred();
            }
            (Some(_), _) => {
                self.fill_timer.take_due(now);
                self.fill();
            }
            (None, Some(_)) => {
                self.deferred_timer.cancel();
                self.apply_deferred();
            }
            (None, None) => return false,
        }
        true
    }

    /// Stops filling; the player is suspended once the sound playing now ends
    pub fn suspend(&mut self) {
        if self.closed {
            return;
        }
        self.fill_timer.cancel();
        if self.player_suspended {
            return;
        }
        self.defer(Deferred::Suspend);
    }

    /// Resumes the player (or cancels its pending suspension) and fills at once
    pub fn resume(&mut self) {
        if self.closed || self.deferred == Some(Deferred::Close) {
            log::warn!("Ignoring resume of a closed scheduler");
            return;
        }

        if self.deferred.take().is_some() {
            self.deferred_timer.cancel();
        } else if self.player_suspended {
            self.player.resume();
            self.player_suspended = false;
        }
        self.start_filling();
    }

    /// Stops filling and closes the player once the sound playing now ends
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.fill_timer.cancel();
        self.defer(Deferred::Close);
    }

    fn start_filling(&mut self) {
        if !self.ended {
            self.fill_timer.set_interval(self.host.now(), self.config.interval);
        }
        self.fill();
    }

    /// Queues every note starting before the horizon
    pub fn fill(&mut self) {
        let now = self.player.current_time();
        self.forget_finished(now);

        let horizon = now + self.config.horizon();
        let mut queued = 0usize;

        while !self.ended && self.cursor.note_start_time() < horizon {
            if self.player.queue_space() < NOTE_SLOTS {
                // Top up again once half of what is queued has played
                let retry = ((self.cursor.note_start_time() - now) / 2.0).max(MIN_REFILL);
                self.fill_timer
                    .set_interval_at(self.host.now() + retry, self.config.interval);
                log::debug!("Player queue full, refilling in {retry:.3}s");
                break;
            }

            if self.cursor.finished() {
                let end = self.cursor.measure_start_time();
                self.queue_transition(end, TransitionLevel::Stop);
                self.ended = true;
                self.fill_timer.cancel();
                log::debug!("Queued task end at {end:.3}s");
                break;
            }

            let at = self.cursor.note_start_time();
            let mut accent = self.cursor.note_accent();
            if let Some(level) = self.cursor.measure_transition() {
                self.queue_transition(at, level);
                if level == TransitionLevel::Stop {
                    accent = Accent::Silent;
                }
            }
            if accent.is_audible() {
                let finish = self.player.schedule_click(at, accent);
                self.sounds.push_back((at, finish));
            }

            self.cursor.advance_note();
            queued += 1;
        }

        if queued > 0 {
            log::trace!("Queued {queued} notes up to {horizon:.3}s");
        }
    }

    fn queue_transition(&mut self, at: f64, level: TransitionLevel) {
        let finish = self.player.schedule_transition(at, level);
        self.sounds.push_back((at, finish));
    }

    fn forget_finished(&mut self, now: f64) {
        self.sounds.retain(|(_, finish)| *finish > now);
    }

    /// Finish time of the latest sound audible right now
    fn in_flight_until(&self, now: f64) -> Option<f64> {
        self.sounds
            .iter()
            .filter(|(start, finish)| *start <= now && now < *finish)
            .map(|(_, finish)| *finish)
            .reduce(f64::max)
    }

    /// Applies `deferred` once the sounds audible right now have ended.
    /// Sounds starting after this call do not delay it any further.
    fn defer(&mut self, deferred: Deferred) {
        self.deferred = Some(deferred);

        if !self.player_suspended {
            let now = self.player.current_time();
            self.forget_finished(now);
            if let Some(finish) = self.in_flight_until(now) {
                self.deferred_timer
                    .set_timeout(self.host.now(), (finish - now).max(MIN_DEFERRAL));
                return;
            }
        }

        self.deferred_timer.cancel();
        self.apply_deferred();
    }

    fn apply_deferred(&mut self) {
        let Some(deferred) = self.deferred.take() else {
            return;
        };

        let now = self.player.current_time();
        match deferred {
            Deferred::Suspend => {
                self.player.suspend();
                self.player_suspended = true;
                log::debug!("Player suspended at {now:.3}s");
            }
            Deferred::Close => {
                if !self.player_suspended {
                    self.player.suspend();
                    self.player_suspended = true;
                }
                self.player.close();
                self.closed = true;
                self.sounds.clear();
                log::debug!("Player closed at {now:.3}s");
            }
        }
    }
}
