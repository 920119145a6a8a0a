// Notifications - Payloads broadcast by the click engine
// Timestamps are audio clock seconds

use crate::sequencer::cursor::Position;
use crate::sequencer::task::{Accent, TransitionLevel};

/// One emitted note, audible or not
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ClickEvent {
    pub position: Position,
    /// Start of the part the note belongs to
    pub part_start_time: f64,
    pub accent: Accent,
    /// Nominal start of the note
    pub time: f64,
}

impl ClickEvent {
    pub fn is_audible(&self) -> bool {
        self.accent.is_audible()
    }

    /// Seconds since the part started
    pub fn part_offset(&self) -> f64 {
        self.time - self.part_start_time
    }
}

/// Cue marking a part boundary or the last measure of a part
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct TransitionEvent {
    pub level: TransitionLevel,
    pub time: f64,
    /// Part starting (stop) or ending (warning) at `time`; equals the part
    /// count for the end of the task
    pub part_index: usize,
}

impl TransitionEvent {
    pub fn is_stop(&self) -> bool {
        self.level == TransitionLevel::Stop
    }
}
