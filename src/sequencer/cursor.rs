// Cursor - Note-by-note walker over a task plan
// Tracks indices and cumulative timestamps, never rewinds

use super::task::{Accent, BeatAccents, MetronomeTask, TransitionLevel};
use super::timeline::MeasureGeometry;
use std::fmt;
use std::sync::Arc;

/// A part with its geometry and whole-measure count resolved
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPart {
    pub name: Option<String>,
    pub geometry: MeasureGeometry,
    pub measure_count: u32,
    pub accents: BeatAccents,
}

/// Resolved form of a [`MetronomeTask`], shared by every cursor walking it
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPlan {
    parts: Vec<PlannedPart>,
}

impl TaskPlan {
    pub fn new(task: &MetronomeTask) -> Self {
        let parts = task
            .parts()
            .iter()
            .map(|part| {
                let geometry = part.geometry();
                let measure_count = part.duration.measure_count(geometry.duration);
                PlannedPart {
                    name: part.name.clone(),
                    geometry,
                    measure_count,
                    accents: part.beat_accents.clone(),
                }
            })
            .collect();

        Self { parts }
    }

    pub fn parts(&self) -> &[PlannedPart] {
        &self.parts
    }

    pub fn total_measures(&self) -> u64 {
        self.parts.iter().map(|part| part.measure_count as u64).sum()
    }

    /// Playtime in seconds
    pub fn total_duration(&self) -> f64 {
        self.parts
            .iter()
            .map(|part| part.measure_count as f64 * part.geometry.duration)
            .sum()
    }
}

/// Index of a note inside a task.
/// Ordering is lexicographic: part, measure, beat, note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize)]
pub struct Position {
    pub part_index: usize,
    pub part_measure_index: u32,
    pub measure_beat_index: u32,
    pub beat_note_index: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.part_index + 1,
            self.part_measure_index + 1,
            self.measure_beat_index + 1,
            self.beat_note_index + 1
        )
    }
}

/// Mutable walker, owned by exactly one consumer.
/// Timestamps are absolute seconds in the audio clock domain.
#[derive(Debug, Clone)]
pub struct PositionCursor {
    plan: Arc<TaskPlan>,
    part_index: usize,
    part_measure_index: u32,
    measure_beat_index: u32,
    beat_note_index: u32,
    measure_start_time: f64,
    part_start_time: f64,
}

impl PositionCursor {
    /// Cursor on the first note, which starts at `start_time`
    pub fn new(plan: Arc<TaskPlan>, start_time: f64) -> Self {
        debug_assert!(!plan.parts().is_empty(), "task plan must have parts");
        Self {
            plan,
            part_index: 0,
            part_measure_index: 0,
            measure_beat_index: 0,
            beat_note_index: 0,
            measure_start_time: start_time,
            part_start_time: start_time,
        }
    }

    pub fn plan(&self) -> &Arc<TaskPlan> {
        &self.plan
    }

    /// Current part, `None` once finished
    pub fn part(&self) -> Option<&PlannedPart> {
        self.plan.parts.get(self.part_index)
    }

    pub fn finished(&self) -> bool {
        self.part_index == self.plan.parts.len()
    }

    pub fn position(&self) -> Position {
        Position {
            part_index: self.part_index,
            part_measure_index: self.part_measure_index,
            measure_beat_index: self.measure_beat_index,
            beat_note_index: self.beat_note_index,
        }
    }

    pub fn measure_start_time(&self) -> f64 {
        self.measure_start_time
    }

    pub fn part_start_time(&self) -> f64 {
        self.part_start_time
    }

    pub fn beat_start_time(&self) -> f64 {
        match self.part() {
            Some(part) => {
                self.measure_start_time
                    + self.measure_beat_index as f64 * part.geometry.beat_duration
            }
            None => self.measure_start_time,
        }
    }

    /// Start of the current note; the task end once finished
    pub fn note_start_time(&self) -> f64 {
        match self.part() {
            Some(part) => {
                self.beat_start_time()
                    + part.geometry.beat_note_offsets[self.beat_note_index as usize]
            }
            None => self.measure_start_time,
        }
    }

    /// Note interval of the current part
    pub fn note_interval(&self) -> Option<f64> {
        self.part().map(|part| part.geometry.note_interval)
    }

    /// Measures left in the current part, the current one included
    pub fn remained_part_measures(&self) -> u32 {
        self.part()
            .map(|part| part.measure_count - self.part_measure_index)
            .unwrap_or(0)
    }

    /// Accent of the current note. Sub-beat notes are never above normal,
    /// and a silent beat silences its subdivisions.
    pub fn note_accent(&self) -> Accent {
        let Some(part) = self.part() else {
            return Accent::Silent;
        };
        let accent = part.accents.get(self.measure_beat_index);
        if self.beat_note_index != 0 && accent.is_audible() {
            Accent::Normal
        } else {
            accent
        }
    }

    /// Transition cue due at the current note, only on a measure's first note
    pub fn measure_transition(&self) -> Option<TransitionLevel> {
        if self.finished() || self.measure_beat_index != 0 || self.beat_note_index != 0 {
            return None;
        }
        if self.part_index > 0 && self.part_measure_index == 0 {
            Some(TransitionLevel::Stop)
        } else if self.remained_part_measures() == 1 {
            Some(TransitionLevel::Warning)
        } else {
            None
        }
    }

    pub fn advance_measure(&mut self) {
        let Some(part) = self.part() else {
            return;
        };
        let measure_duration = part.geometry.duration;
        let measure_count = part.measure_count;

        self.measure_start_time += measure_duration;
        self.part_measure_index += 1;
        if self.part_measure_index == measure_count {
            self.part_measure_index = 0;
            self.part_index += 1;
            self.part_start_time = self.measure_start_time;
        }

        self.measure_beat_index = 0;
        self.beat_note_index = 0;
    }

    pub fn advance_beat(&mut self) {
        let Some(part) = self.part() else {
            return;
        };
        let beats_count = part.geometry.beats_count;

        self.measure_beat_index += 1;
        if self.measure_beat_index == beats_count {
            self.advance_measure();
        } else {
            self.beat_note_index = 0;
        }
    }

    pub fn advance_note(&mut self) {
        let Some(part) = self.part() else {
            return;
        };
        let beat_divider = part.geometry.beat_divider;

        self.beat_note_index += 1;
        if self.beat_note_index == beat_divider {
            self.advance_beat();
        }
    }

    /// Audio time the task ends at, going by the current plan from here on
    pub fn end_time(&self) -> f64 {
        let Some(part) = self.part() else {
            return self.measure_start_time;
        };
        let current = (part.measure_count - self.part_measure_index) as f64 * part.geometry.duration;
        let later: f64 = self.plan.parts[self.part_index + 1..]
            .iter()
            .map(|part| part.measure_count as f64 * part.geometry.duration)
            .sum();
        self.measure_start_time + current + later
    }

    /// Moves every timestamp by `delta` seconds
    pub fn shift_times(&mut self, delta: f64) {
        self.measure_start_time += delta;
        self.part_start_time += delta;
    }

    /// Swaps in an edited plan. Indices are kept (rolled forward where they
    /// overflow the new geometry) and the current note keeps its start time,
    /// so the new geometry applies from the next note on.
    pub fn retarget(&mut self, plan: Arc<TaskPlan>) {
        let anchor = self.note_start_time();
        let part_index = self.part_index;

        self.plan = plan;
        self.normalize();

        if self.part_index != part_index {
            self.part_start_time = anchor;
        }
        self.measure_start_time = match self.part() {
            Some(part) => {
                anchor - part.geometry.note_offset(self.measure_beat_index, self.beat_note_index)
            }
            None => anchor,
        };
    }

    fn normalize(&mut self) {
        loop {
            let Some(part) = self.plan.parts.get(self.part_index) else {
                self.part_index = self.plan.parts.len();
                self.part_measure_index = 0;
                self.measure_beat_index = 0;
                self.beat_note_index = 0;
                return;
            };

            if self.beat_note_index >= part.geometry.beat_divider {
                self.beat_note_index = 0;
                self.measure_beat_index += 1;
            } else if self.measure_beat_index >= part.geometry.beats_count {
                self.measure_beat_index = 0;
                self.part_measure_index += 1;
            } else if self.part_measure_index >= part.measure_count {
                self.part_measure_index = 0;
                self.part_index += 1;
            } else {
                return;
            }
        }
    }
}
