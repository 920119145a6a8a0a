// Task - Declarative description of a practice task
// Ordered parts, each with its own signature, tempo, subdivision, accents and duration

use super::timeline::{MeasureGeometry, Tempo, TimeSignature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Largest accepted beat divider
pub const MAX_BEAT_DIVIDER: u32 = 128;
/// Largest accepted duration value (measures or seconds)
pub const MAX_DURATION_VALUE: f64 = 10_800.0;

/// Configuration errors, rejected before an engine is constructed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("task must contain at least one part")]
    Empty,

    #[error("part {index}: {source}")]
    Part {
        index: usize,
        #[source]
        source: PartError,
    },

    #[error("invalid accent value {0}: expected integer [0-3]")]
    InvalidAccent(u8),

    #[error("invalid transition level {0}: expected 1 or 2")]
    InvalidTransitionLevel(u8),

    #[error("unknown accents preset '{0}'")]
    UnknownPreset(String),

    #[error("{0}: invalid duration, expected number of measures or {{seconds}}s or {{minutes}}m")]
    InvalidDurationText(String),
}

/// Reason a single part is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PartError {
    #[error("bpm {0} is invalid: expected number [0.1, 360]")]
    InvalidBpm(f64),

    #[error("invalid time signature {0}, expected integers [1-128]")]
    InvalidSignature(TimeSignature),

    #[error("invalid beat divider {0}, expected integer [1-128]")]
    InvalidDivider(u32),

    #[error("can not create a part with {0} measures, expected [1-10800]")]
    InvalidMeasures(u32),

    #[error("can not create a part lasting {0} seconds, expected (0, 10800]")]
    InvalidSeconds(f64),
}

/// Loudness/pitch category of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Accent {
    /// Advances the position but is never played
    Silent = 0,
    Normal = 1,
    Medium = 2,
    Strong = 3,
}

impl Accent {
    pub fn is_audible(self) -> bool {
        self != Accent::Silent
    }
}

impl TryFrom<u8> for Accent {
    type Error = TaskError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Accent::Silent),
            1 => Ok(Accent::Normal),
            2 => Ok(Accent::Medium),
            3 => Ok(Accent::Strong),
            other => Err(TaskError::InvalidAccent(other)),
        }
    }
}

impl From<Accent> for u8 {
    fn from(accent: Accent) -> Self {
        accent as u8
    }
}

/// Non-musical cue marking a part boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TransitionLevel {
    /// Part-to-part boundary or task end
    Stop = 1,
    /// The part's last measure begins
    Warning = 2,
}

impl TryFrom<u8> for TransitionLevel {
    type Error = TaskError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TransitionLevel::Stop),
            2 => Ok(TransitionLevel::Warning),
            other => Err(TaskError::InvalidTransitionLevel(other)),
        }
    }
}

impl From<TransitionLevel> for u8 {
    fn from(level: TransitionLevel) -> Self {
        level as u8
    }
}

/// Named accent layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccentPreset {
    /// Strong first beat
    First,
    /// Strong first beat, medium middle beat for even numerators
    Middle,
}

impl AccentPreset {
    pub fn resolve(self, signature: TimeSignature) -> BeatAccents {
        let accents = BeatAccents::empty().with(0, Accent::Strong);
        let beats = signature.beats_per_measure();
        match self {
            AccentPreset::Middle if beats % 2 == 0 => accents.with(beats / 2, Accent::Medium),
            _ => accents,
        }
    }
}

impl FromStr for AccentPreset {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(AccentPreset::First),
            "middle" => Ok(AccentPreset::Middle),
            _ => Err(TaskError::UnknownPreset(s.to_string())),
        }
    }
}

/// Beat index to accent map, unlisted beats are [`Accent::Normal`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeatAccents(BTreeMap<u32, Accent>);

impl BeatAccents {
    /// Every beat normal
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, beat_index: u32, accent: Accent) -> Self {
        self.0.insert(beat_index, accent);
        self
    }

    pub fn set(&mut self, beat_index: u32, accent: Accent) {
        self.0.insert(beat_index, accent);
    }

    /// Accent configured for a beat
    pub fn get(&self, beat_index: u32) -> Accent {
        self.0.get(&beat_index).copied().unwrap_or(Accent::Normal)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Accent)> + '_ {
        self.0.iter().map(|(beat, accent)| (*beat, *accent))
    }
}

impl Default for BeatAccents {
    fn default() -> Self {
        AccentPreset::First.resolve(TimeSignature::default())
    }
}

/// How long a part plays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartDuration {
    Measures(u32),
    Seconds(f64),
}

impl PartDuration {
    /// Whole measures played for a given measure duration.
    /// Seconds round up, never below one measure.
    pub fn measure_count(&self, measure_duration: f64) -> u32 {
        match *self {
            PartDuration::Measures(count) => count,
            PartDuration::Seconds(seconds) => ((seconds / measure_duration).ceil() as u32).max(1),
        }
    }

    fn check(&self) -> Result<(), PartError> {
        match *self {
            PartDuration::Measures(count) => {
                if count >= 1 && count as f64 <= MAX_DURATION_VALUE {
                    Ok(())
                } else {
                    Err(PartError::InvalidMeasures(count))
                }
            }
            PartDuration::Seconds(seconds) => {
                if seconds.is_finite() && seconds > 0.0 && seconds <= MAX_DURATION_VALUE {
                    Ok(())
                } else {
                    Err(PartError::InvalidSeconds(seconds))
                }
            }
        }
    }
}

impl Default for PartDuration {
    fn default() -> Self {
        PartDuration::Seconds(60.0)
    }
}

/// `"12"` is twelve measures, `"30s"` thirty seconds, `"2m"` two minutes
impl FromStr for PartDuration {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let fail = || TaskError::InvalidDurationText(s.to_string());

        let (number, seconds_multiplier) = match text.chars().last() {
            Some('s' | 'S') => (&text[..text.len() - 1], Some(1.0)),
            Some('m' | 'M') => (&text[..text.len() - 1], Some(60.0)),
            _ => (text, None),
        };

        let duration = match seconds_multiplier {
            Some(multiplier) => {
                let value: f64 = number.trim().parse().map_err(|_| fail())?;
                PartDuration::Seconds(value * multiplier)
            }
            None => PartDuration::Measures(number.parse().map_err(|_| fail())?),
        };

        duration.check().map_err(|_| fail())?;
        Ok(duration)
    }
}

impl fmt::Display for PartDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartDuration::Measures(count) => write!(f, "{count} measures"),
            PartDuration::Seconds(seconds) => write!(f, "{seconds}s"),
        }
    }
}

/// One contiguous segment of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPart {
    pub name: Option<String>,
    pub signature: TimeSignature,
    pub bpm: f64,
    pub beat_divider: u32,
    pub beat_accents: BeatAccents,
    pub duration: PartDuration,
}

impl Default for TaskPart {
    fn default() -> Self {
        Self {
            name: None,
            signature: TimeSignature::default(),
            bpm: 60.0,
            beat_divider: 1,
            beat_accents: BeatAccents::default(),
            duration: PartDuration::default(),
        }
    }
}

impl TaskPart {
    /// Part with default options (4/4, 60 BPM, strong first beat)
    pub fn new(duration: PartDuration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn with_signature(mut self, signature: TimeSignature) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_divider(mut self, beat_divider: u32) -> Self {
        self.beat_divider = beat_divider;
        self
    }

    pub fn with_accents(mut self, beat_accents: BeatAccents) -> Self {
        self.beat_accents = beat_accents;
        self
    }

    pub fn tempo(&self) -> Tempo {
        Tempo::new(self.bpm)
    }

    pub fn validate(&self) -> Result<(), PartError> {
        if !(Tempo::MIN_BPM..=Tempo::MAX_BPM).contains(&self.bpm) {
            return Err(PartError::InvalidBpm(self.bpm));
        }
        if !self.signature.is_valid() {
            return Err(PartError::InvalidSignature(self.signature));
        }
        if !(1..=MAX_BEAT_DIVIDER).contains(&self.beat_divider) {
            return Err(PartError::InvalidDivider(self.beat_divider));
        }
        self.duration.check()
    }

    pub fn geometry(&self) -> MeasureGeometry {
        MeasureGeometry::new(self.signature, self.tempo(), self.beat_divider)
    }

    /// Whole measures this part plays
    pub fn measure_count(&self) -> u32 {
        self.duration.measure_count(self.geometry().duration)
    }
}

/// Ordered, non-empty list of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetronomeTask {
    parts: Vec<TaskPart>,
}

impl MetronomeTask {
    /// Creates a validated task
    pub fn new(parts: Vec<TaskPart>) -> Result<Self, TaskError> {
        let task = Self { parts };
        task.validate()?;
        Ok(task)
    }

    /// Single-part task
    pub fn single(part: TaskPart) -> Result<Self, TaskError> {
        Self::new(vec![part])
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        if self.parts.is_empty() {
            return Err(TaskError::Empty);
        }
        for (index, part) in self.parts.iter().enumerate() {
            part.validate()
                .map_err(|source| TaskError::Part { index, source })?;
        }
        Ok(())
    }

    pub fn parts(&self) -> &[TaskPart] {
        &self.parts
    }

    /// Mutable access for hot updates, re-validate before handing the task back to an engine
    pub fn parts_mut(&mut self) -> &mut [TaskPart] {
        &mut self.parts
    }

    /// Total playtime in seconds, after rounding every part to whole measures
    pub fn total_duration(&self) -> f64 {
        self.parts
            .iter()
            .map(|part| part.measure_count() as f64 * part.geometry().duration)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_defaults() {
        let part = TaskPart::new(PartDuration::Measures(4));
        assert_eq!(part.bpm, 60.0);
        assert_eq!(part.signature, TimeSignature::four_four());
        assert_eq!(part.beat_divider, 1);
        assert_eq!(part.beat_accents.get(0), Accent::Strong);
        assert_eq!(part.beat_accents.get(1), Accent::Normal);
        assert!(part.validate().is_ok());
    }

    #[test]
    fn test_seconds_round_up_to_whole_measures() {
        // 4/4 at 60 BPM: one measure lasts 4s
        let part = TaskPart::new(PartDuration::Seconds(2.5));
        assert_eq!(part.measure_count(), 1);

        let part = TaskPart::new(PartDuration::Seconds(10.0));
        assert_eq!(part.measure_count(), 3);

        // 4/4 at 120 BPM: one measure lasts 2s
        let part = TaskPart::new(PartDuration::Seconds(2.5)).with_bpm(120.0);
        assert_eq!(part.measure_count(), 2);

        let part = TaskPart::new(PartDuration::Seconds(4.0));
        assert_eq!(part.measure_count(), 1);
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(MetronomeTask::new(vec![]), Err(TaskError::Empty));

        let bad_bpm = TaskPart::new(PartDuration::Measures(1)).with_bpm(0.0);
        assert_eq!(bad_bpm.validate(), Err(PartError::InvalidBpm(0.0)));

        let bad_divider = TaskPart::new(PartDuration::Measures(1)).with_divider(0);
        assert_eq!(bad_divider.validate(), Err(PartError::InvalidDivider(0)));

        let bad_signature =
            TaskPart::new(PartDuration::Measures(1)).with_signature(TimeSignature::new(0, 4));
        assert!(matches!(
            bad_signature.validate(),
            Err(PartError::InvalidSignature(_))
        ));

        let zero_measures = TaskPart::new(PartDuration::Measures(0));
        assert_eq!(zero_measures.validate(), Err(PartError::InvalidMeasures(0)));

        let negative = TaskPart::new(PartDuration::Seconds(-1.0));
        assert_eq!(negative.validate(), Err(PartError::InvalidSeconds(-1.0)));

        let result = MetronomeTask::new(vec![
            TaskPart::new(PartDuration::Measures(2)),
            TaskPart::new(PartDuration::Measures(2)).with_bpm(500.0),
        ]);
        assert_eq!(
            result,
            Err(TaskError::Part {
                index: 1,
                source: PartError::InvalidBpm(500.0)
            })
        );
    }

    #[test]
    fn test_accent_presets() {
        let first = AccentPreset::First.resolve(TimeSignature::four_four());
        assert_eq!(first.iter().collect::<Vec<_>>(), vec![(0, Accent::Strong)]);

        let middle = AccentPreset::Middle.resolve(TimeSignature::new(6, 8));
        assert_eq!(middle.get(0), Accent::Strong);
        assert_eq!(middle.get(3), Accent::Medium);

        // Odd numerators have no middle beat
        let odd = AccentPreset::Middle.resolve(TimeSignature::new(5, 4));
        assert_eq!(odd.iter().count(), 1);

        assert_eq!("Middle".parse::<AccentPreset>(), Ok(AccentPreset::Middle));
        assert!("loud".parse::<AccentPreset>().is_err());
    }

    #[test]
    fn test_duration_text() {
        assert_eq!("12".parse(), Ok(PartDuration::Measures(12)));
        assert_eq!("30s".parse(), Ok(PartDuration::Seconds(30.0)));
        assert_eq!(" 2M ".parse(), Ok(PartDuration::Seconds(120.0)));
        assert_eq!("1.5m".parse(), Ok(PartDuration::Seconds(90.0)));

        assert!("0".parse::<PartDuration>().is_err());
        assert!("1.5".parse::<PartDuration>().is_err());
        assert!("0s".parse::<PartDuration>().is_err());
        assert!("abc".parse::<PartDuration>().is_err());
    }

    #[test]
    fn test_accent_conversion() {
        assert_eq!(Accent::try_from(3), Ok(Accent::Strong));
        assert_eq!(Accent::try_from(4), Err(TaskError::InvalidAccent(4)));
        assert_eq!(u8::from(Accent::Medium), 2);
        assert!(!Accent::Silent.is_audible());
        assert_eq!(TransitionLevel::try_from(2), Ok(TransitionLevel::Warning));
    }

    #[test]
    fn test_total_duration() {
        let task = MetronomeTask::new(vec![
            TaskPart::new(PartDuration::Measures(2)),
            TaskPart::new(PartDuration::Seconds(3.0)).with_bpm(120.0),
        ])
        .unwrap();

        // 2 * 4s + 2 * 2s
        assert_eq!(task.total_duration(), 12.0);
    }

    #[test]
    fn test_task_json() {
        let json = r#"{
            "parts": [
                { "name": "warmup", "bpm": 90, "duration": { "seconds": 30 } },
                {
                    "signature": { "numerator": 3, "denominator": 4 },
                    "beat_divider": 2,
                    "beat_accents": { "0": 3, "2": 0 },
                    "duration": { "measures": 8 }
                }
            ]
        }"#;

        let task: MetronomeTask = serde_json::from_str(json).unwrap();
        assert!(task.validate().is_ok());
        assert_eq!(task.parts()[0].name.as_deref(), Some("warmup"));
        assert_eq!(task.parts()[0].duration, PartDuration::Seconds(30.0));
        assert_eq!(task.parts()[1].signature, TimeSignature::three_four());
        assert_eq!(task.parts()[1].beat_accents.get(2), Accent::Silent);
        assert_eq!(task.parts()[1].beat_accents.get(1), Accent::Normal);
    }
}
