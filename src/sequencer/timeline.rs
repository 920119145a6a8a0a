// Timeline - Time signature, tempo and measure geometry
// Turns a part's musical parameters into absolute intervals in seconds

use std::fmt;

/// Time signature (numerator/denominator)
/// Example: 7/8 time = TimeSignature { numerator: 7, denominator: 8 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per measure
    pub denominator: u8, // Beat unit the tempo is counted in
}

impl TimeSignature {
    /// Largest accepted numerator or denominator
    pub const MAX_VALUE: u8 = 128;

    /// Creates a new time signature
    pub const fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Common 4/4 time signature
    pub const fn four_four() -> Self {
        Self::new(4, 4)
    }

    /// Common 3/4 time signature (waltz)
    pub const fn three_four() -> Self {
        Self::new(3, 4)
    }

    /// Number of beats per measure
    pub fn beats_per_measure(&self) -> u32 {
        self.numerator as u32
    }

    /// Both values are integers in [1, 128]
    pub fn is_valid(&self) -> bool {
        (1..=Self::MAX_VALUE).contains(&self.numerator)
            && (1..=Self::MAX_VALUE).contains(&self.denominator)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Tempo in beats of the signature's denominator per minute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Lowest tempo accepted by task validation
    pub const MIN_BPM: f64 = 0.1;
    /// Highest tempo accepted by task validation
    pub const MAX_BPM: f64 = 360.0;

    /// Creates a new tempo
    /// Range checks belong to task validation, see [`Tempo::is_valid`]
    pub fn new(bpm: f64) -> Self {
        debug_assert!(bpm > 0.0, "BPM must be positive");
        Self { bpm }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn is_valid(&self) -> bool {
        self.bpm.is_finite() && (Self::MIN_BPM..=Self::MAX_BPM).contains(&self.bpm)
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one measure in seconds at given time signature
    pub fn measure_duration_seconds(&self, time_signature: &TimeSignature) -> f64 {
        self.beat_duration_seconds() * time_signature.beats_per_measure() as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(60.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Absolute intervals of one measure of a part
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureGeometry {
    pub beats_count: u32,
    pub beat_divider: u32,
    /// Seconds per beat
    pub beat_duration: f64,
    /// Seconds per measure
    pub duration: f64,
    /// Seconds between two notes of one beat
    pub note_interval: f64,
    /// `beat_divider` evenly spaced offsets inside a beat, the first one is 0
    pub beat_note_offsets: Vec<f64>,
}

impl MeasureGeometry {
    /// Computes the geometry for a validated signature, tempo and divider
    pub fn new(signature: TimeSignature, tempo: Tempo, beat_divider: u32) -> Self {
        debug_assert!(signature.numerator >= 1, "signature numerator must be >= 1");
        debug_assert!(beat_divider >= 1, "beat divider must be >= 1");

        let beat_duration = tempo.beat_duration_seconds();
        let note_interval = beat_duration / beat_divider as f64;
        let beat_note_offsets = (0..beat_divider)
            .map(|index| index as f64 * note_interval)
            .collect();

        Self {
            beats_count: signature.beats_per_measure(),
            beat_divider,
            beat_duration,
            duration: tempo.measure_duration_seconds(&signature),
            note_interval,
            beat_note_offsets,
        }
    }

    /// Offset of a note from the start of its measure
    pub fn note_offset(&self, beat_index: u32, note_index: u32) -> f64 {
        beat_index as f64 * self.beat_duration + self.beat_note_offsets[note_index as usize]
    }
}
