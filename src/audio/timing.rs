// Audio timing - Sample counter used as the player's clock
// Only the render callback advances it, and not while suspended

use super::AudioClock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared audio timing state
#[derive(Clone, Debug)]
pub struct AudioTiming {
    /// Frames rendered so far (incremented by audio callback)
    sample_position: Arc<AtomicU64>,
    /// Set by the control side, observed by the audio callback
    suspended: Arc<AtomicBool>,
    /// Sample rate (for timestamp conversions)
    sample_rate: f64,
}

impl AudioTiming {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            suspended: Arc::new(AtomicBool::new(false)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Get current sample position
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Acquire)
    }

    /// Advance sample position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::AcqRel);
    }

    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::Release);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    /// First frame at or after `seconds`
    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).ceil() as u64
    }

    pub fn samples_to_seconds(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate as u32
    }
}

impl AudioClock for AudioTiming {
    fn current_time(&self) -> f64 {
        self.samples_to_seconds(self.current_sample())
    }
}
