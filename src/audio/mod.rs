// Module audio - Player boundary and click rendering
// The engine only talks to a player through the traits below

pub mod click;
#[cfg(feature = "device")]
pub mod device;
pub mod export;
pub mod parameters;
pub mod player;
pub mod timing;

pub use crate::sequencer::task::{Accent, TransitionLevel};

/// Monotonic audio time in seconds
pub trait AudioClock {
    fn current_time(&self) -> f64;
}

/// Sound output that plays clicks at audio clock timestamps.
/// Its clock freezes while suspended, so queued sounds keep their place.
pub trait Player: AudioClock {
    type Clock: AudioClock + Clone + 'static;

    /// Cheap handle reading this player's clock
    fn clock(&self) -> Self::Clock;

    /// Queues a click, returns the time its sound ends
    fn schedule_click(&mut self, at: f64, accent: Accent) -> f64;

    /// Queues a transition cue, returns the time its sound ends
    fn schedule_transition(&mut self, at: f64, level: TransitionLevel) -> f64;

    /// Sounds that can still be queued without dropping any
    fn queue_space(&self) -> usize;

    fn suspend(&mut self);
    fn resume(&mut self);

    /// Releases the output; nothing is played afterwards
    fn close(&mut self);

    fn master_volume(&self) -> f32;
    fn set_master_volume(&mut self, volume: f32);
}

/// Creates a fresh player for every playback session
pub trait PlayerFactory {
    type Player: Player;

    fn create(&mut self) -> Result<Self::Player, PlayerError>;
}

/// Clock type of the players a factory creates
pub type ClockOf<F> = <<F as PlayerFactory>::Player as Player>::Clock;

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("no output device available")]
    NoDevice,

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}
