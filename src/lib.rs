// Practice Metronome - Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod driver;
pub mod messaging;
pub mod sequencer;
pub mod testing;

// Re-export commonly used types for convenience
pub use audio::export::{ExportSettings, ExportSummary, export_wav};
pub use audio::player::{QueuedPlayer, QueuedPlayerFactory};
pub use audio::timing::AudioTiming;
pub use audio::{AudioClock, Player, PlayerError, PlayerFactory};
pub use config::{ConfigError, DriftConfig, EngineConfig, LookaheadConfig, load_task};
pub use driver::{TimerDriven, run_realtime};
pub use messaging::{ClickEvent, EventControl, SubscriptionId, TransitionEvent};
pub use sequencer::{
    Accent, AccentPreset, BeatAccents, Metronome, MetronomeError, MetronomeTask, PartDuration,
    Position, TaskPart, Tempo, TimeSignature, TransitionLevel, TransportState,
};
