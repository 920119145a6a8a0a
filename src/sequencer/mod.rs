// Sequencer module - Practice tasks and drift-corrected playback
// Task model, position cursor, host timers and the playback facade

pub mod cursor;
pub mod metronome;
pub mod scheduler;
pub mod stopwatch;
pub mod task;
pub mod timeline;
pub mod timer;
pub mod transport;
pub mod wake_lock;

pub use cursor::{Position, PositionCursor, TaskPlan};
pub use metronome::{Metronome, MetronomeError};
pub use scheduler::NoteScheduler;
pub use stopwatch::{Stopwatch, StopwatchError, StopwatchState};
pub use task::{
    Accent, AccentPreset, BeatAccents, MetronomeTask, PartDuration, TaskError, TaskPart,
    TransitionLevel,
};
pub use timeline::{MeasureGeometry, Tempo, TimeSignature};
pub use timer::{HostClock, ManualHostClock, SystemHostClock, TimerToken};
pub use transport::TransportState;
pub use wake_lock::{NoWakeLock, WakeLease, WakeLock};
