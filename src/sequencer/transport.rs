// Transport - Playback state of the metronome facade

use std::fmt;

/// Transport state (stopped/playing/paused/finished)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No task loaded, or torn down by stop
    #[default]
    Stopped,
    Playing,
    /// Position kept, resumable
    Paused,
    /// Task played to its end; resuming starts it over
    Finished,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    /// Check if a resume would continue or restart something
    pub fn is_resumable(&self) -> bool {
        matches!(self, TransportState::Paused | TransportState::Finished)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        !self.is_playing()
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Stopped => "stopped",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
            TransportState::Finished => "finished",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state() {
        let state = TransportState::Playing;
        assert!(state.is_playing());
        assert!(!state.is_stopped());
        assert!(!state.is_resumable());

        assert!(TransportState::Paused.is_resumable());
        assert!(TransportState::Finished.is_resumable());
        assert!(!TransportState::Stopped.is_resumable());
        assert_eq!(TransportState::default(), TransportState::Stopped);
        assert_eq!(TransportState::Finished.to_string(), "finished");
    }
}
