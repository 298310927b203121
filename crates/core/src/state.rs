//! Pipeline State: the lifecycle C11 enforces.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Starting,
    Listening,
    Paused,
    Stopping,
    Error,
}

impl PipelineState {
    /// Only `Listening` and `Paused` ever see audio frames; `Paused` drops
    /// them silently rather than rejecting them.
    pub fn accepts_audio(self) -> bool {
        matches!(self, PipelineState::Listening | PipelineState::Paused)
    }

    /// Whether `to` is a legal transition from `self`. Any state may move to
    /// `Error`. Otherwise the lifecycle is linear with a Listening/Paused
    /// toggle.
    pub fn can_transition_to(self, to: PipelineState) -> bool {
        use PipelineState::*;
        if to == Error {
            return true;
        }
        matches!(
            (self, to),
            (Idle, Starting)
                | (Starting, Listening)
                | (Listening, Paused)
                | (Paused, Listening)
                | (Listening, Stopping)
                | (Paused, Stopping)
                | (Stopping, Idle)
                | (Error, Idle)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_lifecycle_is_legal() {
        assert!(PipelineState::Idle.can_transition_to(PipelineState::Starting));
        assert!(PipelineState::Starting.can_transition_to(PipelineState::Listening));
        assert!(PipelineState::Listening.can_transition_to(PipelineState::Paused));
        assert!(PipelineState::Paused.can_transition_to(PipelineState::Listening));
        assert!(PipelineState::Listening.can_transition_to(PipelineState::Stopping));
        assert!(PipelineState::Stopping.can_transition_to(PipelineState::Idle));
    }

    #[test]
    fn any_state_can_error() {
        assert!(PipelineState::Listening.can_transition_to(PipelineState::Error));
        assert!(PipelineState::Idle.can_transition_to(PipelineState::Error));
    }

    #[test]
    fn idle_cannot_jump_to_listening() {
        assert!(!PipelineState::Idle.can_transition_to(PipelineState::Listening));
    }

    #[test]
    fn only_listening_and_paused_accept_audio() {
        assert!(PipelineState::Listening.accepts_audio());
        assert!(PipelineState::Paused.accepts_audio());
        assert!(!PipelineState::Idle.accepts_audio());
        assert!(!PipelineState::Stopping.accepts_audio());
    }
}
