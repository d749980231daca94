//! Session lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session lifecycle
///
/// `Created -> Listening -> Finalizing -> Responding -> Listening`, with
/// `Terminated` reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Created,
    Listening,
    Finalizing,
    Responding,
    Terminated,
}

impl SessionState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (Created, Listening) => true,
            (Listening, Finalizing) => true,
            (Finalizing, Responding) | (Finalizing, Listening) => true,
            (Responding, Listening) => true,
            _ => false,
        }
    }

    pub fn is_terminated(self) -> bool {
        self == SessionState::Terminated
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Listening => "listening",
            SessionState::Finalizing => "finalizing",
            SessionState::Responding => "responding",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use SessionState::*;
        assert!(Created.can_transition_to(Listening));
        assert!(Finalizing.can_transition_to(Listening));
        assert!(Responding.can_transition_to(Terminated));
        assert!(!Listening.can_transition_to(Responding));
        assert!(!Terminated.can_transition_to(Listening));
    }
}
