//! Controller phase state machine.
//!
//! ```text
//! Idle -> Running            (execute)
//! Running -> Running         (execute again: implicit supersede)
//! Running -> Idle            (terminal result or cancel)
//! Idle/Running -> Shutdown   (teardown)
//! Shutdown -> (nothing)      (terminal, no operation is valid)
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle phase of an [`OperationController`](crate::OperationController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    Idle,
    Running,
    Shutdown,
}

impl ControllerPhase {
    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_transition_to(self, to: ControllerPhase) -> bool {
        match self {
            ControllerPhase::Idle => matches!(to, ControllerPhase::Running | ControllerPhase::Shutdown),
            ControllerPhase::Running => true,
            ControllerPhase::Shutdown => false,
        }
    }

    /// Returns `true` if no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, ControllerPhase::Shutdown)
    }
}
