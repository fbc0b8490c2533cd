//! Results of a wait operation.

use std::time::Duration;

use crate::state::StateSnapshot;

/// The resolution of one wait operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The observed state satisfied the target condition.
    Reached(StateSnapshot),

    /// The resource transitioned into a kind-specific unrecoverable state.
    TerminalError {
        detail: String,
        snapshot: StateSnapshot,
    },

    /// The budget was exhausted before satisfaction or terminal error.
    TimedOut {
        elapsed: Duration,
        last_observed: Option<StateSnapshot>,
    },

    /// The resource no longer exists. Only produced when the wait condition
    /// is deletion; everywhere else disappearance is an error instead.
    Vanished,
}

impl PollOutcome {
    pub fn is_reached(&self) -> bool {
        matches!(self, Self::Reached(_))
    }

    pub fn is_vanished(&self) -> bool {
        matches!(self, Self::Vanished)
    }

    /// The last state observed before resolution, when one exists.
    pub fn last_observed(&self) -> Option<&StateSnapshot> {
        match self {
            Self::Reached(snapshot) | Self::TerminalError { snapshot, .. } => Some(snapshot),
            Self::TimedOut { last_observed, .. } => last_observed.as_ref(),
            Self::Vanished => None,
        }
    }
}
