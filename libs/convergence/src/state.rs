//! Identities and observed state of remote resources.

use std::fmt;

/// Resource kinds the harness polls.
///
/// The kind selects which status accessor and classification policy apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Server,
    Volume,
    Snapshot,
    Image,
    Alarm,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Volume => "volume",
            Self::Snapshot => "snapshot",
            Self::Image => "image",
            Self::Alarm => "alarm",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote resource being waited upon.
///
/// Constructed transiently at the call site and discarded after the wait
/// returns; it owns no persistent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    /// Opaque handle assigned by the remote service at creation.
    pub id: String,

    /// Selects the status accessor and classification policy.
    pub kind: ResourceKind,
}

impl PollTarget {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

impl fmt::Display for PollTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Observed state of a remote resource at one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Primary status string as reported by the service.
    pub status: String,

    /// Secondary sub-state, when the service reports in-progress housekeeping
    /// (e.g. a task marker that clears after the primary status flips).
    pub task_state: Option<String>,

    /// Free-form fault payload, populated when the status indicates failure.
    pub fault: Option<String>,
}

impl StateSnapshot {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            task_state: None,
            fault: None,
        }
    }

    pub fn with_task_state(mut self, task_state: impl Into<String>) -> Self {
        self.task_state = Some(task_state.into());
        self
    }

    pub fn with_fault(mut self, fault: impl Into<String>) -> Self {
        self.fault = Some(fault.into());
        self
    }

    /// The (status, sub-state) pair used to detect transitions between polls.
    pub fn transition_pair(&self) -> (&str, Option<&str>) {
        (self.status.as_str(), self.task_state.as_deref())
    }
}

/// Renders as `status/task_state`, e.g. `BUILD/spawning` or `ACTIVE/None`.
impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.status,
            self.task_state.as_deref().unwrap_or("None")
        )
    }
}
