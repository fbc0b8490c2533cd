//! State-classification policies, one per resource kind.

use async_trait::async_trait;

use crate::error::AccessError;
use crate::state::{PollTarget, StateSnapshot};

/// Per-resource-kind wait policy: how to fetch the current state and how to
/// classify it.
///
/// Each resource client supplies one small policy object per wait; the loop,
/// timing, and transition logging live in the engine and are written once.
#[async_trait]
pub trait StatePolicy: Send + Sync {
    /// The resource this policy observes.
    fn target(&self) -> &PollTarget;

    /// Human-readable description of the awaited condition, used in timeout
    /// messages and logs, e.g. `status "ACTIVE"` or `deletion`.
    fn describe_condition(&self) -> String;

    /// Fetch the current observable state of the target.
    async fn fetch(&self) -> Result<StateSnapshot, AccessError>;

    /// Whether the snapshot satisfies the wait.
    fn is_target_reached(&self, snapshot: &StateSnapshot) -> bool;

    /// Whether the snapshot is an unrecoverable dead end; returns the
    /// diagnostic detail (the service's fault payload when available).
    fn is_terminal_error(&self, snapshot: &StateSnapshot) -> Option<String>;

    /// Whether a not-found result from [`fetch`](Self::fetch) satisfies the
    /// wait. True only for deletion waits.
    fn satisfied_when_gone(&self) -> bool {
        false
    }

    /// Whether to sleep one extra interval after the condition is satisfied,
    /// for services whose primary status flips before secondary housekeeping
    /// completes.
    fn settle_after_reached(&self) -> bool {
        false
    }
}
