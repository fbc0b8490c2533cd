//! Error taxonomy for status accessors and wait operations.

use std::time::Duration;

use thiserror::Error;

/// Failure modes of a status accessor.
///
/// `NotFound` is distinguished because deletion waits and cleanup passes
/// treat it as success; every other accessor failure is opaque to the
/// engine and propagated without retry.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The resource no longer exists (or never did).
    #[error("resource not found")]
    NotFound,

    /// Any other failure surfaced by the status query.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AccessError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Failures surfaced by a wait operation.
///
/// Every variant carries enough context to diagnose the failure without
/// re-running the test: the resource, the awaited condition, and the
/// observed state.
#[derive(Debug, Error)]
pub enum WaitError {
    /// Budget exhausted without reaching the target or a terminal state.
    #[error(
        "timed out after {elapsed:?} waiting for {subject} \
         (budget {budget:?}); last observed: {last_observed}"
    )]
    Timeout {
        /// What was being waited for, e.g. `server 1f3a to reach status "ACTIVE"`.
        subject: String,
        /// Effective budget, including any grace period.
        budget: Duration,
        elapsed: Duration,
        /// Rendered last observed state, `status/task_state`.
        last_observed: String,
    },

    /// The resource entered a kind-specific unrecoverable state.
    #[error("{target} entered terminal state: {detail}")]
    Terminal { target: String, detail: String },

    /// The status query failed in a way the engine does not interpret.
    #[error("status query for {target} failed")]
    Unexpected {
        target: String,
        #[source]
        source: anyhow::Error,
    },
}
