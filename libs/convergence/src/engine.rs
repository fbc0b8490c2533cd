//! The condition-wait loop.
//!
//! One loop serves every resource kind. Policies classify snapshots; the
//! engine owns timing, transition logging, and outcome selection. The loop:
//!
//! 1. Fetch the current state.
//! 2. Log the transition if the (status, sub-state) pair changed.
//! 3. Return `Reached` if the policy is satisfied (after an optional settle
//!    sleep).
//! 4. Return `TerminalError` if the policy reports a dead end — a dead
//!    resource is never polled again.
//! 5. Return `TimedOut` if less than one interval of budget remains; the
//!    final check happens at or before the deadline, never after.
//! 6. Sleep one interval and repeat.

use std::future::Future;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::budget::PollBudget;
use crate::error::{AccessError, WaitError};
use crate::outcome::PollOutcome;
use crate::policy::StatePolicy;
use crate::state::StateSnapshot;

/// Poll until the policy resolves the wait.
///
/// Returns `Err` only for accessor failures the engine does not interpret
/// (`WaitError::Unexpected`); every other resolution — including timeout and
/// terminal error — is an `Ok` [`PollOutcome`]. Callers that simply require
/// satisfaction should use [`converge`] or [`wait_for_deletion`].
pub async fn wait_until<P: StatePolicy + ?Sized>(
    policy: &P,
    budget: PollBudget,
) -> Result<PollOutcome, WaitError> {
    let start = Instant::now();
    let total = budget.total_timeout();
    let mut last: Option<StateSnapshot> = None;

    debug!(
        resource = %policy.target(),
        condition = %policy.describe_condition(),
        interval_secs = budget.interval.as_secs_f64(),
        timeout_secs = total.as_secs_f64(),
        "starting wait"
    );

    loop {
        let snapshot = match policy.fetch().await {
            Ok(snapshot) => snapshot,
            Err(AccessError::NotFound) if policy.satisfied_when_gone() => {
                debug!(resource = %policy.target(), "resource gone, wait satisfied");
                return Ok(PollOutcome::Vanished);
            }
            Err(err) => {
                return Err(WaitError::Unexpected {
                    target: policy.target().to_string(),
                    source: err.into(),
                });
            }
        };

        if let Some(previous) = &last {
            if previous.transition_pair() != snapshot.transition_pair() {
                info!(
                    resource = %policy.target(),
                    from = %previous,
                    to = %snapshot,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "state transition"
                );
            }
        }

        if policy.is_target_reached(&snapshot) {
            if policy.settle_after_reached() {
                sleep(budget.interval).await;
            }
            return Ok(PollOutcome::Reached(snapshot));
        }

        if let Some(detail) = policy.is_terminal_error(&snapshot) {
            return Ok(PollOutcome::TerminalError { detail, snapshot });
        }

        let elapsed = start.elapsed();
        if total.saturating_sub(elapsed) < budget.interval {
            return Ok(PollOutcome::TimedOut {
                elapsed,
                last_observed: Some(snapshot),
            });
        }

        last = Some(snapshot);
        sleep(budget.interval).await;
    }
}

/// Poll until the policy is satisfied, mapping every other resolution into
/// the [`WaitError`] taxonomy.
pub async fn converge<P: StatePolicy + ?Sized>(
    policy: &P,
    budget: PollBudget,
) -> Result<StateSnapshot, WaitError> {
    let target = policy.target().to_string();
    match wait_until(policy, budget).await? {
        PollOutcome::Reached(snapshot) => Ok(snapshot),
        PollOutcome::TerminalError { detail, .. } => Err(WaitError::Terminal { target, detail }),
        PollOutcome::TimedOut {
            elapsed,
            last_observed,
        } => Err(WaitError::Timeout {
            subject: format!("{} to reach {}", target, policy.describe_condition()),
            budget: budget.total_timeout(),
            elapsed,
            last_observed: last_observed
                .map(|snapshot| snapshot.to_string())
                .unwrap_or_else(|| "nothing".to_string()),
        }),
        PollOutcome::Vanished => Err(WaitError::Unexpected {
            target,
            source: anyhow::anyhow!("resource vanished during a non-deletion wait"),
        }),
    }
}

/// Poll until the resource is gone.
///
/// The policy must report satisfaction on absence
/// ([`StatePolicy::satisfied_when_gone`]). Any status the policy classifies
/// as a terminal error (e.g. `error_deleting`) fails the wait immediately —
/// the remote side has reported it cannot complete the deletion, and
/// continuing to poll would only hide the failure behind a timeout.
pub async fn wait_for_deletion<P: StatePolicy + ?Sized>(
    policy: &P,
    budget: PollBudget,
) -> Result<(), WaitError> {
    let target = policy.target().to_string();
    match wait_until(policy, budget).await? {
        PollOutcome::Vanished | PollOutcome::Reached(_) => Ok(()),
        PollOutcome::TerminalError { detail, .. } => Err(WaitError::Terminal { target, detail }),
        PollOutcome::TimedOut {
            elapsed,
            last_observed,
        } => Err(WaitError::Timeout {
            subject: format!("{target} to be deleted"),
            budget: budget.total_timeout(),
            elapsed,
            last_observed: last_observed
                .map(|snapshot| snapshot.to_string())
                .unwrap_or_else(|| "nothing".to_string()),
        }),
    }
}

/// Boolean form of the wait contract.
///
/// Evaluates `condition` on the engine's schedule until it returns true or
/// the budget is exhausted. Errors from the condition propagate immediately;
/// the engine does not retry transient failures — callers that want
/// resilience must wrap the condition themselves.
pub async fn wait_for_condition<F, Fut>(
    subject: &str,
    budget: PollBudget,
    mut condition: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = anyhow::Result<bool>> + Send,
{
    let start = Instant::now();
    let total = budget.total_timeout();

    loop {
        match condition().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(source) => {
                return Err(WaitError::Unexpected {
                    target: subject.to_string(),
                    source,
                });
            }
        }

        let elapsed = start.elapsed();
        if total.saturating_sub(elapsed) < budget.interval {
            return Err(WaitError::Timeout {
                subject: subject.to_string(),
                budget: total,
                elapsed,
                last_observed: "condition unsatisfied".to_string(),
            });
        }
        sleep(budget.interval).await;
    }
}
