//! Resource lifecycle tracking and idempotent cleanup.
//!
//! Each test suite owns one tracker per resource kind. Ids are appended when
//! a resource is created and removed individually when a delete-and-wait
//! succeeds; whatever remains at teardown is swept by [`cleanup_all`].
//!
//! # Invariants
//!
//! - A tracker never retains an id whose resource has been successfully
//!   deleted.
//! - Cleanup is attempted in insertion order; each attempt is isolated from
//!   the others' outcomes.
//! - "Already gone" during cleanup is success, not failure, and is the only
//!   error kind suppressed.
//!
//! [`cleanup_all`]: ResourceTracker::cleanup_all

use std::future::Future;

use nimbus_convergence::AccessError;
use tracing::{debug, warn};

/// Ordered registry of created resource ids for one resource kind.
#[derive(Debug)]
pub struct ResourceTracker {
    label: &'static str,
    ids: Vec<String>,
}

impl ResourceTracker {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            ids: Vec::new(),
        }
    }

    /// Kind label used in logs and reports, e.g. `"server"` or `"port"`.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Register a created resource for teardown.
    pub fn track(&mut self, id: impl Into<String>) {
        let id = id.into();
        debug!(kind = self.label, id = %id, "tracking resource");
        self.ids.push(id);
    }

    /// Remove an id after its resource was deleted by the test body.
    pub fn untrack(&mut self, id: &str) {
        self.ids.retain(|tracked| tracked != id);
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Best-effort deletion of every tracked resource, in insertion order.
    ///
    /// Not-found is swallowed — the test body may already have deleted the
    /// resource. Any other error is recorded in the report and the id is
    /// retained, but cleanup of the remaining ids proceeds regardless.
    pub async fn cleanup_all<F, Fut>(&mut self, mut delete_fn: F) -> CleanupReport
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<(), AccessError>>,
    {
        let mut report = CleanupReport::new(self.label);
        let mut retained = Vec::new();

        for id in self.ids.drain(..) {
            match delete_fn(id.clone()).await {
                Ok(()) => {
                    debug!(kind = self.label, id = %id, "cleaned up resource");
                    report.deleted.push(id);
                }
                Err(AccessError::NotFound) => {
                    debug!(kind = self.label, id = %id, "resource already gone");
                    report.already_gone.push(id);
                }
                Err(error) => {
                    warn!(kind = self.label, id = %id, error = %error, "cleanup failed");
                    retained.push(id.clone());
                    report.failed.push(CleanupFailure { id, error });
                }
            }
        }

        self.ids = retained;
        report
    }
}

/// One id whose cleanup attempt failed with a non-not-found error.
#[derive(Debug)]
pub struct CleanupFailure {
    pub id: String,
    pub error: AccessError,
}

/// Outcome of one [`ResourceTracker::cleanup_all`] pass.
#[derive(Debug)]
pub struct CleanupReport {
    pub label: &'static str,
    pub deleted: Vec<String>,
    pub already_gone: Vec<String>,
    pub failed: Vec<CleanupFailure>,
}

impl CleanupReport {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            deleted: Vec::new(),
            already_gone: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// True when every attempt succeeded or found the resource already gone.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.already_gone.len() + self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_deleted_and_gone_ids() {
        let mut tracker = ResourceTracker::new("volume");
        tracker.track("vol-1");
        tracker.track("vol-2");

        let report = tracker
            .cleanup_all(|id| async move {
                if id == "vol-2" {
                    Err(AccessError::NotFound)
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(report.is_clean());
        assert_eq!(report.deleted, vec!["vol-1"]);
        assert_eq!(report.already_gone, vec!["vol-2"]);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_isolation_continues_past_failures() {
        let mut tracker = ResourceTracker::new("server");
        tracker.track("a");
        tracker.track("b");
        tracker.track("c");

        let attempted = Mutex::new(Vec::new());
        let report = tracker
            .cleanup_all(|id| {
                attempted.lock().unwrap().push(id.clone());
                async move {
                    if id == "b" {
                        Err(AccessError::Other(anyhow::anyhow!("conflict")))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(*attempted.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(!report.is_clean());
        assert_eq!(report.deleted, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "b");
        // The failed id stays tracked; the others are gone.
        assert_eq!(tracker.ids(), ["b"]);
    }

    #[tokio::test]
    async fn test_cleanup_preserves_insertion_order() {
        let mut tracker = ResourceTracker::new("port");
        for id in ["p1", "p2", "p3", "p4"] {
            tracker.track(id);
        }

        let seen = Mutex::new(Vec::new());
        tracker
            .cleanup_all(|id| {
                seen.lock().unwrap().push(id);
                async { Ok(()) }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec!["p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn test_untrack_removes_only_matching_id() {
        let mut tracker = ResourceTracker::new("image");
        tracker.track("img-1");
        tracker.track("img-2");

        tracker.untrack("img-1");

        assert_eq!(tracker.ids(), ["img-2"]);
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_of_empty_tracker_is_noop() {
        let mut tracker = ResourceTracker::new("alarm");
        let report = tracker.cleanup_all(|_| async { Ok(()) }).await;
        assert!(report.is_clean());
        assert_eq!(report.attempted(), 0);
    }
}
