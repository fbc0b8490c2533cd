//! Block storage service client: volumes and snapshots.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_convergence::{
    converge, wait_for_deletion, AccessError, PollBudget, PollTarget, ResourceKind, StatePolicy,
    StateSnapshot,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProbeConfig;
use crate::error::ClientError;
use crate::http::ApiClient;

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeDetail {
    pub id: String,
    pub name: String,
    pub status: String,
    pub size_gb: u64,

    #[serde(default)]
    pub fault: Option<String>,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotDetail {
    pub id: String,
    pub volume_id: String,
    pub name: String,
    pub status: String,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    pub size_gb: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSnapshotRequest {
    pub volume_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct VolumeList {
    items: Vec<VolumeDetail>,
}

#[derive(Debug, Deserialize)]
struct SnapshotList {
    items: Vec<SnapshotDetail>,
}

/// Client for the block storage service.
#[derive(Debug, Clone)]
pub struct VolumeClient {
    api: ApiClient,
    budget: PollBudget,
}

impl VolumeClient {
    pub fn new(config: &ProbeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            api: ApiClient::new(&config.endpoints.volume, config.auth_token.as_deref())?,
            budget: config.volume.budget(),
        })
    }

    /// Override the configured poll budget.
    pub fn with_budget(mut self, budget: PollBudget) -> Self {
        self.budget = budget;
        self
    }

    pub async fn create_volume(
        &self,
        request: &CreateVolumeRequest,
    ) -> Result<VolumeDetail, ClientError> {
        let volume: VolumeDetail = self.api.post("/v1/volumes", request).await?;
        info!(volume_id = %volume.id, size_gb = volume.size_gb, "created volume");
        Ok(volume)
    }

    pub async fn get_volume(&self, id: &str) -> Result<VolumeDetail, ClientError> {
        self.api.get(&format!("/v1/volumes/{id}")).await
    }

    pub async fn list_volumes(&self) -> Result<Vec<VolumeDetail>, ClientError> {
        let list: VolumeList = self.api.get("/v1/volumes").await?;
        Ok(list.items)
    }

    pub async fn delete_volume(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/volumes/{id}")).await
    }

    pub async fn create_snapshot(
        &self,
        request: &CreateSnapshotRequest,
    ) -> Result<SnapshotDetail, ClientError> {
        let snapshot: SnapshotDetail = self.api.post("/v1/snapshots", request).await?;
        info!(snapshot_id = %snapshot.id, volume_id = %snapshot.volume_id, "created snapshot");
        Ok(snapshot)
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<SnapshotDetail, ClientError> {
        self.api.get(&format!("/v1/snapshots/{id}")).await
    }

    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotDetail>, ClientError> {
        let list: SnapshotList = self.api.get("/v1/snapshots").await?;
        Ok(list.items)
    }

    pub async fn delete_snapshot(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/snapshots/{id}")).await
    }

    /// Wait until the volume reports `status`.
    pub async fn wait_for_volume_status(
        &self,
        id: &str,
        status: &str,
    ) -> Result<StateSnapshot, ClientError> {
        let policy = self.status_policy(ResourceKind::Volume, id, status);
        Ok(converge(&policy, self.budget).await?)
    }

    /// Wait until the snapshot reports `status`.
    pub async fn wait_for_snapshot_status(
        &self,
        id: &str,
        status: &str,
    ) -> Result<StateSnapshot, ClientError> {
        let policy = self.status_policy(ResourceKind::Snapshot, id, status);
        Ok(converge(&policy, self.budget).await?)
    }

    /// Wait until the volume is gone; `error_deleting` fails immediately.
    pub async fn wait_for_volume_deletion(&self, id: &str) -> Result<(), ClientError> {
        let policy = self.gone_policy(ResourceKind::Volume, id);
        Ok(wait_for_deletion(&policy, self.budget).await?)
    }

    /// Wait until the snapshot is gone; `error_deleting` fails immediately.
    pub async fn wait_for_snapshot_deletion(&self, id: &str) -> Result<(), ClientError> {
        let policy = self.gone_policy(ResourceKind::Snapshot, id);
        Ok(wait_for_deletion(&policy, self.budget).await?)
    }

    fn status_policy(&self, kind: ResourceKind, id: &str, wanted: &str) -> BlockStatusPolicy {
        BlockStatusPolicy {
            api: self.api.clone(),
            path: status_path(kind, id),
            target: PollTarget::new(kind, id),
            wanted: wanted.to_string(),
        }
    }

    fn gone_policy(&self, kind: ResourceKind, id: &str) -> BlockGonePolicy {
        BlockGonePolicy {
            api: self.api.clone(),
            path: status_path(kind, id),
            target: PollTarget::new(kind, id),
        }
    }
}

fn status_path(kind: ResourceKind, id: &str) -> String {
    match kind {
        ResourceKind::Snapshot => format!("/v1/snapshots/{id}"),
        _ => format!("/v1/volumes/{id}"),
    }
}

/// Status body shared by volumes and snapshots; polling needs no more.
#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,

    #[serde(default)]
    fault: Option<String>,
}

async fn fetch_status(api: &ApiClient, path: &str) -> Result<StateSnapshot, AccessError> {
    let body: StatusBody = api.get(path).await.map_err(AccessError::from)?;
    Ok(StateSnapshot {
        status: body.status,
        task_state: None,
        fault: body.fault,
    })
}

struct BlockStatusPolicy {
    api: ApiClient,
    path: String,
    target: PollTarget,
    wanted: String,
}

#[async_trait]
impl StatePolicy for BlockStatusPolicy {
    fn target(&self) -> &PollTarget {
        &self.target
    }

    fn describe_condition(&self) -> String {
        format!("status {:?}", self.wanted)
    }

    async fn fetch(&self) -> Result<StateSnapshot, AccessError> {
        fetch_status(&self.api, &self.path).await
    }

    fn is_target_reached(&self, snapshot: &StateSnapshot) -> bool {
        snapshot.status == self.wanted
    }

    fn is_terminal_error(&self, snapshot: &StateSnapshot) -> Option<String> {
        if snapshot.status != "error" || self.wanted == "error" {
            return None;
        }
        Some(
            snapshot
                .fault
                .clone()
                .unwrap_or_else(|| format!("{} reported status error", self.target.kind)),
        )
    }
}

struct BlockGonePolicy {
    api: ApiClient,
    path: String,
    target: PollTarget,
}

#[async_trait]
impl StatePolicy for BlockGonePolicy {
    fn target(&self) -> &PollTarget {
        &self.target
    }

    fn describe_condition(&self) -> String {
        "deletion".to_string()
    }

    async fn fetch(&self) -> Result<StateSnapshot, AccessError> {
        fetch_status(&self.api, &self.path).await
    }

    fn is_target_reached(&self, _snapshot: &StateSnapshot) -> bool {
        false
    }

    fn is_terminal_error(&self, snapshot: &StateSnapshot) -> Option<String> {
        if snapshot.status != "error_deleting" {
            return None;
        }
        Some(
            snapshot
                .fault
                .clone()
                .unwrap_or_else(|| format!("{} reported status error_deleting", self.target.kind)),
        )
    }

    fn satisfied_when_gone(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn snapshot(status: &str) -> StateSnapshot {
        StateSnapshot::new(status)
    }

    #[rstest]
    #[case(ResourceKind::Volume, "/v1/volumes/abc")]
    #[case(ResourceKind::Snapshot, "/v1/snapshots/abc")]
    fn test_status_path_per_kind(#[case] kind: ResourceKind, #[case] expected: &str) {
        assert_eq!(status_path(kind, "abc"), expected);
    }

    #[test]
    fn test_error_is_terminal_for_status_waits() {
        let client = VolumeClient {
            api: ApiClient::new("http://127.0.0.1:1", None).unwrap(),
            budget: PollBudget::from_secs(1, 60),
        };
        let policy = client.status_policy(ResourceKind::Volume, "vol-1", "available");

        assert!(policy.is_target_reached(&snapshot("available")));
        assert!(!policy.is_target_reached(&snapshot("creating")));
        assert_eq!(
            policy.is_terminal_error(&snapshot("error")).as_deref(),
            Some("volume reported status error")
        );
        assert!(policy.is_terminal_error(&snapshot("creating")).is_none());
    }

    #[test]
    fn test_error_deleting_is_terminal_only_for_deletion_waits() {
        let client = VolumeClient {
            api: ApiClient::new("http://127.0.0.1:1", None).unwrap(),
            budget: PollBudget::from_secs(1, 60),
        };

        let status = client.status_policy(ResourceKind::Snapshot, "snap-1", "available");
        assert!(status.is_terminal_error(&snapshot("error_deleting")).is_none());

        let gone = client.gone_policy(ResourceKind::Snapshot, "snap-1");
        assert_eq!(
            gone.is_terminal_error(&snapshot("error_deleting")).as_deref(),
            Some("snapshot reported status error_deleting")
        );
        assert!(gone.is_terminal_error(&snapshot("deleting")).is_none());
        assert!(!gone.is_target_reached(&snapshot("deleting")));
    }
}
