//! Compute service client: servers.

use std::time::Duration;

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

/// Server representation, limited to what the waits require.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerDetail {
    pub id: String,
    pub name: String,
    pub status: String,

    /// In-progress task marker; clears once housekeeping completes.
    #[serde(default)]
    pub task_state: Option<String>,

    /// Fault payload, populated when `status` is `ERROR`.
    #[serde(default)]
    pub fault: Option<String>,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl ServerDetail {
    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            status: self.status.clone(),
            task_state: self.task_state.clone(),
            fault: self.fault.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub flavor: String,
    pub image: String,
}

#[derive(Debug, Deserialize)]
struct ServerList {
    items: Vec<ServerDetail>,
}

/// Options for one server status wait.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    /// Hold until the task state clears after the status matches, then
    /// settle one extra interval.
    pub ready_wait: bool,

    /// Additive grace on top of the configured build timeout.
    pub extra_timeout: Option<Duration>,

    /// Treat an `ERROR` status as terminal. Disable to keep polling through
    /// `ERROR` when a scenario expects it as an intermediate state.
    pub raise_on_error: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            ready_wait: true,
            extra_timeout: None,
            raise_on_error: true,
        }
    }
}

/// Client for the compute service.
#[derive(Debug, Clone)]
pub struct ComputeClient {
    api: ApiClient,
    budget: PollBudget,
    ready_wait: bool,
}

impl ComputeClient {
    pub fn new(config: &ProbeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            api: ApiClient::new(&config.endpoints.compute, config.auth_token.as_deref())?,
            budget: config.compute.budget(),
            ready_wait: config.compute.ready_wait,
        })
    }

    /// Override the configured poll budget.
    pub fn with_budget(mut self, budget: PollBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Default wait options per the configured ready-wait policy.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            ready_wait: self.ready_wait,
            ..WaitOptions::default()
        }
    }

    pub async fn create_server(
        &self,
        request: &CreateServerRequest,
    ) -> Result<ServerDetail, ClientError> {
        let server: ServerDetail = self.api.post("/v1/servers", request).await?;
        info!(server_id = %server.id, name = %server.name, "created server");
        Ok(server)
    }

    pub async fn get_server(&self, id: &str) -> Result<ServerDetail, ClientError> {
        self.api.get(&format!("/v1/servers/{id}")).await
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerDetail>, ClientError> {
        let list: ServerList = self.api.get("/v1/servers").await?;
        Ok(list.items)
    }

    pub async fn delete_server(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/servers/{id}")).await
    }

    /// Wait until the server reports `status`.
    pub async fn wait_for_server_status(
        &self,
        id: &str,
        status: &str,
        options: WaitOptions,
    ) -> Result<StateSnapshot, ClientError> {
        let policy = ServerStatusPolicy {
            api: self.api.clone(),
            target: PollTarget::new(ResourceKind::Server, id),
            wanted: status.to_string(),
            ready_wait: options.ready_wait,
            raise_on_error: options.raise_on_error,
        };

        let mut budget = self.budget;
        if let Some(extra) = options.extra_timeout {
            budget = budget.with_extra_timeout(extra);
        }

        Ok(converge(&policy, budget).await?)
    }

    /// Wait until the server is gone, failing fast if it lands in `ERROR`.
    pub async fn wait_for_termination(
        &self,
        id: &str,
        ignore_error: bool,
    ) -> Result<(), ClientError> {
        let policy = ServerGonePolicy {
            api: self.api.clone(),
            target: PollTarget::new(ResourceKind::Server, id),
            ignore_error,
        };
        Ok(wait_for_deletion(&policy, self.budget).await?)
    }

    /// Delete the server and wait for it to disappear.
    pub async fn delete_and_wait(&self, id: &str) -> Result<(), ClientError> {
        self.delete_server(id).await?;
        self.wait_for_termination(id, false).await
    }
}

async fn fetch_snapshot(api: &ApiClient, id: &str) -> Result<StateSnapshot, AccessError> {
    let detail: ServerDetail = api
        .get(&format!("/v1/servers/{id}"))
        .await
        .map_err(AccessError::from)?;
    Ok(detail.snapshot())
}

struct ServerStatusPolicy {
    api: ApiClient,
    target: PollTarget,
    wanted: String,
    ready_wait: bool,
    raise_on_error: bool,
}

#[async_trait]
impl StatePolicy for ServerStatusPolicy {
    fn target(&self) -> &PollTarget {
        &self.target
    }

    fn describe_condition(&self) -> String {
        format!("status {:?}", self.wanted)
    }

    async fn fetch(&self) -> Result<StateSnapshot, AccessError> {
        fetch_snapshot(&self.api, &self.target.id).await
    }

    fn is_target_reached(&self, snapshot: &StateSnapshot) -> bool {
        if self.wanted == "BUILD" {
            // Waiting for an in-progress status is satisfied by any live
            // status other than UNKNOWN.
            return snapshot.status != "UNKNOWN";
        }
        if snapshot.status != self.wanted {
            return false;
        }
        !self.ready_wait || snapshot.task_state.is_none()
    }

    fn is_terminal_error(&self, snapshot: &StateSnapshot) -> Option<String> {
        if !self.raise_on_error || self.wanted == "ERROR" || snapshot.status != "ERROR" {
            return None;
        }
        Some(
            snapshot
                .fault
                .clone()
                .unwrap_or_else(|| "server reported status ERROR".to_string()),
        )
    }

    fn settle_after_reached(&self) -> bool {
        self.ready_wait && self.wanted != "BUILD"
    }
}

struct ServerGonePolicy {
    api: ApiClient,
    target: PollTarget,
    ignore_error: bool,
}

#[async_trait]
impl StatePolicy for ServerGonePolicy {
    fn target(&self) -> &PollTarget {
        &self.target
    }

    fn describe_condition(&self) -> String {
        "deletion".to_string()
    }

    async fn fetch(&self) -> Result<StateSnapshot, AccessError> {
        fetch_snapshot(&self.api, &self.target.id).await
    }

    fn is_target_reached(&self, _snapshot: &StateSnapshot) -> bool {
        false
    }

    fn is_terminal_error(&self, snapshot: &StateSnapshot) -> Option<String> {
        if self.ignore_error || snapshot.status != "ERROR" {
            return None;
        }
        Some(
            snapshot
                .fault
                .clone()
                .unwrap_or_else(|| "server reported status ERROR while deleting".to_string()),
        )
    }

    fn satisfied_when_gone(&self) -> bool {
        true
    }
}
