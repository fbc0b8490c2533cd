//! Image service client.

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
pub struct ImageDetail {
    pub id: String,
    pub name: String,
    pub status: String,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateImageRequest {
    pub name: String,
    pub disk_format: String,
    pub container_format: String,
}

#[derive(Debug, Deserialize)]
struct ImageList {
    items: Vec<ImageDetail>,
}

/// Client for the image service.
#[derive(Debug, Clone)]
pub struct ImageClient {
    api: ApiClient,
    budget: PollBudget,
}

impl ImageClient {
    pub fn new(config: &ProbeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            api: ApiClient::new(&config.endpoints.image, config.auth_token.as_deref())?,
            budget: config.image.budget(),
        })
    }

    /// Override the configured poll budget.
    pub fn with_budget(mut self, budget: PollBudget) -> Self {
        self.budget = budget;
        self
    }

    pub async fn create_image(
        &self,
        request: &CreateImageRequest,
    ) -> Result<ImageDetail, ClientError> {
        let image: ImageDetail = self.api.post("/v1/images", request).await?;
        info!(image_id = %image.id, name = %image.name, "created image");
        Ok(image)
    }

    pub async fn get_image(&self, id: &str) -> Result<ImageDetail, ClientError> {
        self.api.get(&format!("/v1/images/{id}")).await
    }

    pub async fn list_images(&self) -> Result<Vec<ImageDetail>, ClientError> {
        let list: ImageList = self.api.get("/v1/images").await?;
        Ok(list.items)
    }

    pub async fn delete_image(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/images/{id}")).await
    }

    /// Wait until the image reports `status`; `killed` fails immediately.
    pub async fn wait_for_image_status(
        &self,
        id: &str,
        status: &str,
    ) -> Result<StateSnapshot, ClientError> {
        let policy = ImageStatusPolicy {
            api: self.api.clone(),
            target: PollTarget::new(ResourceKind::Image, id),
            wanted: status.to_string(),
        };
        Ok(converge(&policy, self.budget).await?)
    }

    /// Wait until the image is gone.
    pub async fn wait_until_deleted(&self, id: &str) -> Result<(), ClientError> {
        let policy = ImageGonePolicy {
            api: self.api.clone(),
            target: PollTarget::new(ResourceKind::Image, id),
        };
        Ok(wait_for_deletion(&policy, self.budget).await?)
    }
}

async fn fetch_snapshot(api: &ApiClient, id: &str) -> Result<StateSnapshot, AccessError> {
    let detail: ImageDetail = api
        .get(&format!("/v1/images/{id}"))
        .await
        .map_err(AccessError::from)?;
    Ok(StateSnapshot::new(detail.status))
}

struct ImageStatusPolicy {
    api: ApiClient,
    target: PollTarget,
    wanted: String,
}

#[async_trait]
impl StatePolicy for ImageStatusPolicy {
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
        snapshot.status == self.wanted
    }

    fn is_terminal_error(&self, snapshot: &StateSnapshot) -> Option<String> {
        if snapshot.status != "killed" || self.wanted == "killed" {
            return None;
        }
        Some("image upload was killed".to_string())
    }
}

struct ImageGonePolicy {
    api: ApiClient,
    target: PollTarget,
}

#[async_trait]
impl StatePolicy for ImageGonePolicy {
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

    fn is_terminal_error(&self, _snapshot: &StateSnapshot) -> Option<String> {
        None
    }

    fn satisfied_when_gone(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(wanted: &str) -> ImageStatusPolicy {
        ImageStatusPolicy {
            api: ApiClient::new("http://127.0.0.1:1", None).unwrap(),
            target: PollTarget::new(ResourceKind::Image, "img-1"),
            wanted: wanted.to_string(),
        }
    }

    #[test]
    fn test_killed_is_terminal() {
        let policy = policy("active");
        assert!(policy
            .is_terminal_error(&StateSnapshot::new("killed"))
            .is_some());
        assert!(policy
            .is_terminal_error(&StateSnapshot::new("saving"))
            .is_none());
    }

    #[test]
    fn test_killed_not_terminal_when_awaited() {
        let policy = policy("killed");
        let snap = StateSnapshot::new("killed");
        assert!(policy.is_terminal_error(&snap).is_none());
        assert!(policy.is_target_reached(&snap));
    }
}
