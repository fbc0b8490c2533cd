//! Telemetry service client: alarms and meter samples.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_convergence::{
    converge, wait_for_condition, AccessError, PollBudget, PollTarget, ResourceKind, StatePolicy,
    StateSnapshot,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProbeConfig;
use crate::error::ClientError;
use crate::http::ApiClient;

/// The closed set of alarm states the service recognizes.
pub const ALARM_STATES: [&str; 3] = ["ok", "alarm", "insufficient_data"];

#[derive(Debug, Clone, Deserialize)]
pub struct AlarmDetail {
    pub id: String,
    pub name: String,
    pub state: String,

    #[serde(default)]
    pub state_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAlarmRequest {
    pub name: String,
    pub meter: String,
    pub threshold: f64,
    pub comparison: String,
}

#[derive(Debug, Clone, Serialize)]
struct SetStateRequest<'a> {
    state: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sample {
    pub resource_id: String,
    pub meter: String,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SampleList {
    items: Vec<Sample>,
}

/// Client for the telemetry service.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    api: ApiClient,
    budget: PollBudget,
}

impl TelemetryClient {
    pub fn new(config: &ProbeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            api: ApiClient::new(&config.endpoints.telemetry, config.auth_token.as_deref())?,
            budget: config.telemetry.budget(),
        })
    }

    /// Override the configured poll budget.
    pub fn with_budget(mut self, budget: PollBudget) -> Self {
        self.budget = budget;
        self
    }

    pub async fn create_alarm(
        &self,
        request: &CreateAlarmRequest,
    ) -> Result<AlarmDetail, ClientError> {
        let alarm: AlarmDetail = self.api.post("/v1/alarms", request).await?;
        info!(alarm_id = %alarm.id, meter = %request.meter, "created alarm");
        Ok(alarm)
    }

    pub async fn get_alarm(&self, id: &str) -> Result<AlarmDetail, ClientError> {
        self.api.get(&format!("/v1/alarms/{id}")).await
    }

    pub async fn delete_alarm(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/alarms/{id}")).await
    }

    /// Set the alarm state; only states in [`ALARM_STATES`] are accepted.
    pub async fn set_alarm_state(&self, id: &str, state: &str) -> Result<AlarmDetail, ClientError> {
        if !ALARM_STATES.contains(&state) {
            return Err(ClientError::UnsupportedAlarmState(state.to_string()));
        }
        self.api
            .put(&format!("/v1/alarms/{id}/state"), &SetStateRequest { state })
            .await
    }

    /// Wait until the alarm reports `state`.
    pub async fn wait_for_alarm_state(
        &self,
        id: &str,
        state: &str,
    ) -> Result<StateSnapshot, ClientError> {
        if !ALARM_STATES.contains(&state) {
            return Err(ClientError::UnsupportedAlarmState(state.to_string()));
        }
        let policy = AlarmStatePolicy {
            api: self.api.clone(),
            target: PollTarget::new(ResourceKind::Alarm, id),
            wanted: state.to_string(),
        };
        Ok(converge(&policy, self.budget).await?)
    }

    pub async fn list_samples(
        &self,
        meter: &str,
        query: Option<&str>,
    ) -> Result<Vec<Sample>, ClientError> {
        let mut path = format!("/v1/samples?meter={meter}");
        if let Some(query) = query {
            path.push_str(&format!("&query={query}"));
        }
        let list: SampleList = self.api.get(&path).await?;
        Ok(list.items)
    }

    /// Wait until at least one sample for `meter` exists, then return the
    /// samples. Backends persist samples with long delays; query failures
    /// propagate rather than being retried.
    pub async fn await_samples(
        &self,
        meter: &str,
        query: Option<&str>,
    ) -> Result<Vec<Sample>, ClientError> {
        let subject = format!("samples for meter {meter:?}");
        wait_for_condition(&subject, self.budget, || {
            let client = self.clone();
            let meter = meter.to_string();
            let query = query.map(str::to_string);
            async move {
                let samples = client
                    .list_samples(&meter, query.as_deref())
                    .await
                    .map_err(anyhow::Error::new)?;
                Ok(!samples.is_empty())
            }
        })
        .await?;

        self.list_samples(meter, query).await
    }
}

struct AlarmStatePolicy {
    api: ApiClient,
    target: PollTarget,
    wanted: String,
}

#[async_trait]
impl StatePolicy for AlarmStatePolicy {
    fn target(&self) -> &PollTarget {
        &self.target
    }

    fn describe_condition(&self) -> String {
        format!("state {:?}", self.wanted)
    }

    async fn fetch(&self) -> Result<StateSnapshot, AccessError> {
        let alarm: AlarmDetail = self
            .api
            .get(&format!("/v1/alarms/{}", self.target.id))
            .await
            .map_err(AccessError::from)?;
        let mut snapshot = StateSnapshot::new(alarm.state);
        snapshot.fault = alarm.state_reason;
        Ok(snapshot)
    }

    fn is_target_reached(&self, snapshot: &StateSnapshot) -> bool {
        snapshot.status == self.wanted
    }

    // Every alarm state is a valid resting state; none are dead ends.
    fn is_terminal_error(&self, _snapshot: &StateSnapshot) -> Option<String> {
        None
    }
}
