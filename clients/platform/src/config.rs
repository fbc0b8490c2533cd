//! Harness configuration.
//!
//! One explicit struct passed into each client at construction. Loading
//! follows two paths: a TOML file (`NIMBUS_PROBE_CONFIG` names it) or
//! environment variables with defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use nimbus_convergence::PollBudget;
use serde::Deserialize;

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub endpoints: Endpoints,

    /// Bearer token attached to every request, when the deployment requires
    /// one.
    pub auth_token: Option<String>,

    pub compute: ComputeTimeouts,
    pub volume: ServiceTimeouts,
    pub image: ServiceTimeouts,
    pub telemetry: ServiceTimeouts,
}

/// Per-service API base URLs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub compute: String,
    pub volume: String,
    pub image: String,
    pub telemetry: String,
    pub network: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            compute: "http://127.0.0.1:8774".to_string(),
            volume: "http://127.0.0.1:8776".to_string(),
            image: "http://127.0.0.1:9292".to_string(),
            telemetry: "http://127.0.0.1:8777".to_string(),
            network: "http://127.0.0.1:9696".to_string(),
        }
    }
}

/// Poll interval and timeout budget for one service.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ServiceTimeouts {
    pub build_interval_secs: u64,
    pub build_timeout_secs: u64,
}

impl Default for ServiceTimeouts {
    fn default() -> Self {
        Self {
            build_interval_secs: 1,
            build_timeout_secs: 300,
        }
    }
}

impl ServiceTimeouts {
    pub fn budget(&self) -> PollBudget {
        PollBudget::new(
            Duration::from_secs(self.build_interval_secs),
            Duration::from_secs(self.build_timeout_secs),
        )
    }
}

/// Compute budgets, plus the ready-wait policy flag.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ComputeTimeouts {
    pub build_interval_secs: u64,
    pub build_timeout_secs: u64,

    /// Hold server status waits until the task state clears after the
    /// primary status matches.
    pub ready_wait: bool,
}

impl Default for ComputeTimeouts {
    fn default() -> Self {
        Self {
            build_interval_secs: 3,
            build_timeout_secs: 300,
            ready_wait: true,
        }
    }
}

impl ComputeTimeouts {
    pub fn budget(&self) -> PollBudget {
        PollBudget::new(
            Duration::from_secs(self.build_interval_secs),
            Duration::from_secs(self.build_timeout_secs),
        )
    }
}

impl ProbeConfig {
    /// Load from the file named by `NIMBUS_PROBE_CONFIG`, or from the
    /// environment.
    pub fn load() -> Result<Self> {
        match std::env::var("NIMBUS_PROBE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => Ok(Self::from_env()),
        }
    }

    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {path:?}"))?;

        toml::from_str(&contents).with_context(|| format!("Failed to parse config from {path:?}"))
    }

    /// Defaults, with endpoint and token overrides from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("NIMBUS_COMPUTE_URL") {
            config.endpoints.compute = value;
        }
        if let Ok(value) = std::env::var("NIMBUS_VOLUME_URL") {
            config.endpoints.volume = value;
        }
        if let Ok(value) = std::env::var("NIMBUS_IMAGE_URL") {
            config.endpoints.image = value;
        }
        if let Ok(value) = std::env::var("NIMBUS_TELEMETRY_URL") {
            config.endpoints.telemetry = value;
        }
        if let Ok(value) = std::env::var("NIMBUS_NETWORK_URL") {
            config.endpoints.network = value;
        }
        if let Ok(value) = std::env::var("NIMBUS_AUTH_TOKEN") {
            config.auth_token = Some(value);
        }

        config
    }

    /// Config with every endpoint pointed at one base URL. Intended for
    /// harness tests that stand up a single mock control plane.
    pub fn single_endpoint(base_url: &str) -> Self {
        let mut config = Self::default();
        config.endpoints = Endpoints {
            compute: base_url.to_string(),
            volume: base_url.to_string(),
            image: base_url.to_string(),
            telemetry: base_url.to_string(),
            network: base_url.to_string(),
        };
        config
    }
}
