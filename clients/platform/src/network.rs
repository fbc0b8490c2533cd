//! Network service client and teardown fixture.
//!
//! Network resources have no asynchronous build states to wait on; what they
//! do have is referential constraints, so teardown order matters. The
//! [`NetworkFixture`] owns one tracker per resource kind and encodes the
//! deletion order the remote side requires.

use nimbus_convergence::AccessError;
use nimbus_tracker::{CleanupReport, ResourceTracker};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProbeConfig;
use crate::error::ClientError;
use crate::http::ApiClient;

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkDetail {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubnetDetail {
    pub id: String,
    pub network_id: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterDetail {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortDetail {
    pub id: String,
    pub network_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloatingIpDetail {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
struct NamedRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct SubnetRequest<'a> {
    network_id: &'a str,
    cidr: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct NetworkScopedRequest<'a> {
    network_id: &'a str,
}

/// Client for the network service.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    api: ApiClient,
}

impl NetworkClient {
    pub fn new(config: &ProbeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            api: ApiClient::new(&config.endpoints.network, config.auth_token.as_deref())?,
        })
    }

    pub async fn create_network(&self, name: &str) -> Result<NetworkDetail, ClientError> {
        let network: NetworkDetail = self.api.post("/v1/networks", &NamedRequest { name }).await?;
        info!(network_id = %network.id, name, "created network");
        Ok(network)
    }

    pub async fn delete_network(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/networks/{id}")).await
    }

    pub async fn create_subnet(
        &self,
        network_id: &str,
        cidr: &str,
    ) -> Result<SubnetDetail, ClientError> {
        self.api
            .post("/v1/subnets", &SubnetRequest { network_id, cidr })
            .await
    }

    pub async fn delete_subnet(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/subnets/{id}")).await
    }

    pub async fn create_router(&self, name: &str) -> Result<RouterDetail, ClientError> {
        self.api.post("/v1/routers", &NamedRequest { name }).await
    }

    pub async fn delete_router(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/routers/{id}")).await
    }

    pub async fn create_port(&self, network_id: &str) -> Result<PortDetail, ClientError> {
        self.api
            .post("/v1/ports", &NetworkScopedRequest { network_id })
            .await
    }

    pub async fn delete_port(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/ports/{id}")).await
    }

    pub async fn create_floating_ip(
        &self,
        network_id: &str,
    ) -> Result<FloatingIpDetail, ClientError> {
        self.api
            .post("/v1/floating_ips", &NetworkScopedRequest { network_id })
            .await
    }

    pub async fn delete_floating_ip(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(&format!("/v1/floating_ips/{id}")).await
    }
}

/// Trackers for every network resource created by one test suite.
#[derive(Debug)]
pub struct NetworkFixture {
    pub networks: ResourceTracker,
    pub subnets: ResourceTracker,
    pub routers: ResourceTracker,
    pub ports: ResourceTracker,
    pub floating_ips: ResourceTracker,
}

impl Default for NetworkFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkFixture {
    pub fn new() -> Self {
        Self {
            networks: ResourceTracker::new("network"),
            subnets: ResourceTracker::new("subnet"),
            routers: ResourceTracker::new("router"),
            ports: ResourceTracker::new("port"),
            floating_ips: ResourceTracker::new("floating_ip"),
        }
    }

    pub async fn create_network(
        &mut self,
        client: &NetworkClient,
        name: &str,
    ) -> Result<NetworkDetail, ClientError> {
        let network = client.create_network(name).await?;
        self.networks.track(&network.id);
        Ok(network)
    }

    pub async fn create_subnet(
        &mut self,
        client: &NetworkClient,
        network_id: &str,
        cidr: &str,
    ) -> Result<SubnetDetail, ClientError> {
        let subnet = client.create_subnet(network_id, cidr).await?;
        self.subnets.track(&subnet.id);
        Ok(subnet)
    }

    pub async fn create_router(
        &mut self,
        client: &NetworkClient,
        name: &str,
    ) -> Result<RouterDetail, ClientError> {
        let router = client.create_router(name).await?;
        self.routers.track(&router.id);
        Ok(router)
    }

    pub async fn create_port(
        &mut self,
        client: &NetworkClient,
        network_id: &str,
    ) -> Result<PortDetail, ClientError> {
        let port = client.create_port(network_id).await?;
        self.ports.track(&port.id);
        Ok(port)
    }

    pub async fn create_floating_ip(
        &mut self,
        client: &NetworkClient,
        network_id: &str,
    ) -> Result<FloatingIpDetail, ClientError> {
        let fip = client.create_floating_ip(network_id).await?;
        self.floating_ips.track(&fip.id);
        Ok(fip)
    }

    /// Best-effort teardown of everything tracked, in dependency order:
    /// ports, then subnets, then networks, then routers, then floating IPs.
    /// Failures in one kind do not stop teardown of the rest.
    pub async fn teardown(&mut self, client: &NetworkClient) -> TeardownReport {
        let ports = self
            .ports
            .cleanup_all(|id| {
                let client = client.clone();
                async move { client.delete_port(&id).await.map_err(AccessError::from) }
            })
            .await;

        let subnets = self
            .subnets
            .cleanup_all(|id| {
                let client = client.clone();
                async move { client.delete_subnet(&id).await.map_err(AccessError::from) }
            })
            .await;

        let networks = self
            .networks
            .cleanup_all(|id| {
                let client = client.clone();
                async move { client.delete_network(&id).await.map_err(AccessError::from) }
            })
            .await;

        let routers = self
            .routers
            .cleanup_all(|id| {
                let client = client.clone();
                async move { client.delete_router(&id).await.map_err(AccessError::from) }
            })
            .await;

        let floating_ips = self
            .floating_ips
            .cleanup_all(|id| {
                let client = client.clone();
                async move { client.delete_floating_ip(&id).await.map_err(AccessError::from) }
            })
            .await;

        TeardownReport {
            ports,
            subnets,
            networks,
            routers,
            floating_ips,
        }
    }
}

/// Per-kind cleanup reports from one [`NetworkFixture::teardown`] pass.
#[derive(Debug)]
pub struct TeardownReport {
    pub ports: CleanupReport,
    pub subnets: CleanupReport,
    pub networks: CleanupReport,
    pub routers: CleanupReport,
    pub floating_ips: CleanupReport,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.ports.is_clean()
            && self.subnets.is_clean()
            && self.networks.is_clean()
            && self.routers.is_clean()
            && self.floating_ips.is_clean()
    }
}
