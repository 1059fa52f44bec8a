//! [`ComputeApi`] over the provider's public REST API.
//!
//! Managed-Kubernetes, VPC and Compute live behind separate endpoints. Every
//! request carries an IAM bearer token; HTTP 404 maps to
//! [`ComputeError::NotFound`].

mod wire;

use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::compute::{
    ComputeApi, ComputeError, ComputeFuture, NodeGroupRecord, NodeGroupSpec, OperationRecord,
    SecurityGroupRecord, SubnetRecord,
};
use crate::types::{NetworkId, NodeGroupId, SecurityGroupId, SubnetId};

pub use wire::UNREGISTERED_TAINT_KEY;

/// Default managed-Kubernetes endpoint.
pub const DEFAULT_MKS_ENDPOINT: &str = "https://mks.api.cloud.yandex.net/managed-kubernetes/v1";
/// Default VPC endpoint.
pub const DEFAULT_VPC_ENDPOINT: &str = "https://vpc.api.cloud.yandex.net/vpc/v1";
/// Default Compute endpoint.
pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.api.cloud.yandex.net/compute/v1";

/// Instance label naming the owning node group.
pub const NODE_GROUP_ID_LABEL: &str = "managed-kubernetes-node-group-id";

const PAGE_SIZE: &str = "1000";

/// Base URLs of the provider's services.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoints {
    /// Managed-Kubernetes API.
    pub mks: String,
    /// VPC API.
    pub vpc: String,
    /// Compute API.
    pub compute: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            mks: DEFAULT_MKS_ENDPOINT.to_owned(),
            vpc: DEFAULT_VPC_ENDPOINT.to_owned(),
            compute: DEFAULT_COMPUTE_ENDPOINT.to_owned(),
        }
    }
}

#[derive(Debug)]
struct ClusterInfo {
    folder_id: String,
    network_id: NetworkId,
}

/// REST client bound to one managed cluster.
pub struct YandexApi {
    client: Client,
    token: String,
    cluster_id: String,
    endpoints: Endpoints,
    cluster: OnceCell<ClusterInfo>,
}

impl fmt::Debug for YandexApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YandexApi")
            .field("cluster_id", &self.cluster_id)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl YandexApi {
    /// Builds a client. `request_timeout` bounds each HTTP exchange.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Transport`] when the HTTP client cannot be
    /// constructed.
    pub fn new(
        token: impl Into<String>,
        cluster_id: impl Into<String>,
        endpoints: Endpoints,
        request_timeout: Duration,
    ) -> Result<Self, ComputeError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| transport(&err))?;
        Ok(Self {
            client,
            token: token.into(),
            cluster_id: cluster_id.into(),
            endpoints,
            cluster: OnceCell::new(),
        })
    }

    async fn cluster(&self) -> Result<&ClusterInfo, ComputeError> {
        self.cluster
            .get_or_try_init(|| async {
                let url = format!("{}/clusters/{}", self.endpoints.mks, self.cluster_id);
                let cluster: wire::Cluster = self
                    .send(self.client.get(url), "cluster", &self.cluster_id)
                    .await?;
                Ok(ClusterInfo {
                    folder_id: cluster.folder_id,
                    network_id: NetworkId::new(cluster.network_id),
                })
            })
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
        id: &str,
    ) -> Result<T, ComputeError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| transport(&err))?;
        read(response, resource, id).await
    }

    async fn node_group_pages(&self, folder_id: &str) -> Result<Vec<NodeGroupRecord>, ComputeError> {
        let url = format!("{}/nodeGroups", self.endpoints.mks);
        let mut records = Vec::new();
        let mut token = String::new();
        loop {
            let request = self.client.get(&url).query(&[
                ("folderId", folder_id),
                ("pageSize", PAGE_SIZE),
                ("pageToken", token.as_str()),
            ]);
            let page: wire::NodeGroupPage = self.send(request, "node groups", folder_id).await?;
            records.extend(managed_records(&self.cluster_id, page.node_groups));
            if page.next_page_token.is_empty() {
                return Ok(records);
            }
            token = page.next_page_token;
        }
    }

    async fn operation_pages(&self, id: &NodeGroupId) -> Result<Vec<OperationRecord>, ComputeError> {
        let url = format!("{}/nodeGroups/{id}/operations", self.endpoints.mks);
        let mut records = Vec::new();
        let mut token = String::new();
        loop {
            let request = self
                .client
                .get(&url)
                .query(&[("pageSize", PAGE_SIZE), ("pageToken", token.as_str())]);
            let page: wire::OperationPage = self.send(request, "node group", id).await?;
            records.extend(page.operations.into_iter().map(OperationRecord::from));
            if page.next_page_token.is_empty() {
                return Ok(records);
            }
            token = page.next_page_token;
        }
    }
}

/// Node groups of `cluster_id` carrying the management label. The folder
/// may hold groups this crate never created; only managed ones must decode,
/// and a managed group that does not is logged and skipped.
fn managed_records(cluster_id: &str, groups: Vec<wire::NodeGroup>) -> Vec<NodeGroupRecord> {
    groups
        .into_iter()
        .filter(|group| group.is_managed_in(cluster_id))
        .filter_map(|group| {
            let id = group.id.clone();
            NodeGroupRecord::try_from(group)
                .inspect_err(|err| {
                    warn!(node_group_id = %id, error = %err, "skipping undecodable node group");
                })
                .ok()
        })
        .collect()
}

fn transport(err: &reqwest::Error) -> ComputeError {
    if err.is_timeout() {
        return ComputeError::Timeout {
            operation: err
                .url()
                .map_or_else(|| "request".to_owned(), ToString::to_string),
        };
    }
    ComputeError::Transport {
        message: err.to_string(),
    }
}

async fn read<T: DeserializeOwned>(
    response: Response,
    resource: &str,
    id: &str,
) -> Result<T, ComputeError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ComputeError::not_found(resource, id));
    }
    let body = response.bytes().await.map_err(|err| transport(&err))?;
    if !status.is_success() {
        return Err(ComputeError::Api {
            status: status.as_u16(),
            message: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    decode(&body, resource)
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T, ComputeError> {
    serde_json::from_slice(body).map_err(|err| ComputeError::Decode {
        what: what.to_owned(),
        message: err.to_string(),
    })
}

impl ComputeApi for YandexApi {
    fn network_id(&self) -> ComputeFuture<'_, NetworkId> {
        Box::pin(async move { Ok(self.cluster().await?.network_id.clone()) })
    }

    fn get_subnet<'a>(&'a self, id: &'a SubnetId) -> ComputeFuture<'a, SubnetRecord> {
        Box::pin(async move {
            let url = format!("{}/subnets/{id}", self.endpoints.vpc);
            let subnet: wire::Subnet = self.send(self.client.get(url), "subnet", id).await?;
            Ok(subnet.into())
        })
    }

    fn get_security_group<'a>(
        &'a self,
        id: &'a SecurityGroupId,
    ) -> ComputeFuture<'a, SecurityGroupRecord> {
        Box::pin(async move {
            let url = format!("{}/securityGroups/{id}", self.endpoints.vpc);
            let group: wire::SecurityGroup = self
                .send(self.client.get(url), "security group", id)
                .await?;
            Ok(group.into())
        })
    }

    fn list_node_groups(&self) -> ComputeFuture<'_, Vec<NodeGroupRecord>> {
        Box::pin(async move {
            let folder_id = self.cluster().await?.folder_id.clone();
            self.node_group_pages(&folder_id).await
        })
    }

    fn get_node_group<'a>(&'a self, id: &'a NodeGroupId) -> ComputeFuture<'a, NodeGroupRecord> {
        Box::pin(async move {
            let url = format!("{}/nodeGroups/{id}", self.endpoints.mks);
            let group: wire::NodeGroup = self.send(self.client.get(url), "node group", id).await?;
            NodeGroupRecord::try_from(group)
        })
    }

    fn create_node_group<'a>(&'a self, spec: &'a NodeGroupSpec) -> ComputeFuture<'a, NodeGroupId> {
        Box::pin(async move {
            let url = format!("{}/nodeGroups", self.endpoints.mks);
            let body = wire::CreateNodeGroup::from(spec);
            let operation: wire::Operation = self
                .send(self.client.post(url).json(&body), "cluster", &spec.cluster_id)
                .await?;
            let id = operation.accepted()?.node_group_id()?;
            debug!(name = %spec.name, node_group_id = %id, "create operation accepted");
            Ok(id)
        })
    }

    fn delete_node_group<'a>(&'a self, id: &'a NodeGroupId) -> ComputeFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("{}/nodeGroups/{id}", self.endpoints.mks);
            let operation: wire::Operation = self
                .send(self.client.delete(url), "node group", id)
                .await?;
            operation.accepted().map(|_| ())
        })
    }

    fn node_group_operations<'a>(
        &'a self,
        id: &'a NodeGroupId,
    ) -> ComputeFuture<'a, Vec<OperationRecord>> {
        Box::pin(self.operation_pages(id))
    }

    fn node_group_instance_id<'a>(
        &'a self,
        id: &'a NodeGroupId,
    ) -> ComputeFuture<'a, Option<String>> {
        Box::pin(async move {
            let url = format!("{}/nodeGroups/{id}/nodes", self.endpoints.mks);
            let page: wire::NodePage = self.send(self.client.get(url), "node group", id).await?;
            Ok(page
                .nodes
                .into_iter()
                .next()
                .map(|node| node.cloud_status.id)
                .filter(|instance| !instance.is_empty()))
        })
    }

    fn instance_node_group_id<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ComputeFuture<'a, Option<NodeGroupId>> {
        Box::pin(async move {
            let url = format!("{}/instances/{instance_id}", self.endpoints.compute);
            let request = self.client.get(url).query(&[("view", "BASIC")]);
            let instance: wire::Instance = self.send(request, "instance", instance_id).await?;
            Ok(instance
                .labels
                .get(NODE_GROUP_ID_LABEL)
                .filter(|id| !id.is_empty())
                .map(|id| NodeGroupId::new(id.clone())))
        })
    }
}
