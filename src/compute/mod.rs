//! Abstraction over the provider's compute, VPC and managed-Kubernetes APIs.
//!
//! [`ComputeApi`] is the seam between provisioning logic and the network. The
//! REST implementation lives in [`crate::yandex`]; tests use
//! [`crate::test_support::FakeComputeApi`].

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::InstanceTypeDescriptor;
use crate::disk::DiskType;
use crate::types::{NetworkId, NodeGroupId, SecurityGroupId, SubnetId, Zone};

/// Future returned by [`ComputeApi`] operations.
pub type ComputeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ComputeError>> + Send + 'a>>;

/// Errors raised by compute API calls.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ComputeError {
    /// The resource does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Resource kind (for example `subnet`).
        resource: String,
        /// Identifier looked up.
        id: String,
    },
    /// The call did not finish within its per-call limit.
    #[error("{operation} timed out")]
    Timeout {
        /// Operation name.
        operation: String,
    },
    /// The request never produced a response.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying error.
        message: String,
    },
    /// The provider answered with an error status.
    #[error("provider returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider message.
        message: String,
    },
    /// The response body could not be interpreted.
    #[error("failed to decode {what}: {message}")]
    Decode {
        /// What was being decoded.
        what: String,
        /// Decoder message.
        message: String,
    },
}

impl ComputeError {
    /// Builds a [`ComputeError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource: resource.to_owned(),
            id: id.to_string(),
        }
    }

    /// Reports whether the resource is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Reports whether retrying the call may succeed. Timeouts, transport
    /// failures, throttling (429) and server errors are transient; missing
    /// resources, other client errors and undecodable responses are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Api { status, .. } => !matches!(*status, 400..=428 | 430..=499),
            Self::NotFound { .. } | Self::Decode { .. } => false,
        }
    }
}

/// Lifecycle state of a managed node group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NodeGroupState {
    /// Being created.
    Provisioning,
    /// Serving.
    Running,
    /// Applying a configuration change.
    Reconciling,
    /// Shutting down.
    Stopping,
    /// Stopped.
    Stopped,
    /// Starting after a stop.
    Starting,
    /// Being deleted.
    Deleting,
    /// Terminally failed.
    Failed,
    /// A state this crate does not know.
    Unknown(String),
}

impl NodeGroupState {
    /// Maps the provider's status string.
    #[must_use]
    pub fn from_provider(status: &str) -> Self {
        match status {
            "PROVISIONING" => Self::Provisioning,
            "RUNNING" => Self::Running,
            "RECONCILING" => Self::Reconciling,
            "STOPPING" => Self::Stopping,
            "STOPPED" => Self::Stopped,
            "STARTING" => Self::Starting,
            "DELETING" => Self::Deleting,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

/// A managed node group as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeGroupRecord {
    /// Provider identifier.
    pub id: NodeGroupId,
    /// Caller-chosen name; the idempotency key.
    pub name: String,
    /// Owning cluster.
    pub cluster_id: String,
    /// Node group labels.
    pub labels: BTreeMap<String, String>,
    /// Instance shape.
    pub shape: InstanceTypeDescriptor,
    /// Zone, when the allocation policy names one.
    pub zone: Option<Zone>,
    /// Subnet of the node interface, when reported.
    pub subnet: Option<SubnetId>,
    /// Boot disk type.
    pub disk_type: String,
    /// Boot disk size in bytes.
    pub disk_size_bytes: u64,
    /// Whether nodes are preemptible.
    pub discounted: bool,
    /// Compute instance id of the node, once assigned.
    pub instance_id: Option<String>,
    /// Lifecycle state.
    pub state: NodeGroupState,
}

/// Parameters of a node group to create.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeGroupSpec {
    /// Idempotency name.
    pub name: String,
    /// Owning cluster.
    pub cluster_id: String,
    /// Node group and node template labels, already including management
    /// markers.
    pub labels: BTreeMap<String, String>,
    /// Kubernetes labels applied to the node.
    pub node_labels: BTreeMap<String, String>,
    /// Instance shape.
    pub shape: InstanceTypeDescriptor,
    /// Target zone.
    pub zone: Zone,
    /// Subnet for the node interface.
    pub subnet: SubnetId,
    /// Security groups for the node interface.
    pub security_groups: Vec<SecurityGroupId>,
    /// Request preemptible nodes.
    pub discounted: bool,
    /// Boot disk type.
    pub disk_type: DiskType,
    /// Boot disk size in bytes.
    pub disk_size_bytes: u64,
    /// Request software-accelerated networking.
    pub accelerated_network: bool,
}

/// An operation recorded against a node group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperationRecord {
    /// Operation id.
    pub id: String,
    /// Metadata type URL naming the operation kind.
    pub kind: String,
    /// Whether the operation finished.
    pub done: bool,
}

impl OperationRecord {
    /// Reports whether this is an unfinished delete.
    #[must_use]
    pub fn is_pending_delete(&self) -> bool {
        !self.done && self.kind.contains("DeleteNodeGroup")
    }
}

/// A VPC subnet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubnetRecord {
    /// Identifier.
    pub id: SubnetId,
    /// Owning network; empty when the provider omits it.
    pub network_id: NetworkId,
    /// Zone; empty when the provider omits it.
    pub zone: Zone,
}

/// A VPC security group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityGroupRecord {
    /// Identifier.
    pub id: SecurityGroupId,
    /// Owning network; empty when the provider omits it.
    pub network_id: NetworkId,
}

/// Provider operations used by validation and lifecycle management.
///
/// Missing resources surface as [`ComputeError::NotFound`].
pub trait ComputeApi: Send + Sync {
    /// Network of the managed cluster.
    fn network_id(&self) -> ComputeFuture<'_, NetworkId>;

    /// Fetches a subnet.
    fn get_subnet<'a>(&'a self, id: &'a SubnetId) -> ComputeFuture<'a, SubnetRecord>;

    /// Fetches a security group.
    fn get_security_group<'a>(
        &'a self,
        id: &'a SecurityGroupId,
    ) -> ComputeFuture<'a, SecurityGroupRecord>;

    /// Lists every node group in the cluster's folder, unfiltered.
    fn list_node_groups(&self) -> ComputeFuture<'_, Vec<NodeGroupRecord>>;

    /// Fetches a node group.
    fn get_node_group<'a>(&'a self, id: &'a NodeGroupId) -> ComputeFuture<'a, NodeGroupRecord>;

    /// Creates a node group and returns its id once the provider accepts it.
    fn create_node_group<'a>(&'a self, spec: &'a NodeGroupSpec) -> ComputeFuture<'a, NodeGroupId>;

    /// Requests deletion of a node group.
    fn delete_node_group<'a>(&'a self, id: &'a NodeGroupId) -> ComputeFuture<'a, ()>;

    /// Lists operations recorded against a node group.
    fn node_group_operations<'a>(
        &'a self,
        id: &'a NodeGroupId,
    ) -> ComputeFuture<'a, Vec<OperationRecord>>;

    /// Compute instance id of the node group's first node, once assigned.
    fn node_group_instance_id<'a>(&'a self, id: &'a NodeGroupId)
    -> ComputeFuture<'a, Option<String>>;

    /// Node group owning a compute instance, read from the instance labels.
    fn instance_node_group_id<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ComputeFuture<'a, Option<NodeGroupId>>;
}

/// Runs a compute call under a per-call limit.
///
/// # Errors
///
/// Returns [`ComputeError::Timeout`] when `limit` elapses first, otherwise
/// the call's own result.
pub async fn bounded<T>(
    limit: Duration,
    operation: &str,
    call: ComputeFuture<'_, T>,
) -> Result<T, ComputeError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| ComputeError::Timeout {
            operation: operation.to_owned(),
        })?
}
