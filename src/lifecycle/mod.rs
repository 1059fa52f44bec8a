//! Creates, deletes and looks up the managed node groups that back nodes.
//!
//! Every provider call runs under [`LifecycleSettings::call_timeout`]. Creates
//! for one name are serialised in-process and short-circuit when a managed
//! node group with that name already exists; deletes become no-ops while a
//! delete operation is still running.

mod wait;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::catalog::InstanceTypeDescriptor;
use crate::compute::{
    ComputeApi, ComputeError, ComputeFuture, NodeGroupRecord, NodeGroupSpec, OperationRecord,
    bounded,
};
use crate::disk::DiskType;
use crate::keyed_lock::KeyedLock;
use crate::offering::labels;
use crate::types::{NodeGroupId, ProviderId, ProviderIdError, SecurityGroupId, SubnetId, Zone};

/// Label key marking node groups owned by this crate.
pub const MANAGED_BY_LABEL: &str = "managed-by";
/// Value of [`MANAGED_BY_LABEL`].
pub const MANAGED_BY_VALUE: &str = "nodeplan";

/// Timing and ownership settings for [`LifecycleManager`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LifecycleSettings {
    /// Cluster whose node groups are managed.
    pub cluster_id: String,
    /// Delay between external-id polls.
    pub poll_interval: Duration,
    /// Total time allowed for external-id resolution.
    pub resolve_timeout: Duration,
    /// Limit for each provider call.
    pub call_timeout: Duration,
}

impl LifecycleSettings {
    /// Settings with the default timings for `cluster_id`.
    #[must_use]
    pub fn for_cluster(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            poll_interval: Duration::from_secs(1),
            resolve_timeout: Duration::from_secs(300),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// A node group to create.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateRequest {
    /// Idempotency name.
    pub name: String,
    /// Instance shape.
    pub shape: InstanceTypeDescriptor,
    /// Target zone.
    pub zone: Zone,
    /// Subnet in `zone`.
    pub subnet: SubnetId,
    /// Request discounted (preemptible) capacity.
    pub discounted: bool,
    /// Boot disk type.
    pub disk_type: DiskType,
    /// Boot disk size in bytes.
    pub disk_size_bytes: u64,
    /// Labels for the node group and its nodes.
    pub labels: BTreeMap<String, String>,
    /// Security groups for the node interface.
    pub security_groups: Vec<SecurityGroupId>,
    /// Request software-accelerated networking.
    pub accelerated_network: bool,
}

/// Result of [`LifecycleManager::delete`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeleteOutcome {
    /// A delete was issued.
    Requested,
    /// A delete was already running; nothing was issued.
    InFlight,
    /// The node group no longer exists.
    AlreadyGone,
}

/// Errors raised by [`LifecycleManager`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LifecycleError {
    /// A provider call failed.
    #[error("{operation} failed: {source}")]
    Compute {
        /// Operation being performed.
        operation: String,
        /// Underlying failure.
        #[source]
        source: ComputeError,
    },
    /// The node never reported an instance id.
    #[error("node group {node_group_id} exposed no instance id within {waited:?}{}", last_error_suffix(.last_error.as_deref()))]
    ExternalIdTimeout {
        /// Node group being resolved.
        node_group_id: NodeGroupId,
        /// Time spent polling.
        waited: Duration,
        /// Most recent poll failure, if any.
        last_error: Option<String>,
    },
    /// The external id was not a provider id.
    #[error(transparent)]
    InvalidProviderId(#[from] ProviderIdError),
}

/// Node labels describing a shape, so workloads can be scheduled on it.
fn shape_labels(shape: &InstanceTypeDescriptor) -> [(String, String); 4] {
    [
        (
            labels::INSTANCE_CPU_PLATFORM.to_owned(),
            shape.platform.to_string(),
        ),
        (labels::INSTANCE_CPU.to_owned(), shape.cpu.to_string()),
        (labels::INSTANCE_MEMORY.to_owned(), shape.memory_quantity()),
        (
            labels::INSTANCE_CPU_FRACTION.to_owned(),
            shape.core_fraction.to_string(),
        ),
    ]
}

fn last_error_suffix(last_error: Option<&str>) -> String {
    last_error.map_or_else(String::new, |message| format!(" (last error: {message})"))
}

impl LifecycleError {
    /// Reports whether retrying the operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Compute { source, .. } => source.is_retryable(),
            Self::ExternalIdTimeout { .. } | Self::InvalidProviderId(_) => false,
        }
    }
}

/// Manages node groups through a [`ComputeApi`].
#[derive(Debug)]
pub struct LifecycleManager<A: ?Sized> {
    api: Arc<A>,
    settings: LifecycleSettings,
    creates: KeyedLock<String>,
    deletes: KeyedLock<NodeGroupId>,
}

impl<A: ComputeApi + ?Sized> LifecycleManager<A> {
    /// Builds a manager.
    #[must_use]
    pub fn new(api: Arc<A>, settings: LifecycleSettings) -> Self {
        Self {
            api,
            settings,
            creates: KeyedLock::new(),
            deletes: KeyedLock::new(),
        }
    }

    /// Creates a node group unless a managed one with the same name exists,
    /// returning its id either way.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Compute`] when listing or creating fails.
    pub async fn create(&self, request: &CreateRequest) -> Result<NodeGroupId, LifecycleError> {
        let _guard = self.creates.lock(&request.name).await;
        if let Some(existing) = self
            .list()
            .await?
            .into_iter()
            .find(|group| group.name == request.name)
        {
            info!(name = %request.name, node_group_id = %existing.id, "node group already exists");
            return Ok(existing.id);
        }

        let spec = self.node_group_spec(request);
        let id = self
            .call("create node group", self.api.create_node_group(&spec))
            .await?;
        info!(
            name = %request.name,
            node_group_id = %id,
            instance_type = %request.shape,
            zone = %request.zone,
            discounted = request.discounted,
            "node group create issued"
        );
        Ok(id)
    }

    /// Deletes a node group. Deleting a missing group, or one already being
    /// deleted, succeeds without a second request.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Compute`] for provider failures other than
    /// not-found.
    pub async fn delete(&self, id: &NodeGroupId) -> Result<DeleteOutcome, LifecycleError> {
        let _guard = self.deletes.lock(id).await;
        let operations = match self.pending(id).await {
            Ok(operations) => operations,
            Err(err) if err.is_not_found() => return Ok(Self::gone(id)),
            Err(err) => return Err(Self::failed("list node group operations", err)),
        };
        if operations.iter().any(OperationRecord::is_pending_delete) {
            info!(node_group_id = %id, "node group delete already in flight");
            return Ok(DeleteOutcome::InFlight);
        }

        let limit = self.settings.call_timeout;
        match bounded(limit, "delete node group", self.api.delete_node_group(id)).await {
            Ok(()) => {
                info!(node_group_id = %id, "node group delete issued");
                Ok(DeleteOutcome::Requested)
            }
            Err(err) if err.is_not_found() => Ok(Self::gone(id)),
            Err(err) => Err(Self::failed("delete node group", err)),
        }
    }

    /// Node groups of this cluster that carry the management label.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Compute`] when listing fails.
    pub async fn list(&self) -> Result<Vec<NodeGroupRecord>, LifecycleError> {
        let groups = self
            .call("list node groups", self.api.list_node_groups())
            .await?;
        Ok(groups
            .into_iter()
            .filter(|group| self.is_managed(group))
            .collect())
    }

    /// Fetches a node group, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Compute`] for failures other than not-found.
    pub async fn get_by_id(
        &self,
        id: &NodeGroupId,
    ) -> Result<Option<NodeGroupRecord>, LifecycleError> {
        let limit = self.settings.call_timeout;
        match bounded(limit, "get node group", self.api.get_node_group(id)).await {
            Ok(group) => Ok(Some(group)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(Self::failed("get node group", err)),
        }
    }

    /// Finds the node group backing a node by its provider id.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidProviderId`] when `provider_id` lacks
    /// the `yandex://` scheme and [`LifecycleError::Compute`] for provider
    /// failures other than not-found.
    pub async fn get_by_external_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<NodeGroupRecord>, LifecycleError> {
        let parsed = ProviderId::parse(provider_id)?;
        let limit = self.settings.call_timeout;
        let owner = bounded(
            limit,
            "get instance",
            self.api.instance_node_group_id(parsed.instance_id()),
        )
        .await;
        match owner {
            Ok(Some(id)) => self.get_by_id(&id).await,
            Ok(None) => Ok(None),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(Self::failed("get instance", err)),
        }
    }

    fn node_group_spec(&self, request: &CreateRequest) -> NodeGroupSpec {
        let mut labels: BTreeMap<String, String> = request
            .labels
            .iter()
            .map(|(key, value)| (key.clone(), value.to_lowercase()))
            .collect();
        labels.insert(MANAGED_BY_LABEL.to_owned(), MANAGED_BY_VALUE.to_owned());
        let mut node_labels = request.labels.clone();
        node_labels.extend(shape_labels(&request.shape));
        NodeGroupSpec {
            name: request.name.clone(),
            cluster_id: self.settings.cluster_id.clone(),
            labels,
            node_labels,
            shape: request.shape.clone(),
            zone: request.zone.clone(),
            subnet: request.subnet.clone(),
            security_groups: request.security_groups.clone(),
            discounted: request.discounted,
            disk_type: request.disk_type,
            disk_size_bytes: request.disk_size_bytes,
            accelerated_network: request.accelerated_network
                && request.shape.core_fraction.is_full(),
        }
    }

    fn is_managed(&self, group: &NodeGroupRecord) -> bool {
        group.cluster_id == self.settings.cluster_id
            && group.labels.get(MANAGED_BY_LABEL).map(String::as_str) == Some(MANAGED_BY_VALUE)
    }

    async fn pending(&self, id: &NodeGroupId) -> Result<Vec<OperationRecord>, ComputeError> {
        bounded(
            self.settings.call_timeout,
            "list node group operations",
            self.api.node_group_operations(id),
        )
        .await
    }

    async fn call<T>(
        &self,
        operation: &str,
        fut: ComputeFuture<'_, T>,
    ) -> Result<T, LifecycleError> {
        bounded(self.settings.call_timeout, operation, fut)
            .await
            .map_err(|source| Self::failed(operation, source))
    }

    fn failed(operation: &str, source: ComputeError) -> LifecycleError {
        LifecycleError::Compute {
            operation: operation.to_owned(),
            source,
        }
    }

    fn gone(id: &NodeGroupId) -> DeleteOutcome {
        info!(node_group_id = %id, "node group already gone");
        DeleteOutcome::AlreadyGone
    }
}

#[cfg(test)]
mod tests;
