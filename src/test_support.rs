//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::catalog::InstanceTypeDescriptor;
use crate::compute::{
    ComputeApi, ComputeError, ComputeFuture, NodeGroupRecord, NodeGroupSpec, NodeGroupState,
    OperationRecord, SecurityGroupRecord, SubnetRecord,
};
use crate::types::{NetworkId, NodeGroupId, SecurityGroupId, SubnetId, Zone};

/// Operation names recorded by [`FakeComputeApi`].
pub mod ops {
    /// [`super::ComputeApi::network_id`].
    pub const NETWORK_ID: &str = "network_id";
    /// [`super::ComputeApi::get_subnet`].
    pub const GET_SUBNET: &str = "get_subnet";
    /// [`super::ComputeApi::get_security_group`].
    pub const GET_SECURITY_GROUP: &str = "get_security_group";
    /// [`super::ComputeApi::list_node_groups`].
    pub const LIST_NODE_GROUPS: &str = "list_node_groups";
    /// [`super::ComputeApi::get_node_group`].
    pub const GET_NODE_GROUP: &str = "get_node_group";
    /// [`super::ComputeApi::create_node_group`].
    pub const CREATE_NODE_GROUP: &str = "create_node_group";
    /// [`super::ComputeApi::delete_node_group`].
    pub const DELETE_NODE_GROUP: &str = "delete_node_group";
    /// [`super::ComputeApi::node_group_operations`].
    pub const NODE_GROUP_OPERATIONS: &str = "node_group_operations";
    /// [`super::ComputeApi::node_group_instance_id`].
    pub const NODE_GROUP_INSTANCE_ID: &str = "node_group_instance_id";
    /// [`super::ComputeApi::instance_node_group_id`].
    pub const INSTANCE_NODE_GROUP_ID: &str = "instance_node_group_id";
}

/// Operation kind recorded when the fake accepts a delete.
pub const DELETE_OPERATION_KIND: &str = "yandex.cloud.k8s.v1.DeleteNodeGroupMetadata";

#[derive(Debug, Default)]
struct FakeState {
    network: NetworkId,
    subnets: HashMap<SubnetId, SubnetRecord>,
    security_groups: HashMap<SecurityGroupId, SecurityGroupRecord>,
    node_groups: BTreeMap<NodeGroupId, NodeGroupRecord>,
    operations: HashMap<NodeGroupId, Vec<OperationRecord>>,
    instance_owners: HashMap<String, NodeGroupId>,
    pending_instances: HashMap<NodeGroupId, (u32, String)>,
    instance_delay_polls: u32,
    failures: HashMap<&'static str, VecDeque<ComputeError>>,
    delays: HashMap<&'static str, Duration>,
    calls: Vec<&'static str>,
    created_specs: Vec<NodeGroupSpec>,
    next_id: u64,
}

/// In-memory [`ComputeApi`] that records calls and can be scripted to fail,
/// stall, or reveal node instance ids only after several polls.
#[derive(Clone, Debug, Default)]
pub struct FakeComputeApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeComputeApi {
    /// Creates a fake whose cluster lives in `network`.
    #[must_use]
    pub fn new(network: &str) -> Self {
        let fake = Self::default();
        fake.state().network = NetworkId::from(network);
        fake
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a subnet.
    pub fn add_subnet(&self, id: &str, network: &str, zone: &str) {
        self.state().subnets.insert(
            SubnetId::from(id),
            SubnetRecord {
                id: SubnetId::from(id),
                network_id: NetworkId::from(network),
                zone: Zone::from(zone),
            },
        );
    }

    /// Registers a security group.
    pub fn add_security_group(&self, id: &str, network: &str) {
        self.state().security_groups.insert(
            SecurityGroupId::from(id),
            SecurityGroupRecord {
                id: SecurityGroupId::from(id),
                network_id: NetworkId::from(network),
            },
        );
    }

    /// Stores a node group as if created out of band.
    pub fn insert_node_group(&self, record: NodeGroupRecord) {
        let mut state = self.state();
        if let Some(instance) = record.instance_id.clone() {
            state.instance_owners.insert(instance, record.id.clone());
        }
        state.node_groups.insert(record.id.clone(), record);
    }

    /// Records an operation against a node group.
    pub fn add_operation(&self, id: &str, kind: &str, done: bool) {
        let mut state = self.state();
        let count = state.operations.values().map(Vec::len).sum::<usize>();
        state
            .operations
            .entry(NodeGroupId::from(id))
            .or_default()
            .push(OperationRecord {
                id: format!("op-{count}"),
                kind: kind.to_owned(),
                done,
            });
    }

    /// Makes newly created node groups reveal their instance id only after
    /// `polls` unsuccessful polls. `u32::MAX` never reveals it.
    pub fn set_instance_delay_polls(&self, polls: u32) {
        self.state().instance_delay_polls = polls;
    }

    /// Fails the next call of `operation` with `error`. Repeated calls queue
    /// further failures.
    pub fn fail_next(&self, operation: &'static str, error: ComputeError) {
        self.state()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Delays every call of `operation` by `delay`.
    pub fn delay(&self, operation: &'static str, delay: Duration) {
        self.state().delays.insert(operation, delay);
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    /// Number of calls made to `operation`.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    /// Specs passed to `create_node_group`, in order.
    #[must_use]
    pub fn created_specs(&self) -> Vec<NodeGroupSpec> {
        self.state().created_specs.clone()
    }

    /// Snapshot of stored node groups.
    #[must_use]
    pub fn node_groups(&self) -> Vec<NodeGroupRecord> {
        self.state().node_groups.values().cloned().collect()
    }

    fn begin(&self, operation: &'static str) -> (Option<Duration>, Option<ComputeError>) {
        let mut state = self.state();
        state.calls.push(operation);
        let failure = state
            .failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front);
        (state.delays.get(operation).copied(), failure)
    }

    fn call<'a, T, F>(&'a self, operation: &'static str, body: F) -> ComputeFuture<'a, T>
    where
        T: Send + 'a,
        F: FnOnce(&mut FakeState) -> Result<T, ComputeError> + Send + 'a,
    {
        Box::pin(async move {
            let (delay, failure) = self.begin(operation);
            if let Some(pause) = delay {
                tokio::time::sleep(pause).await;
            }
            if let Some(err) = failure {
                return Err(err);
            }
            let mut state = self.state();
            body(&mut state)
        })
    }
}

/// Builds a node group record in the `RUNNING` state.
#[must_use]
pub fn node_group_record(
    id: &str,
    name: &str,
    cluster_id: &str,
    labels: &[(&str, &str)],
) -> NodeGroupRecord {
    NodeGroupRecord {
        id: NodeGroupId::from(id),
        name: name.to_owned(),
        cluster_id: cluster_id.to_owned(),
        labels: labels
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect(),
        shape: InstanceTypeDescriptor {
            platform: "standard-v3".into(),
            core_fraction: crate::catalog::CoreFraction::FULL,
            cpu: 2,
            memory_mib: 4096,
        },
        zone: Some(Zone::from("ru-central1-a")),
        subnet: Some(SubnetId::from("subnet-a")),
        disk_type: "network-ssd".to_owned(),
        disk_size_bytes: 64 << 30,
        discounted: false,
        instance_id: None,
        state: NodeGroupState::Running,
    }
}

impl ComputeApi for FakeComputeApi {
    fn network_id(&self) -> ComputeFuture<'_, NetworkId> {
        self.call(ops::NETWORK_ID, |state| Ok(state.network.clone()))
    }

    fn get_subnet<'a>(&'a self, id: &'a SubnetId) -> ComputeFuture<'a, SubnetRecord> {
        self.call(ops::GET_SUBNET, move |state| {
            state
                .subnets
                .get(id)
                .cloned()
                .ok_or_else(|| ComputeError::not_found("subnet", id))
        })
    }

    fn get_security_group<'a>(
        &'a self,
        id: &'a SecurityGroupId,
    ) -> ComputeFuture<'a, SecurityGroupRecord> {
        self.call(ops::GET_SECURITY_GROUP, move |state| {
            state
                .security_groups
                .get(id)
                .cloned()
                .ok_or_else(|| ComputeError::not_found("security group", id))
        })
    }

    fn list_node_groups(&self) -> ComputeFuture<'_, Vec<NodeGroupRecord>> {
        self.call(ops::LIST_NODE_GROUPS, |state| {
            Ok(state.node_groups.values().cloned().collect())
        })
    }

    fn get_node_group<'a>(&'a self, id: &'a NodeGroupId) -> ComputeFuture<'a, NodeGroupRecord> {
        self.call(ops::GET_NODE_GROUP, move |state| {
            state
                .node_groups
                .get(id)
                .cloned()
                .ok_or_else(|| ComputeError::not_found("node group", id))
        })
    }

    fn create_node_group<'a>(&'a self, spec: &'a NodeGroupSpec) -> ComputeFuture<'a, NodeGroupId> {
        self.call(ops::CREATE_NODE_GROUP, move |state| {
            state.next_id = state.next_id.saturating_add(1);
            let id = NodeGroupId::new(format!("ng-{}", state.next_id));
            let instance = format!("inst-{}", state.next_id);
            state.created_specs.push(spec.clone());
            state.node_groups.insert(
                id.clone(),
                NodeGroupRecord {
                    id: id.clone(),
                    name: spec.name.clone(),
                    cluster_id: spec.cluster_id.clone(),
                    labels: spec.labels.clone(),
                    shape: spec.shape.clone(),
                    zone: Some(spec.zone.clone()),
                    subnet: Some(spec.subnet.clone()),
                    disk_type: spec.disk_type.to_string(),
                    disk_size_bytes: spec.disk_size_bytes,
                    discounted: spec.discounted,
                    instance_id: None,
                    state: NodeGroupState::Provisioning,
                },
            );
            state.instance_owners.insert(instance.clone(), id.clone());
            let polls = state.instance_delay_polls;
            state.pending_instances.insert(id.clone(), (polls, instance));
            Ok(id)
        })
    }

    fn delete_node_group<'a>(&'a self, id: &'a NodeGroupId) -> ComputeFuture<'a, ()> {
        self.call(ops::DELETE_NODE_GROUP, move |state| {
            let record = state
                .node_groups
                .get_mut(id)
                .ok_or_else(|| ComputeError::not_found("node group", id))?;
            record.state = NodeGroupState::Deleting;
            let operations = state.operations.entry(id.clone()).or_default();
            let next = operations.len();
            operations.push(OperationRecord {
                id: format!("op-delete-{next}"),
                kind: DELETE_OPERATION_KIND.to_owned(),
                done: false,
            });
            Ok(())
        })
    }

    fn node_group_operations<'a>(
        &'a self,
        id: &'a NodeGroupId,
    ) -> ComputeFuture<'a, Vec<OperationRecord>> {
        self.call(ops::NODE_GROUP_OPERATIONS, move |state| {
            if !state.node_groups.contains_key(id) {
                return Err(ComputeError::not_found("node group", id));
            }
            Ok(state.operations.get(id).cloned().unwrap_or_default())
        })
    }

    fn node_group_instance_id<'a>(
        &'a self,
        id: &'a NodeGroupId,
    ) -> ComputeFuture<'a, Option<String>> {
        self.call(ops::NODE_GROUP_INSTANCE_ID, move |state| {
            if let Some((remaining, instance)) = state.pending_instances.get_mut(id) {
                if *remaining > 0 {
                    *remaining = remaining.saturating_sub(1);
                    return Ok(None);
                }
                let revealed = instance.clone();
                state.pending_instances.remove(id);
                if let Some(record) = state.node_groups.get_mut(id) {
                    record.instance_id = Some(revealed.clone());
                    record.state = NodeGroupState::Running;
                }
                return Ok(Some(revealed));
            }
            let record = state
                .node_groups
                .get(id)
                .ok_or_else(|| ComputeError::not_found("node group", id))?;
            Ok(record.instance_id.clone())
        })
    }

    fn instance_node_group_id<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ComputeFuture<'a, Option<NodeGroupId>> {
        self.call(ops::INSTANCE_NODE_GROUP_ID, move |state| {
            state
                .instance_owners
                .get(instance_id)
                .cloned()
                .map(Some)
                .ok_or_else(|| ComputeError::not_found("instance", instance_id))
        })
    }
}
