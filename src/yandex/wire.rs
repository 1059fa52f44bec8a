//! JSON shapes of the provider's REST API and their conversion into
//! [`crate::compute`] records.
//!
//! The REST gateway renders protobuf `int64` fields as strings; older
//! endpoints and hand-written fixtures use numbers. Both are accepted.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::{CoreFraction, InstanceTypeDescriptor};
use crate::compute::{
    ComputeError, NodeGroupRecord, NodeGroupSpec, NodeGroupState, OperationRecord,
    SecurityGroupRecord, SubnetRecord,
};
use crate::lifecycle::{MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use crate::types::{NetworkId, NodeGroupId, PlatformId, SecurityGroupId, SubnetId, Zone};

/// Taint keeping workloads off a node until it registers with the cluster.
pub const UNREGISTERED_TAINT_KEY: &str = "karpenter.sh/unregistered";

#[derive(Deserialize)]
#[serde(untagged)]
enum Int64 {
    Number(u64),
    Text(String),
}

fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Option::<Int64>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Int64::Number(value)) => Ok(value),
        Some(Int64::Text(text)) if text.is_empty() => Ok(0),
        Some(Int64::Text(text)) => text.parse().map_err(serde::de::Error::custom),
    }
}

fn decode_error(what: &str, message: impl ToString) -> ComputeError {
    ComputeError::Decode {
        what: what.to_owned(),
        message: message.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Cluster {
    #[serde(default)]
    pub(super) folder_id: String,
    #[serde(default)]
    pub(super) network_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Subnet {
    pub(super) id: String,
    #[serde(default)]
    pub(super) network_id: String,
    #[serde(default)]
    pub(super) zone_id: String,
}

impl From<Subnet> for SubnetRecord {
    fn from(subnet: Subnet) -> Self {
        Self {
            id: SubnetId::new(subnet.id),
            network_id: NetworkId::new(subnet.network_id),
            zone: Zone::new(subnet.zone_id),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SecurityGroup {
    pub(super) id: String,
    #[serde(default)]
    pub(super) network_id: String,
}

impl From<SecurityGroup> for SecurityGroupRecord {
    fn from(group: SecurityGroup) -> Self {
        Self {
            id: SecurityGroupId::new(group.id),
            network_id: NetworkId::new(group.network_id),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Instance {
    #[serde(default)]
    pub(super) labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ResourcesSpec {
    #[serde(default, deserialize_with = "int64")]
    memory: u64,
    #[serde(default, deserialize_with = "int64")]
    cores: u64,
    #[serde(default, deserialize_with = "int64")]
    core_fraction: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DiskSpec {
    #[serde(default)]
    disk_type_id: String,
    #[serde(default, deserialize_with = "int64")]
    disk_size: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SchedulingPolicy {
    #[serde(default)]
    preemptible: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NetworkInterface {
    #[serde(default)]
    subnet_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NodeTemplate {
    #[serde(default)]
    platform_id: String,
    #[serde(default)]
    resources_spec: ResourcesSpec,
    #[serde(default)]
    boot_disk_spec: DiskSpec,
    #[serde(default)]
    scheduling_policy: SchedulingPolicy,
    #[serde(default)]
    network_interface_specs: Vec<NetworkInterface>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Location {
    #[serde(default)]
    zone_id: String,
    #[serde(default)]
    subnet_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AllocationPolicy {
    #[serde(default)]
    locations: Vec<Location>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NodeGroup {
    pub(super) id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    cluster_id: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    node_template: NodeTemplate,
    #[serde(default)]
    allocation_policy: AllocationPolicy,
}

impl NodeGroup {
    /// Reports whether the group belongs to `cluster_id` and carries the
    /// management label.
    pub(super) fn is_managed_in(&self, cluster_id: &str) -> bool {
        self.cluster_id == cluster_id
            && self.labels.get(MANAGED_BY_LABEL).map(String::as_str) == Some(MANAGED_BY_VALUE)
    }
}

impl TryFrom<NodeGroup> for NodeGroupRecord {
    type Error = ComputeError;

    fn try_from(group: NodeGroup) -> Result<Self, Self::Error> {
        let template = group.node_template;
        let resources = template.resources_spec;
        let fraction = u8::try_from(resources.core_fraction)
            .ok()
            .and_then(CoreFraction::new)
            .ok_or_else(|| {
                decode_error(
                    "node group",
                    format!("invalid core fraction {}", resources.core_fraction),
                )
            })?;
        let cpu = u32::try_from(resources.cores).map_err(|err| decode_error("node group", err))?;
        let location = group.allocation_policy.locations.into_iter().next();
        let subnet = location
            .as_ref()
            .map(|place| place.subnet_id.clone())
            .filter(|id| !id.is_empty())
            .or_else(|| {
                template
                    .network_interface_specs
                    .into_iter()
                    .flat_map(|interface| interface.subnet_ids)
                    .next()
            });
        Ok(Self {
            id: NodeGroupId::new(group.id),
            name: group.name,
            cluster_id: group.cluster_id,
            labels: group.labels,
            shape: InstanceTypeDescriptor {
                platform: PlatformId::new(template.platform_id),
                core_fraction: fraction,
                cpu,
                memory_mib: resources.memory.checked_shr(20).unwrap_or(0),
            },
            zone: location
                .map(|place| place.zone_id)
                .filter(|zone| !zone.is_empty())
                .map(Zone::new),
            subnet: subnet.map(SubnetId::new),
            disk_type: template.boot_disk_spec.disk_type_id,
            disk_size_bytes: template.boot_disk_spec.disk_size,
            discounted: template.scheduling_policy.preemptible,
            instance_id: None,
            state: NodeGroupState::from_provider(&group.status),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NodeGroupPage {
    #[serde(default)]
    pub(super) node_groups: Vec<NodeGroup>,
    #[serde(default)]
    pub(super) next_page_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CloudStatus {
    #[serde(default)]
    pub(super) id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Node {
    #[serde(default)]
    pub(super) cloud_status: CloudStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NodePage {
    #[serde(default)]
    pub(super) nodes: Vec<Node>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct OperationMetadata {
    #[serde(default, rename = "@type")]
    kind: String,
    #[serde(default, rename = "nodeGroupId")]
    node_group_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct OperationStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Operation {
    #[serde(default)]
    id: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    metadata: OperationMetadata,
    #[serde(default)]
    error: Option<OperationStatus>,
}

impl Operation {
    /// Fails when the provider rejected the operation outright.
    pub(super) fn accepted(self) -> Result<Self, ComputeError> {
        match self.error {
            Some(status) if status.code != 0 => Err(ComputeError::Api {
                status: u16::try_from(status.code).unwrap_or(u16::MAX),
                message: status.message,
            }),
            _ => Ok(self),
        }
    }

    /// Node group named in the operation metadata.
    pub(super) fn node_group_id(&self) -> Result<NodeGroupId, ComputeError> {
        if self.metadata.node_group_id.is_empty() {
            return Err(decode_error(
                "create operation",
                format!("operation {} carries no node group id", self.id),
            ));
        }
        Ok(NodeGroupId::new(self.metadata.node_group_id.clone()))
    }
}

impl From<Operation> for OperationRecord {
    fn from(operation: Operation) -> Self {
        Self {
            id: operation.id,
            kind: operation.metadata.kind,
            done: operation.done,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OperationPage {
    #[serde(default)]
    pub(super) operations: Vec<Operation>,
    #[serde(default)]
    pub(super) next_page_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourcesRequest {
    memory: String,
    cores: String,
    core_fraction: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiskRequest {
    disk_type_id: String,
    disk_size: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SchedulingRequest {
    preemptible: bool,
}

#[derive(Debug, Serialize)]
struct Empty {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkInterfaceRequest {
    subnet_ids: Vec<String>,
    primary_v4_address_spec: Empty,
    security_group_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TypeSetting {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeTemplateRequest {
    name: String,
    labels: BTreeMap<String, String>,
    platform_id: String,
    resources_spec: ResourcesRequest,
    boot_disk_spec: DiskRequest,
    metadata: BTreeMap<String, String>,
    scheduling_policy: SchedulingRequest,
    network_interface_specs: Vec<NetworkInterfaceRequest>,
    network_settings: TypeSetting,
    container_runtime_settings: TypeSetting,
}

#[derive(Debug, Serialize)]
struct FixedScale {
    size: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScalePolicy {
    fixed_scale: FixedScale,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationRequest {
    zone_id: String,
}

#[derive(Debug, Serialize)]
struct AllocationRequest {
    locations: Vec<LocationRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployPolicy {
    max_unavailable: &'static str,
    max_expansion: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MaintenancePolicy {
    auto_repair: bool,
    auto_upgrade: bool,
}

#[derive(Debug, Serialize)]
struct Taint {
    key: &'static str,
    value: &'static str,
    effect: &'static str,
}

/// Body of `POST /nodeGroups`: a fixed-size group of one node.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateNodeGroup {
    cluster_id: String,
    name: String,
    description: &'static str,
    labels: BTreeMap<String, String>,
    node_template: NodeTemplateRequest,
    scale_policy: ScalePolicy,
    allocation_policy: AllocationRequest,
    deploy_policy: DeployPolicy,
    maintenance_policy: MaintenancePolicy,
    node_taints: Vec<Taint>,
    node_labels: BTreeMap<String, String>,
}

impl From<&NodeGroupSpec> for CreateNodeGroup {
    fn from(spec: &NodeGroupSpec) -> Self {
        let memory_bytes = spec.shape.memory_mib.checked_shl(20).unwrap_or(u64::MAX);
        let network = if spec.accelerated_network {
            "SOFTWARE_ACCELERATED"
        } else {
            "STANDARD"
        };
        Self {
            cluster_id: spec.cluster_id.clone(),
            name: spec.name.clone(),
            description: "nodeplan node group",
            labels: spec.labels.clone(),
            node_template: NodeTemplateRequest {
                name: format!("{}-{}-{{instance.index}}", spec.name, spec.zone),
                labels: spec.labels.clone(),
                platform_id: spec.shape.platform.to_string(),
                resources_spec: ResourcesRequest {
                    memory: memory_bytes.to_string(),
                    cores: spec.shape.cpu.to_string(),
                    core_fraction: spec.shape.core_fraction.to_string(),
                },
                boot_disk_spec: DiskRequest {
                    disk_type_id: spec.disk_type.to_string(),
                    disk_size: spec.disk_size_bytes.to_string(),
                },
                metadata: BTreeMap::from([("enable-oslogin".to_owned(), "true".to_owned())]),
                scheduling_policy: SchedulingRequest {
                    preemptible: spec.discounted,
                },
                network_interface_specs: vec![NetworkInterfaceRequest {
                    subnet_ids: vec![spec.subnet.to_string()],
                    primary_v4_address_spec: Empty {},
                    security_group_ids: spec
                        .security_groups
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                }],
                network_settings: TypeSetting { kind: network },
                container_runtime_settings: TypeSetting { kind: "CONTAINERD" },
            },
            scale_policy: ScalePolicy {
                fixed_scale: FixedScale { size: "1" },
            },
            allocation_policy: AllocationRequest {
                locations: vec![LocationRequest {
                    zone_id: spec.zone.to_string(),
                }],
            },
            deploy_policy: DeployPolicy {
                max_unavailable: "0",
                max_expansion: "1",
            },
            maintenance_policy: MaintenancePolicy {
                auto_repair: true,
                auto_upgrade: false,
            },
            node_taints: vec![Taint {
                key: UNREGISTERED_TAINT_KEY,
                value: "",
                effect: "NO_EXECUTE",
            }],
            node_labels: spec.node_labels.clone(),
        }
    }
}
