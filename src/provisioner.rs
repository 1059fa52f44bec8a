//! End-to-end provisioning: validate the node class, choose an offering, and
//! materialise it as a node group.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::compute::ComputeApi;
use crate::disk::{DiskType, UnknownDiskType};
use crate::lifecycle::{
    CreateRequest, DeleteOutcome, LifecycleError, LifecycleManager, LifecycleSettings,
};
use crate::node_class::{NodeClass, ResolvedSubnet};
use crate::offering::{CapacityType, InstanceTypeProvider, OfferingError, Requirements};
use crate::selection::{
    RandomTieBreaker, ResourceRequest, SelectionError, SelectionPolicy, SelectionRequest,
    TieBreaker,
};
use crate::types::{NodeGroupId, ProviderId, SubnetId, Zone};
use crate::validation::{
    ValidationEngine, ValidationError, ValidationSettings, ValidationState,
};

/// A node to launch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProvisionRequest {
    /// Idempotency name for the node group.
    pub name: String,
    /// Resource minimums.
    pub resources: ResourceRequest,
    /// Label constraints such as zone or capacity type.
    pub requirements: Requirements,
}

/// A launched node.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionedNode {
    /// Node group backing the node.
    pub node_group_id: NodeGroupId,
    /// Provider id to publish on the node.
    pub provider_id: ProviderId,
    /// Canonical instance-type name.
    pub instance_type: String,
    /// Zone of the node.
    pub zone: Zone,
    /// Capacity type bought.
    pub capacity_type: CapacityType,
    /// Hourly price of the chosen offering.
    pub price: Option<f64>,
}

/// Errors raised while provisioning.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ProvisionError {
    /// The node class has no passing verdict.
    #[error("node class {name} is not ready ({state:?}): {reason}: {message}")]
    NotValidated {
        /// Node class name.
        name: String,
        /// Current validation state.
        state: ValidationState,
        /// Reason code.
        reason: String,
        /// Detail.
        message: String,
    },
    /// Validation could not reach a verdict.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Instance types could not be built.
    #[error(transparent)]
    Offering(#[from] OfferingError),
    /// Nothing satisfies the request.
    #[error(transparent)]
    Selection(#[from] SelectionError),
    /// The chosen zone has no resolved subnet.
    #[error("no resolved subnet in zone {zone}")]
    NoSubnetInZone {
        /// Chosen zone.
        zone: Zone,
    },
    /// The node class names an unknown disk type.
    #[error(transparent)]
    DiskType(#[from] UnknownDiskType),
    /// Node group management failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl ProvisionError {
    /// Reports whether retrying later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NotValidated { .. } | Self::Validation(_) => true,
            Self::Lifecycle(err) => err.is_retryable(),
            Self::Offering(_)
            | Self::Selection(_)
            | Self::NoSubnetInZone { .. }
            | Self::DiskType(_) => false,
        }
    }
}

/// Wires validation, selection and lifecycle management together.
#[derive(Debug)]
pub struct Provisioner<A: ?Sized, T = RandomTieBreaker> {
    validation: ValidationEngine<A>,
    instance_types: InstanceTypeProvider,
    policy: SelectionPolicy<T>,
    lifecycle: LifecycleManager<A>,
}

impl<A: ComputeApi + ?Sized, T: TieBreaker> Provisioner<A, T> {
    /// Builds a provisioner sharing one provider client.
    #[must_use]
    pub fn new(
        api: &Arc<A>,
        instance_types: InstanceTypeProvider,
        policy: SelectionPolicy<T>,
        lifecycle: LifecycleSettings,
        validation: ValidationSettings,
    ) -> Self {
        Self {
            validation: ValidationEngine::new(Arc::clone(api), validation),
            instance_types,
            policy,
            lifecycle: LifecycleManager::new(Arc::clone(api), lifecycle),
        }
    }

    /// Launches the cheapest node satisfying `request` under `class`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::NotValidated`] unless the class validates,
    /// [`ProvisionError::Selection`] when nothing fits, and the underlying
    /// failure otherwise. See [`ProvisionError::is_retryable`].
    pub async fn provision(
        &self,
        class: &NodeClass,
        request: &ProvisionRequest,
    ) -> Result<ProvisionedNode, ProvisionError> {
        let outcome = self.validation.reconcile(class).await?;
        if outcome.state != ValidationState::Succeeded {
            return Err(ProvisionError::NotValidated {
                name: class.name.clone(),
                state: outcome.state,
                reason: outcome.result.reason,
                message: outcome.result.message,
            });
        }

        let candidates = self.instance_types.list(class)?;
        let selection = self.policy.select(
            &candidates,
            &SelectionRequest {
                requirements: request.requirements.clone(),
                resources: request.resources,
            },
        )?;
        let zone = selection.offering.zone.clone();
        let subnet = roomiest_subnet(&class.status.subnets, &zone)
            .ok_or_else(|| ProvisionError::NoSubnetInZone { zone: zone.clone() })?;

        let create = CreateRequest {
            name: request.name.clone(),
            shape: selection.instance_type.descriptor.clone(),
            zone: zone.clone(),
            subnet,
            discounted: selection.offering.capacity_type == CapacityType::Discounted,
            disk_type: DiskType::from_configured(&class.spec.disk_type)?,
            disk_size_bytes: class.spec.disk_size_bytes,
            labels: class.spec.labels.clone(),
            security_groups: class.spec.security_groups.clone(),
            accelerated_network: class.spec.accelerated_network,
        };
        let node_group_id = self.lifecycle.create(&create).await?;
        let provider_id = self.lifecycle.resolve_external_id(&node_group_id).await?;
        info!(
            name = %request.name,
            %node_group_id,
            %provider_id,
            instance_type = %selection.instance_type.name,
            "node provisioned"
        );
        Ok(ProvisionedNode {
            node_group_id,
            provider_id,
            instance_type: selection.instance_type.name,
            zone,
            capacity_type: selection.offering.capacity_type,
            price: selection.offering.price,
        })
    }

    /// Deletes the node group behind a node.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Lifecycle`] when the provider call fails.
    pub async fn deprovision(&self, id: &NodeGroupId) -> Result<DeleteOutcome, ProvisionError> {
        Ok(self.lifecycle.delete(id).await?)
    }
}

/// Subnet in `zone` with the most free addresses; unknown counts rank last
/// and ids break ties.
fn roomiest_subnet(subnets: &[ResolvedSubnet], zone: &Zone) -> Option<SubnetId> {
    subnets
        .iter()
        .filter(|subnet| &subnet.zone == zone && !subnet.id.is_empty())
        .max_by(|left, right| {
            left.available_ips
                .cmp(&right.available_ips)
                .then_with(|| right.id.cmp(&left.id))
        })
        .map(|subnet| subnet.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CoreFraction, InstanceCatalog};
    use crate::compute::ComputeError;
    use crate::node_class::ConditionStatus;
    use crate::offering::{OfferingResolver, labels};
    use crate::pricing::PricingEngine;
    use crate::selection::LexicalTieBreaker;
    use crate::test_support::{FakeComputeApi, ops};
    use rstest::{fixture, rstest};
    use std::collections::BTreeSet;

    fn subnet(id: &str, zone: &str, ips: Option<u64>) -> ResolvedSubnet {
        ResolvedSubnet {
            id: SubnetId::from(id),
            zone: Zone::from(zone),
            available_ips: ips,
        }
    }

    #[fixture]
    fn api() -> Arc<FakeComputeApi> {
        let fake = FakeComputeApi::new("net-1");
        fake.add_subnet("subnet-a1", "net-1", "ru-central1-a");
        fake.add_subnet("subnet-a2", "net-1", "ru-central1-a");
        fake.add_subnet("subnet-b", "net-1", "ru-central1-b");
        Arc::new(fake)
    }

    #[fixture]
    fn class() -> NodeClass {
        let mut class = NodeClass::new("default");
        class.spec.disk_size_bytes = 64 << 30;
        class.spec.can_be_discounted = true;
        class.spec.core_fractions = vec![CoreFraction::FULL];
        class.status.subnets_ready = ConditionStatus::True;
        class.status.subnets = vec![
            subnet("subnet-a1", "ru-central1-a", Some(10)),
            subnet("subnet-a2", "ru-central1-a", Some(90)),
            subnet("subnet-b", "ru-central1-b", Some(50)),
        ];
        class
    }

    fn provisioner(api: &Arc<FakeComputeApi>) -> Provisioner<FakeComputeApi, LexicalTieBreaker> {
        let zones: BTreeSet<Zone> = ["ru-central1-a", "ru-central1-b"]
            .into_iter()
            .map(Zone::from)
            .collect();
        Provisioner::new(
            api,
            InstanceTypeProvider::new(
                InstanceCatalog::builtin(),
                OfferingResolver::new(PricingEngine::builtin()),
                zones,
            ),
            SelectionPolicy::new(LexicalTieBreaker),
            LifecycleSettings::for_cluster("cluster-1"),
            ValidationSettings::default(),
        )
    }

    fn two_by_four(name: &str) -> ProvisionRequest {
        ProvisionRequest {
            name: name.to_owned(),
            resources: ResourceRequest {
                cpu: 2,
                memory_mib: 4096,
                disk_gib: 0,
            },
            requirements: Requirements::new().with(labels::PLATFORM, ["standard-v3"]),
        }
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn provisions_cheapest_spot_node_in_roomiest_subnet(
        api: Arc<FakeComputeApi>,
        class: NodeClass,
    ) {
        let node = provisioner(&api)
            .provision(&class, &two_by_four("default-x1"))
            .await
            .unwrap_or_else(|err| panic!("provisioning should succeed: {err}"));
        assert_eq!(node.instance_type, "standard-v3_2_4Gi_100");
        assert_eq!(node.capacity_type, CapacityType::Discounted);
        assert_eq!(node.zone.as_str(), "ru-central1-a");
        assert_eq!(node.provider_id.as_str(), "yandex://inst-1");

        let specs = api.created_specs();
        let [spec] = specs.as_slice() else {
            panic!("expected one create, got {specs:?}");
        };
        assert_eq!(spec.subnet.as_str(), "subnet-a2");
        assert!(spec.discounted);
        assert_eq!(spec.disk_type, DiskType::NetworkSsd);
    }

    #[rstest]
    #[tokio::test]
    async fn unvalidated_class_is_retryable(api: Arc<FakeComputeApi>, mut class: NodeClass) {
        class.status.subnets_ready = ConditionStatus::Unknown;
        let err = provisioner(&api)
            .provision(&class, &two_by_four("default-x1"))
            .await
            .err()
            .unwrap_or_else(|| panic!("unvalidated class should be refused"));
        assert!(matches!(err, ProvisionError::NotValidated { .. }));
        assert!(err.is_retryable());
        assert_eq!(api.call_count(ops::CREATE_NODE_GROUP), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn insufficient_capacity_is_terminal(api: Arc<FakeComputeApi>, class: NodeClass) {
        let mut request = two_by_four("default-x1");
        request.resources.cpu = 4096;
        let err = provisioner(&api)
            .provision(&class, &request)
            .await
            .err()
            .unwrap_or_else(|| panic!("oversized request should fail"));
        assert!(matches!(err, ProvisionError::Selection(_)));
        assert!(!err.is_retryable());
    }

    #[rstest]
    #[tokio::test]
    async fn provider_outage_during_create_is_retryable(api: Arc<FakeComputeApi>, class: NodeClass) {
        api.fail_next(
            ops::CREATE_NODE_GROUP,
            ComputeError::Api {
                status: 500,
                message: "internal".to_owned(),
            },
        );
        let err = provisioner(&api)
            .provision(&class, &two_by_four("default-x1"))
            .await
            .err()
            .unwrap_or_else(|| panic!("create failure should surface"));
        assert!(matches!(err, ProvisionError::Lifecycle(_)));
        assert!(err.is_retryable());
    }

    #[rstest]
    #[tokio::test]
    async fn rejected_create_is_terminal(api: Arc<FakeComputeApi>, class: NodeClass) {
        api.fail_next(
            ops::CREATE_NODE_GROUP,
            ComputeError::Api {
                status: 403,
                message: "permission denied".to_owned(),
            },
        );
        let err = provisioner(&api)
            .provision(&class, &two_by_four("default-x2"))
            .await
            .err()
            .unwrap_or_else(|| panic!("create failure should surface"));
        assert!(matches!(err, ProvisionError::Lifecycle(_)));
        assert!(!err.is_retryable());
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn deprovision_is_idempotent(api: Arc<FakeComputeApi>, class: NodeClass) {
        let nodes = provisioner(&api);
        let node = nodes
            .provision(&class, &two_by_four("default-x1"))
            .await
            .unwrap_or_else(|err| panic!("provisioning should succeed: {err}"));
        assert_eq!(nodes.deprovision(&node.node_group_id).await, Ok(DeleteOutcome::Requested));
        assert_eq!(nodes.deprovision(&node.node_group_id).await, Ok(DeleteOutcome::InFlight));
    }

    #[rstest]
    #[case::prefers_more_addresses("ru-central1-a", Some("subnet-a2"))]
    #[case::single_subnet("ru-central1-b", Some("subnet-b"))]
    #[case::no_subnet("ru-central1-d", None)]
    fn roomiest_subnet_choice(class: NodeClass, #[case] zone: &str, #[case] expected: Option<&str>) {
        let chosen = roomiest_subnet(&class.status.subnets, &Zone::from(zone));
        assert_eq!(chosen.as_deref(), expected);
    }
}
