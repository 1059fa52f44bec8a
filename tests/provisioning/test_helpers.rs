//! Shared fixtures for provisioning BDD scenarios.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use nodeplan::test_support::FakeComputeApi;
use nodeplan::{
    ConditionStatus, CoreFraction, DeleteOutcome, InstanceCatalog, InstanceTypeProvider,
    LexicalTieBreaker, LifecycleSettings, NodeClass, OfferingResolver, PricingEngine,
    ProvisionError, ProvisionedNode, Provisioner, ResolvedSubnet, SelectionPolicy, SubnetId,
    ValidationSettings, Zone,
};
use rstest::fixture;

pub const NETWORK: &str = "net-1";

#[derive(Clone, Debug)]
pub struct ProvisioningContext {
    pub api: FakeComputeApi,
    pub class: NodeClass,
    pub outcome: Option<Result<ProvisionedNode, ProvisionError>>,
    pub deletes: Vec<DeleteOutcome>,
}

impl ProvisioningContext {
    pub fn provisioner(&self) -> Provisioner<FakeComputeApi, LexicalTieBreaker> {
        let zones: BTreeSet<Zone> = ["ru-central1-a", "ru-central1-b", "ru-central1-d"]
            .into_iter()
            .map(Zone::from)
            .collect();
        let lifecycle = LifecycleSettings {
            poll_interval: Duration::from_millis(10),
            resolve_timeout: Duration::from_secs(2),
            ..LifecycleSettings::for_cluster("cluster-1")
        };
        Provisioner::new(
            &Arc::new(self.api.clone()),
            InstanceTypeProvider::new(
                InstanceCatalog::builtin(),
                OfferingResolver::new(PricingEngine::builtin()),
                zones,
            ),
            SelectionPolicy::new(LexicalTieBreaker),
            lifecycle,
            ValidationSettings::default(),
        )
    }
}

fn subnet(id: &str, zone: &str, ips: u64) -> ResolvedSubnet {
    ResolvedSubnet {
        id: SubnetId::from(id),
        zone: Zone::from(zone),
        available_ips: Some(ips),
    }
}

#[fixture]
pub fn provisioning_context() -> ProvisioningContext {
    let api = FakeComputeApi::new(NETWORK);
    api.add_subnet("subnet-a1", NETWORK, "ru-central1-a");
    api.add_subnet("subnet-a2", NETWORK, "ru-central1-a");
    api.add_subnet("subnet-b", NETWORK, "ru-central1-b");

    let mut class = NodeClass::new("default");
    class.spec.disk_size_bytes = 64 << 30;
    class.spec.core_fractions = vec![CoreFraction::FULL];
    class.status.subnets_ready = ConditionStatus::True;
    class.status.subnets = vec![
        subnet("subnet-a1", "ru-central1-a", 10),
        subnet("subnet-a2", "ru-central1-a", 90),
        subnet("subnet-b", "ru-central1-b", 50),
    ];

    ProvisioningContext {
        api,
        class,
        outcome: None,
        deletes: Vec::new(),
    }
}
