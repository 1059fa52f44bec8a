//! Shared fixtures for validation BDD scenarios.

use std::sync::Arc;

use nodeplan::test_support::FakeComputeApi;
use nodeplan::{
    ConditionStatus, NodeClass, ResolvedSubnet, SubnetId, ValidationEngine, ValidationError,
    ValidationOutcome, ValidationSettings, Zone,
};
use rstest::fixture;

pub const NETWORK: &str = "net-1";

#[derive(Clone, Debug)]
pub struct ValidationContext {
    pub api: FakeComputeApi,
    pub engine: Arc<ValidationEngine<FakeComputeApi>>,
    pub class: NodeClass,
    pub outcomes: Vec<Result<ValidationOutcome, ValidationError>>,
}

impl ValidationContext {
    pub fn resolve_subnet(&mut self, id: &str, zone: &str) {
        self.class.status.subnets.push(ResolvedSubnet {
            id: SubnetId::from(id),
            zone: Zone::from(zone),
            available_ips: Some(100),
        });
    }
}

#[fixture]
pub fn validation_context() -> ValidationContext {
    let api = FakeComputeApi::new(NETWORK);
    let mut class = NodeClass::new("default");
    class.spec.disk_size_bytes = 64 << 30;
    class.status.subnets_ready = ConditionStatus::True;
    let engine = Arc::new(ValidationEngine::new(
        Arc::new(api.clone()),
        ValidationSettings::default(),
    ));
    ValidationContext {
        api,
        engine,
        class,
        outcomes: Vec::new(),
    }
}
