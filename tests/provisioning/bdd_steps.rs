//! BDD step definitions for node provisioning.

use nodeplan::test_support::ops;
use nodeplan::{
    ConditionStatus, DeleteOutcome, ProvisionRequest, ProvisionedNode, Requirements,
    ResourceRequest, labels,
};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::ProvisioningContext;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn runtime() -> Result<Runtime, StepError> {
    Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))
}

fn provisioned(context: &ProvisioningContext) -> Result<&ProvisionedNode, StepError> {
    match &context.outcome {
        Some(Ok(node)) => Ok(node),
        Some(Err(err)) => Err(StepError::Assertion(format!(
            "expected a provisioned node, got {err}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[given("a validated node class allowing discounted capacity")]
fn discounted_class(mut provisioning_context: ProvisioningContext) -> ProvisioningContext {
    provisioning_context.class.spec.can_be_discounted = true;
    provisioning_context
}

#[given("a validated node class without discounted capacity")]
fn on_demand_class(mut provisioning_context: ProvisioningContext) -> ProvisioningContext {
    provisioning_context.class.spec.can_be_discounted = false;
    provisioning_context
}

#[given("a node class whose subnets are not resolved")]
fn unresolved_class(mut provisioning_context: ProvisioningContext) -> ProvisioningContext {
    provisioning_context.class.status.subnets_ready = ConditionStatus::Unknown;
    provisioning_context
}

#[when("I provision a node with {cpu:u32} vCPU and {memory_gib:u64} GiB named \"{name}\"")]
fn provision(
    provisioning_context: ProvisioningContext,
    cpu: u32,
    memory_gib: u64,
    name: String,
) -> Result<ProvisioningContext, StepError> {
    let request = ProvisionRequest {
        name,
        resources: ResourceRequest {
            cpu,
            memory_mib: memory_gib.saturating_mul(1024),
            disk_gib: 0,
        },
        requirements: Requirements::new().with(labels::PLATFORM, ["standard-v3"]),
    };
    let provisioner = provisioning_context.provisioner();
    let class = provisioning_context.class.clone();
    let outcome = runtime()?.block_on(async move { provisioner.provision(&class, &request).await });
    Ok(ProvisioningContext {
        outcome: Some(outcome),
        ..provisioning_context
    })
}

#[when("I deprovision the node twice")]
fn deprovision_twice(
    provisioning_context: ProvisioningContext,
) -> Result<ProvisioningContext, StepError> {
    let id = provisioned(&provisioning_context)?.node_group_id.clone();
    let provisioner = provisioning_context.provisioner();
    let deletes = runtime()?
        .block_on(async move {
            let first = provisioner.deprovision(&id).await?;
            let second = provisioner.deprovision(&id).await?;
            Ok::<_, nodeplan::ProvisionError>(vec![first, second])
        })
        .map_err(|err| StepError::Assertion(format!("deprovision failed: {err}")))?;
    Ok(ProvisioningContext {
        deletes,
        ..provisioning_context
    })
}

#[then("the node runs on instance type \"{name}\"")]
fn node_instance_type(
    provisioning_context: &ProvisioningContext,
    name: String,
) -> Result<(), StepError> {
    let node = provisioned(provisioning_context)?;
    if node.instance_type == name {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected instance type {name}, got {}",
            node.instance_type
        )))
    }
}

#[then("the node uses \"{capacity}\" capacity in zone \"{zone}\"")]
fn node_capacity_and_zone(
    provisioning_context: &ProvisioningContext,
    capacity: String,
    zone: String,
) -> Result<(), StepError> {
    let node = provisioned(provisioning_context)?;
    if node.capacity_type.as_str() == capacity && node.zone.as_str() == zone {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {capacity} in {zone}, got {} in {}",
            node.capacity_type, node.zone
        )))
    }
}

#[then("the node group was created in subnet \"{subnet}\"")]
fn node_group_subnet(
    provisioning_context: &ProvisioningContext,
    subnet: String,
) -> Result<(), StepError> {
    let specs = provisioning_context.api.created_specs();
    let [spec] = specs.as_slice() else {
        return Err(StepError::Assertion(format!(
            "expected one created node group, got {}",
            specs.len()
        )));
    };
    if spec.subnet.as_str() == subnet {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected subnet {subnet}, got {}",
            spec.subnet
        )))
    }
}

#[then("the node reports provider id \"{provider_id}\"")]
fn node_provider_id(
    provisioning_context: &ProvisioningContext,
    provider_id: String,
) -> Result<(), StepError> {
    let node = provisioned(provisioning_context)?;
    if node.provider_id.as_str() == provider_id {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected provider id {provider_id}, got {}",
            node.provider_id
        )))
    }
}

#[then("{count} node group was created")]
fn one_node_group_created(
    provisioning_context: &ProvisioningContext,
    count: usize,
) -> Result<(), StepError> {
    created_count(provisioning_context, count)
}

#[then("{count} node groups were created")]
fn node_groups_created(
    provisioning_context: &ProvisioningContext,
    count: usize,
) -> Result<(), StepError> {
    created_count(provisioning_context, count)
}

fn created_count(provisioning_context: &ProvisioningContext, count: usize) -> Result<(), StepError> {
    let created = provisioning_context
        .api
        .call_count(ops::CREATE_NODE_GROUP);
    if created == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} create calls, got {created}"
        )))
    }
}

#[then("provisioning fails with a retryable error")]
fn fails_retryable(provisioning_context: &ProvisioningContext) -> Result<(), StepError> {
    match &provisioning_context.outcome {
        Some(Err(err)) if err.is_retryable() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a retryable failure, got {other:?}"
        ))),
    }
}

#[then("provisioning fails with a terminal error")]
fn fails_terminal(provisioning_context: &ProvisioningContext) -> Result<(), StepError> {
    match &provisioning_context.outcome {
        Some(Err(err)) if !err.is_retryable() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a terminal failure, got {other:?}"
        ))),
    }
}

#[then("the delete outcomes are \"{first}\" then \"{second}\"")]
fn delete_outcomes(
    provisioning_context: &ProvisioningContext,
    first: String,
    second: String,
) -> Result<(), StepError> {
    let observed: Vec<String> = provisioning_context
        .deletes
        .iter()
        .map(|outcome: &DeleteOutcome| format!("{outcome:?}"))
        .collect();
    if observed == [first.clone(), second.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected [{first}, {second}], got {observed:?}"
        )))
    }
}
