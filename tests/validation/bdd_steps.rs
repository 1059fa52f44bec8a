//! BDD step definitions for node class validation.

use std::sync::Arc;

use nodeplan::test_support::ops;
use nodeplan::{ConditionStatus, CoreFraction, SecurityGroupId, ValidationOutcome};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{NETWORK, ValidationContext};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn last_outcome(context: &ValidationContext) -> Result<&ValidationOutcome, StepError> {
    match context.outcomes.last() {
        Some(Ok(outcome)) => Ok(outcome),
        Some(Err(err)) => Err(StepError::Assertion(format!(
            "expected a verdict, got {err}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[given("a node class with subnets resolved in the cluster network")]
fn resolved_class(mut validation_context: ValidationContext) -> ValidationContext {
    validation_context
        .api
        .add_subnet("subnet-a", NETWORK, "ru-central1-a");
    validation_context.resolve_subnet("subnet-a", "ru-central1-a");
    validation_context
}

#[given("subnet resolution has not finished")]
fn resolution_pending(mut validation_context: ValidationContext) -> ValidationContext {
    validation_context.class.status.subnets_ready = ConditionStatus::Unknown;
    validation_context
}

#[given("the boot disk is \"{disk_type}\" of {mib:u64} MiB")]
fn boot_disk(
    mut validation_context: ValidationContext,
    disk_type: String,
    mib: u64,
) -> ValidationContext {
    validation_context.class.spec.disk_type = disk_type;
    validation_context.class.spec.disk_size_bytes = mib << 20;
    validation_context
}

#[given("subnet \"{id}\" in network \"{network}\" is resolved in zone \"{zone}\"")]
fn extra_subnet(
    mut validation_context: ValidationContext,
    id: String,
    network: String,
    zone: String,
) -> ValidationContext {
    validation_context.api.add_subnet(&id, &network, &zone);
    validation_context.resolve_subnet(&id, &zone);
    validation_context
}

#[given("the cloud reports subnet \"{id}\" in zone \"{zone}\"")]
fn cloud_subnet_zone(
    validation_context: ValidationContext,
    id: String,
    zone: String,
) -> ValidationContext {
    validation_context.api.add_subnet(&id, NETWORK, &zone);
    validation_context
}

#[given("the node class attaches security group \"{id}\"")]
fn attach_security_group(mut validation_context: ValidationContext, id: String) -> ValidationContext {
    validation_context
        .class
        .spec
        .security_groups
        .push(SecurityGroupId::new(id));
    validation_context
}

#[given("accelerated networking is requested with core fraction {percent:u8}")]
fn accelerated_network(
    mut validation_context: ValidationContext,
    percent: u8,
) -> Result<ValidationContext, StepError> {
    let fraction = CoreFraction::new(percent)
        .ok_or_else(|| StepError::Assertion(format!("invalid core fraction {percent}")))?;
    validation_context.class.spec.accelerated_network = true;
    validation_context.class.spec.core_fractions = vec![fraction];
    Ok(validation_context)
}

#[when("I validate the node class")]
fn validate(mut validation_context: ValidationContext) -> Result<ValidationContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let engine = Arc::clone(&validation_context.engine);
    let class = validation_context.class.clone();
    let outcome = runtime.block_on(async move { engine.reconcile(&class).await });
    validation_context.outcomes.push(outcome);
    Ok(validation_context)
}

#[then("the validation state is \"{state}\"")]
fn validation_state(validation_context: &ValidationContext, state: String) -> Result<(), StepError> {
    let outcome = last_outcome(validation_context)?;
    let observed = format!("{:?}", outcome.state);
    if observed == state {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected state {state}, got {observed} ({})",
            outcome.result.message
        )))
    }
}

#[then("the validation reason is \"{reason}\"")]
fn validation_reason(
    validation_context: &ValidationContext,
    reason: String,
) -> Result<(), StepError> {
    let outcome = last_outcome(validation_context)?;
    if outcome.result.reason == reason {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected reason {reason}, got {:?}: {}",
            outcome.result.reason, outcome.result.message
        )))
    }
}

#[then("the provider was not called")]
fn provider_not_called(validation_context: &ValidationContext) -> Result<(), StepError> {
    let calls = validation_context.api.calls();
    if calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no provider calls, got {calls:?}"
        )))
    }
}

#[then("the provider was asked for each subnet once")]
fn subnet_lookups_once(validation_context: &ValidationContext) -> Result<(), StepError> {
    let lookups = validation_context.api.call_count(ops::GET_SUBNET);
    let expected = validation_context.class.status.subnets.len();
    if lookups == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected} subnet lookups, got {lookups}"
        )))
    }
}
