//! BDD scenarios for node provisioning.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ProvisioningContext, provisioning_context};

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Launch the cheapest discounted node in the roomiest subnet"
)]
fn scenario_cheapest_spot(provisioning_context: ProvisioningContext) {
    drop(provisioning_context);
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "On-demand classes never buy discounted capacity"
)]
fn scenario_on_demand_only(provisioning_context: ProvisioningContext) {
    drop(provisioning_context);
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Repeated provisioning reuses the node group"
)]
fn scenario_idempotent_create(provisioning_context: ProvisioningContext) {
    drop(provisioning_context);
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Classes with unresolved subnets are refused for now"
)]
fn scenario_unresolved_subnets(provisioning_context: ProvisioningContext) {
    drop(provisioning_context);
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Requests no shape can satisfy fail for good"
)]
fn scenario_insufficient_capacity(provisioning_context: ProvisioningContext) {
    drop(provisioning_context);
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Deleting a node twice reports the delete in flight"
)]
fn scenario_delete_in_flight(provisioning_context: ProvisioningContext) {
    drop(provisioning_context);
}
