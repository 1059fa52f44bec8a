//! BDD scenarios for node class validation.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ValidationContext, validation_context};

#[scenario(
    path = "tests/features/validation.feature",
    name = "A well-formed class validates"
)]
fn scenario_valid_class(validation_context: ValidationContext) {
    drop(validation_context);
}

#[scenario(
    path = "tests/features/validation.feature",
    name = "Unresolved subnets hold validation back"
)]
fn scenario_dependencies_unknown(validation_context: ValidationContext) {
    drop(validation_context);
}

#[scenario(
    path = "tests/features/validation.feature",
    name = "Undersized HDD disks fail before any provider call"
)]
fn scenario_disk_size(validation_context: ValidationContext) {
    drop(validation_context);
}

#[scenario(
    path = "tests/features/validation.feature",
    name = "Subnets outside the cluster network are rejected"
)]
fn scenario_foreign_subnet(validation_context: ValidationContext) {
    drop(validation_context);
}

#[scenario(
    path = "tests/features/validation.feature",
    name = "Subnets that moved zone are rejected"
)]
fn scenario_zone_mismatch(validation_context: ValidationContext) {
    drop(validation_context);
}

#[scenario(
    path = "tests/features/validation.feature",
    name = "Missing security groups are rejected"
)]
fn scenario_missing_security_group(validation_context: ValidationContext) {
    drop(validation_context);
}

#[scenario(
    path = "tests/features/validation.feature",
    name = "Accelerated networking rejects burstable cores"
)]
fn scenario_accelerated_network(validation_context: ValidationContext) {
    drop(validation_context);
}

#[scenario(
    path = "tests/features/validation.feature",
    name = "Verdicts are served from the cache"
)]
fn scenario_cached_verdict(validation_context: ValidationContext) {
    drop(validation_context);
}
