//! Checks that consult the provider: subnets, security groups, and the
//! accelerated-network rule.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::compute::{ComputeApi, ComputeError, bounded};
use crate::node_class::NodeClass;

use super::{ValidationResult, reasons};

/// Every resolved subnet must exist in the cluster network and in the zone
/// recorded at resolution time.
pub async fn subnets<A: ComputeApi + ?Sized>(
    api: &A,
    call_timeout: Duration,
    class: &NodeClass,
) -> Result<ValidationResult, ComputeError> {
    if class.status.subnets.is_empty() {
        return Ok(ValidationResult::failure(
            reasons::NO_SUBNETS_RESOLVED,
            "no subnets resolved in status",
        ));
    }
    let network = bounded(call_timeout, "get cluster network", api.network_id()).await?;

    let mut seen = BTreeSet::new();
    for resolved in &class.status.subnets {
        if resolved.id.is_empty() {
            return Ok(ValidationResult::failure(
                reasons::INVALID_SUBNET,
                "status.subnets contains an empty id",
            ));
        }
        if !seen.insert(resolved.id.as_str()) {
            continue;
        }
        let subnet = match bounded(call_timeout, "get subnet", api.get_subnet(&resolved.id)).await
        {
            Ok(subnet) => subnet,
            Err(err) if err.is_not_found() => {
                return Ok(ValidationResult::failure(
                    reasons::SUBNET_NOT_FOUND,
                    format!("subnet not found: {}", resolved.id),
                ));
            }
            Err(err) => return Err(err),
        };
        if !subnet.network_id.is_empty() && subnet.network_id != network {
            return Ok(ValidationResult::failure(
                reasons::SUBNET_NOT_FOUND,
                format!("subnet {} is not in cluster network {network}", resolved.id),
            ));
        }
        if !resolved.zone.is_empty() && !subnet.zone.is_empty() && resolved.zone != subnet.zone {
            return Ok(ValidationResult::failure(
                reasons::SUBNET_ZONE_MISMATCH,
                format!(
                    "subnet zone mismatch for {}: status={}, cloud={}",
                    resolved.id, resolved.zone, subnet.zone
                ),
            ));
        }
    }
    Ok(ValidationResult::success())
}

/// Every configured security group must exist in the cluster network.
pub async fn security_groups<A: ComputeApi + ?Sized>(
    api: &A,
    call_timeout: Duration,
    class: &NodeClass,
) -> Result<ValidationResult, ComputeError> {
    if class.spec.security_groups.is_empty() {
        return Ok(ValidationResult::success());
    }
    let network = bounded(call_timeout, "get cluster network", api.network_id()).await?;
    for id in &class.spec.security_groups {
        let missing = || {
            ValidationResult::failure(
                reasons::SECURITY_GROUP_NOT_FOUND,
                format!("security group not found (or not in cluster network): {id}"),
            )
        };
        match bounded(call_timeout, "get security group", api.get_security_group(id)).await {
            Ok(group) if group.network_id.is_empty() || group.network_id == network => {}
            Ok(_) => return Ok(missing()),
            Err(err) if err.is_not_found() => return Ok(missing()),
            Err(err) => return Err(err),
        }
    }
    Ok(ValidationResult::success())
}

/// Accelerated networking needs dedicated cores: every configured fraction
/// must be 100, or none configured (which defaults to 100).
#[must_use]
pub fn accelerated_network(class: &NodeClass) -> ValidationResult {
    let spec = &class.spec;
    if !spec.accelerated_network || spec.core_fractions.iter().all(|fraction| fraction.is_full())
    {
        return ValidationResult::success();
    }
    let configured: Vec<String> = spec
        .core_fractions
        .iter()
        .map(ToString::to_string)
        .collect();
    ValidationResult::failure(
        reasons::INVALID_ACCELERATED_NETWORK_CORE_FRACTIONS,
        format!(
            "spec.acceleratedNetwork=true requires every spec.coreFractions entry to be 100, got [{}]",
            configured.join(", ")
        ),
    )
}
