//! The node class: user-declared provisioning settings plus resolved status.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::CoreFraction;
use crate::types::{SecurityGroupId, SubnetId, Zone};

/// Tri-state readiness of a prerequisite condition.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConditionStatus {
    /// The prerequisite holds.
    True,
    /// The prerequisite was evaluated and does not hold.
    False,
    /// The prerequisite has not been evaluated yet.
    #[default]
    Unknown,
}

/// A subnet resolved for the node class by the surrounding reconciler.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSubnet {
    /// Subnet identifier.
    pub id: SubnetId,
    /// Zone recorded at resolution time.
    pub zone: Zone,
    /// Free IPv4 addresses, when known.
    pub available_ips: Option<u64>,
}

/// User-declared settings.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeClassSpec {
    /// Boot disk type; blank selects `network-ssd`.
    pub disk_type: String,
    /// Boot disk size in bytes.
    pub disk_size_bytes: u64,
    /// Labels stamped on created node groups and their nodes.
    pub labels: BTreeMap<String, String>,
    /// Security groups attached to node network interfaces.
    pub security_groups: Vec<SecurityGroupId>,
    /// Allowed core-fraction tiers; empty allows every tier.
    pub core_fractions: Vec<CoreFraction>,
    /// Request software-accelerated networking.
    pub accelerated_network: bool,
    /// Allow discounted (preemptible) capacity.
    pub can_be_discounted: bool,
}

/// Status fields published by the subnet resolver.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeClassStatus {
    /// Resolved subnets.
    pub subnets: Vec<ResolvedSubnet>,
    /// Whether subnet resolution succeeded.
    pub subnets_ready: ConditionStatus,
}

/// A named node class.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeClass {
    /// Unique name.
    pub name: String,
    /// Declared settings.
    pub spec: NodeClassSpec,
    /// Resolved status.
    pub status: NodeClassStatus,
}

impl NodeClass {
    /// Creates a node class with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Reports whether instance shapes of `fraction` may be used.
    #[must_use]
    pub fn allows_fraction(&self, fraction: CoreFraction) -> bool {
        self.spec.core_fractions.is_empty() || self.spec.core_fractions.contains(&fraction)
    }
}
