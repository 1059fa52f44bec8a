//! Label-keyed scheduling requirements.

use std::collections::{BTreeMap, BTreeSet};

/// Well-known requirement keys.
pub mod labels {
    /// Canonical instance-type name.
    pub const INSTANCE_TYPE: &str = "node.kubernetes.io/instance-type";
    /// Availability zone.
    pub const ZONE: &str = "topology.kubernetes.io/zone";
    /// Capacity type (`on-demand` or `spot`).
    pub const CAPACITY_TYPE: &str = "karpenter.sh/capacity-type";
    /// CPU architecture.
    pub const ARCH: &str = "kubernetes.io/arch";
    /// Operating system.
    pub const OS: &str = "kubernetes.io/os";
    /// Hardware platform.
    pub const PLATFORM: &str = "yandex.cloud/platform-id";
    /// Core-fraction tier.
    pub const CORE_FRACTION: &str = "yandex.cloud/core-fraction";
    /// Node label carrying the hardware platform of the node's shape.
    pub const INSTANCE_CPU_PLATFORM: &str = "yandex.cloud/instance-cpu-platform";
    /// Node label carrying the vCPU count.
    pub const INSTANCE_CPU: &str = "yandex.cloud/instance-cpu";
    /// Node label carrying the memory quantity (`4Gi`, `1536Mi`).
    pub const INSTANCE_MEMORY: &str = "yandex.cloud/instance-memory";
    /// Node label carrying the core-fraction percentage.
    pub const INSTANCE_CPU_FRACTION: &str = "yandex.cloud/instance-cpu-fraction";
}

/// Allowed values per label key. A key absent from the map is unconstrained.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Requirements(BTreeMap<String, BTreeSet<String>>);

impl Requirements {
    /// Creates an unconstrained set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the allowed values for `key`.
    #[must_use]
    pub fn with<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.insert(key, values);
        self
    }

    /// Sets the allowed values for `key`.
    pub fn insert<I, V>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.0
            .insert(key.to_owned(), values.into_iter().map(Into::into).collect());
    }

    /// Allowed values for `key`, or `None` when unconstrained.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.0.get(key)
    }

    /// Reports whether `key` allows `value`.
    #[must_use]
    pub fn allows(&self, key: &str, value: &str) -> bool {
        self.get(key).is_none_or(|values| values.contains(value))
    }

    /// Two requirement sets are compatible when every key both constrain
    /// shares at least one value.
    #[must_use]
    pub fn compatible(&self, other: &Self) -> bool {
        self.0.iter().all(|(key, values)| {
            other
                .0
                .get(key)
                .is_none_or(|theirs| !values.is_disjoint(theirs))
        })
    }
}
