//! Resources a node holds back from workloads.
//!
//! Kubelet reservations follow the managed-Kubernetes tiers: a falling share
//! of memory per band and a falling share of each additional core. Eviction
//! keeps 100 MiB of memory and a tenth of the boot disk free.

use super::Resources;

const MIB_PER_GIB: u64 = 1024;
const MILLIS_PER_CPU: u64 = 1000;
const RESERVED_STORAGE_MIB: u64 = 15 * MIB_PER_GIB;
const SMALL_NODE_RESERVED_MEMORY_MIB: u64 = 255;
const EVICTION_MEMORY_MIB: u64 = 100;

/// CPU, memory and ephemeral storage quantities.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResourceQuantities {
    /// CPU in millicores.
    pub cpu_millis: u64,
    /// Memory in MiB.
    pub memory_mib: u64,
    /// Ephemeral storage in MiB.
    pub storage_mib: u64,
}

impl ResourceQuantities {
    /// Full capacity of an instance type.
    #[must_use]
    pub fn of(capacity: &Resources) -> Self {
        Self {
            cpu_millis: u64::from(capacity.cpu).saturating_mul(MILLIS_PER_CPU),
            memory_mib: capacity.memory_mib,
            storage_mib: capacity.disk_gib.saturating_mul(MIB_PER_GIB),
        }
    }

    /// Component-wise difference, clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self {
            cpu_millis: self.cpu_millis.saturating_sub(other.cpu_millis),
            memory_mib: self.memory_mib.saturating_sub(other.memory_mib),
            storage_mib: self.storage_mib.saturating_sub(other.storage_mib),
        }
    }
}

/// What a node keeps for the kubelet and for eviction headroom.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Overhead {
    /// Reserved for Kubernetes system daemons.
    pub kube_reserved: ResourceQuantities,
    /// Kept free before the kubelet starts evicting pods.
    pub eviction_threshold: ResourceQuantities,
}

impl Overhead {
    /// Overhead of a node with `capacity`.
    #[must_use]
    pub fn for_capacity(capacity: &Resources) -> Self {
        let disk_mib = capacity.disk_gib.saturating_mul(MIB_PER_GIB);
        Self {
            kube_reserved: ResourceQuantities {
                cpu_millis: reserved_cpu_millis(u64::from(capacity.cpu)),
                memory_mib: reserved_memory_mib(capacity.memory_mib),
                storage_mib: RESERVED_STORAGE_MIB,
            },
            eviction_threshold: ResourceQuantities {
                cpu_millis: 0,
                memory_mib: EVICTION_MEMORY_MIB,
                storage_mib: disk_mib.saturating_add(9).checked_div(10).unwrap_or(0),
            },
        }
    }

    /// Sum of both reservations.
    #[must_use]
    pub const fn total(&self) -> ResourceQuantities {
        ResourceQuantities {
            cpu_millis: self
                .kube_reserved
                .cpu_millis
                .saturating_add(self.eviction_threshold.cpu_millis),
            memory_mib: self
                .kube_reserved
                .memory_mib
                .saturating_add(self.eviction_threshold.memory_mib),
            storage_mib: self
                .kube_reserved
                .storage_mib
                .saturating_add(self.eviction_threshold.storage_mib),
        }
    }
}

/// Portion of `value` that falls in `[start, start + width)`.
const fn band(value: u64, start: u64, width: u64) -> u64 {
    let above = value.saturating_sub(start);
    if above < width { above } else { width }
}

fn reserved_memory_mib(memory_mib: u64) -> u64 {
    if memory_mib < MIB_PER_GIB {
        return SMALL_NODE_RESERVED_MEMORY_MIB;
    }
    let gib = MIB_PER_GIB;
    // Percent-weighted MiB, divided once at the end.
    let weighted = [
        (band(memory_mib, 0, 4 * gib), 25),
        (band(memory_mib, 4 * gib, 4 * gib), 20),
        (band(memory_mib, 8 * gib, 8 * gib), 10),
        (band(memory_mib, 16 * gib, 112 * gib), 6),
        (memory_mib.saturating_sub(128 * gib), 2),
    ]
    .into_iter()
    .fold(0_u64, |sum, (mib, percent)| {
        sum.saturating_add(mib.saturating_mul(percent))
    });
    weighted.checked_div(100).unwrap_or(0)
}

fn reserved_cpu_millis(cores: u64) -> u64 {
    // Tenths of a millicore, rounded to the nearest millicore.
    let tenths = [
        (band(cores, 0, 1), 600),
        (band(cores, 1, 1), 100),
        (band(cores, 2, 2), 50),
        (cores.saturating_sub(4), 25),
    ]
    .into_iter()
    .fold(0_u64, |sum, (count, weight)| {
        sum.saturating_add(count.saturating_mul(weight))
    });
    tenths.saturating_add(5).checked_div(10).unwrap_or(0)
}
