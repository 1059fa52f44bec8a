//! Hourly price estimates for instance shapes and boot disks.
//!
//! Prices are estimates computed in floating point, not billing records. A
//! missing table entry is reported as `None` and never as a zero price.

pub mod table;

use std::collections::BTreeMap;

use crate::catalog::{CoreFraction, InstanceTypeDescriptor};
use crate::disk::DiskType;
use crate::types::PlatformId;

/// Prices for one platform.
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformPrices {
    /// On-demand price per vCPU-hour, by tier.
    pub on_demand: BTreeMap<CoreFraction, f64>,
    /// Discounted price per vCPU-hour, by tier. Empty when the platform has no
    /// discounted capacity.
    pub discounted: BTreeMap<CoreFraction, f64>,
    /// On-demand price per GiB-hour of memory.
    pub memory_gib: f64,
    /// Discounted price per GiB-hour of memory.
    pub discounted_memory_gib: f64,
}

/// Instance price table keyed by platform.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceTable {
    platforms: BTreeMap<PlatformId, PlatformPrices>,
}

impl PriceTable {
    /// Wraps a platform map.
    #[must_use]
    pub const fn new(platforms: BTreeMap<PlatformId, PlatformPrices>) -> Self {
        Self { platforms }
    }

    /// Returns the prices for a platform.
    #[must_use]
    pub fn platform(&self, platform: &PlatformId) -> Option<&PlatformPrices> {
        self.platforms.get(platform)
    }
}

/// Disk price table keyed by disk type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiskPriceTable {
    per_gib_hour: BTreeMap<DiskType, f64>,
}

impl DiskPriceTable {
    /// Wraps a disk price map.
    #[must_use]
    pub const fn new(per_gib_hour: BTreeMap<DiskType, f64>) -> Self {
        Self { per_gib_hour }
    }
}

/// Resolves prices from injected tables.
#[derive(Clone, Debug, Default)]
pub struct PricingEngine {
    instances: PriceTable,
    disks: DiskPriceTable,
}

impl PricingEngine {
    /// Builds an engine over the given tables.
    #[must_use]
    pub const fn new(instances: PriceTable, disks: DiskPriceTable) -> Self {
        Self { instances, disks }
    }

    /// Builds an engine over the published `ru-central1` tables.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(table::ru_central1(), table::ru_central1_disks())
    }

    /// On-demand hourly price, or `None` when the platform or tier is unpriced.
    #[must_use]
    pub fn on_demand_price(&self, descriptor: &InstanceTypeDescriptor) -> Option<f64> {
        let prices = self.instances.platform(&descriptor.platform)?;
        let per_cpu = prices.on_demand.get(&descriptor.core_fraction)?;
        Some(shape_price(*per_cpu, prices.memory_gib, descriptor))
    }

    /// Discounted hourly price, or `None` when the platform or tier has no
    /// discounted entry.
    #[must_use]
    pub fn discounted_price(&self, descriptor: &InstanceTypeDescriptor) -> Option<f64> {
        let prices = self.instances.platform(&descriptor.platform)?;
        let per_cpu = prices.discounted.get(&descriptor.core_fraction)?;
        Some(shape_price(
            *per_cpu,
            prices.discounted_memory_gib,
            descriptor,
        ))
    }

    /// Hourly price of a disk, linear in size.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "price estimate; disk sizes stay far below 2^52 GiB"
    )]
    pub fn disk_price(&self, disk_type: DiskType, size_gib: u64) -> Option<f64> {
        self.disks
            .per_gib_hour
            .get(&disk_type)
            .map(|per_gib| per_gib * size_gib as f64)
    }
}

#[expect(clippy::float_arithmetic, reason = "price estimate")]
fn shape_price(per_cpu: f64, per_gib: f64, descriptor: &InstanceTypeDescriptor) -> f64 {
    per_cpu * f64::from(descriptor.cpu) + per_gib * descriptor.memory_gib()
}

#[cfg(test)]
mod tests;
