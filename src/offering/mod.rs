//! Instance types with per-zone, per-capacity-type offerings.
//!
//! [`OfferingResolver`] expands an [`InstanceType`] into one [`Offering`] for
//! every zone and requested capacity type. [`InstanceTypeProvider`] drives the
//! catalog, pricing and resolver for a node class.

mod overhead;
mod requirements;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::catalog::{CatalogError, InstanceCatalog, InstanceTypeDescriptor, PlatformProfile};
use crate::node_class::{NodeClass, ResolvedSubnet};
use crate::pricing::PricingEngine;
use crate::types::Zone;

pub use overhead::{Overhead, ResourceQuantities};
pub use requirements::{Requirements, labels};

/// Purchase model for capacity.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CapacityType {
    /// Full price, never preempted.
    OnDemand,
    /// Discounted, preemptible capacity.
    Discounted,
}

impl CapacityType {
    /// Label value used in requirements.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnDemand => "on-demand",
            Self::Discounted => "spot",
        }
    }
}

impl fmt::Display for CapacityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapacityType {
    type Err = OfferingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "on-demand" => Ok(Self::OnDemand),
            "spot" => Ok(Self::Discounted),
            other => Err(OfferingError::UnknownCapacityType {
                value: other.to_owned(),
            }),
        }
    }
}

/// Errors raised while building instance types and offerings.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OfferingError {
    /// A requirement names a capacity type this provider does not sell.
    #[error("unknown capacity type {value:?}")]
    UnknownCapacityType {
        /// Offending label value.
        value: String,
    },
    /// Catalog lookup failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Resource capacity of an instance type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Resources {
    /// vCPUs.
    pub cpu: u32,
    /// Memory in MiB.
    pub memory_mib: u64,
    /// Boot disk in GiB.
    pub disk_gib: u64,
}

/// Free IPv4 addresses per zone, summed over the zone's subnets.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ZoneInventory(BTreeMap<Zone, Option<u64>>);

impl ZoneInventory {
    /// Aggregates resolved subnets by zone. A zone's headroom stays unknown
    /// unless at least one of its subnets reports a count.
    #[must_use]
    pub fn from_subnets(subnets: &[ResolvedSubnet]) -> Self {
        let mut zones: BTreeMap<Zone, Option<u64>> = BTreeMap::new();
        for subnet in subnets {
            let entry = zones.entry(subnet.zone.clone()).or_insert(None);
            if let Some(ips) = subnet.available_ips {
                *entry = Some(entry.unwrap_or(0).saturating_add(ips));
            }
        }
        Self(zones)
    }

    /// Zones present in the inventory.
    #[must_use]
    pub fn zones(&self) -> BTreeSet<Zone> {
        self.0.keys().cloned().collect()
    }

    /// Free addresses in `zone`, when known.
    #[must_use]
    pub fn headroom(&self, zone: &Zone) -> Option<u64> {
        self.0.get(zone).copied().flatten()
    }
}

/// A priced purchase option for one instance type in one zone.
#[derive(Clone, Debug, PartialEq)]
pub struct Offering {
    /// Canonical instance-type name.
    pub instance_type: String,
    /// Zone.
    pub zone: Zone,
    /// Capacity type.
    pub capacity_type: CapacityType,
    /// Hourly price; `None` when unpriced.
    pub price: Option<f64>,
    /// Free addresses in the zone, when known.
    pub available_ips: Option<u64>,
    /// Whether the offering can be bought.
    pub available: bool,
}

impl Offering {
    /// Zone and capacity-type requirements of this offering.
    #[must_use]
    pub fn requirements(&self) -> Requirements {
        Requirements::new()
            .with(labels::ZONE, [self.zone.as_str()])
            .with(labels::CAPACITY_TYPE, [self.capacity_type.as_str()])
    }
}

/// An instance shape resolved for a node class.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceType {
    /// Shape.
    pub descriptor: InstanceTypeDescriptor,
    /// Canonical name.
    pub name: String,
    /// Scheduling requirements.
    pub requirements: Requirements,
    /// Resource capacity.
    pub capacity: Resources,
    /// Capacity held back from workloads.
    pub overhead: Overhead,
    /// Whether the owning platform sells discounted capacity.
    pub platform_discountable: bool,
    /// Offerings; empty until resolved.
    pub offerings: Vec<Offering>,
}

impl InstanceType {
    /// Builds an instance type for `class` without offerings.
    #[must_use]
    pub fn new(
        descriptor: InstanceTypeDescriptor,
        profile: &PlatformProfile,
        class: &NodeClass,
    ) -> Self {
        let mut capacity_types = vec![CapacityType::OnDemand.as_str()];
        if class.spec.can_be_discounted && profile.can_be_discounted {
            capacity_types.push(CapacityType::Discounted.as_str());
        }
        let zones: BTreeSet<&str> = class
            .status
            .subnets
            .iter()
            .map(|subnet| subnet.zone.as_str())
            .collect();
        let name = descriptor.name();
        let requirements = Requirements::new()
            .with(labels::INSTANCE_TYPE, [name.as_str()])
            .with(labels::PLATFORM, [descriptor.platform.as_str()])
            .with(labels::CORE_FRACTION, [descriptor.core_fraction.to_string()])
            .with(labels::ARCH, ["amd64"])
            .with(labels::OS, ["linux"])
            .with(labels::ZONE, zones)
            .with(labels::CAPACITY_TYPE, capacity_types);
        let capacity = Resources {
            cpu: descriptor.cpu,
            memory_mib: descriptor.memory_mib,
            disk_gib: class.spec.disk_size_bytes.checked_shr(30).unwrap_or(0),
        };
        Self {
            descriptor,
            name,
            requirements,
            overhead: Overhead::for_capacity(&capacity),
            capacity,
            platform_discountable: profile.can_be_discounted,
            offerings: Vec::new(),
        }
    }

    /// Capacity left for workloads once the overhead is taken out.
    #[must_use]
    pub fn allocatable(&self) -> ResourceQuantities {
        ResourceQuantities::of(&self.capacity).saturating_sub(self.overhead.total())
    }

    /// Cheapest price among available offerings accepted by `filter`.
    #[must_use]
    pub fn cheapest_available(&self, filter: impl Fn(&Offering) -> bool) -> Option<f64> {
        self.offerings
            .iter()
            .filter(|offering| offering.available && filter(offering))
            .filter_map(|offering| offering.price)
            .min_by(f64::total_cmp)
    }
}

/// Expands instance types into offerings.
#[derive(Clone, Debug, Default)]
pub struct OfferingResolver {
    pricing: PricingEngine,
}

impl OfferingResolver {
    /// Builds a resolver over a pricing engine.
    #[must_use]
    pub const fn new(pricing: PricingEngine) -> Self {
        Self { pricing }
    }

    /// Produces one offering per zone in `all_zones` and per capacity type
    /// the instance type requests. Discounted offerings are skipped for
    /// platforms that never sell discounted capacity.
    ///
    /// An offering is available when it is priced, its zone satisfies the
    /// instance type's zone requirement, and the zone has not run out of
    /// addresses.
    ///
    /// # Errors
    ///
    /// Returns [`OfferingError::UnknownCapacityType`] when the requirements
    /// name a capacity type other than `on-demand` or `spot`.
    pub fn resolve(
        &self,
        instance_type: &InstanceType,
        all_zones: &BTreeSet<Zone>,
        inventory: &ZoneInventory,
    ) -> Result<Vec<Offering>, OfferingError> {
        let capacity_types = instance_type
            .requirements
            .get(labels::CAPACITY_TYPE)
            .into_iter()
            .flatten()
            .map(|value| value.parse::<CapacityType>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut offerings = Vec::new();
        for zone in all_zones {
            let zone_allowed = instance_type.requirements.allows(labels::ZONE, zone);
            let available_ips = inventory.headroom(zone);
            for &capacity_type in &capacity_types {
                let price = match capacity_type {
                    CapacityType::OnDemand => {
                        self.pricing.on_demand_price(&instance_type.descriptor)
                    }
                    CapacityType::Discounted if instance_type.platform_discountable => {
                        self.pricing.discounted_price(&instance_type.descriptor)
                    }
                    CapacityType::Discounted => continue,
                };
                offerings.push(Offering {
                    instance_type: instance_type.name.clone(),
                    zone: zone.clone(),
                    capacity_type,
                    price,
                    available_ips,
                    available: price.is_some() && zone_allowed && available_ips != Some(0),
                });
            }
        }
        Ok(offerings)
    }
}

/// Lists instance types with fresh offerings for a node class.
#[derive(Clone, Debug)]
pub struct InstanceTypeProvider {
    catalog: InstanceCatalog,
    resolver: OfferingResolver,
    all_zones: BTreeSet<Zone>,
}

impl InstanceTypeProvider {
    /// Builds a provider over a catalog, resolver and the region's zones.
    #[must_use]
    pub const fn new(
        catalog: InstanceCatalog,
        resolver: OfferingResolver,
        all_zones: BTreeSet<Zone>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            all_zones,
        }
    }

    /// Every instance type the class allows, ordered by cheapest available
    /// offering (unpriced last) and then by name.
    ///
    /// # Errors
    ///
    /// Propagates [`OfferingResolver::resolve`] failures.
    pub fn list(&self, class: &NodeClass) -> Result<Vec<InstanceType>, OfferingError> {
        let inventory = ZoneInventory::from_subnets(&class.status.subnets);
        let mut instance_types = Vec::new();
        for profile in self.catalog.profiles() {
            for descriptor in InstanceCatalog::generate(profile) {
                if !class.allows_fraction(descriptor.core_fraction) {
                    continue;
                }
                instance_types.push(self.build(descriptor, profile, class, &inventory)?);
            }
        }
        instance_types.sort_by(|left, right| {
            let left_price = left.cheapest_available(|_| true);
            let right_price = right.cheapest_available(|_| true);
            compare_prices(left_price, right_price).then_with(|| left.name.cmp(&right.name))
        });
        Ok(instance_types)
    }

    /// Resolves one instance type by canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`OfferingError::Catalog`] when the name is malformed or not
    /// offered.
    pub fn get(&self, class: &NodeClass, name: &str) -> Result<InstanceType, OfferingError> {
        let descriptor = self.catalog.by_name(name)?;
        let profile = self
            .catalog
            .profile(&descriptor.platform)
            .ok_or_else(|| CatalogError::NotFound {
                name: name.to_owned(),
            })?;
        let inventory = ZoneInventory::from_subnets(&class.status.subnets);
        self.build(descriptor, profile, class, &inventory)
    }

    fn build(
        &self,
        descriptor: InstanceTypeDescriptor,
        profile: &PlatformProfile,
        class: &NodeClass,
        inventory: &ZoneInventory,
    ) -> Result<InstanceType, OfferingError> {
        let mut instance_type = InstanceType::new(descriptor, profile, class);
        instance_type.offerings = self
            .resolver
            .resolve(&instance_type, &self.all_zones, inventory)?;
        Ok(instance_type)
    }
}

/// Orders known prices ascending, with unknown prices last.
pub(crate) fn compare_prices(left: Option<f64>, right: Option<f64>) -> std::cmp::Ordering {
    match (left, right) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}
