//! Instance-type catalog generated from per-platform configuration rules.
//!
//! Each [`PlatformProfile`] lists its core-fraction tiers. Every tier carries
//! its own vCPU counts and memory-per-core ratios, and the catalog is the
//! cross product within each tier (tiers never mix). The table is plain data
//! passed into [`InstanceCatalog::new`], so tests can substitute fixtures.

mod descriptor;
pub mod profiles;

use std::collections::BTreeSet;

use thiserror::Error;

use crate::types::PlatformId;

pub use descriptor::{CoreFraction, DescriptorParseError, InstanceTypeDescriptor};

/// Allowed shapes for one core-fraction tier of a platform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TierRule {
    /// Tier these shapes belong to.
    pub fraction: CoreFraction,
    /// Allowed vCPU counts.
    pub vcpus: Vec<u32>,
    /// Allowed memory-per-core ratios in MiB per vCPU.
    pub memory_per_core_mib: Vec<u32>,
}

/// Configuration rules for one hardware platform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlatformProfile {
    /// Platform identifier.
    pub platform: PlatformId,
    /// Supported tiers.
    pub tiers: Vec<TierRule>,
    /// Whether discounted (preemptible) capacity may be bought.
    pub can_be_discounted: bool,
}

/// Errors raised by [`InstanceCatalog::by_name`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CatalogError {
    /// The name is not a valid canonical encoding.
    #[error(transparent)]
    Malformed(#[from] DescriptorParseError),
    /// The name decodes but the catalog does not offer that shape.
    #[error("instance type {name} is not offered by any platform profile")]
    NotFound {
        /// Requested name.
        name: String,
    },
}

/// Read-only catalog over a profile table.
#[derive(Clone, Debug, Default)]
pub struct InstanceCatalog {
    profiles: Vec<PlatformProfile>,
}

impl InstanceCatalog {
    /// Builds a catalog over the given profiles.
    #[must_use]
    pub const fn new(profiles: Vec<PlatformProfile>) -> Self {
        Self { profiles }
    }

    /// Builds a catalog over the published `ru-central1` configurations.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(profiles::ru_central1())
    }

    /// Returns every profile.
    #[must_use]
    pub fn profiles(&self) -> &[PlatformProfile] {
        &self.profiles
    }

    /// Looks up the profile for a platform.
    #[must_use]
    pub fn profile(&self, platform: &PlatformId) -> Option<&PlatformProfile> {
        self.profiles
            .iter()
            .find(|profile| &profile.platform == platform)
    }

    /// Expands one profile into its descriptors.
    #[must_use]
    pub fn generate(profile: &PlatformProfile) -> BTreeSet<InstanceTypeDescriptor> {
        let mut descriptors = BTreeSet::new();
        for rule in &profile.tiers {
            for &cpu in &rule.vcpus {
                for &ratio in &rule.memory_per_core_mib {
                    descriptors.insert(InstanceTypeDescriptor {
                        platform: profile.platform.clone(),
                        core_fraction: rule.fraction,
                        cpu,
                        memory_mib: u64::from(cpu).saturating_mul(u64::from(ratio)),
                    });
                }
            }
        }
        descriptors
    }

    /// Expands every profile.
    #[must_use]
    pub fn descriptors(&self) -> BTreeSet<InstanceTypeDescriptor> {
        self.profiles.iter().flat_map(Self::generate).collect()
    }

    /// Decodes a canonical name and confirms the catalog offers it.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Malformed`] when the name does not decode and
    /// [`CatalogError::NotFound`] when no profile generates the shape.
    pub fn by_name(&self, name: &str) -> Result<InstanceTypeDescriptor, CatalogError> {
        let descriptor: InstanceTypeDescriptor = name.parse()?;
        let offered = self.profile(&descriptor.platform).is_some_and(|profile| {
            profile.tiers.iter().any(|rule| {
                rule.fraction == descriptor.core_fraction
                    && rule.vcpus.contains(&descriptor.cpu)
                    && rule.memory_per_core_mib.iter().any(|&ratio| {
                        u64::from(descriptor.cpu).saturating_mul(u64::from(ratio))
                            == descriptor.memory_mib
                    })
            })
        });
        if offered {
            Ok(descriptor)
        } else {
            Err(CatalogError::NotFound {
                name: name.to_owned(),
            })
        }
    }
}
