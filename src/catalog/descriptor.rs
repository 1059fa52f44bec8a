//! Canonical instance-type descriptors and their string encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PlatformId;

const MIB_PER_GIB: u64 = 1024;
const MIB_PER_TIB: u64 = 1024 * 1024;

/// Guaranteed share of a physical core, in percent.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CoreFraction(u8);

impl CoreFraction {
    /// Burstable tier with a 5% guarantee.
    pub const BURST_5: Self = Self(5);
    /// Burstable tier with a 20% guarantee.
    pub const BURST_20: Self = Self(20);
    /// Burstable tier with a 50% guarantee.
    pub const BURST_50: Self = Self(50);
    /// Dedicated core; the maximum tier.
    pub const FULL: Self = Self(100);

    /// Builds a fraction, returning `None` outside `1..=100`.
    #[must_use]
    pub const fn new(percent: u8) -> Option<Self> {
        if percent == 0 || percent > 100 {
            None
        } else {
            Some(Self(percent))
        }
    }

    /// Returns the percentage.
    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Reports whether this is the dedicated-core tier.
    #[must_use]
    pub const fn is_full(self) -> bool {
        self.0 == Self::FULL.0
    }
}

impl TryFrom<u8> for CoreFraction {
    type Error = DescriptorParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(DescriptorParseError::InvalidCoreFraction {
            value: value.to_string(),
        })
    }
}

impl From<CoreFraction> for u8 {
    fn from(value: CoreFraction) -> Self {
        value.0
    }
}

impl fmt::Display for CoreFraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A purchasable instance shape: platform, core-fraction tier, vCPUs and memory.
///
/// The canonical name `platform_cpu_memory_fraction` (for example
/// `standard-v3_2_4Gi_100`) is lossless: parsing a rendered name yields an
/// equal descriptor.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InstanceTypeDescriptor {
    /// Hardware platform.
    pub platform: PlatformId,
    /// Core-fraction tier.
    pub core_fraction: CoreFraction,
    /// Number of virtual CPUs.
    pub cpu: u32,
    /// Memory in MiB.
    pub memory_mib: u64,
}

impl InstanceTypeDescriptor {
    /// Returns the canonical name.
    #[must_use]
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Memory as a Kubernetes-style quantity, the same rendering the
    /// canonical name uses.
    #[must_use]
    pub fn memory_quantity(&self) -> String {
        render_memory(self.memory_mib)
    }

    /// Memory expressed in GiB, possibly fractional.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "memory sizes stay far below 2^52 MiB"
    )]
    pub fn memory_gib(&self) -> f64 {
        self.memory_mib as f64 / 1024.0
    }
}

fn render_memory(memory_mib: u64) -> String {
    match (
        memory_mib.checked_rem(MIB_PER_GIB),
        memory_mib.checked_div(MIB_PER_GIB),
    ) {
        (Some(0), Some(gib)) if memory_mib > 0 => format!("{gib}Gi"),
        _ => format!("{memory_mib}Mi"),
    }
}

fn parse_memory(raw: &str) -> Result<u64, DescriptorParseError> {
    let invalid = || DescriptorParseError::InvalidMemory {
        value: raw.to_owned(),
    };
    let (digits, multiplier) = if let Some(value) = raw.strip_suffix("Mi") {
        (value, 1)
    } else if let Some(value) = raw.strip_suffix("Gi") {
        (value, MIB_PER_GIB)
    } else if let Some(value) = raw.strip_suffix("Ti") {
        (value, MIB_PER_TIB)
    } else {
        return Err(invalid());
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    match amount.checked_mul(multiplier) {
        Some(mib) if mib > 0 => Ok(mib),
        _ => Err(invalid()),
    }
}

impl fmt::Display for InstanceTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.platform,
            self.cpu,
            render_memory(self.memory_mib),
            self.core_fraction
        )
    }
}

impl FromStr for InstanceTypeDescriptor {
    type Err = DescriptorParseError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = name.split('_').collect();
        let [platform, cpu, memory, fraction] = parts.as_slice() else {
            return Err(DescriptorParseError::WrongPartCount {
                name: name.to_owned(),
                parts: parts.len(),
            });
        };
        if platform.is_empty() {
            return Err(DescriptorParseError::EmptyPlatform {
                name: name.to_owned(),
            });
        }
        let cpu_count = cpu
            .parse::<u32>()
            .ok()
            .filter(|count| *count > 0 && cpu.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| DescriptorParseError::InvalidCpu {
                value: (*cpu).to_owned(),
            })?;
        let core_fraction = fraction
            .parse::<u8>()
            .ok()
            .filter(|_| fraction.bytes().all(|b| b.is_ascii_digit()))
            .and_then(CoreFraction::new)
            .ok_or_else(|| DescriptorParseError::InvalidCoreFraction {
                value: (*fraction).to_owned(),
            })?;
        Ok(Self {
            platform: PlatformId::from(*platform),
            core_fraction,
            cpu: cpu_count,
            memory_mib: parse_memory(memory)?,
        })
    }
}

/// Errors raised when decoding a canonical instance-type name.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DescriptorParseError {
    /// The name does not split into exactly four `_`-separated parts.
    #[error("instance type {name:?} must have 4 '_'-separated parts, found {parts}")]
    WrongPartCount {
        /// Offending name.
        name: String,
        /// Number of parts found.
        parts: usize,
    },
    /// The platform component is empty.
    #[error("instance type {name:?} has an empty platform")]
    EmptyPlatform {
        /// Offending name.
        name: String,
    },
    /// The vCPU component is not a positive integer.
    #[error("invalid vCPU count {value:?}")]
    InvalidCpu {
        /// Offending component.
        value: String,
    },
    /// The memory component is not a positive `Mi`/`Gi`/`Ti` quantity.
    #[error("invalid memory quantity {value:?}: expected <n>Mi, <n>Gi or <n>Ti")]
    InvalidMemory {
        /// Offending component.
        value: String,
    },
    /// The core fraction is not an integer in `1..=100`.
    #[error("invalid core fraction {value:?}: expected 1..=100")]
    InvalidCoreFraction {
        /// Offending component.
        value: String,
    },
}
