//! Boot-disk types offered by the provider.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Network block-storage disk type.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DiskType {
    /// Replicated HDD.
    NetworkHdd,
    /// Replicated SSD; used when no type is configured.
    #[default]
    NetworkSsd,
    /// Non-replicated SSD.
    NetworkSsdNonreplicated,
    /// High-IOPS SSD (`io-m3`).
    NetworkSsdIoM3,
}

impl DiskType {
    /// Every supported type.
    pub const ALL: [Self; 4] = [
        Self::NetworkHdd,
        Self::NetworkSsd,
        Self::NetworkSsdNonreplicated,
        Self::NetworkSsdIoM3,
    ];

    /// Provider identifier of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkHdd => "network-hdd",
            Self::NetworkSsd => "network-ssd",
            Self::NetworkSsdNonreplicated => "network-ssd-nonreplicated",
            Self::NetworkSsdIoM3 => "network-ssd-io-m3",
        }
    }

    /// Parses a configured type, treating blank input as the default.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownDiskType`] for unsupported identifiers.
    pub fn from_configured(value: &str) -> Result<Self, UnknownDiskType> {
        if value.trim().is_empty() {
            Ok(Self::default())
        } else {
            value.parse()
        }
    }
}

/// Raised for unsupported disk type identifiers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unsupported disk type {value:?}")]
pub struct UnknownDiskType {
    /// Offending identifier.
    pub value: String,
}

impl FromStr for DiskType {
    type Err = UnknownDiskType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownDiskType {
                value: value.to_owned(),
            })
    }
}

impl TryFrom<String> for DiskType {
    type Error = UnknownDiskType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiskType> for String {
    fn from(value: DiskType) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for DiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
