//! Newtypes for provider identifiers to avoid stringly-typed code.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

newtype!(
    /// Hardware platform identifier such as `standard-v3`.
    PlatformId
);
newtype!(
    /// Availability zone such as `ru-central1-a`.
    Zone
);
newtype!(
    /// Managed node group identifier assigned by the provider.
    NodeGroupId
);
newtype!(
    /// VPC subnet identifier.
    SubnetId
);
newtype!(
    /// VPC network identifier.
    NetworkId
);
newtype!(
    /// VPC security group identifier.
    SecurityGroupId
);

/// Scheme prefix for provider ids published to the cluster.
pub const PROVIDER_ID_PREFIX: &str = "yandex://";

/// Externally visible node address in the form `yandex://<instance-id>`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProviderId(String);

/// Raised when a provider id does not carry the expected scheme.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("provider id {value:?} does not start with {PROVIDER_ID_PREFIX}")]
pub struct ProviderIdError {
    /// Offending input.
    pub value: String,
}

impl ProviderId {
    /// Builds a provider id for a compute instance.
    #[must_use]
    pub fn for_instance(instance_id: &str) -> Self {
        Self(format!("{PROVIDER_ID_PREFIX}{instance_id}"))
    }

    /// Parses a provider id, rejecting values without the scheme or with an
    /// empty instance id.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderIdError`] when the scheme is missing.
    pub fn parse(value: &str) -> Result<Self, ProviderIdError> {
        match value.strip_prefix(PROVIDER_ID_PREFIX) {
            Some(instance) if !instance.is_empty() => Ok(Self(value.to_owned())),
            _ => Err(ProviderIdError {
                value: value.to_owned(),
            }),
        }
    }

    /// Returns the compute instance id without the scheme.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        self.0
            .strip_prefix(PROVIDER_ID_PREFIX)
            .unwrap_or(self.0.as_str())
    }

    /// Returns the full provider id.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
