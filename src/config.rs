//! Configuration loading via `ortho-config`.

use std::collections::BTreeSet;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::lifecycle::LifecycleSettings;
use crate::types::Zone;
use crate::validation::ValidationSettings;
use crate::yandex::{
    DEFAULT_COMPUTE_ENDPOINT, DEFAULT_MKS_ENDPOINT, DEFAULT_VPC_ENDPOINT, Endpoints, YandexApi,
};

/// Provider configuration merged from defaults, `nodeplan.toml`, environment
/// variables and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "NODEPLAN")]
pub struct ProviderConfig {
    /// IAM token sent as the bearer credential. Required for API calls.
    #[ortho_config(default = String::new())]
    pub iam_token: String,
    /// Managed cluster whose node groups are provisioned. Required.
    #[ortho_config(default = String::new())]
    pub cluster_id: String,
    /// Zones offerings are generated for.
    #[ortho_config(default = default_zones())]
    pub zones: Vec<String>,
    /// Delay between instance-id polls, in milliseconds.
    #[ortho_config(default = 1000)]
    pub poll_interval_ms: u64,
    /// Total time allowed for instance-id resolution, in seconds.
    #[ortho_config(default = 300)]
    pub resolve_timeout_secs: u64,
    /// Limit for each provider call, in seconds.
    #[ortho_config(default = 30)]
    pub call_timeout_secs: u64,
    /// Lifetime of cached validation verdicts, in seconds.
    #[ortho_config(default = 600)]
    pub validation_cache_ttl_secs: u64,
    /// Delay before a node class is validated again, in seconds.
    #[ortho_config(default = 600)]
    pub requeue_after_secs: u64,
    /// Skip provider checks and record success.
    #[ortho_config(default = false)]
    pub validation_checks_disabled: bool,
    /// Managed-Kubernetes API base URL.
    #[ortho_config(default = DEFAULT_MKS_ENDPOINT.to_owned())]
    pub mks_endpoint: String,
    /// VPC API base URL.
    #[ortho_config(default = DEFAULT_VPC_ENDPOINT.to_owned())]
    pub vpc_endpoint: String,
    /// Compute API base URL.
    #[ortho_config(default = DEFAULT_COMPUTE_ENDPOINT.to_owned())]
    pub compute_endpoint: String,
}

/// Zones of the `ru-central1` region.
pub const DEFAULT_ZONES: [&str; 3] = ["ru-central1-a", "ru-central1-b", "ru-central1-d"];

fn default_zones() -> Vec<String> {
    DEFAULT_ZONES.iter().map(|zone| (*zone).to_owned()).collect()
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to nodeplan.toml",
            self.env_var, self.toml_key
        )
    }
}

impl ProviderConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be greater than zero: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("nodeplan")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks required fields and timings. Messages name the environment
    /// variable and TOML key to set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a timing is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.iam_token,
            &FieldMetadata::new("IAM token", "NODEPLAN_IAM_TOKEN", "iam_token"),
        )?;
        Self::require_field(
            &self.cluster_id,
            &FieldMetadata::new("cluster ID", "NODEPLAN_CLUSTER_ID", "cluster_id"),
        )?;
        if self.zones.iter().all(|zone| zone.trim().is_empty()) {
            return Err(ConfigError::MissingField(format!(
                "missing zones: {}",
                FieldMetadata::new("zones", "NODEPLAN_ZONES", "zones").hint()
            )));
        }
        for (value, metadata) in [
            (
                self.poll_interval_ms,
                FieldMetadata::new("poll interval", "NODEPLAN_POLL_INTERVAL_MS", "poll_interval_ms"),
            ),
            (
                self.resolve_timeout_secs,
                FieldMetadata::new(
                    "resolve timeout",
                    "NODEPLAN_RESOLVE_TIMEOUT_SECS",
                    "resolve_timeout_secs",
                ),
            ),
            (
                self.call_timeout_secs,
                FieldMetadata::new("call timeout", "NODEPLAN_CALL_TIMEOUT_SECS", "call_timeout_secs"),
            ),
        ] {
            Self::require_positive(value, &metadata)?;
        }
        Ok(())
    }

    /// Zones offerings are generated for, blanks dropped.
    #[must_use]
    pub fn zone_set(&self) -> BTreeSet<Zone> {
        self.zones
            .iter()
            .map(|zone| zone.trim())
            .filter(|zone| !zone.is_empty())
            .map(Zone::from)
            .collect()
    }

    /// Lifecycle timings for the configured cluster.
    #[must_use]
    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            cluster_id: self.cluster_id.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            resolve_timeout: Duration::from_secs(self.resolve_timeout_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }

    /// Validation cache and requeue settings.
    #[must_use]
    pub const fn validation_settings(&self) -> ValidationSettings {
        ValidationSettings {
            requeue_after: Duration::from_secs(self.requeue_after_secs),
            cache_ttl: Duration::from_secs(self.validation_cache_ttl_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            checks_disabled: self.validation_checks_disabled,
        }
    }

    /// Service base URLs.
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            mks: self.mks_endpoint.trim_end_matches('/').to_owned(),
            vpc: self.vpc_endpoint.trim_end_matches('/').to_owned(),
            compute: self.compute_endpoint.trim_end_matches('/').to_owned(),
        }
    }

    /// Builds a REST client after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or the HTTP client
    /// cannot be built.
    pub fn api(&self) -> Result<YandexApi, ConfigError> {
        self.validate()?;
        YandexApi::new(
            self.iam_token.clone(),
            self.cluster_id.clone(),
            self.endpoints(),
            Duration::from_secs(self.call_timeout_secs),
        )
        .map_err(|err| ConfigError::Client(err.to_string()))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// A field holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// The HTTP client could not be built.
    #[error("failed to build provider client: {0}")]
    Client(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
