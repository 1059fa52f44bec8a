//! Node-class validation gate.
//!
//! [`ValidationEngine::reconcile`] runs on every reconciliation of a node
//! class. It waits for subnet resolution, then reuses a cached verdict for
//! the class's current content hash or runs the checks in order (disk,
//! subnets, security groups, accelerated network), stopping at the first
//! failure. Verdicts are cached; provider errors are returned to the caller
//! and never cached.

mod cache;
pub mod checks;
pub mod disk;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::compute::{ComputeApi, ComputeError};
use crate::node_class::{ConditionStatus, NodeClass};

pub use cache::{ValidationCache, cache_key};

/// Stable reason codes.
pub mod reasons {
    /// A prerequisite condition is false or unknown.
    pub const DEPENDENCIES_NOT_READY: &str = "DependenciesNotReady";
    /// Disk size violates the disk type's rule.
    pub const INVALID_DISK_SIZE: &str = "InvalidDiskSize";
    /// Disk type is not supported.
    pub const INVALID_DISK_TYPE: &str = "InvalidDiskType";
    /// Status lists no subnets.
    pub const NO_SUBNETS_RESOLVED: &str = "NoSubnetsResolved";
    /// Status lists a subnet with an empty id.
    pub const INVALID_SUBNET: &str = "InvalidSubnet";
    /// A subnet is missing or outside the cluster network.
    pub const SUBNET_NOT_FOUND: &str = "SubnetNotFound";
    /// A subnet's zone differs from the resolved zone.
    pub const SUBNET_ZONE_MISMATCH: &str = "SubnetZoneMismatch";
    /// A security group is missing or outside the cluster network.
    pub const SECURITY_GROUP_NOT_FOUND: &str = "SecurityGroupNotFound";
    /// Accelerated networking requested with burstable core fractions.
    pub const INVALID_ACCELERATED_NETWORK_CORE_FRACTIONS: &str =
        "InvalidAcceleratedNetworkCoreFractions";
}

/// Default delay before a node class is validated again.
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(600);

/// Readiness of a node class for provisioning.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationState {
    /// A prerequisite has not been evaluated yet.
    DependenciesUnknown,
    /// A prerequisite is false.
    DependenciesFailed,
    /// Prerequisites hold but no verdict is cached yet.
    Validating,
    /// Every check passed.
    Succeeded,
    /// A check failed.
    Failed,
}

/// Reason code and message. An empty reason means success.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationResult {
    /// Stable machine-readable code; empty on success.
    pub reason: String,
    /// Human-readable detail naming the offending field or value.
    pub message: String,
}

impl ValidationResult {
    /// A passing result.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// A failing result.
    #[must_use]
    pub fn failure(reason: &str, message: impl Into<String>) -> Self {
        Self {
            reason: reason.to_owned(),
            message: message.into(),
        }
    }

    /// Reports whether the result is a pass.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.reason.is_empty()
    }
}

/// Verdict of one reconciliation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationOutcome {
    /// Resulting state.
    pub state: ValidationState,
    /// Reason and message.
    pub result: ValidationResult,
    /// When to reconcile again.
    pub requeue_after: Option<Duration>,
}

/// Raised when a check could not reach a verdict.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    /// The provider call failed; retry later.
    #[error("validating node class {name}: {source}")]
    Provider {
        /// Node class name.
        name: String,
        /// Provider failure.
        #[source]
        source: ComputeError,
    },
}

impl ValidationError {
    /// Provider failures are always retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        true
    }
}

/// Tunables for [`ValidationEngine`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValidationSettings {
    /// Requeue delay attached to every outcome.
    pub requeue_after: Duration,
    /// Lifetime of cached verdicts.
    pub cache_ttl: Duration,
    /// Limit for each provider call.
    pub call_timeout: Duration,
    /// Skip every check and record success.
    pub checks_disabled: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            requeue_after: DEFAULT_REQUEUE_AFTER,
            cache_ttl: DEFAULT_REQUEUE_AFTER,
            call_timeout: Duration::from_secs(30),
            checks_disabled: false,
        }
    }
}

/// Validates node classes against the provider, caching verdicts.
#[derive(Debug)]
pub struct ValidationEngine<A: ?Sized> {
    settings: ValidationSettings,
    cache: ValidationCache,
    api: Arc<A>,
}

impl<A: ComputeApi + ?Sized> ValidationEngine<A> {
    /// Builds an engine.
    #[must_use]
    pub fn new(api: Arc<A>, settings: ValidationSettings) -> Self {
        Self {
            cache: ValidationCache::new(settings.cache_ttl),
            settings,
            api,
        }
    }

    /// Returns the verdict cache.
    #[must_use]
    pub const fn cache(&self) -> &ValidationCache {
        &self.cache
    }

    /// Evaluates a node class.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Provider`] when a provider call fails;
    /// nothing is cached in that case.
    pub async fn reconcile(&self, class: &NodeClass) -> Result<ValidationOutcome, ValidationError> {
        if let Some(outcome) = self.dependency_gate(class) {
            return Ok(outcome);
        }
        let key = cache_key(class);
        let _guard = self.cache.lock(&key).await;
        if let Some(result) = self.cache.get(&key) {
            debug!(node_class = %class.name, %key, "validation cache hit");
            return Ok(self.verdict(result));
        }

        let result = if self.settings.checks_disabled {
            ValidationResult::success()
        } else {
            self.run_checks(class)
                .await
                .map_err(|source| ValidationError::Provider {
                    name: class.name.clone(),
                    source,
                })?
        };
        info!(
            node_class = %class.name,
            reason = %result.reason,
            message = %result.message,
            "validation verdict computed"
        );
        self.cache.insert(&key, result.clone());
        Ok(self.verdict(result))
    }

    /// Reports the current state without calling the provider.
    #[must_use]
    pub fn peek(&self, class: &NodeClass) -> ValidationOutcome {
        if let Some(outcome) = self.dependency_gate(class) {
            return outcome;
        }
        self.cache
            .get(&cache_key(class))
            .map_or_else(
                || ValidationOutcome {
                    state: ValidationState::Validating,
                    result: ValidationResult::success(),
                    requeue_after: None,
                },
                |result| self.verdict(result),
            )
    }

    /// Forgets every verdict for a node class, for example on deletion.
    pub fn forget(&self, name: &str) {
        self.cache.clear(name);
    }

    fn dependency_gate(&self, class: &NodeClass) -> Option<ValidationOutcome> {
        let state = match class.status.subnets_ready {
            ConditionStatus::True => return None,
            ConditionStatus::False => ValidationState::DependenciesFailed,
            ConditionStatus::Unknown => ValidationState::DependenciesUnknown,
        };
        Some(ValidationOutcome {
            state,
            result: ValidationResult::failure(
                reasons::DEPENDENCIES_NOT_READY,
                "awaiting subnet resolution",
            ),
            requeue_after: Some(self.settings.requeue_after),
        })
    }

    fn verdict(&self, result: ValidationResult) -> ValidationOutcome {
        let state = if result.is_success() {
            ValidationState::Succeeded
        } else {
            ValidationState::Failed
        };
        ValidationOutcome {
            state,
            result,
            requeue_after: Some(self.settings.requeue_after),
        }
    }

    async fn run_checks(&self, class: &NodeClass) -> Result<ValidationResult, ComputeError> {
        let api = self.api.as_ref();
        let limit = self.settings.call_timeout;

        let disk_result = disk::check(&class.spec);
        if !disk_result.is_success() {
            return Ok(disk_result);
        }
        let subnet_result = checks::subnets(api, limit, class).await?;
        if !subnet_result.is_success() {
            return Ok(subnet_result);
        }
        let group_result = checks::security_groups(api, limit, class).await?;
        if !group_result.is_success() {
            return Ok(group_result);
        }
        Ok(checks::accelerated_network(class))
    }
}
