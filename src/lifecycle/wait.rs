//! Polling for the instance id of a freshly created node group.

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::compute::{ComputeApi, bounded};
use crate::types::{NodeGroupId, ProviderId};

use super::{LifecycleError, LifecycleManager};

impl<A: ComputeApi + ?Sized> LifecycleManager<A> {
    /// Polls until the node group's node has an instance id and returns its
    /// provider id.
    ///
    /// Polls every [`super::LifecycleSettings::poll_interval`] until
    /// [`super::LifecycleSettings::resolve_timeout`] elapses; no poll or
    /// sleep outlives that deadline. Failed polls and unassigned ids both
    /// keep polling. Dropping the future stops it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ExternalIdTimeout`] carrying the last poll
    /// failure when no id appears in time.
    pub async fn resolve_external_id(
        &self,
        id: &NodeGroupId,
    ) -> Result<ProviderId, LifecycleError> {
        let started = Instant::now();
        let deadline = started + self.settings.resolve_timeout;
        let mut last_error = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let poll = bounded(
                self.settings.call_timeout.min(remaining),
                "get node group instance",
                self.api.node_group_instance_id(id),
            )
            .await;
            match poll {
                Ok(Some(instance)) if !instance.is_empty() => {
                    debug!(node_group_id = %id, instance_id = %instance, "instance id resolved");
                    return Ok(ProviderId::for_instance(&instance));
                }
                Ok(_) => debug!(node_group_id = %id, "instance id not assigned yet"),
                Err(err) => {
                    debug!(node_group_id = %id, error = %err, "instance id poll failed");
                    last_error = Some(err.to_string());
                }
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            sleep(self.settings.poll_interval.min(left)).await;
        }

        let waited = started.elapsed();
        warn!(node_group_id = %id, ?waited, "gave up resolving instance id");
        Err(LifecycleError::ExternalIdTimeout {
            node_group_id: id.clone(),
            waited,
            last_error,
        })
    }
}
