//! Pause executor

use crate::azure::ControlPlane;
use crate::error::ExecutionError;
use crate::models::{CapacityDescriptor, Outcome, Verdict};
use std::sync::Arc;
use tracing::{info, warn};

/// Issues the suspend action for an idle capacity
pub struct PauseExecutor {
    control_plane: Arc<dyn ControlPlane>,
    dry_run: bool,
}

impl PauseExecutor {
    pub fn new(control_plane: Arc<dyn ControlPlane>, dry_run: bool) -> Self {
        Self {
            control_plane,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Suspend only when the verdict is `Idle`, waiting for the operation to finish
    pub async fn execute(
        &self,
        descriptor: &CapacityDescriptor,
        verdict: Verdict,
    ) -> Result<Outcome, ExecutionError> {
        if verdict != Verdict::Idle {
            return Ok(Outcome::Skipped);
        }

        if self.dry_run {
            warn!(
                resource_id = %descriptor.resource,
                "Dry run: capacity is idle but suspend was not issued"
            );
            return Ok(Outcome::WouldPause);
        }

        info!(resource_id = %descriptor.resource, "Pausing capacity");
        self.control_plane.suspend(&descriptor.handle).await?;
        info!(resource_id = %descriptor.resource, "Capacity paused");

        Ok(Outcome::Paused)
    }
}
