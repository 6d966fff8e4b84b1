//! State prober

use crate::azure::{CapacityResourceId, ControlPlane};
use crate::error::ProbeError;
use crate::models::{CapacityDescriptor, CapacityHandle, ProvisioningState};
use std::sync::Arc;
use tracing::debug;

/// Reads the capacity's provisioning state at the start of a cycle
pub struct StateProber {
    control_plane: Arc<dyn ControlPlane>,
}

impl StateProber {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    pub async fn probe(
        &self,
        resource: &CapacityResourceId,
    ) -> Result<CapacityDescriptor, ProbeError> {
        let capacity = self.control_plane.get_capacity(resource).await?;

        let returned: CapacityResourceId = capacity.id.parse()?;
        if !returned.same_resource(resource) {
            return Err(ProbeError::ForeignResource {
                expected: resource.to_string(),
                actual: capacity.id,
            });
        }

        let state: ProvisioningState = capacity
            .state
            .parse()
            .map_err(|_| ProbeError::UnparseableState(capacity.state.clone()))?;

        debug!(
            resource_id = %resource,
            state = %state,
            sku = ?capacity.sku,
            "Probed capacity"
        );

        Ok(CapacityDescriptor {
            resource: resource.clone(),
            state,
            handle: CapacityHandle::new(capacity.id),
        })
    }
}
