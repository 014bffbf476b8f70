// Propagation from the reference plane to the source redshift

use std::sync::Arc;

use crate::model::LensSystem;
use crate::types::{PlaneParams, RayState, UpstreamError};

// ============================================================================
// BACKGROUND SEGMENT
// ============================================================================

// Propagates rays from the macro plane through the back halos to the source
//
// No caching: this segment is cheap next to the foreground, and its input
// changes on every trial anyway because it depends on the varying macromodel
// deflection. The span starts at the macro plane with include_z_start false,
// so deflectors exactly at the reference plane (front halos and the
// macromodel itself) are not applied a second time.
#[derive(Debug)]
pub struct Background<M> {
    // Shared halo sub-model (front + back planes); the front planes fall
    // outside the propagation span
    halo_model: Arc<M>,
    z_macro: f64,
    z_source: f64,
}

impl<M: LensSystem> Background<M> {
    pub fn new(halo_model: Arc<M>, z_macro: f64, z_source: f64) -> Self {
        Self {
            halo_model,
            z_macro,
            z_source,
        }
    }

    // Cheap handle for per-worker clones; the halo sub-model is immutable
    pub fn fork(&self) -> Self {
        Self {
            halo_model: Arc::clone(&self.halo_model),
            z_macro: self.z_macro,
            z_source: self.z_source,
        }
    }

    // Shared handle to the halo sub-model
    pub(crate) fn halo_model(&self) -> Arc<M> {
        Arc::clone(&self.halo_model)
    }

    // Single propagation over (z_macro, z_source]
    pub fn ray_shooting(
        &self,
        ray: RayState,
        halo_args: &[PlaneParams],
    ) -> Result<RayState, UpstreamError> {
        self.halo_model
            .ray_shooting_partial(ray, self.z_macro, self.z_source, halo_args, false)
    }
}
