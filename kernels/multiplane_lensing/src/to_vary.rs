// Macromodel deflection at the reference plane

use std::sync::Arc;

use crate::model::LensSystem;
use crate::types::{PlaneParams, RayState, UpstreamError};

// ============================================================================
// VARYING SEGMENT
// ============================================================================

// Applies the macromodel's deflection to an already-propagated ray bundle
//
// This is the one segment whose parameters change on every optimizer trial,
// so nothing here is cached. The crossing has zero thickness: z_start and
// z_stop are both the macro redshift and include_z_start is true, so exactly
// the deflectors sitting at the reference plane contribute and the ray's
// comoving position is left unchanged.
#[derive(Debug)]
pub struct ToVary<M> {
    macro_model: Arc<M>,
    z_macro: f64,
}

impl<M: LensSystem> ToVary<M> {
    pub fn new(macro_model: Arc<M>, z_macro: f64) -> Self {
        Self {
            macro_model,
            z_macro,
        }
    }

    // Cheap handle for per-worker clones; the macro sub-model is immutable
    pub fn fork(&self) -> Self {
        Self {
            macro_model: Arc::clone(&self.macro_model),
            z_macro: self.z_macro,
        }
    }

    // One zero-thickness crossing of the macro plane
    pub fn ray_shooting(
        &self,
        ray: RayState,
        macro_args: &[PlaneParams],
    ) -> Result<RayState, UpstreamError> {
        self.macro_model
            .ray_shooting_partial(ray, self.z_macro, self.z_macro, macro_args, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_model::{sis_plane, toy_system};

    #[test]
    fn test_zero_thickness_crossing_keeps_position() {
        let plane = sis_plane(0.5, 1.0, 0.0, 0.0);
        let args = vec![plane.params.clone()];
        let to_vary = ToVary::new(Arc::new(toy_system(vec![plane], 1.5)), 0.5);

        // Ray arriving at the macro plane at comoving x = theta * T(0, 0.5)
        let incoming = RayState {
            x: 2048.0,
            y: 0.0,
            alpha_x: 2.0,
            alpha_y: 0.0,
        };
        let outgoing = to_vary.ray_shooting(incoming, &args).unwrap();

        // Position untouched, angle reduced by the deflection
        assert_eq!(outgoing.x, incoming.x);
        assert_eq!(outgoing.y, incoming.y);
        assert!(outgoing.alpha_x < incoming.alpha_x);
        assert_eq!(outgoing.alpha_y, 0.0);
    }

    #[test]
    fn test_varying_args_override_construction_params() {
        let plane = sis_plane(0.5, 1.0, 0.0, 0.0);
        let to_vary = ToVary::new(Arc::new(toy_system(vec![plane.clone()], 1.5)), 0.5);

        let incoming = RayState {
            x: 2048.0,
            y: 0.0,
            alpha_x: 2.0,
            alpha_y: 0.0,
        };

        // Zero Einstein radius in the per-call args must win over the
        // construction-time value
        let zeroed = vec![plane.params.clone().with("theta_E", 0.0)];
        let outgoing = to_vary.ray_shooting(incoming, &zeroed).unwrap();
        assert_eq!(outgoing, incoming);
    }
}
