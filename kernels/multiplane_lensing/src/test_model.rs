// Toy lens system and cosmology for exercising the engine in tests
//
// Implements the external capability traits with a closed-form singular
// isothermal sphere (SIS) deflector, so every expected value in the tests
// has an analytic reference. The capability call counter is what lets cache
// tests prove that nothing was recomputed.

use std::cell::Cell;

use crate::model::{Cosmology, LensSystem};
use crate::types::{LensPlane, PlaneParams, RayState, UpstreamError};

// ============================================================================
// TOY COSMOLOGY
// ============================================================================

// Comoving distance linear in redshift: T(z1, z2) = (z2 - z1) * scale
//
// Not a physical cosmology, but it is additive over adjacent intervals,
// which is the only property the multi-plane recursion relies on.
#[derive(Debug, Clone, Copy)]
pub struct ToyCosmology {
    pub scale: f64,
}

impl Cosmology for ToyCosmology {
    fn transverse_comoving_distance(&self, z_near: f64, z_far: f64) -> f64 {
        (z_far - z_near) * self.scale
    }
}

// Power-of-two scale keeps pure drifts exact in floating point, so tests
// of zero-deflection configurations can assert strict equality
pub fn toy_cosmology() -> ToyCosmology {
    ToyCosmology { scale: 2048.0 }
}

// ============================================================================
// TOY LENS SYSTEM
// ============================================================================

// Minimal multi-plane ray shooter over SIS profiles
//
// The SIS "theta_E" parameter is the reduced Einstein radius with respect to
// the model's source plane; the physical deflection applied to the ray is
// scaled by T(0, z_source) / T(z_lens, z_source) so that a single deflector
// reproduces the textbook mapping beta = theta - theta_E * theta / |theta|.
//
// Profile "FAIL" always errors, standing in for a non-convergent profile
// evaluation in a real lens-model library.
#[derive(Debug)]
pub struct ToyLensSystem {
    planes: Vec<LensPlane>,
    cosmo: ToyCosmology,
    z_source: f64,
    calls: Cell<usize>,
}

impl ToyLensSystem {
    pub fn new(planes: Vec<LensPlane>, cosmo: ToyCosmology, z_source: f64) -> Self {
        Self {
            planes,
            cosmo,
            z_source,
            calls: Cell::new(0),
        }
    }

    // Number of ray_shooting_partial invocations on this instance
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    // Deflection of one plane at the ray's current comoving position
    fn deflection(
        &self,
        plane: &LensPlane,
        args: &PlaneParams,
        x: f64,
        y: f64,
    ) -> Result<(f64, f64), UpstreamError> {
        match plane.profile.as_str() {
            "SIS" => {
                let theta_e = args.get_or("theta_E", 0.0);
                let t_0d = self
                    .cosmo
                    .transverse_comoving_distance(0.0, plane.redshift);
                let dx = x / t_0d - args.get_or("center_x", 0.0);
                let dy = y / t_0d - args.get_or("center_y", 0.0);
                let r = dx.hypot(dy);
                if r == 0.0 || theta_e == 0.0 {
                    return Ok((0.0, 0.0));
                }

                // Reduced deflection theta_E, rescaled to a physical angle
                let t_0s = self.cosmo.transverse_comoving_distance(0.0, self.z_source);
                let t_ds = self
                    .cosmo
                    .transverse_comoving_distance(plane.redshift, self.z_source);
                let scale = t_0s / t_ds;
                Ok((theta_e * dx / r * scale, theta_e * dy / r * scale))
            }
            "FAIL" => Err(UpstreamError::new("profile evaluation did not converge")),
            other => Err(UpstreamError::new(format!("unknown profile {other}"))),
        }
    }
}

impl LensSystem for ToyLensSystem {
    fn ray_shooting_partial(
        &self,
        ray: RayState,
        z_start: f64,
        z_stop: f64,
        args: &[PlaneParams],
        include_z_start: bool,
    ) -> Result<RayState, UpstreamError> {
        self.calls.set(self.calls.get() + 1);
        assert_eq!(
            args.len(),
            self.planes.len(),
            "per-plane args must align with the model's plane list"
        );

        // Deflectors inside the span, ordered by redshift
        let mut in_span: Vec<usize> = (0..self.planes.len())
            .filter(|&i| {
                let z = self.planes[i].redshift;
                (z > z_start || (include_z_start && z == z_start)) && z <= z_stop
            })
            .collect();
        in_span.sort_by(|&a, &b| {
            self.planes[a]
                .redshift
                .partial_cmp(&self.planes[b].redshift)
                .unwrap()
        });

        let mut ray = ray;
        let mut z_current = z_start;
        for i in in_span {
            let plane = &self.planes[i];
            let d = self
                .cosmo
                .transverse_comoving_distance(z_current, plane.redshift);
            ray.x += ray.alpha_x * d;
            ray.y += ray.alpha_y * d;

            let (ax, ay) = self.deflection(plane, &args[i], ray.x, ray.y)?;
            ray.alpha_x -= ax;
            ray.alpha_y -= ay;
            z_current = plane.redshift;
        }

        // Free drift from the last deflector to the stop plane
        let d = self.cosmo.transverse_comoving_distance(z_current, z_stop);
        ray.x += ray.alpha_x * d;
        ray.y += ray.alpha_y * d;
        Ok(ray)
    }

    fn with_planes(&self, planes: Vec<LensPlane>) -> Self {
        Self::new(planes, self.cosmo, self.z_source)
    }
}

// ============================================================================
// CONVENIENCE BUILDERS
// ============================================================================

pub fn toy_system(planes: Vec<LensPlane>, z_source: f64) -> ToyLensSystem {
    ToyLensSystem::new(planes, toy_cosmology(), z_source)
}

pub fn sis_plane(redshift: f64, theta_e: f64, center_x: f64, center_y: f64) -> LensPlane {
    LensPlane::new(
        "SIS",
        redshift,
        PlaneParams::new()
            .with("theta_E", theta_e)
            .with("center_x", center_x)
            .with("center_y", center_y),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sanity check of the fixture itself: one SIS at z = 0.5 maps
    // theta = (2, 0) to the source position beta = (1, 0)
    #[test]
    fn test_single_sis_mapping() {
        let system = toy_system(vec![sis_plane(0.5, 1.0, 0.0, 0.0)], 1.5);
        let args = vec![PlaneParams::new().with("theta_E", 1.0)];

        let out = system
            .ray_shooting_partial(RayState::at_observer(2.0, 0.0), 0.0, 1.5, &args, false)
            .unwrap();

        let t_0s = toy_cosmology().transverse_comoving_distance(0.0, 1.5);
        assert!((out.x / t_0s - 1.0).abs() < 1e-12);
        assert!((out.y / t_0s).abs() < 1e-12);
    }

    #[test]
    fn test_fail_profile_propagates_error() {
        let plane = LensPlane::new("FAIL", 0.5, PlaneParams::new());
        let system = toy_system(vec![plane], 1.5);

        let result = system.ray_shooting_partial(
            RayState::at_observer(1.0, 0.0),
            0.0,
            1.5,
            &[PlaneParams::new()],
            false,
        );
        assert!(result.is_err());
    }
}
