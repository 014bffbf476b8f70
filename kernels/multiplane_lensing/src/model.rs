// External capability seams: lens-model library and cosmology

use crate::types::{LensPlane, PlaneParams, RayState, UpstreamError};

// ============================================================================
// LENS-MODEL CAPABILITY
// ============================================================================

// Ray-shooting primitive supplied by the (out-of-scope) lens-model library
//
// This is the sole numerical dependency of the engine: it propagates a ray's
// comoving position and deflection from plane z_start to plane z_stop through
// the profiles of the model, given the per-plane parameter values in `args`
// (aligned with the model's plane order). The engine never reimplements
// per-profile deflection formulas.
//
// Contract for plane selection: a deflector at redshift z contributes iff
//
//   z_start < z <= z_stop,  or  z == z_start when include_z_start is true
//
// The inclusive stop is what lets front halos sitting exactly at the macro
// plane be applied by the foreground pass, while include_z_start makes the
// zero-thickness macro-plane crossing (z_start == z_stop) well defined.
pub trait LensSystem: Sized {
    fn ray_shooting_partial(
        &self,
        ray: RayState,
        z_start: f64,
        z_stop: f64,
        args: &[PlaneParams],
        include_z_start: bool,
    ) -> Result<RayState, UpstreamError>;

    // Build a sub-model over a subset of planes, preserving the cosmology
    // and source redshift of this model
    //
    // The splitter hands each pipeline segment its own sub-model; plane order
    // is preserved because the underlying library may cache per-plane state
    // keyed by position in the list.
    fn with_planes(&self, planes: Vec<LensPlane>) -> Self;
}

// ============================================================================
// COSMOLOGY CAPABILITY
// ============================================================================

// Distance factors supplied by the (out-of-scope) cosmology library
//
// The engine only ever needs the transverse comoving distance from the
// observer to the source plane, evaluated once at construction, to convert
// the final comoving position into an angular source-plane position.
pub trait Cosmology {
    // Transverse comoving distance between two redshifts, z_near <= z_far
    fn transverse_comoving_distance(&self, z_near: f64, z_far: f64) -> f64;
}
