// kernels/multiplane_lensing/src/lib.rs

// Multi-Plane Gravitational Lensing Ray-Shooting Core
//
// This library propagates light rays from the observer to the source plane
// through a sequence of deflectors at discrete redshifts, built for fitting
// loops where one deflector group (the macromodel) is perturbed on every
// trial while the rest (the halos) stay fixed. The invariant foreground
// segment of the light path is computed once and cached; deflection,
// Hessian, and magnification stay numerically exact.
//
// All computations use f64. The per-profile deflection math and the
// cosmological distance factors are supplied externally through the
// LensSystem and Cosmology traits; this crate owns only the plane
// partitioning, the segment pipeline, and the caching contract.

pub mod background;
pub mod engine;
pub mod foreground;
pub mod model;
pub mod partition;
pub mod to_vary;
pub mod types;

#[cfg(test)]
mod test_model;

// Re-export the public surface at the crate root
pub use background::Background;
pub use engine::{magnification_from_hessian, MultiPlaneLensing, DEFAULT_FD_STEP};
pub use foreground::Foreground;
pub use model::{Cosmology, LensSystem};
pub use partition::{split_lens_model, ModelPartition};
pub use to_vary::ToVary;
pub use types::{
    ForegroundMode, LensPlane, LensingError, OffsetSlot, PartitionError, PlaneParams, RayState,
    UpstreamError,
};
