// Type definitions for multi-plane lensing ray-shooting

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// RAY STATE
// ============================================================================

// Physical state of a light ray as it crosses deflector planes
//
// Physics: In the multi-plane formalism a ray is described at each plane by
// its comoving transverse position (x, y) and the angle it is currently
// traveling at (alpha_x, alpha_y). Propagation between planes advances the
// position by angle x comoving distance; crossing a deflector plane changes
// the angle.
//
// A RayState is produced and consumed by single propagation calls only;
// nothing outside the foreground cache holds one across calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RayState {
    // Comoving transverse position
    pub x: f64,
    pub y: f64,

    // Current deflection angle components
    pub alpha_x: f64,
    pub alpha_y: f64,
}

impl RayState {
    // A ray leaving the observer toward angular position (thetax, thetay)
    //
    // At redshift zero the comoving offset is zero and the ray travels
    // along the observed direction.
    #[inline]
    pub fn at_observer(thetax: f64, thetay: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            alpha_x: thetax,
            alpha_y: thetay,
        }
    }
}

// ============================================================================
// LENS PLANES AND PARAMETERS
// ============================================================================

// Named parameters of one deflector profile
//
// The engine never interprets these values itself; they are handed through
// to the external lens-model library. Conventional keys: "theta_E" (Einstein
// radius), "e1"/"e2" (ellipticity), "center_x"/"center_y" (position),
// "gamma" (power-law slope), "gamma1"/"gamma2" (external shear).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaneParams(BTreeMap<String, f64>);

impl PlaneParams {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    // Builder-style insertion, handy for test setups and config code
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    // Parameter value with a fallback, the common lookup in profile code
    #[inline]
    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }
}

// One mass distribution at a fixed redshift
//
// Immutable once constructed. The profile identifier is opaque to this
// engine; only the external lens-model library gives it meaning (e.g. "SIS",
// "SPEMD", "SHEAR", "NFW").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensPlane {
    // Profile type identifier understood by the lens-model library
    pub profile: String,

    // Redshift of the plane this deflector resides at
    pub redshift: f64,

    // Construction-time parameter values for this profile
    pub params: PlaneParams,
}

impl LensPlane {
    pub fn new(profile: &str, redshift: f64, params: PlaneParams) -> Self {
        assert!(redshift >= 0.0, "Plane redshift must be non-negative");
        Self {
            profile: profile.to_string(),
            redshift,
            params,
        }
    }
}

// ============================================================================
// FOREGROUND CACHE MODES
// ============================================================================

// Which of the two finite-difference perturbation caches to use
//
// Slot X holds the ray bundle perturbed by +diff along the x axis, slot Y
// the bundle perturbed along y. The Hessian assembly depends on this pairing;
// transposing it would silently transpose the finite-difference formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSlot {
    X,
    Y,
}

impl OffsetSlot {
    // Cache array index for this slot (X = 0, Y = 1)
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
        }
    }
}

// Caching behavior of a foreground ray-shooting call
//
// The foreground segment does not depend on macromodel parameters, so inside
// an optimization loop the same three ray bundles (nominal plus the two
// finite-difference perturbations) are requested thousands of times. The
// mode makes the reuse explicit instead of inferring it from call arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundMode {
    // Use (and lazily populate) the single cache slot tied to the instance's
    // fixed image position. Passed angles are ignored in this mode.
    True,

    // Always recompute from the passed angles, never touching any cache
    Force,

    // Use (and lazily populate) one of the two perturbation slots. After the
    // first call the passed angles are ignored for that slot.
    CacheSlot(OffsetSlot),
}

// ============================================================================
// ERROR TAXONOMY
// ============================================================================

// Construction-time failure of the macro/halo split
//
// These are fatal: no engine is built from an invalid partition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    #[error("macromodel index set is empty")]
    EmptyMacroIndices,

    #[error("macromodel index {index} is out of range for {len} planes")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("macromodel planes span distinct redshifts {first} and {other}")]
    MixedRedshifts { first: f64, other: f64 },
}

// Failure inside the external lens-model library (e.g. a non-convergent
// profile evaluation). Propagated unchanged; never recovered here.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("upstream lens model error: {message}")]
pub struct UpstreamError {
    pub message: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// Top-level error type of the engine
//
// Numerical edge cases (degenerate Jacobians, too-large finite-difference
// steps) are deliberately NOT part of this taxonomy: they propagate as
// ordinary floating-point inf/NaN, matching the convention that
// magnification legitimately diverges near critical curves.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LensingError {
    #[error(transparent)]
    InvalidPartition(#[from] PartitionError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
