// Multi-plane ray-shooting orchestrator

use std::sync::Arc;

use crate::background::Background;
use crate::foreground::Foreground;
use crate::model::{Cosmology, LensSystem};
use crate::partition::split_lens_model;
use crate::to_vary::ToVary;
use crate::types::{
    ForegroundMode, LensPlane, LensingError, OffsetSlot, PlaneParams, RayState,
};

// Default forward finite-difference step for the Hessian, in angular units
//
// The canonical `diff` argument for hessian(_fast) and magnification(_fast);
// pass something else only when the step has been calibrated against the
// profile set in use.
//
// Forward differences only: the cached perturbation slots exist only in the
// +diff direction, so a centered scheme would defeat the caching.
pub const DEFAULT_FD_STEP: f64 = 1e-8;

// ============================================================================
// MAGNIFICATION FORMULA
// ============================================================================

// Magnification from the four Hessian components of the Fermat potential
//
// Math: the lens mapping's Jacobian is
//
//   J = [[1 - fxx, -fxy], [-fyx, 1 - fyy]]
//
// and magnification is |det J|^-1. A degenerate determinant (image on a
// critical curve) yields inf; that is the physical answer, not an error.
#[inline]
pub fn magnification_from_hessian(fxx: f64, fxy: f64, fyx: f64, fyy: f64) -> f64 {
    let det_j = (1.0 - fxx) * (1.0 - fyy) - fxy * fyx;
    det_j.recip().abs()
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

// Full multi-plane ray-shooting pipeline around one image position
//
// Composes the three light-path segments:
//
//   observer -> Foreground (cached) -> ToVary (varying) -> Background
//
// then scales the final comoving position by the transverse comoving
// distance to the source to get the angular source-plane position beta.
//
// One instance serves one image position and one fixed halo population; it
// is rebuilt when either changes. Not safe for concurrent mutation: parallel
// workers each take a fork(), which shares the immutable sub-models but
// starts with empty caches.
#[derive(Debug)]
pub struct MultiPlaneLensing<M> {
    foreground: Foreground<M>,
    to_vary: ToVary<M>,
    background: Background<M>,

    // Fixed halo parameters, front group then back group
    halo_args: Vec<PlaneParams>,

    // Construction-time macromodel parameters, the optimizer's starting point
    macro_args: Vec<PlaneParams>,

    // Canonical image position the fast path is tied to
    x_pos: f64,
    y_pos: f64,

    // Transverse comoving distance to the source plane
    t_z_source: f64,

    // Reference redshift of the background group, carried from the partition
    z_background: f64,
}

impl<M: LensSystem> MultiPlaneLensing<M> {
    // Build the engine for one image position and a fixed halo population
    //
    // Splits `planes` around the macro plane, builds the macromodel and halo
    // sub-models from the full model, and evaluates the source-plane distance
    // factor once. Fails when the macro-index set does not describe a valid
    // partition.
    #[allow(clippy::too_many_arguments)]
    pub fn new<C: Cosmology>(
        full_model: &M,
        planes: &[LensPlane],
        x_pos: f64,
        y_pos: f64,
        z_source: f64,
        z_macro: f64,
        cosmo: &C,
        macro_indices: &[usize],
    ) -> Result<Self, LensingError> {
        assert!(z_macro > 0.0, "Macro plane must be at positive redshift");
        assert!(z_source > z_macro, "Source must lie behind the macro plane");

        let partition = split_lens_model(planes, macro_indices, z_macro, z_source)?;

        let macro_model = Arc::new(full_model.with_planes(partition.macro_planes.clone()));
        let halo_model = Arc::new(full_model.with_planes(partition.halo_planes()));

        Ok(Self {
            foreground: Foreground::new(Arc::clone(&halo_model), z_macro, x_pos, y_pos),
            to_vary: ToVary::new(macro_model, z_macro),
            background: Background::new(halo_model, z_macro, z_source),
            halo_args: partition.halo_args(),
            macro_args: partition.macro_args(),
            x_pos,
            y_pos,
            t_z_source: cosmo.transverse_comoving_distance(0.0, z_source),
            z_background: partition.z_background,
        })
    }

    // Angular source-plane position for an arbitrary observed angle
    //
    // Always recomputes the foreground segment (Force mode); use
    // ray_shooting_fast inside optimization loops where the observed angles
    // are the canonical ones.
    pub fn ray_shooting(
        &mut self,
        thetax: f64,
        thetay: f64,
        macro_args: &[PlaneParams],
    ) -> Result<(f64, f64), LensingError> {
        let ray =
            self.foreground
                .ray_shooting(&self.halo_args, ForegroundMode::Force, thetax, thetay)?;
        self.finish(ray, macro_args)
    }

    // Same pipeline through a cached foreground mode
    //
    // With ForegroundMode::True the passed angles are ignored and the
    // canonical image position is used; with CacheSlot they matter only on
    // the first call for that slot.
    pub fn ray_shooting_fast(
        &mut self,
        macro_args: &[PlaneParams],
        mode: ForegroundMode,
        thetax: f64,
        thetay: f64,
    ) -> Result<(f64, f64), LensingError> {
        let ray = self
            .foreground
            .ray_shooting(&self.halo_args, mode, thetax, thetay)?;
        self.finish(ray, macro_args)
    }

    // Hessian of the Fermat potential at (thetax, thetay)
    //
    // Forward finite differences of the deflection alpha = theta - beta:
    //
    //   d(alpha_i)/d(theta_j) ~ (alpha_i(theta + diff e_j) - alpha_i(theta)) / diff
    //
    // Returns (fxx, fxy, fyx, fyy). Use DEFAULT_FD_STEP for `diff` unless a
    // calibrated step is at hand; hessian_default wraps that choice.
    pub fn hessian(
        &mut self,
        thetax: f64,
        thetay: f64,
        macro_args: &[PlaneParams],
        diff: f64,
    ) -> Result<(f64, f64, f64, f64), LensingError> {
        let (alpha_x, alpha_y) = self.alpha(thetax, thetay, macro_args)?;
        let (alpha_x_dx, alpha_y_dx) = self.alpha(thetax + diff, thetay, macro_args)?;
        let (alpha_x_dy, alpha_y_dy) = self.alpha(thetax, thetay + diff, macro_args)?;

        let f_xx = (alpha_x_dx - alpha_x) / diff;
        let f_xy = (alpha_x_dy - alpha_x) / diff;
        let f_yx = (alpha_y_dx - alpha_y) / diff;
        let f_yy = (alpha_y_dy - alpha_y) / diff;

        Ok((f_xx, f_xy, f_yx, f_yy))
    }

    // Hessian at the canonical image position through the cached fast path
    //
    // The nominal ray bundle goes through the True cache; the x- and
    // y-perturbed bundles go through slots 0 and 1. Each slot is populated
    // exactly once per halo configuration and reused across every macromodel
    // trial, because the foreground contribution to a perturbed bundle does
    // not depend on the macromodel.
    pub fn hessian_fast(
        &mut self,
        macro_args: &[PlaneParams],
        diff: f64,
    ) -> Result<(f64, f64, f64, f64), LensingError> {
        let (x0, y0) = (self.x_pos, self.y_pos);

        let (alpha_x, alpha_y) = self.alpha_fast(x0, y0, macro_args, ForegroundMode::True)?;
        let (alpha_x_dx, alpha_y_dx) = self.alpha_fast(
            x0 + diff,
            y0,
            macro_args,
            ForegroundMode::CacheSlot(OffsetSlot::X),
        )?;
        let (alpha_x_dy, alpha_y_dy) = self.alpha_fast(
            x0,
            y0 + diff,
            macro_args,
            ForegroundMode::CacheSlot(OffsetSlot::Y),
        )?;

        let f_xx = (alpha_x_dx - alpha_x) / diff;
        let f_xy = (alpha_x_dy - alpha_x) / diff;
        let f_yx = (alpha_y_dx - alpha_y) / diff;
        let f_yy = (alpha_y_dy - alpha_y) / diff;

        Ok((f_xx, f_xy, f_yx, f_yy))
    }

    // Hessian with the default finite-difference step
    pub fn hessian_default(
        &mut self,
        thetax: f64,
        thetay: f64,
        macro_args: &[PlaneParams],
    ) -> Result<(f64, f64, f64, f64), LensingError> {
        self.hessian(thetax, thetay, macro_args, DEFAULT_FD_STEP)
    }

    // Fast-path Hessian with the default finite-difference step
    pub fn hessian_fast_default(
        &mut self,
        macro_args: &[PlaneParams],
    ) -> Result<(f64, f64, f64, f64), LensingError> {
        self.hessian_fast(macro_args, DEFAULT_FD_STEP)
    }

    // Image magnification at an arbitrary observed angle
    pub fn magnification(
        &mut self,
        thetax: f64,
        thetay: f64,
        macro_args: &[PlaneParams],
        diff: f64,
    ) -> Result<f64, LensingError> {
        let (f_xx, f_xy, f_yx, f_yy) = self.hessian(thetax, thetay, macro_args, diff)?;
        Ok(magnification_from_hessian(f_xx, f_xy, f_yx, f_yy))
    }

    // Image magnification at the canonical position, cached fast path
    pub fn magnification_fast(
        &mut self,
        macro_args: &[PlaneParams],
        diff: f64,
    ) -> Result<f64, LensingError> {
        let (f_xx, f_xy, f_yx, f_yy) = self.hessian_fast(macro_args, diff)?;
        Ok(magnification_from_hessian(f_xx, f_xy, f_yx, f_yy))
    }

    // Image magnification with the default finite-difference step
    pub fn magnification_default(
        &mut self,
        thetax: f64,
        thetay: f64,
        macro_args: &[PlaneParams],
    ) -> Result<f64, LensingError> {
        self.magnification(thetax, thetay, macro_args, DEFAULT_FD_STEP)
    }

    // Fast-path magnification with the default finite-difference step
    pub fn magnification_fast_default(
        &mut self,
        macro_args: &[PlaneParams],
    ) -> Result<f64, LensingError> {
        self.magnification_fast(macro_args, DEFAULT_FD_STEP)
    }

    // Seed the foreground caches with bundles computed elsewhere
    pub fn set_precomputed_rays(
        &mut self,
        true_ray: Option<RayState>,
        offset_rays: Option<[RayState; 2]>,
    ) {
        self.foreground.set_precomputed(true_ray, offset_rays);
    }

    // Per-worker clone: shares the immutable sub-models and halo arguments,
    // starts with empty foreground caches
    pub fn fork(&self) -> Self {
        Self {
            foreground: self.foreground.fork(),
            to_vary: self.to_vary.fork(),
            background: self.background.fork(),
            halo_args: self.halo_args.clone(),
            macro_args: self.macro_args.clone(),
            x_pos: self.x_pos,
            y_pos: self.y_pos,
            t_z_source: self.t_z_source,
            z_background: self.z_background,
        }
    }

    // Construction-time macromodel parameters, in macro-plane order
    #[inline]
    pub fn macro_args(&self) -> &[PlaneParams] {
        &self.macro_args
    }

    // Reference redshift of the background halo group
    #[inline]
    pub fn z_background(&self) -> f64 {
        self.z_background
    }

    // Canonical image position this engine is tied to
    #[inline]
    pub fn image_position(&self) -> (f64, f64) {
        (self.x_pos, self.y_pos)
    }

    // Tail of the pipeline shared by all entry points: macro-plane crossing,
    // background propagation, scaling to angular source-plane coordinates
    fn finish(
        &self,
        ray: RayState,
        macro_args: &[PlaneParams],
    ) -> Result<(f64, f64), LensingError> {
        let ray = self.to_vary.ray_shooting(ray, macro_args)?;
        let ray = self.background.ray_shooting(ray, &self.halo_args)?;
        Ok((ray.x / self.t_z_source, ray.y / self.t_z_source))
    }

    // Deflection alpha = theta - beta through the uncached path
    fn alpha(
        &mut self,
        thetax: f64,
        thetay: f64,
        macro_args: &[PlaneParams],
    ) -> Result<(f64, f64), LensingError> {
        let (beta_x, beta_y) = self.ray_shooting(thetax, thetay, macro_args)?;
        Ok((thetax - beta_x, thetay - beta_y))
    }

    // Deflection alpha = theta - beta through a cached foreground mode
    fn alpha_fast(
        &mut self,
        thetax: f64,
        thetay: f64,
        macro_args: &[PlaneParams],
        mode: ForegroundMode,
    ) -> Result<(f64, f64), LensingError> {
        let (beta_x, beta_y) = self.ray_shooting_fast(macro_args, mode, thetax, thetay)?;
        Ok((thetax - beta_x, thetay - beta_y))
    }
}
