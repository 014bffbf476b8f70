// Splitting a full lens model into macromodel and halo groups

use serde::Serialize;

use crate::types::{LensPlane, PartitionError, PlaneParams};

// ============================================================================
// MODEL PARTITION
// ============================================================================

// Result of splitting a full plane list around the macro plane
//
// Physics: During fitting, only the macromodel's parameters change between
// trials; every other deflector ("halo") is fixed. Halos in front of the
// macro plane affect the ray path before the varying deflection is applied,
// halos behind it only after, so the light path naturally splits into three
// segments that can be evaluated (and cached) independently.
//
// Groups are disjoint and together cover every input plane exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct ModelPartition {
    // Planes at the macro-indices, in model order
    pub macro_planes: Vec<LensPlane>,

    // Halos with redshift <= the macro plane (model order)
    pub front_planes: Vec<LensPlane>,

    // Halos with redshift > the macro plane (model order)
    pub back_planes: Vec<LensPlane>,

    // Minimum redshift among back halos, or the midpoint between macro and
    // source redshift when no back halos exist
    pub z_background: f64,
}

impl ModelPartition {
    // Combined halo plane list: front group followed by back group
    //
    // The concatenation order matters: the underlying ray-shooting primitive
    // may keep per-plane state keyed by list position, and both the
    // foreground and background segments share one halo sub-model.
    pub fn halo_planes(&self) -> Vec<LensPlane> {
        let mut planes = self.front_planes.clone();
        planes.extend(self.back_planes.iter().cloned());
        planes
    }

    // Parameter list aligned with halo_planes()
    pub fn halo_args(&self) -> Vec<PlaneParams> {
        self.front_planes
            .iter()
            .chain(self.back_planes.iter())
            .map(|plane| plane.params.clone())
            .collect()
    }

    // Parameter list aligned with macro_planes, the starting point for the
    // optimizer's varying argument vector
    pub fn macro_args(&self) -> Vec<PlaneParams> {
        self.macro_planes
            .iter()
            .map(|plane| plane.params.clone())
            .collect()
    }
}

// ============================================================================
// MODEL SPLITTER
// ============================================================================

// Partition a full ordered plane list into macro / front-halo / back-halo
//
// Classification rules:
// - entries at macro-indices form the macromodel, in model order
// - remaining entries with z <= z_macro go to the front group
// - remaining entries with z > z_macro go to the back group
//
// A halo exactly at the macro redshift belongs to the front group: the
// foreground pass stops inclusively at z_macro, so that halo is applied
// exactly once, before the macromodel deflection.
//
// Fails when the macro-index set is empty, any index is out of range, or the
// macro planes do not share a single redshift (the engine assumes one macro
// plane along the line of sight).
pub fn split_lens_model(
    planes: &[LensPlane],
    macro_indices: &[usize],
    z_macro: f64,
    z_source: f64,
) -> Result<ModelPartition, PartitionError> {
    if macro_indices.is_empty() {
        return Err(PartitionError::EmptyMacroIndices);
    }
    for &index in macro_indices {
        if index >= planes.len() {
            return Err(PartitionError::IndexOutOfRange {
                index,
                len: planes.len(),
            });
        }
    }

    let mut macro_planes = Vec::new();
    let mut front_planes = Vec::new();
    let mut back_planes = Vec::new();

    // Running minimum over back-halo redshifts, seeded with the midpoint so
    // an empty back group yields the halfway point to the source
    let mut z_background = z_macro + 0.5 * (z_source - z_macro);

    for (i, plane) in planes.iter().enumerate() {
        if macro_indices.contains(&i) {
            macro_planes.push(plane.clone());
        } else if plane.redshift > z_macro {
            if plane.redshift < z_background {
                z_background = plane.redshift;
            }
            back_planes.push(plane.clone());
        } else {
            front_planes.push(plane.clone());
        }
    }

    // All macro planes must sit at one redshift
    let z_first = macro_planes[0].redshift;
    for plane in &macro_planes[1..] {
        if plane.redshift != z_first {
            return Err(PartitionError::MixedRedshifts {
                first: z_first,
                other: plane.redshift,
            });
        }
    }

    Ok(ModelPartition {
        macro_planes,
        front_planes,
        back_planes,
        z_background,
    })
}
