/// Position-Based Fluids
///
/// The density constraint enforcing incompressibility, boundary volume
/// weights for static particles sampled by fluids, and the velocity-level
/// post passes (XSPH viscosity, vorticity confinement).
pub mod boundary;
pub mod density;
pub mod viscosity;

pub use boundary::compute_boundary_volumes;
pub use density::DensityConstraint;
pub use viscosity::{apply_vorticity_confinement, apply_xsph_viscosity};

use crate::kernel::{lattice_density_sum, Kernel};

/// Reference distance for the tensile-instability term, as a fraction of `H`.
pub const TENSILE_REFERENCE_FRACTION: f32 = 0.2;

/// Exponent of the tensile-instability term.
pub const TENSILE_EXPONENT: i32 = 4;

/// Per-particle mass that puts a fluid sampled on a cubic lattice of
/// `spacing` exactly at `rest_density`.
pub fn fluid_particle_mass(kernel: &dyn Kernel, spacing: f32, rest_density: f32) -> f32 {
    let sum = lattice_density_sum(kernel, spacing);
    if sum > 0.0 {
        rest_density / sum
    } else {
        rest_density
    }
}
