/// Smoothing kernels
///
/// Pure functions of a relative-position vector and a fixed support radius `H`,
/// used only by the fluid density constraint.
pub mod cubic;
pub mod poly6;

pub use cubic::CubicKernel;
pub use poly6::Poly6Kernel;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Distances below this never produce a gradient.
pub const GRADIENT_EPSILON: f32 = 1e-6;

/// A smoothing kernel with compact support `H`.
pub trait Kernel: std::fmt::Debug + Send + Sync {
    /// Support radius.
    fn radius(&self) -> f32;

    /// Precomputed self weight `W(0)`.
    fn zero(&self) -> f32;

    /// Weight for a scalar distance. Exactly zero beyond the support radius.
    fn w_distance(&self, distance: f32) -> f32;

    /// Gradient with respect to the first particle of `r = p_i - p_j`.
    fn grad_w(&self, r: Vec3) -> Vec3;

    fn w(&self, r: Vec3) -> f32 {
        self.w_distance(r.length())
    }
}

/// Kernel family selectable from solver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    /// Poly6 weights with the Spiky gradient.
    Poly6,
    /// Two-piece cubic spline.
    Cubic,
}

impl KernelKind {
    pub fn build(self, h: f32) -> SmoothingKernel {
        match self {
            KernelKind::Poly6 => SmoothingKernel::Poly6(Poly6Kernel::new(h)),
            KernelKind::Cubic => SmoothingKernel::Cubic(CubicKernel::new(h)),
        }
    }
}

/// Concrete kernel held by a density constraint.
#[derive(Debug, Clone, Copy)]
pub enum SmoothingKernel {
    Poly6(Poly6Kernel),
    Cubic(CubicKernel),
}

impl Kernel for SmoothingKernel {
    fn radius(&self) -> f32 {
        match self {
            SmoothingKernel::Poly6(kernel) => kernel.radius(),
            SmoothingKernel::Cubic(kernel) => kernel.radius(),
        }
    }

    fn zero(&self) -> f32 {
        match self {
            SmoothingKernel::Poly6(kernel) => kernel.zero(),
            SmoothingKernel::Cubic(kernel) => kernel.zero(),
        }
    }

    fn w_distance(&self, distance: f32) -> f32 {
        match self {
            SmoothingKernel::Poly6(kernel) => kernel.w_distance(distance),
            SmoothingKernel::Cubic(kernel) => kernel.w_distance(distance),
        }
    }

    fn grad_w(&self, r: Vec3) -> Vec3 {
        match self {
            SmoothingKernel::Poly6(kernel) => kernel.grad_w(r),
            SmoothingKernel::Cubic(kernel) => kernel.grad_w(r),
        }
    }
}

/// Kernel sum `Σ W(x_0 - x_k)` over an infinite cubic lattice of the given
/// spacing, self term included. A fluid sampled on that lattice with particle
/// mass `rest_density / sum` sits exactly at rest density.
pub fn lattice_density_sum(kernel: &dyn Kernel, spacing: f32) -> f32 {
    if spacing <= 0.0 {
        return kernel.zero();
    }

    let reach = (kernel.radius() / spacing).ceil() as i32;
    let mut sum = 0.0;
    for z in -reach..=reach {
        for y in -reach..=reach {
            for x in -reach..=reach {
                let r = Vec3::new(x as f32, y as f32, z as f32) * spacing;
                sum += kernel.w(r);
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_sum_includes_self() {
        let kernel = Poly6Kernel::new(0.4);
        // A spacing larger than H leaves only the self term.
        assert_eq!(lattice_density_sum(&kernel, 1.0), kernel.zero());
        assert!(lattice_density_sum(&kernel, 0.2) > kernel.zero());
    }

    #[test]
    fn test_kind_builds_matching_kernel() {
        let poly6 = KernelKind::Poly6.build(0.5);
        let cubic = KernelKind::Cubic.build(0.5);
        assert_eq!(poly6.zero(), Poly6Kernel::new(0.5).zero());
        assert_eq!(cubic.zero(), CubicKernel::new(0.5).zero());
    }
}
