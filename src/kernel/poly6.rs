use std::f32::consts::PI;

use glam::Vec3;

use super::{Kernel, GRADIENT_EPSILON};

/// SPH Poly6 kernel for weights, Spiky kernel for gradients.
///
/// Poly6's own gradient vanishes as `r -> 0`, which lets clustered particles
/// stick together; the Spiky gradient keeps a repulsive slope there.
#[derive(Debug, Clone, Copy)]
pub struct Poly6Kernel {
    h: f32,
    h2: f32,
    poly6_coeff: f32,
    spiky_coeff: f32,
    zero: f32,
}

impl Poly6Kernel {
    pub fn new(h: f32) -> Self {
        let h2 = h * h;
        let h6 = h2 * h2 * h2;
        let h9 = h6 * h2 * h;

        let mut kernel = Self {
            h,
            h2,
            poly6_coeff: 315.0 / (64.0 * PI * h9),
            spiky_coeff: 45.0 / (PI * h6),
            zero: 0.0,
        };
        kernel.zero = kernel.w_distance(0.0);
        kernel
    }
}

impl Kernel for Poly6Kernel {
    fn radius(&self) -> f32 {
        self.h
    }

    fn zero(&self) -> f32 {
        self.zero
    }

    fn w_distance(&self, distance: f32) -> f32 {
        if distance > self.h {
            return 0.0;
        }
        let diff = self.h2 - distance * distance;
        self.poly6_coeff * diff * diff * diff
    }

    fn grad_w(&self, r: Vec3) -> Vec3 {
        let d = r.length();
        if d > self.h || d <= GRADIENT_EPSILON {
            return Vec3::ZERO;
        }
        let diff = self.h - d;
        -(r / d) * self.spiky_coeff * diff * diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: f32 = 0.4;

    #[test]
    fn test_zero_outside_support() {
        let kernel = Poly6Kernel::new(H);
        for d in [H * 1.0001, H * 1.5, 10.0] {
            assert_eq!(kernel.w(Vec3::new(d, 0.0, 0.0)), 0.0);
            assert_eq!(kernel.grad_w(Vec3::new(0.0, d, 0.0)), Vec3::ZERO);
        }
    }

    #[test]
    fn test_self_weight() {
        let kernel = Poly6Kernel::new(H);
        let expected = 315.0 / (64.0 * PI * H.powi(9)) * H.powi(6);
        assert!((kernel.zero() - expected).abs() / expected < 1e-5);
        assert_eq!(kernel.w(Vec3::ZERO), kernel.zero());
    }

    #[test]
    fn test_no_gradient_at_origin() {
        let kernel = Poly6Kernel::new(H);
        assert_eq!(kernel.grad_w(Vec3::ZERO), Vec3::ZERO);
        assert_eq!(kernel.grad_w(Vec3::splat(1e-8)), Vec3::ZERO);
    }

    #[test]
    fn test_gradient_vanishes_toward_support() {
        let kernel = Poly6Kernel::new(H);
        let near_edge = kernel.grad_w(Vec3::new(H * 0.999, 0.0, 0.0)).length();
        let mid = kernel.grad_w(Vec3::new(H * 0.5, 0.0, 0.0)).length();
        assert!(near_edge < mid * 1e-3);
    }

    #[test]
    fn test_gradient_points_back_toward_neighbor() {
        let kernel = Poly6Kernel::new(H);
        let grad = kernel.grad_w(Vec3::new(0.1, 0.0, 0.0));
        assert!(grad.x < 0.0);
        assert_eq!(grad.y, 0.0);
    }

    #[test]
    fn test_normalized_over_support() {
        let kernel = Poly6Kernel::new(H);
        let n = 48;
        let step = 2.0 * H / n as f32;
        let mut integral = 0.0f64;
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let p = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5) * step
                        - Vec3::splat(H);
                    integral += kernel.w(p) as f64;
                }
            }
        }
        integral *= (step as f64).powi(3);
        assert!((integral - 1.0).abs() < 0.02, "integral = {integral}");
    }
}
