use std::f32::consts::PI;

use glam::Vec3;

use super::{Kernel, GRADIENT_EPSILON};

/// Cubic spline kernel, piecewise on `q = r / H` at `q <= 0.5` and `q <= 1`.
#[derive(Debug, Clone, Copy)]
pub struct CubicKernel {
    h: f32,
    inv_h: f32,
    k: f32,
    l: f32,
    zero: f32,
}

impl CubicKernel {
    pub fn new(h: f32) -> Self {
        let h3 = h * h * h;
        let mut kernel = Self {
            h,
            inv_h: 1.0 / h,
            k: 8.0 / (PI * h3),
            l: 48.0 / (PI * h3),
            zero: 0.0,
        };
        kernel.zero = kernel.w_distance(0.0);
        kernel
    }
}

impl Kernel for CubicKernel {
    fn radius(&self) -> f32 {
        self.h
    }

    fn zero(&self) -> f32 {
        self.zero
    }

    fn w_distance(&self, distance: f32) -> f32 {
        let q = distance * self.inv_h;
        if q > 1.0 {
            0.0
        } else if q <= 0.5 {
            let q2 = q * q;
            self.k * (6.0 * q2 * q - 6.0 * q2 + 1.0)
        } else {
            let factor = 1.0 - q;
            self.k * 2.0 * factor * factor * factor
        }
    }

    fn grad_w(&self, r: Vec3) -> Vec3 {
        let d = r.length();
        let q = d * self.inv_h;
        if q > 1.0 || d <= GRADIENT_EPSILON {
            return Vec3::ZERO;
        }

        let grad_q = r * (1.0 / (d * self.h));
        if q <= 0.5 {
            self.l * q * (3.0 * q - 2.0) * grad_q
        } else {
            let factor = 1.0 - q;
            self.l * (-factor * factor) * grad_q
        }
    }
}
