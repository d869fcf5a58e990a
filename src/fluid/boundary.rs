use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;

use crate::kernel::Kernel;

/// Volume weight of each boundary sample, `1 / Σ_k W(x_i - x_k)` over all
/// boundary samples within the kernel support (self included).
///
/// A fluid particle next to a wall then sees the wall as `ρ0 * V` mass per
/// sample, which keeps it from being drawn into an under-sampled boundary.
pub fn compute_boundary_volumes(positions: &[Vec3], kernel: &dyn Kernel) -> Vec<f32> {
    let h = kernel.radius();
    if positions.is_empty() || h <= 0.0 {
        return vec![0.0; positions.len()];
    }

    let cell_of = |p: Vec3| (p / h).floor().as_ivec3();
    let mut cells: FxHashMap<IVec3, Vec<usize>> = FxHashMap::default();
    for (index, &p) in positions.iter().enumerate() {
        cells.entry(cell_of(p)).or_default().push(index);
    }

    positions
        .iter()
        .map(|&p| {
            let cell = cell_of(p);
            let mut sum = 0.0;
            for z in -1..=1 {
                for y in -1..=1 {
                    for x in -1..=1 {
                        let Some(bucket) = cells.get(&(cell + IVec3::new(x, y, z))) else {
                            continue;
                        };
                        sum += bucket.iter().map(|&k| kernel.w(p - positions[k])).sum::<f32>();
                    }
                }
            }
            if sum > 0.0 {
                1.0 / sum
            } else {
                0.0
            }
        })
        .collect()
}
