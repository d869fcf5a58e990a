/// Particle spawn lattices
use glam::Vec3;

use crate::math::Aabb;

fn cells_along(extent: f32, spacing: f32) -> i32 {
    ((extent / spacing) + 1e-4).floor().max(0.0) as i32
}

/// Fill `bounds` with a cubic lattice of the given spacing. Particle centres
/// sit half a spacing inside the faces.
pub fn points_from_box(bounds: &Aabb, spacing: f32) -> Vec<Vec3> {
    if spacing <= 0.0 {
        return Vec::new();
    }

    let size = bounds.size();
    let (nx, ny, nz) = (
        cells_along(size.x, spacing),
        cells_along(size.y, spacing),
        cells_along(size.z, spacing),
    );

    let mut points = Vec::with_capacity((nx * ny * nz).max(0) as usize);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let offset = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5) * spacing;
                points.push(bounds.min + offset);
            }
        }
    }
    points
}

/// Shell of `layers` lattice layers wrapped around the outside of `bounds`.
pub fn points_from_bound(bounds: &Aabb, spacing: f32, layers: u32) -> Vec<Vec3> {
    if spacing <= 0.0 || layers == 0 {
        return Vec::new();
    }

    let size = bounds.size();
    let layers = layers as i32;
    let thickness = layers as f32 * spacing + 1e-4;
    let (nx, ny, nz) = (
        cells_along(size.x, spacing),
        cells_along(size.y, spacing),
        cells_along(size.z, spacing),
    );

    let mut points = Vec::new();
    for z in -layers..=nz + layers {
        for y in -layers..=ny + layers {
            for x in -layers..=nx + layers {
                let offset = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5) * spacing;
                let p = bounds.min + offset;
                if bounds.contains(p) {
                    continue;
                }
                let outside = (bounds.min - p).max(p - bounds.max).max_element();
                if outside <= thickness {
                    points.push(p);
                }
            }
        }
    }
    points
}
