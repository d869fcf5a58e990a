/// Rigid-body signed distance samples
///
/// One sample per particle of a rigid body: distance to the body surface
/// (negative inside) and the outward gradient at the particle.
use glam::{IVec3, Quat, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::math::EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SdfData {
    pub distance: f32,
    pub gradient: Vec3,
}

impl Default for SdfData {
    fn default() -> Self {
        Self {
            distance: -1.0,
            gradient: Vec3::ZERO,
        }
    }
}

impl SdfData {
    pub fn new(distance: f32, gradient: Vec3) -> Self {
        Self { distance, gradient }
    }

    pub fn rotate(&mut self, rotation: Quat) {
        self.gradient = rotation * self.gradient;
    }

    pub fn rotated(&self, rotation: Quat) -> Self {
        let mut sample = *self;
        sample.rotate(rotation);
        sample
    }
}

const FACE_OFFSETS: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

/// Build SDF samples for particles sampled on a cubic lattice of `spacing`.
///
/// A particle missing any of its six face neighbours lies on the surface and
/// gets `-radius` with a gradient pointing away from its local neighbourhood.
/// Interior particles get `-(radius + distance to the nearest surface
/// particle)` with a gradient pointing at that particle.
pub fn generate_lattice_sdf(positions: &[Vec3], spacing: f32, radius: f32) -> Vec<SdfData> {
    if positions.is_empty() {
        return Vec::new();
    }

    let origin = positions[0];
    let centroid = positions.iter().copied().sum::<Vec3>() / positions.len() as f32;
    let cell_of = |p: Vec3| ((p - origin) / spacing).round().as_ivec3();

    let mut lattice: FxHashMap<IVec3, usize> = FxHashMap::default();
    lattice.reserve(positions.len());
    for (index, &p) in positions.iter().enumerate() {
        lattice.entry(cell_of(p)).or_insert(index);
    }

    let surface: Vec<bool> = positions
        .iter()
        .map(|&p| {
            let cell = cell_of(p);
            FACE_OFFSETS
                .iter()
                .any(|offset| !lattice.contains_key(&(cell + *offset)))
        })
        .collect();

    let surface_points: Vec<usize> = (0..positions.len()).filter(|&i| surface[i]).collect();

    positions
        .iter()
        .enumerate()
        .map(|(index, &p)| {
            if surface[index] {
                SdfData::new(-radius, surface_gradient(p, cell_of(p), &lattice, positions, centroid))
            } else {
                interior_sample(p, radius, positions, &surface_points)
            }
        })
        .collect()
}

fn surface_gradient(
    p: Vec3,
    cell: IVec3,
    lattice: &FxHashMap<IVec3, usize>,
    positions: &[Vec3],
    centroid: Vec3,
) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let mut count = 0;
    for z in -1..=1 {
        for y in -1..=1 {
            for x in -1..=1 {
                if let Some(&neighbor) = lattice.get(&(cell + IVec3::new(x, y, z))) {
                    sum += positions[neighbor];
                    count += 1;
                }
            }
        }
    }

    let local = p - sum / count.max(1) as f32;
    if local.length() > EPSILON {
        return local.normalize();
    }
    let global = p - centroid;
    if global.length() > EPSILON {
        return global.normalize();
    }
    // No usable direction; contacts fall back to the centre line.
    Vec3::ZERO
}

fn interior_sample(p: Vec3, radius: f32, positions: &[Vec3], surface_points: &[usize]) -> SdfData {
    let nearest = surface_points.iter().copied().min_by(|&a, &b| {
        let da = (positions[a] - p).length_squared();
        let db = (positions[b] - p).length_squared();
        da.total_cmp(&db)
    });

    match nearest {
        Some(surface) => {
            let to_surface = positions[surface] - p;
            let distance = to_surface.length();
            let gradient = if distance > EPSILON {
                to_surface / distance
            } else {
                Vec3::Y
            };
            SdfData::new(-(radius + distance), gradient)
        }
        None => SdfData::new(-radius, Vec3::Y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(n: i32, spacing: f32) -> Vec<Vec3> {
        let mut points = Vec::new();
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    points.push(Vec3::new(x as f32, y as f32, z as f32) * spacing);
                }
            }
        }
        points
    }

    #[test]
    fn test_default_sample() {
        let sample = SdfData::default();
        assert_eq!(sample.distance, -1.0);
        assert_eq!(sample.gradient, Vec3::ZERO);
    }

    #[test]
    fn test_cube_surface_and_interior() {
        let points = cube(3, 0.2);
        let sdf = generate_lattice_sdf(&points, 0.2, 0.1);
        assert_eq!(sdf.len(), 27);

        // Centre of a 3x3x3 block is the only interior particle.
        let centre = 13;
        assert!((sdf[centre].distance - -0.3).abs() < 1e-5);
        assert!((sdf[centre].gradient.length() - 1.0).abs() < 1e-5);

        for (i, sample) in sdf.iter().enumerate() {
            if i != centre {
                assert_eq!(sample.distance, -0.1);
            }
        }
    }

    #[test]
    fn test_corner_gradient_points_outward() {
        let points = cube(3, 0.2);
        let sdf = generate_lattice_sdf(&points, 0.2, 0.1);
        let expected = -Vec3::ONE.normalize();
        assert!((sdf[0].gradient - expected).length() < 1e-5);

        let far_corner = sdf[26].gradient;
        assert!((far_corner - Vec3::ONE.normalize()).length() < 1e-5);
    }

    #[test]
    fn test_single_particle() {
        let sdf = generate_lattice_sdf(&[Vec3::new(1.0, 2.0, 3.0)], 0.2, 0.1);
        assert_eq!(sdf.len(), 1);
        assert_eq!(sdf[0].distance, -0.1);
        assert_eq!(sdf[0].gradient, Vec3::ZERO);
    }
}
