use glam::Vec3;

use super::{BuildReport, NeighborSearch};
use crate::error::PhysicsResult;
use crate::particle::Particle;

/// Brute-force list scan. O(n) per query; the correctness baseline.
#[derive(Debug, Clone, Default)]
pub struct ListNeighborSearch {
    indices: Vec<usize>,
}

impl ListNeighborSearch {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NeighborSearch for ListNeighborSearch {
    fn build(&mut self, _particles: &[Particle], indices: &[usize]) -> PhysicsResult<BuildReport> {
        self.indices.clear();
        self.indices.extend_from_slice(indices);
        Ok(BuildReport {
            indexed: self.indices.len(),
            dropped: 0,
        })
    }

    fn for_each_nearby<F>(&self, particles: &[Particle], origin: Vec3, radius: f32, mut f: F)
    where
        F: FnMut(usize, usize),
    {
        let r2 = radius * radius;
        for (local, &global) in self.indices.iter().enumerate() {
            if (particles[global].predicted - origin).length_squared() < r2 {
                f(local, global);
            }
        }
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}
