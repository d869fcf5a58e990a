/// Neighbour search
///
/// Two interchangeable strategies behind one contract: index a subset of the
/// particle array at its predicted positions, then enumerate
/// `(local index, global index)` pairs of indexed particles strictly within a
/// radius of a query point.
pub mod brute_force;
pub mod hash_grid;

pub use brute_force::ListNeighborSearch;
pub use hash_grid::HashGridNeighborSearch;

use glam::Vec3;

use crate::config::{NeighborStrategy, SolverParams};
use crate::error::PhysicsResult;
use crate::math::Aabb;
use crate::particle::Particle;

/// Upper bound on grid cells per axis. Larger volumes wrap around.
pub const MAX_GRID_RESOLUTION: usize = 64;

/// Outcome of indexing a particle set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    /// Particles left out of a full bucket under `OverflowPolicy::Truncate`.
    pub dropped: usize,
}

pub trait NeighborSearch: Send + Sync {
    /// Index `indices` (global particle indices) at their predicted positions.
    fn build(&mut self, particles: &[Particle], indices: &[usize]) -> PhysicsResult<BuildReport>;

    /// Call `f(local, global)` for every indexed particle with
    /// `|predicted - origin| < radius`. Order is strategy specific.
    fn for_each_nearby<F>(&self, particles: &[Particle], origin: Vec3, radius: f32, f: F)
    where
        F: FnMut(usize, usize);

    /// Number of indexed particles.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Global indices within `radius` of `origin`, ascending. Both strategies
    /// produce identical output for the same input.
    fn gather_nearby(&self, particles: &[Particle], origin: Vec3, radius: f32, out: &mut Vec<usize>) {
        out.clear();
        self.for_each_nearby(particles, origin, radius, |_, global| out.push(global));
        out.sort_unstable();
    }
}

/// Strategy selected from solver parameters.
#[derive(Debug, Clone)]
pub enum NeighborIndex {
    List(ListNeighborSearch),
    HashGrid(HashGridNeighborSearch),
}

impl NeighborIndex {
    /// Grid spacing is twice the widest query radius so that the 8-cell
    /// query pattern covers every candidate.
    pub fn from_params(params: &SolverParams, bounds: &Aabb) -> Self {
        match params.neighbor_strategy {
            NeighborStrategy::List => NeighborIndex::List(ListNeighborSearch::new()),
            NeighborStrategy::HashGrid => {
                let query_radius = params.contact_distance().max(params.smoothing_radius);
                NeighborIndex::HashGrid(HashGridNeighborSearch::for_bounds(
                    bounds,
                    2.0 * query_radius,
                    params.bucket_capacity,
                    params.overflow_policy,
                ))
            }
        }
    }
}

impl NeighborSearch for NeighborIndex {
    fn build(&mut self, particles: &[Particle], indices: &[usize]) -> PhysicsResult<BuildReport> {
        match self {
            NeighborIndex::List(search) => search.build(particles, indices),
            NeighborIndex::HashGrid(search) => search.build(particles, indices),
        }
    }

    fn for_each_nearby<F>(&self, particles: &[Particle], origin: Vec3, radius: f32, f: F)
    where
        F: FnMut(usize, usize),
    {
        match self {
            NeighborIndex::List(search) => search.for_each_nearby(particles, origin, radius, f),
            NeighborIndex::HashGrid(search) => search.for_each_nearby(particles, origin, radius, f),
        }
    }

    fn len(&self) -> usize {
        match self {
            NeighborIndex::List(search) => search.len(),
            NeighborIndex::HashGrid(search) => search.len(),
        }
    }
}
