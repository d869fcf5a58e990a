/// PBF density constraint
///
/// One instance per fluid entity, persisting for the solver's lifetime.
/// Every projection rebuilds the neighbour index, then runs three
/// data-parallel passes over the entity's particles (density and lambda,
/// corrections, apply) so that all reads happen before any write.
use glam::Vec3;
use rayon::prelude::*;

use super::{TENSILE_EXPONENT, TENSILE_REFERENCE_FRACTION};
use crate::config::{OverflowPolicy, SolverParams};
use crate::constraint::{ParticleConstraint, ProjectionContext, ProjectionMode};
use crate::entity::EntityId;
use crate::error::{capacity_overflow, PhysicsResult};
use crate::kernel::{Kernel, SmoothingKernel};
use crate::neighbor::NeighborSearch;
use crate::particle::{Particle, Phase};

#[derive(Debug, Clone)]
pub struct DensityConstraint {
    entity: EntityId,
    particles: Vec<usize>,
    rest_density: f32,
    kernel: SmoothingKernel,
    neighbors: Vec<Vec<usize>>,
    densities: Vec<f32>,
    lambdas: Vec<f32>,
    corrections: Vec<Vec3>,
}

/// Mass a neighbour contributes to a fluid particle's density, or `None`
/// when it does not take part.
fn effective_mass(
    neighbor: &Particle,
    index: usize,
    params: &SolverParams,
    rest_density: f32,
    boundary_volumes: &[f32],
) -> Option<f32> {
    match neighbor.phase {
        Phase::Fluid => Some(neighbor.mass()),
        Phase::None if !neighbor.is_static() => Some(neighbor.mass()),
        Phase::Rigidbody if !neighbor.is_static() => Some(params.solid_pressure * neighbor.mass()),
        Phase::Boundary => boundary_volumes
            .get(index)
            .filter(|volume| **volume > 0.0)
            .map(|volume| params.solid_pressure * rest_density * volume),
        _ => None,
    }
}

impl DensityConstraint {
    pub fn new(entity: EntityId, particles: Vec<usize>, rest_density: f32, kernel: SmoothingKernel) -> Self {
        let count = particles.len();
        Self {
            entity,
            particles,
            rest_density,
            kernel,
            neighbors: vec![Vec::new(); count],
            densities: vec![0.0; count],
            lambdas: vec![0.0; count],
            corrections: vec![Vec3::ZERO; count],
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn rest_density(&self) -> f32 {
        self.rest_density
    }

    /// Densities from the latest projection, aligned with the entity's particles.
    pub fn densities(&self) -> &[f32] {
        &self.densities
    }

    pub fn lambdas(&self) -> &[f32] {
        &self.lambdas
    }

    /// Position corrections applied by the latest projection.
    pub fn corrections(&self) -> &[Vec3] {
        &self.corrections
    }

    fn gather_neighbors(
        &mut self,
        particles: &[Particle],
        ctx: &mut ProjectionContext<'_>,
    ) -> PhysicsResult<()> {
        let h = self.kernel.radius();
        let max_neighbors = ctx.params.max_neighbors;
        let index = &*ctx.neighbors;

        let excess: Vec<usize> = self
            .particles
            .par_iter()
            .zip(self.neighbors.par_iter_mut())
            .map(|(&i, found)| {
                index.gather_nearby(particles, particles[i].predicted, h, found);
                found.retain(|&j| j != i);
                let excess = found.len().saturating_sub(max_neighbors);
                found.truncate(max_neighbors);
                excess
            })
            .collect();

        let total: usize = excess.iter().sum();
        if total == 0 {
            return Ok(());
        }
        if ctx.params.overflow_policy == OverflowPolicy::Fail {
            let requested = excess.iter().copied().max().unwrap_or(0) + max_neighbors;
            return Err(capacity_overflow("fluid neighbour buffer", max_neighbors, requested));
        }
        log::warn!(
            "Fluid entity {} exceeded {} neighbours per particle, dropped {} entries",
            self.entity,
            max_neighbors,
            total
        );
        ctx.truncated_neighbors += total;
        Ok(())
    }
}

impl ParticleConstraint for DensityConstraint {
    fn project(
        &mut self,
        particles: &mut [Particle],
        ctx: &mut ProjectionContext<'_>,
        mode: ProjectionMode,
    ) -> PhysicsResult<()> {
        if self.particles.is_empty() {
            return Ok(());
        }

        let all: Vec<usize> = (0..particles.len()).collect();
        let report = ctx.neighbors.build(particles, &all)?;
        ctx.truncated_neighbors += report.dropped;
        self.gather_neighbors(particles, ctx)?;

        let params = ctx.params;
        let volumes = ctx.boundary_volumes;
        let rest = self.rest_density;
        let kernel = self.kernel;

        // Pass 1: density and lambda from the frozen predicted positions.
        {
            let snapshot: &[Particle] = particles;
            let results: Vec<(f32, f32)> = self
                .particles
                .par_iter()
                .zip(self.neighbors.par_iter())
                .map(|(&i, found)| {
                    let pi = &snapshot[i];
                    let mut density = pi.mass() * kernel.zero();
                    let mut grad_i = Vec3::ZERO;
                    let mut grad_sum = 0.0;

                    for &j in found {
                        let pj = &snapshot[j];
                        let Some(mass) = effective_mass(pj, j, params, rest, volumes) else {
                            continue;
                        };
                        let r = pi.predicted - pj.predicted;
                        density += mass * kernel.w(r);
                        let grad = (mass / rest) * kernel.grad_w(r);
                        grad_i += grad;
                        grad_sum += grad.length_squared();
                    }
                    grad_sum += grad_i.length_squared();

                    let c = (density / rest - 1.0).max(0.0);
                    let lambda = -c / (grad_sum + params.relaxation_epsilon);
                    (density, lambda)
                })
                .collect();

            for (k, (density, lambda)) in results.into_iter().enumerate() {
                self.densities[k] = density;
                self.lambdas[k] = lambda;
            }
        }

        for (&i, &lambda) in self.particles.iter().zip(&self.lambdas) {
            particles[i].lambda = lambda;
        }

        // Pass 2: corrections, reading every lambda through the particle array.
        {
            let snapshot: &[Particle] = particles;
            let h = kernel.radius();
            let w_reference = kernel.w_distance(TENSILE_REFERENCE_FRACTION * h);
            let surface_tension = params.surface_tension;

            self.corrections = self
                .particles
                .par_iter()
                .zip(self.neighbors.par_iter())
                .map(|(&i, found)| {
                    let pi = &snapshot[i];
                    let mut delta = Vec3::ZERO;

                    for &j in found {
                        let pj = &snapshot[j];
                        let Some(mass) = effective_mass(pj, j, params, rest, volumes) else {
                            continue;
                        };
                        let r = pi.predicted - pj.predicted;
                        let s_corr = if w_reference > 0.0 {
                            -surface_tension * (kernel.w(r) / w_reference).powi(TENSILE_EXPONENT)
                        } else {
                            0.0
                        };
                        let lambda_j = if pj.phase == Phase::Fluid { pj.lambda } else { 0.0 };
                        delta += mass * (pi.lambda + lambda_j + s_corr) * kernel.grad_w(r);
                    }

                    delta * params.relaxation_factor / rest
                })
                .collect();
        }

        // Pass 3: apply.
        for (&i, &delta) in self.particles.iter().zip(&self.corrections) {
            let p = &mut particles[i];
            if p.inverse_mass == 0.0 {
                continue;
            }
            p.predicted += delta;
            if mode == ProjectionMode::Stabilize {
                p.position += delta;
            }
        }
        Ok(())
    }

    /// Fluid particles are not counted; only contacts share the averaging.
    fn update_counts(&self, _particles: &mut [Particle]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::test_support::list_index;
    use crate::fluid::fluid_particle_mass;
    use crate::geometry::points_from_box;
    use crate::math::Aabb;

    struct Block {
        particles: Vec<Particle>,
        constraint: DensityConstraint,
        params: SolverParams,
    }

    fn block(cells: i32) -> Block {
        let params = SolverParams::default();
        let kernel = params.kernel.build(params.smoothing_radius);
        let spacing = params.fluid_rest_distance;
        let mass = fluid_particle_mass(&kernel, spacing, params.rest_density);

        let extent = cells as f32 * spacing;
        let bounds = Aabb::new(Vec3::ZERO, Vec3::splat(extent));
        let particles: Vec<Particle> = points_from_box(&bounds, spacing)
            .into_iter()
            .map(|p| Particle::new(p, 1.0 / mass, Phase::Fluid, EntityId(0)))
            .collect();
        let indices = (0..particles.len()).collect();
        let constraint = DensityConstraint::new(EntityId(0), indices, params.rest_density, kernel);

        Block {
            particles,
            constraint,
            params,
        }
    }

    fn project(block: &mut Block) {
        let mut index = list_index();
        let mut ctx = ProjectionContext::new(&block.params, &[], &[], &mut index);
        block
            .constraint
            .project(&mut block.particles, &mut ctx, ProjectionMode::Solve)
            .unwrap();
    }

    #[test]
    fn test_lattice_interior_is_at_rest() {
        let mut block = block(7);
        project(&mut block);

        let spacing = block.params.fluid_rest_distance;
        let interior = |p: Vec3| {
            let lo = 2.0 * spacing;
            let hi = 5.0 * spacing;
            (0..3).all(|axis| p[axis] > lo && p[axis] < hi)
        };

        let mut checked = 0;
        for (k, &i) in block.constraint.particles.iter().enumerate() {
            if !interior(block.particles[i].position) {
                continue;
            }
            checked += 1;
            let density = block.constraint.densities()[k];
            assert!((density / 1000.0 - 1.0).abs() < 0.01, "density {density}");
            assert!(block.constraint.lambdas()[k].abs() < 1e-4);
            assert!(block.constraint.corrections()[k].length() < 1e-4);
        }
        assert_eq!(checked, 27);
    }

    #[test]
    fn test_compressed_fluid_pushes_apart() {
        let mut block = block(3);
        for p in &mut block.particles {
            p.predicted *= 0.5;
        }
        project(&mut block);

        let centre = block.particles[13].predicted;
        let corner = &block.particles[0];
        assert!(block.constraint.lambdas().iter().any(|&l| l < 0.0));
        assert!((corner.predicted - centre).length() > (corner.position * 0.5 - centre).length());
    }

    #[test]
    fn test_sparse_fluid_is_unconstrained() {
        let mut block = block(2);
        for p in &mut block.particles {
            p.predicted *= 10.0;
            p.position = p.predicted;
        }
        project(&mut block);
        assert!(block.constraint.lambdas().iter().all(|&l| l == 0.0));
        for p in &block.particles {
            assert_eq!(p.predicted, p.position);
        }
    }

    #[test]
    fn test_neighbour_overflow_fails_under_fail_policy() {
        let mut block = block(3);
        block.params.max_neighbors = 2;
        block.params.overflow_policy = OverflowPolicy::Fail;

        let mut index = list_index();
        let mut ctx = ProjectionContext::new(&block.params, &[], &[], &mut index);
        let err = block
            .constraint
            .project(&mut block.particles, &mut ctx, ProjectionMode::Solve)
            .unwrap_err();
        assert!(matches!(err, crate::error::PhysicsError::CapacityOverflow { capacity: 2, .. }));
    }

    #[test]
    fn test_neighbour_overflow_truncates_and_counts() {
        let mut block = block(3);
        block.params.max_neighbors = 2;

        let mut index = list_index();
        let mut ctx = ProjectionContext::new(&block.params, &[], &[], &mut index);
        block
            .constraint
            .project(&mut block.particles, &mut ctx, ProjectionMode::Solve)
            .unwrap();
        assert!(ctx.truncated_neighbors > 0);
        assert!(block.constraint.neighbors.iter().all(|n| n.len() <= 2));
    }

    #[test]
    fn test_density_leaves_counts_alone() {
        let mut block = block(2);
        block.constraint.update_counts(&mut block.particles);
        assert!(block.particles.iter().all(|p| p.neighbor_count == 0));
    }
}
