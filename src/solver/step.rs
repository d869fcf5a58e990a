use std::time::Instant;

use glam::Vec3;
use rand::Rng;
use rayon::prelude::*;

use super::Solver;
use crate::config::OverflowPolicy;
use crate::constraint::{
    BoundaryConstraint, Constraint, ConstraintGroup, ContactConstraint, ProjectionContext,
    ProjectionMode, RigidContactConstraint, STABILIZATION_ITERATIONS,
};
use crate::entity::Entity;
use crate::error::{invalid_parameter, PhysicsResult};
use crate::fluid::{apply_vorticity_confinement, apply_xsph_viscosity};
use crate::math::EPSILON;
use crate::neighbor::{NeighborIndex, NeighborSearch};
use crate::particle::Phase;

fn elapsed_us(start: Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

impl Solver {
    /// Advance the simulation by `dt`, split into `substeps` equal substeps
    /// that each run the full pipeline.
    ///
    /// Under `OverflowPolicy::Fail` a failing step leaves the solver exactly
    /// as it was before the call.
    pub fn step(&mut self, dt: f32, substeps: u32) -> PhysicsResult<()> {
        if substeps == 0 {
            return Err(invalid_parameter("substeps", "must be at least 1"));
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(invalid_parameter(
                "dt",
                format!("must be positive and finite, got {dt}"),
            ));
        }

        let start = Instant::now();
        self.stats.reset();
        self.neighbors = NeighborIndex::from_params(&self.params, &self.bounds.aabb());

        let snapshot = (self.params.overflow_policy == OverflowPolicy::Fail).then(|| self.clone());
        let t = dt / substeps as f32;

        for _ in 0..substeps {
            if let Err(err) = self.substep(t) {
                self.arena.release_transient();
                if let Some(previous) = snapshot {
                    *self = previous;
                }
                log::warn!("Step of {dt}s aborted: {err}");
                return Err(err);
            }
        }

        self.stats.total_time_us = elapsed_us(start);
        log::debug!(
            "Step {:.4}s x{}: {} contacts, {} rigid contacts, {} boundary, {} density, {} shape, {} sleeping, {}us",
            dt,
            substeps,
            self.stats.contact_constraints,
            self.stats.rigid_contact_constraints,
            self.stats.boundary_constraints,
            self.stats.density_constraints,
            self.stats.shape_constraints,
            self.stats.sleeping_particles,
            self.stats.total_time_us
        );
        Ok(())
    }

    fn substep(&mut self, t: f32) -> PhysicsResult<()> {
        let timer = Instant::now();
        self.predict(t);
        self.stats.prediction_time_us += elapsed_us(timer);

        let timer = Instant::now();
        self.discover()?;
        self.arena.update_counts(&mut self.particles);
        self.count_constraints();
        self.stats.discovery_time_us += elapsed_us(timer);

        let timer = Instant::now();
        self.solve()?;
        self.sync_rotations();
        self.stats.solve_time_us += elapsed_us(timer);

        let timer = Instant::now();
        self.reconcile(t);
        self.apply_restitution();
        self.apply_fluid_forces(t)?;
        self.stats.reconcile_time_us += elapsed_us(timer);

        self.arena.release_transient();
        self.stats.substeps += 1;
        Ok(())
    }

    /// Force and prediction pass. Resets per-substep particle scratch, then
    /// integrates attached forces into velocity and predicts positions.
    pub(crate) fn predict(&mut self, t: f32) {
        let entities: &[Entity] = &self.entities;
        let shock = self.params.shock_propagation;

        self.particles.par_iter_mut().for_each(|p| {
            p.frame_init();
            p.predicted = p.position;
            if p.is_static() || p.phase == Phase::Boundary {
                return;
            }

            let entity = entities.get(p.entity.index());
            let acceleration = entity.map(Entity::total_force).unwrap_or(Vec3::ZERO);
            p.velocity += acceleration * t;
            p.predicted = p.position + p.velocity * t;

            if let Some(entity) = entity {
                let scale = entity.mass_scale(p.predicted.y, shock);
                if scale.is_finite() && scale > 0.0 {
                    p.apply_mass_scale(scale);
                }
            }
        });
    }

    /// Discovery pass: contact constraints for overlapping pairs and one
    /// boundary constraint per violated plane.
    fn discover(&mut self) -> PhysicsResult<()> {
        let all: Vec<usize> = (0..self.particles.len()).collect();
        let report = self.neighbors.build(&self.particles, &all)?;
        self.stats.dropped_from_grid += report.dropped;

        let radius = self.params.contact_distance() - EPSILON;
        let stabilize = self.params.stabilization;
        let mut nearby = Vec::new();

        for i in 0..self.particles.len() {
            let pi = &self.particles[i];
            self.neighbors
                .gather_nearby(&self.particles, pi.predicted, radius, &mut nearby);

            for &j in nearby.iter().filter(|&&j| j > i) {
                let pj = &self.particles[j];
                if pi.is_static() && pj.is_static() {
                    continue;
                }

                let rigid_i = pi.phase == Phase::Rigidbody;
                let rigid_j = pj.phase == Phase::Rigidbody;
                let constraint = match (rigid_i, rigid_j) {
                    (true, true) if pi.entity == pj.entity => continue,
                    (true, true) => Constraint::RigidContact(RigidContactConstraint::new(i, j)),
                    (true, false) | (false, true) => Constraint::Contact(ContactConstraint::new(i, j)),
                    (false, false) => continue,
                };

                let slot = self.arena.add(ConstraintGroup::Contact, constraint);
                if stabilize {
                    self.arena.enqueue(ConstraintGroup::Stabilization, slot);
                }
            }
        }

        let bounds = self.bounds;
        let radius = self.params.radius;
        let jitter = self.params.boundary_jitter;

        for (i, p) in self.particles.iter().enumerate() {
            if p.is_static() {
                continue;
            }
            let offset = if p.phase == Phase::Fluid && jitter > 0.0 {
                radius + self.rng.gen_range(0.0..jitter)
            } else {
                radius
            };

            for side in bounds.violated_sides(p.predicted, offset) {
                let approach = p.velocity.dot(side.inward_normal());
                let constraint = BoundaryConstraint::new(i, side, bounds.value(side), offset, approach);
                let slot = self.arena.add(ConstraintGroup::Contact, Constraint::Boundary(constraint));
                if stabilize {
                    self.arena.enqueue(ConstraintGroup::Stabilization, slot);
                }
            }
        }
        Ok(())
    }

    fn count_constraints(&mut self) {
        for constraint in self.arena.iter_group(ConstraintGroup::Contact) {
            match constraint {
                Constraint::Contact(_) => self.stats.contact_constraints += 1,
                Constraint::RigidContact(_) => self.stats.rigid_contact_constraints += 1,
                Constraint::Boundary(_) => self.stats.boundary_constraints += 1,
                Constraint::Density(_) | Constraint::Shape(_) => {}
            }
        }
        self.stats.stabilization_constraints += self.arena.group(ConstraintGroup::Stabilization).len();
        self.stats.density_constraints += self.arena.group(ConstraintGroup::Standard).len();
        self.stats.shape_constraints += self.arena.group(ConstraintGroup::Shape).len();
    }

    /// Optional stabilization pre-pass, then the main Gauss-Seidel loop over
    /// Contact, Standard and Shape groups.
    fn solve(&mut self) -> PhysicsResult<()> {
        let mut ctx = ProjectionContext::new(
            &self.params,
            &self.entities,
            &self.boundary_volumes,
            &mut self.neighbors,
        );

        if self.params.stabilization {
            for _ in 0..STABILIZATION_ITERATIONS {
                self.arena.project_group(
                    ConstraintGroup::Stabilization,
                    &mut self.particles,
                    &mut ctx,
                    ProjectionMode::Stabilize,
                )?;
            }
        }

        for _ in 0..self.params.iterations {
            for group in ConstraintGroup::SOLVE_ORDER {
                self.arena
                    .project_group(group, &mut self.particles, &mut ctx, ProjectionMode::Solve)?;
            }
        }

        self.stats.truncated_neighbors += ctx.truncated_neighbors;
        Ok(())
    }

    fn sync_rotations(&mut self) {
        for shape in self
            .arena
            .iter_group(ConstraintGroup::Shape)
            .filter_map(Constraint::as_shape)
        {
            if let Some(entity) = self.entities.get_mut(shape.entity().index()) {
                entity.rotation = shape.rotation();
            }
        }
    }

    /// Velocity from the substep displacement; settled particles stop.
    fn reconcile(&mut self, t: f32) {
        let sleep = self.params.sleep_threshold;
        self.stats.sleeping_particles = self
            .particles
            .par_iter_mut()
            .map(|p| {
                if p.is_static() || p.phase == Phase::Boundary {
                    return 0;
                }
                let delta = p.predicted - p.position;
                let settled = delta.length() < sleep;
                p.velocity = if settled { Vec3::ZERO } else { delta / t };
                p.position = p.predicted;
                usize::from(settled)
            })
            .sum();
    }

    fn apply_restitution(&mut self) {
        let restitution = self.params.restitution;
        if restitution <= 0.0 {
            return;
        }
        for boundary in self
            .arena
            .iter_group(ConstraintGroup::Contact)
            .filter_map(Constraint::as_boundary)
        {
            boundary.apply_restitution(&mut self.particles, restitution);
        }
    }

    fn apply_fluid_forces(&mut self, t: f32) -> PhysicsResult<()> {
        let viscosity = self.params.viscosity;
        let vorticity = self.params.vorticity_confinement;
        if viscosity <= 0.0 && vorticity <= 0.0 {
            return Ok(());
        }

        let fluid: Vec<usize> = self
            .particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.phase == Phase::Fluid)
            .map(|(index, _)| index)
            .collect();
        if fluid.is_empty() {
            return Ok(());
        }

        let report = self.neighbors.build(&self.particles, &fluid)?;
        self.stats.dropped_from_grid += report.dropped;
        let kernel = self.params.kernel.build(self.params.smoothing_radius);

        apply_xsph_viscosity(
            &mut self.particles,
            &fluid,
            &self.neighbors,
            &self.entities,
            &kernel,
            viscosity,
        );
        apply_vorticity_confinement(
            &mut self.particles,
            &fluid,
            &self.neighbors,
            &self.entities,
            &kernel,
            vorticity,
            t,
        );
        Ok(())
    }
}
