/// Shape matching for rigid bodies
///
/// Keeps the particles of one rigid body in their rest configuration by
/// fitting the best rigid transform to the predicted positions and moving
/// every particle toward its goal position, averaged by its contact count.
use glam::{Mat3, Quat, Vec3};

use super::{ParticleConstraint, ProjectionContext, ProjectionMode};
use crate::entity::EntityId;
use crate::error::PhysicsResult;
use crate::particle::Particle;

/// Iteration cap for rotation extraction.
pub const ROTATION_ITERATIONS: usize = 20;

#[derive(Debug, Clone)]
pub struct ShapeMatchingConstraint {
    entity: EntityId,
    particles: Vec<usize>,
    rest_offsets: Vec<Vec3>,
    rotation: Quat,
}

impl ShapeMatchingConstraint {
    /// Capture the rest shape from the current particle positions.
    pub fn new(entity: EntityId, indices: Vec<usize>, particles: &[Particle]) -> Self {
        let positions: Vec<Vec3> = indices
            .iter()
            .filter_map(|&index| particles.get(index).map(|p| p.position))
            .collect();
        let centroid = mean(&positions);
        let rest_offsets = positions.iter().map(|&p| p - centroid).collect();

        Self {
            entity,
            particles: indices,
            rest_offsets,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Body rotation found by the latest projection.
    pub fn rotation(&self) -> Quat {
        self.rotation
    }
}

fn mean(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::ZERO;
    }
    points.iter().copied().sum::<Vec3>() / points.len() as f32
}

/// Rotation part of `a`, found by iterative refinement of `q`.
pub fn extract_rotation(a: &Mat3, mut q: Quat, max_iterations: usize) -> Quat {
    for _ in 0..max_iterations {
        let r = Mat3::from_quat(q);
        let numerator =
            r.x_axis.cross(a.x_axis) + r.y_axis.cross(a.y_axis) + r.z_axis.cross(a.z_axis);
        let denominator =
            (r.x_axis.dot(a.x_axis) + r.y_axis.dot(a.y_axis) + r.z_axis.dot(a.z_axis)).abs() + 1e-9;
        let omega = numerator / denominator;
        let angle = omega.length();
        if angle < 1e-9 {
            break;
        }
        q = (Quat::from_axis_angle(omega / angle, angle) * q).normalize();
    }
    q
}

impl ParticleConstraint for ShapeMatchingConstraint {
    fn project(
        &mut self,
        particles: &mut [Particle],
        _ctx: &mut ProjectionContext<'_>,
        mode: ProjectionMode,
    ) -> PhysicsResult<()> {
        if self.particles.len() < 2 || self.particles.len() != self.rest_offsets.len() {
            return Ok(());
        }

        let mut centroid = Vec3::ZERO;
        for &index in &self.particles {
            let Some(p) = particles.get(index) else {
                return Ok(());
            };
            centroid += p.predicted;
        }
        centroid /= self.particles.len() as f32;

        let mut covariance = Mat3::ZERO;
        for (&index, rest) in self.particles.iter().zip(&self.rest_offsets) {
            let d = particles[index].predicted - centroid;
            covariance += Mat3::from_cols(d * rest.x, d * rest.y, d * rest.z);
        }

        self.rotation = extract_rotation(&covariance, self.rotation, ROTATION_ITERATIONS);

        for (&index, rest) in self.particles.iter().zip(&self.rest_offsets) {
            let p = &mut particles[index];
            if p.inverse_mass == 0.0 {
                continue;
            }
            let goal = centroid + self.rotation * *rest;
            let delta = (goal - p.predicted) / p.correction_divisor();
            p.predicted += delta;
            if mode == ProjectionMode::Stabilize {
                p.position += delta;
            }
        }
        Ok(())
    }

    fn update_counts(&self, _particles: &mut [Particle]) {}
}
