use super::{pair_mut, ParticleConstraint, ProjectionContext, ProjectionMode};
use crate::error::PhysicsResult;
use crate::math::EPSILON;
use crate::particle::Particle;

/// Non-penetration between two particles treated as spheres of radius `r`.
///
/// Used for mixed pairs where only one side is a rigid body, so no SDF is
/// available for both.
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    first: usize,
    second: usize,
}

impl ContactConstraint {
    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }
}

impl ParticleConstraint for ContactConstraint {
    fn project(
        &mut self,
        particles: &mut [Particle],
        ctx: &mut ProjectionContext<'_>,
        mode: ProjectionMode,
    ) -> PhysicsResult<()> {
        let Some((p1, p2)) = pair_mut(particles, self.first, self.second) else {
            return Ok(());
        };

        let diff = p1.predicted - p2.predicted;
        let len = diff.length();
        let depth = len - ctx.params.contact_distance();
        if depth > 0.0 || len < EPSILON {
            return Ok(());
        }

        let w1 = p1.inverse_mass;
        let w2 = p2.inverse_mass;
        let w = w1 + w2;
        if w <= 0.0 {
            return Ok(());
        }

        let normal = diff / len;
        let dx1 = -(w1 / w) * depth * normal / p1.correction_divisor();
        let dx2 = (w2 / w) * depth * normal / p2.correction_divisor();

        if w1 > 0.0 {
            p1.predicted += dx1;
            if mode == ProjectionMode::Stabilize {
                p1.position += dx1;
            }
        }
        if w2 > 0.0 {
            p2.predicted += dx2;
            if mode == ProjectionMode::Stabilize {
                p2.position += dx2;
            }
        }
        Ok(())
    }

    fn update_counts(&self, particles: &mut [Particle]) {
        for index in [self.first, self.second] {
            if let Some(p) = particles.get_mut(index) {
                p.neighbor_count += 1;
            }
        }
    }
}
