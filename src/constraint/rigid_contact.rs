/// SDF contact between particles of two different rigid bodies
use glam::Vec3;

use super::{friction_correction, pair_mut, ParticleConstraint, ProjectionContext, ProjectionMode};
use crate::entity::SdfData;
use crate::error::PhysicsResult;
use crate::math::EPSILON;
use crate::particle::Particle;

#[derive(Debug, Clone)]
pub struct RigidContactConstraint {
    first: usize,
    second: usize,
}

/// Penetration depth and unit normal pointing from the first particle
/// toward the second.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Separation {
    depth: f32,
    normal: Vec3,
}

impl RigidContactConstraint {
    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }
}

/// Separation along the centre line.
fn direct_separation(offset: Vec3, contact_distance: f32) -> Option<Separation> {
    let len = offset.length();
    if len < EPSILON {
        return None;
    }
    let depth = contact_distance - len;
    if depth < EPSILON {
        return None;
    }
    Some(Separation {
        depth,
        normal: offset / len,
    })
}

/// Separation from the SDF samples of two particles whose centres both lie
/// inside solid material.
///
/// The shallower sample supplies the direction. A depth shallower than the
/// contact distance marks a surface particle: the depth then comes from the
/// centre distance, and a normal facing against the centre line is mirrored
/// across it.
fn sdf_separation(
    first: SdfData,
    second: SdfData,
    offset: Vec3,
    contact_distance: f32,
) -> Option<Separation> {
    let (depth, normal) = if first.distance.abs() < second.distance.abs() {
        (first.distance.abs(), first.gradient)
    } else {
        (second.distance.abs(), -second.gradient)
    };
    let normal = normal.normalize_or_zero();
    if normal == Vec3::ZERO {
        return direct_separation(offset, contact_distance);
    }

    if depth >= contact_distance + EPSILON {
        return Some(Separation { depth, normal });
    }

    let len = offset.length();
    let depth = contact_distance - len;
    if depth < EPSILON {
        return None;
    }
    if len < EPSILON {
        return Some(Separation { depth, normal });
    }

    let axis = offset / len;
    let along = normal.dot(axis);
    let normal = if along < 0.0 {
        normal - 2.0 * along * axis
    } else {
        normal
    };
    Some(Separation { depth, normal })
}

impl ParticleConstraint for RigidContactConstraint {
    fn project(
        &mut self,
        particles: &mut [Particle],
        ctx: &mut ProjectionContext<'_>,
        mode: ProjectionMode,
    ) -> PhysicsResult<()> {
        let Some((p1, p2)) = pair_mut(particles, self.first, self.second) else {
            return Ok(());
        };

        let w1 = p1.inverse_mass;
        let w2 = p2.inverse_mass;
        let w = w1 + w2;
        if w <= 0.0 {
            return Ok(());
        }

        let contact_distance = ctx.params.contact_distance();
        let offset = p2.predicted - p1.predicted;
        let sdf = |p: &Particle, index: usize| {
            ctx.entities
                .get(p.entity.index())
                .and_then(|entity| entity.sdf_for(index))
        };

        let separation = match (sdf(&*p1, self.first), sdf(&*p2, self.second)) {
            (Some(s1), Some(s2)) if s1.distance < 0.0 && s2.distance < 0.0 => {
                sdf_separation(s1, s2, offset, contact_distance)
            }
            _ => direct_separation(offset, contact_distance),
        };
        let Some(Separation { depth, normal }) = separation else {
            return Ok(());
        };

        let c1 = p1.correction_divisor();
        let c2 = p2.correction_divisor();
        let dx1 = -(w1 / w) * depth * normal / c1;
        let dx2 = (w2 / w) * depth * normal / c2;
        if w1 > 0.0 {
            p1.predicted += dx1;
        }
        if w2 > 0.0 {
            p2.predicted += dx2;
        }

        if mode == ProjectionMode::Stabilize {
            if w1 > 0.0 {
                p1.position += dx1;
            }
            if w2 > 0.0 {
                p2.position += dx2;
            }
            return Ok(());
        }

        let relative = (p1.predicted - p1.position) - (p2.predicted - p2.position);
        if let Some(dx) = friction_correction(
            relative,
            normal,
            depth,
            ctx.params.static_friction,
            ctx.params.dynamic_friction,
        ) {
            if w1 > 0.0 {
                p1.predicted -= dx * (w1 / w) / c1;
            }
            if w2 > 0.0 {
                p2.predicted += dx * (w2 / w) / c2;
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
