/// Constraint layer
///
/// Projection objects operating on the shared particle array. Each constraint
/// exposes exactly two operations: `project` (one corrective adjustment of
/// predicted positions) and `update_counts` (register itself on the
/// per-substep counters used to average simultaneous corrections).
pub mod arena;
pub mod boundary;
pub mod contact;
pub mod rigid_contact;
pub mod shape;

pub use arena::{ConstraintArena, ConstraintSlot};
pub use boundary::{BoundaryBox, BoundaryConstraint, BoundarySide};
pub use contact::ContactConstraint;
pub use rigid_contact::RigidContactConstraint;
pub use shape::ShapeMatchingConstraint;

use glam::Vec3;

use crate::config::SolverParams;
use crate::entity::Entity;
use crate::error::PhysicsResult;
use crate::fluid::DensityConstraint;
use crate::math::EPSILON;
use crate::neighbor::NeighborIndex;
use crate::particle::Particle;

/// Iterations of the optional stabilization pre-pass.
pub const STABILIZATION_ITERATIONS: usize = 2;

/// Processing-order tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintGroup {
    Stabilization,
    Contact,
    Standard,
    Shape,
}

impl ConstraintGroup {
    pub const ALL: [ConstraintGroup; 4] = [
        ConstraintGroup::Stabilization,
        ConstraintGroup::Contact,
        ConstraintGroup::Standard,
        ConstraintGroup::Shape,
    ];

    /// Groups visited by the main iteration loop, in order.
    pub const SOLVE_ORDER: [ConstraintGroup; 3] = [
        ConstraintGroup::Contact,
        ConstraintGroup::Standard,
        ConstraintGroup::Shape,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Transient groups are rebuilt from geometry every substep.
    pub fn is_transient(self) -> bool {
        matches!(self, ConstraintGroup::Stabilization | ConstraintGroup::Contact)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Pre-pass: corrections move `position` and `predicted` equally.
    Stabilize,
    /// Main loop: only `predicted` moves.
    Solve,
}

/// Everything a projection may read besides the particle array.
pub struct ProjectionContext<'a> {
    pub params: &'a SolverParams,
    pub entities: &'a [Entity],
    /// Per-particle boundary volume weights (0 for non-boundary particles).
    pub boundary_volumes: &'a [f32],
    pub neighbors: &'a mut NeighborIndex,
    /// Neighbour entries dropped under `OverflowPolicy::Truncate`.
    pub truncated_neighbors: usize,
}

impl<'a> ProjectionContext<'a> {
    pub fn new(
        params: &'a SolverParams,
        entities: &'a [Entity],
        boundary_volumes: &'a [f32],
        neighbors: &'a mut NeighborIndex,
    ) -> Self {
        Self {
            params,
            entities,
            boundary_volumes,
            neighbors,
            truncated_neighbors: 0,
        }
    }
}

pub trait ParticleConstraint {
    fn project(
        &mut self,
        particles: &mut [Particle],
        ctx: &mut ProjectionContext<'_>,
        mode: ProjectionMode,
    ) -> PhysicsResult<()>;

    fn update_counts(&self, particles: &mut [Particle]);
}

/// Closed set of constraint kinds, dispatched by tag.
#[derive(Debug, Clone)]
pub enum Constraint {
    Boundary(BoundaryConstraint),
    Contact(ContactConstraint),
    RigidContact(RigidContactConstraint),
    Density(DensityConstraint),
    Shape(ShapeMatchingConstraint),
}

impl Constraint {
    pub fn as_boundary(&self) -> Option<&BoundaryConstraint> {
        match self {
            Constraint::Boundary(constraint) => Some(constraint),
            _ => None,
        }
    }

    pub fn as_density(&self) -> Option<&DensityConstraint> {
        match self {
            Constraint::Density(constraint) => Some(constraint),
            _ => None,
        }
    }

    pub fn as_shape(&self) -> Option<&ShapeMatchingConstraint> {
        match self {
            Constraint::Shape(constraint) => Some(constraint),
            _ => None,
        }
    }
}

impl ParticleConstraint for Constraint {
    fn project(
        &mut self,
        particles: &mut [Particle],
        ctx: &mut ProjectionContext<'_>,
        mode: ProjectionMode,
    ) -> PhysicsResult<()> {
        match self {
            Constraint::Boundary(constraint) => constraint.project(particles, ctx, mode),
            Constraint::Contact(constraint) => constraint.project(particles, ctx, mode),
            Constraint::RigidContact(constraint) => constraint.project(particles, ctx, mode),
            Constraint::Density(constraint) => constraint.project(particles, ctx, mode),
            Constraint::Shape(constraint) => constraint.project(particles, ctx, mode),
        }
    }

    fn update_counts(&self, particles: &mut [Particle]) {
        match self {
            Constraint::Boundary(constraint) => constraint.update_counts(particles),
            Constraint::Contact(constraint) => constraint.update_counts(particles),
            Constraint::RigidContact(constraint) => constraint.update_counts(particles),
            Constraint::Density(constraint) => constraint.update_counts(particles),
            Constraint::Shape(constraint) => constraint.update_counts(particles),
        }
    }
}

/// Two distinct particles borrowed mutably at once.
pub(crate) fn pair_mut(
    particles: &mut [Particle],
    first: usize,
    second: usize,
) -> Option<(&mut Particle, &mut Particle)> {
    if first == second || first >= particles.len() || second >= particles.len() {
        return None;
    }
    if first < second {
        let (head, tail) = particles.split_at_mut(second);
        Some((&mut head[first], &mut tail[0]))
    } else {
        let (head, tail) = particles.split_at_mut(first);
        Some((&mut tail[0], &mut head[second]))
    }
}

/// Coulomb friction on a relative tangential displacement.
///
/// Below `static_friction * depth` the whole tangential motion is removed;
/// above it the motion is scaled by `min(dynamic_friction * depth / |t|, 1)`.
/// Returns `None` for a degenerate tangent.
pub(crate) fn friction_correction(
    displacement: Vec3,
    normal: Vec3,
    depth: f32,
    static_friction: f32,
    dynamic_friction: f32,
) -> Option<Vec3> {
    let tangent = displacement - displacement.dot(normal) * normal;
    let len = tangent.length();
    if len < EPSILON {
        return None;
    }
    if len < static_friction * depth {
        Some(tangent)
    } else {
        Some(tangent * (dynamic_friction * depth / len).min(1.0))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Phase;
    use test_support::particle;

    #[test]
    fn test_pair_mut_either_order() {
        let mut particles = vec![particle(0.0, Phase::Fluid), particle(1.0, Phase::Fluid)];
        {
            let (a, b) = pair_mut(&mut particles, 1, 0).unwrap();
            assert_eq!(a.position.x, 1.0);
            assert_eq!(b.position.x, 0.0);
        }
        assert!(pair_mut(&mut particles, 1, 1).is_none());
        assert!(pair_mut(&mut particles, 0, 2).is_none());
    }

    #[test]
    fn test_friction_regimes() {
        let n = Vec3::Y;
        // Static: tangent shorter than mu_s * d is removed entirely.
        let stick = friction_correction(Vec3::new(0.01, 0.5, 0.0), n, 0.1, 0.5, 0.3).unwrap();
        assert!((stick - Vec3::new(0.01, 0.0, 0.0)).length() < 1e-7);

        // Dynamic: scaled by mu_k * d / |t|.
        let slide = friction_correction(Vec3::new(0.2, 0.0, 0.0), n, 0.1, 0.5, 0.3).unwrap();
        assert!((slide.x - 0.03).abs() < 1e-6);

        assert!(friction_correction(Vec3::new(0.0, 1.0, 0.0), n, 0.1, 0.5, 0.3).is_none());
    }

    #[test]
    fn test_group_order() {
        assert_eq!(ConstraintGroup::SOLVE_ORDER[0], ConstraintGroup::Contact);
        assert!(!ConstraintGroup::SOLVE_ORDER.contains(&ConstraintGroup::Stabilization));
        assert!(ConstraintGroup::Contact.is_transient());
        assert!(!ConstraintGroup::Standard.is_transient());
        assert_eq!(ConstraintGroup::Shape.index(), 3);
    }
}
