/// Confining-plane constraints
use glam::{Vec3, Vec4};

use super::{friction_correction, ParticleConstraint, ProjectionContext, ProjectionMode};
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{Aabb, EPSILON};
use crate::particle::Particle;

/// One of the six axis-aligned confining planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundarySide {
    Left,
    Right,
    Top,
    Bottom,
    Forward,
    Back,
}

impl BoundarySide {
    /// Plane order used by `BoundaryBox::from_planes`.
    pub const ALL: [BoundarySide; 6] = [
        BoundarySide::Left,
        BoundarySide::Right,
        BoundarySide::Top,
        BoundarySide::Bottom,
        BoundarySide::Forward,
        BoundarySide::Back,
    ];

    pub fn axis(self) -> usize {
        match self {
            BoundarySide::Left | BoundarySide::Right => 0,
            BoundarySide::Top | BoundarySide::Bottom => 1,
            BoundarySide::Forward | BoundarySide::Back => 2,
        }
    }

    /// +1 when the inside lies toward increasing coordinates.
    pub fn sign(self) -> f32 {
        match self {
            BoundarySide::Left | BoundarySide::Bottom | BoundarySide::Back => 1.0,
            BoundarySide::Right | BoundarySide::Top | BoundarySide::Forward => -1.0,
        }
    }

    pub fn inward_normal(self) -> Vec3 {
        let mut normal = Vec3::ZERO;
        normal[self.axis()] = self.sign();
        normal
    }

    pub fn name(self) -> &'static str {
        match self {
            BoundarySide::Left => "left",
            BoundarySide::Right => "right",
            BoundarySide::Top => "top",
            BoundarySide::Bottom => "bottom",
            BoundarySide::Forward => "forward",
            BoundarySide::Back => "back",
        }
    }
}

/// The confining volume as six axis-aligned planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundaryBox {
    fn default() -> Self {
        Self::from_aabb(&Aabb::default())
    }
}

impl BoundaryBox {
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            min: aabb.min,
            max: aabb.max,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.min, self.max)
    }

    /// Planes `(a, b, c, d)` in Left, Right, Top, Bottom, Forward, Back
    /// order. A point is inside when `a*x + b*y + c*z + d >= 0`; each plane
    /// must be perpendicular to its side's axis and face inward.
    pub fn from_planes(planes: [Vec4; 6]) -> PhysicsResult<Self> {
        let mut min = Vec3::ZERO;
        let mut max = Vec3::ZERO;

        for (side, plane) in BoundarySide::ALL.into_iter().zip(planes) {
            let axis = side.axis();
            let normal = plane.truncate();
            let along = normal[axis];
            let across = normal.length_squared() - along * along;

            if across > EPSILON * EPSILON || along * side.sign() <= EPSILON {
                return Err(PhysicsError::InvalidBoundary {
                    side: side.name().to_string(),
                    reason: format!("plane normal {normal} must point along {}", side.inward_normal()),
                });
            }

            let value = -plane.w / along;
            if side.sign() > 0.0 {
                min[axis] = value;
            } else {
                max[axis] = value;
            }
        }

        for side in [BoundarySide::Left, BoundarySide::Bottom, BoundarySide::Back] {
            let axis = side.axis();
            if min[axis] >= max[axis] {
                return Err(PhysicsError::InvalidBoundary {
                    side: side.name().to_string(),
                    reason: format!("lies beyond the opposite plane ({} >= {})", min[axis], max[axis]),
                });
            }
        }

        Ok(Self { min, max })
    }

    /// Coordinate of a side's plane along its axis.
    pub fn value(&self, side: BoundarySide) -> f32 {
        if side.sign() > 0.0 {
            self.min[side.axis()]
        } else {
            self.max[side.axis()]
        }
    }

    /// Sides whose plane lies closer than `offset` to `point` (or behind it).
    pub fn violated_sides(&self, point: Vec3, offset: f32) -> impl Iterator<Item = BoundarySide> + '_ {
        BoundarySide::ALL
            .into_iter()
            .filter(move |&side| (point[side.axis()] - self.value(side)) * side.sign() < offset)
    }
}

/// Keeps one particle at least `offset` inside one plane, with Coulomb
/// friction on the tangential part of its substep displacement.
#[derive(Debug, Clone)]
pub struct BoundaryConstraint {
    particle: usize,
    side: BoundarySide,
    value: f32,
    offset: f32,
    /// Normal velocity at discovery (negative when approaching the plane).
    approach_speed: f32,
}

impl BoundaryConstraint {
    pub fn new(particle: usize, side: BoundarySide, value: f32, offset: f32, approach_speed: f32) -> Self {
        Self {
            particle,
            side,
            value,
            offset,
            approach_speed,
        }
    }

    /// Velocity-level bounce applied after reconciliation.
    pub fn apply_restitution(&self, particles: &mut [Particle], restitution: f32) {
        let Some(p) = particles.get_mut(self.particle) else {
            return;
        };
        if p.is_static() || self.approach_speed >= 0.0 {
            return;
        }
        let normal = self.side.inward_normal();
        let speed = p.velocity.dot(normal);
        let target = -restitution * self.approach_speed;
        if speed < target {
            p.velocity += (target - speed) * normal;
        }
    }
}

impl ParticleConstraint for BoundaryConstraint {
    fn project(
        &mut self,
        particles: &mut [Particle],
        ctx: &mut ProjectionContext<'_>,
        mode: ProjectionMode,
    ) -> PhysicsResult<()> {
        let Some(p) = particles.get_mut(self.particle) else {
            return Ok(());
        };
        if p.inverse_mass == 0.0 {
            return Ok(());
        }

        let axis = self.side.axis();
        let sign = self.side.sign();
        if (p.predicted[axis] - self.value) * sign >= self.offset {
            return Ok(());
        }

        let target = self.value + sign * self.offset;
        let delta = target - p.predicted[axis];
        p.predicted[axis] = target;

        if mode == ProjectionMode::Stabilize {
            p.position[axis] += delta;
            return Ok(());
        }

        let normal = self.side.inward_normal();
        let displacement = (p.predicted - p.position) / p.correction_divisor();
        if let Some(dx) = friction_correction(
            displacement,
            normal,
            self.offset,
            ctx.params.static_friction,
            ctx.params.dynamic_friction,
        ) {
            p.predicted -= dx;
        }

        if self.side == BoundarySide::Bottom {
            log::trace!("particle {} clamped to floor at {}", self.particle, target);
        }
        Ok(())
    }

    fn update_counts(&self, particles: &mut [Particle]) {
        if let Some(p) = particles.get_mut(self.particle) {
            p.neighbor_count += 1;
        }
    }
}
