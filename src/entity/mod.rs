/// Entity model
///
/// An entity is an ordered group of particles forming one rigid body, fluid
/// body or static boundary, plus the forces attached to it.
pub mod force;
pub mod sdf;

pub use force::{Force, ForceKind};
pub use sdf::{generate_lattice_sdf, SdfData};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};
use crate::particle::Phase;

/// Entity handle, an index into the solver's entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const INVALID: Self = Self(u32::MAX);

    pub fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Rigidbody,
    Fluid,
    Boundary,
}

impl EntityKind {
    pub fn phase(self) -> Phase {
        match self {
            EntityKind::Rigidbody => Phase::Rigidbody,
            EntityKind::Fluid => Phase::Fluid,
            EntityKind::Boundary => Phase::Boundary,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Rigidbody => "rigidbody",
            EntityKind::Fluid => "fluid",
            EntityKind::Boundary => "boundary",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub kind: EntityKind,
    /// Global particle indices, contiguous and in creation order.
    pub particles: Vec<usize>,
    pub external_forces: Vec<Force>,
    pub internal_forces: Vec<Force>,
    /// Per-particle mass.
    pub particle_mass: f32,
    /// Rest density for fluids, zero otherwise.
    pub rest_density: f32,
    /// SDF samples aligned with `particles` (rigid bodies only).
    pub sdf: Vec<SdfData>,
    /// Rotation of a rigid body relative to its rest pose.
    pub rotation: Quat,
}

impl Entity {
    pub fn new(kind: EntityKind, particles: Vec<usize>, particle_mass: f32) -> Self {
        Self {
            kind,
            particles,
            external_forces: Vec::new(),
            internal_forces: Vec::new(),
            particle_mass,
            rest_density: 0.0,
            sdf: Vec::new(),
            rotation: Quat::IDENTITY,
        }
    }

    pub fn add_external_force(&mut self, force: Force) -> PhysicsResult<()> {
        add_force(&mut self.external_forces, force)
    }

    pub fn add_internal_force(&mut self, force: Force) -> PhysicsResult<()> {
        add_force(&mut self.internal_forces, force)
    }

    pub fn remove_external_force(&mut self, kind: ForceKind) -> Option<Force> {
        remove_force(&mut self.external_forces, kind)
    }

    pub fn remove_internal_force(&mut self, kind: ForceKind) -> Option<Force> {
        remove_force(&mut self.internal_forces, kind)
    }

    /// Sum of every attached force, applied as an acceleration.
    pub fn total_force(&self) -> Vec3 {
        self.external_forces
            .iter()
            .chain(self.internal_forces.iter())
            .map(|force| force.value)
            .sum()
    }

    /// Shock-propagation mass scale `exp(-k * height)`; 1 for non-rigid bodies.
    pub fn mass_scale(&self, height: f32, coefficient: f32) -> f32 {
        if self.kind == EntityKind::Rigidbody && coefficient != 0.0 {
            (-coefficient * height).exp()
        } else {
            1.0
        }
    }

    /// SDF sample of a global particle index, gradient rotated into the
    /// body's current orientation.
    pub fn sdf_for(&self, particle: usize) -> Option<SdfData> {
        let first = *self.particles.first()?;
        let offset = particle.checked_sub(first)?;
        self.sdf.get(offset).map(|sample| sample.rotated(self.rotation))
    }
}

fn add_force(forces: &mut Vec<Force>, force: Force) -> PhysicsResult<()> {
    if forces.iter().any(|existing| existing.kind == force.kind) {
        return Err(PhysicsError::ForceAlreadyPresent {
            kind: force.kind.name().to_string(),
        });
    }
    forces.push(force);
    Ok(())
}

fn remove_force(forces: &mut Vec<Force>, kind: ForceKind) -> Option<Force> {
    let position = forces.iter().position(|force| force.kind == kind)?;
    Some(forces.remove(position))
}
