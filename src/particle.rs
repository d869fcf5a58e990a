/// Particle state
///
/// Every simulated body is a set of particles in one flat array. Constraints
/// only ever touch `predicted` (and `position` during stabilization).
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Classification controlling which constraints apply between a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    None,
    Rigidbody,
    Fluid,
    Boundary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Settled position, committed at the end of each substep.
    pub position: Vec3,
    /// Working position during a substep.
    pub predicted: Vec3,
    pub velocity: Vec3,
    /// Effective inverse mass for this substep (after mass scaling).
    pub inverse_mass: f32,
    /// Unscaled inverse mass. 0 means immovable.
    pub base_inverse_mass: f32,
    pub phase: Phase,
    pub entity: EntityId,
    /// Density-constraint Lagrange multiplier (fluids only).
    pub lambda: f32,
    /// Number of constraints touching this particle in the current substep.
    pub neighbor_count: u32,
}

impl Particle {
    pub fn new(position: Vec3, inverse_mass: f32, phase: Phase, entity: EntityId) -> Self {
        Self {
            position,
            predicted: position,
            velocity: Vec3::ZERO,
            inverse_mass,
            base_inverse_mass: inverse_mass,
            phase,
            entity,
            lambda: 0.0,
            neighbor_count: 0,
        }
    }

    /// Reset per-substep scratch state.
    pub fn frame_init(&mut self) {
        self.neighbor_count = 0;
        self.lambda = 0.0;
        self.inverse_mass = self.base_inverse_mass;
    }

    pub fn is_static(&self) -> bool {
        self.base_inverse_mass == 0.0
    }

    /// Unscaled mass; zero for immovable particles so they drop out of sums.
    pub fn mass(&self) -> f32 {
        if self.is_static() {
            0.0
        } else {
            1.0 / self.base_inverse_mass
        }
    }

    /// Scale the mass by `s`, recomputed from the unscaled mass each substep.
    pub fn apply_mass_scale(&mut self, s: f32) {
        self.inverse_mass = if s == 1.0 {
            self.base_inverse_mass
        } else {
            self.base_inverse_mass / s
        };
    }

    /// Counter used to average simultaneous corrections, never zero.
    pub fn correction_divisor(&self) -> f32 {
        self.neighbor_count.max(1) as f32
    }
}
