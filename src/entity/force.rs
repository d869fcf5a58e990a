use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Force type. An entity carries at most one force of each kind per list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForceKind {
    Gravity,
    Wind,
    Custom,
}

impl ForceKind {
    pub fn name(self) -> &'static str {
        match self {
            ForceKind::Gravity => "gravity",
            ForceKind::Wind => "wind",
            ForceKind::Custom => "custom",
        }
    }
}

/// Uniform acceleration applied to every particle of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Force {
    pub kind: ForceKind,
    pub value: Vec3,
}

impl Force {
    pub fn new(kind: ForceKind, value: Vec3) -> Self {
        Self { kind, value }
    }

    pub fn gravity(value: Vec3) -> Self {
        Self::new(ForceKind::Gravity, value)
    }

    pub fn wind(value: Vec3) -> Self {
        Self::new(ForceKind::Wind, value)
    }

    pub fn custom(value: Vec3) -> Self {
        Self::new(ForceKind::Custom, value)
    }
}
