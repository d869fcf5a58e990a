//! Unified particle physics
//!
//! Position-Based Dynamics solver with a Position-Based Fluids extension.
//! Rigid bodies, static boundaries and fluids are all particles advanced by
//! iterative constraint projection on predicted positions.

pub mod config;
pub mod constraint;
pub mod entity;
pub mod error;
pub mod fluid;
pub mod geometry;
pub mod kernel;
pub mod math;
pub mod neighbor;
pub mod particle;
pub mod solver;

pub use config::{NeighborStrategy, OverflowPolicy, SolverParams};
pub use constraint::{BoundaryBox, BoundarySide, ConstraintArena, ConstraintGroup};
pub use entity::{Entity, EntityId, EntityKind, Force, ForceKind, SdfData};
pub use error::{PhysicsError, PhysicsResult};
pub use fluid::DensityConstraint;
pub use kernel::{CubicKernel, Kernel, KernelKind, Poly6Kernel, SmoothingKernel};
pub use math::{Aabb, EPSILON};
pub use neighbor::{HashGridNeighborSearch, ListNeighborSearch, NeighborIndex, NeighborSearch};
pub use particle::{Particle, Phase};
pub use solver::{Solver, SolverStats};

pub use glam::{Quat, Vec3, Vec4};
