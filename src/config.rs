/// Solver parameters
///
/// Global tunables read by every stage of the step. Values may be given in
/// TOML; omitted fields fall back to their defaults.
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsErrorContext, PhysicsResult};
use crate::kernel::KernelKind;

/// Which index backs contact and fluid neighbour discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborStrategy {
    /// Brute-force scan over all indexed particles.
    List,
    /// Uniform spatial hash grid.
    HashGrid,
}

/// What to do when a bucket or neighbour buffer exceeds its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep the first `capacity` entries in ascending particle order and warn.
    Truncate,
    /// Abort the step with `PhysicsError::CapacityOverflow`.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub iterations: u32,
    pub gravity: Vec3,
    pub radius: f32,
    pub smoothing_radius: f32,
    pub kernel: KernelKind,
    pub fluid_rest_distance: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub restitution: f32,
    pub sleep_threshold: f32,
    pub shock_propagation: f32,
    pub rest_density: f32,
    pub surface_tension: f32,
    pub viscosity: f32,
    pub vorticity_confinement: f32,
    pub solid_pressure: f32,
    pub relaxation_epsilon: f32,
    pub relaxation_factor: f32,
    pub stabilization: bool,
    pub boundary_jitter: f32,
    pub jitter_seed: u64,
    pub neighbor_strategy: NeighborStrategy,
    pub bucket_capacity: usize,
    pub max_neighbors: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            iterations: 2,
            gravity: Vec3::new(0.0, -9.8, 0.0),
            radius: 0.1,
            smoothing_radius: 0.4,
            kernel: KernelKind::Poly6,
            fluid_rest_distance: 0.2,
            static_friction: 0.5,
            dynamic_friction: 0.3,
            restitution: 0.0,
            sleep_threshold: 0.001,
            shock_propagation: 0.0,
            rest_density: 1000.0,
            surface_tension: 0.001,
            viscosity: 0.0,
            vorticity_confinement: 0.0,
            solid_pressure: 1.0,
            relaxation_epsilon: 0.01,
            relaxation_factor: 1.0,
            stabilization: false,
            boundary_jitter: 0.003,
            jitter_seed: 0x5eed,
            neighbor_strategy: NeighborStrategy::HashGrid,
            bucket_capacity: 512,
            max_neighbors: 96,
            overflow_policy: OverflowPolicy::Truncate,
        }
    }
}

impl SolverParams {
    /// Parse parameters from a TOML document
    pub fn from_toml_str(source: &str) -> PhysicsResult<Self> {
        toml::from_str(source).physics_context("parsing solver params")
    }

    /// Load parameters from a TOML file
    pub fn load(path: impl AsRef<Path>) -> PhysicsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .physics_context(&format!("reading {}", path.display()))?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> PhysicsResult<String> {
        toml::to_string_pretty(self).physics_context("serializing solver params")
    }

    /// Distance at which two particles touch.
    pub fn contact_distance(&self) -> f32 {
        2.0 * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhysicsError;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let params = SolverParams::from_toml_str(
            r#"
            iterations = 4
            gravity = [0.0, -20.0, 0.0]
            neighbor_strategy = "list"
            overflow_policy = "fail"
            "#,
        )
        .unwrap();

        assert_eq!(params.iterations, 4);
        assert_eq!(params.gravity, Vec3::new(0.0, -20.0, 0.0));
        assert_eq!(params.neighbor_strategy, NeighborStrategy::List);
        assert_eq!(params.overflow_policy, OverflowPolicy::Fail);
        assert_eq!(params.radius, SolverParams::default().radius);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = SolverParams::from_toml_str("iterations = \"many\"").unwrap_err();
        assert!(matches!(err, PhysicsError::Config { .. }));
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let params = SolverParams::default();
        let text = params.to_toml_string().unwrap();
        assert_eq!(SolverParams::from_toml_str(&text).unwrap(), params);
    }
}
