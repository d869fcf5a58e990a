/// Unified particle solver
///
/// Caller-owned simulation context: the flat particle array, the entity
/// table, the constraint arena and the confining planes. Entities are created
/// atomically through the `create_*` calls and advanced by `step`.
pub mod stats;
mod step;

pub use stats::SolverStats;

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::SolverParams;
use crate::constraint::{
    BoundaryBox, Constraint, ConstraintArena, ConstraintGroup, ShapeMatchingConstraint,
};
use crate::entity::{generate_lattice_sdf, Entity, EntityId, EntityKind, Force, ForceKind, SdfData};
use crate::error::{invalid_parameter, PhysicsError, PhysicsResult};
use crate::fluid::{compute_boundary_volumes, fluid_particle_mass, DensityConstraint};
use crate::geometry::{points_from_bound, points_from_box};
use crate::math::{Aabb, EPSILON};
use crate::neighbor::NeighborIndex;
use crate::particle::{Particle, Phase};

#[derive(Debug, Clone)]
pub struct Solver {
    params: SolverParams,
    particles: Vec<Particle>,
    entities: Vec<Entity>,
    /// Volume weight per particle, non-zero only for boundary particles.
    boundary_volumes: Vec<f32>,
    bounds: BoundaryBox,
    arena: ConstraintArena,
    neighbors: NeighborIndex,
    rng: StdRng,
    stats: SolverStats,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolverParams::default())
    }
}

impl Solver {
    pub fn new(params: SolverParams) -> Self {
        let bounds = BoundaryBox::default();
        let neighbors = NeighborIndex::from_params(&params, &bounds.aabb());
        let rng = StdRng::seed_from_u64(params.jitter_seed);
        Self {
            params,
            particles: Vec::new(),
            entities: Vec::new(),
            boundary_volumes: Vec::new(),
            bounds,
            arena: ConstraintArena::new(),
            neighbors,
            rng,
            stats: SolverStats::default(),
        }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut SolverParams {
        &mut self.params
    }

    /// Change gravity for future entities and for every attached gravity force.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.params.gravity = gravity;
        for entity in &mut self.entities {
            for force in &mut entity.external_forces {
                if force.kind == ForceKind::Gravity {
                    force.value = gravity;
                }
            }
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    pub fn bounds(&self) -> &BoundaryBox {
        &self.bounds
    }

    pub fn constraints(&self) -> &ConstraintArena {
        &self.arena
    }

    pub fn entity(&self, id: EntityId) -> PhysicsResult<&Entity> {
        if !id.is_valid() {
            return Err(PhysicsError::InvalidEntity { id: id.0 });
        }
        self.entities
            .get(id.index())
            .ok_or(PhysicsError::InvalidEntity { id: id.0 })
    }

    fn entity_mut(&mut self, id: EntityId) -> PhysicsResult<&mut Entity> {
        if !id.is_valid() {
            return Err(PhysicsError::InvalidEntity { id: id.0 });
        }
        self.entities
            .get_mut(id.index())
            .ok_or(PhysicsError::InvalidEntity { id: id.0 })
    }

    /// Current positions of an entity's particles, in creation order.
    pub fn entity_positions(&self, id: EntityId) -> PhysicsResult<Vec<Vec3>> {
        let entity = self.entity(id)?;
        Ok(entity
            .particles
            .iter()
            .map(|&index| self.particles[index].position)
            .collect())
    }

    /// Density constraint of a fluid entity.
    pub fn density_constraint(&self, id: EntityId) -> PhysicsResult<Option<&DensityConstraint>> {
        self.entity(id)?;
        Ok(self
            .arena
            .iter_group(ConstraintGroup::Standard)
            .filter_map(Constraint::as_density)
            .find(|constraint| constraint.entity() == id))
    }

    pub fn add_external_force(&mut self, id: EntityId, force: Force) -> PhysicsResult<()> {
        self.entity_mut(id)?.add_external_force(force)
    }

    pub fn add_internal_force(&mut self, id: EntityId, force: Force) -> PhysicsResult<()> {
        self.entity_mut(id)?.add_internal_force(force)
    }

    pub fn remove_external_force(&mut self, id: EntityId, kind: ForceKind) -> PhysicsResult<Option<Force>> {
        Ok(self.entity_mut(id)?.remove_external_force(kind))
    }

    pub fn remove_internal_force(&mut self, id: EntityId, kind: ForceKind) -> PhysicsResult<Option<Force>> {
        Ok(self.entity_mut(id)?.remove_internal_force(kind))
    }

    /// Replace the six confining planes (Left, Right, Top, Bottom, Forward, Back).
    pub fn set_boundary_planes(&mut self, planes: [Vec4; 6]) -> PhysicsResult<()> {
        self.bounds = BoundaryBox::from_planes(planes)?;
        log::info!(
            "Boundary planes set to {:?}..{:?}",
            self.bounds.min,
            self.bounds.max
        );
        Ok(())
    }

    /// Entity slots are never reclaimed, so every handle ever returned stays
    /// valid. Destruction is therefore rejected.
    pub fn destroy_entity(&mut self, id: EntityId) -> PhysicsResult<()> {
        self.entity(id)?;
        Err(PhysicsError::NotSupported {
            operation: format!("destroy_entity({id})"),
        })
    }

    /// Rigid body with one particle per position and `mass` per particle.
    /// SDF samples are generated from the particle lattice. An infinite mass
    /// creates an immovable body.
    pub fn create_rigidbody(&mut self, positions: &[Vec3], mass: f32) -> PhysicsResult<EntityId> {
        validate_mass(mass)?;
        let spacing = lattice_spacing(positions).unwrap_or(self.params.contact_distance());
        let sdf = generate_lattice_sdf(positions, spacing, self.params.radius);
        self.create_rigidbody_with_sdf(positions, mass, sdf)
    }

    pub fn create_rigidbody_with_sdf(
        &mut self,
        positions: &[Vec3],
        mass: f32,
        sdf: Vec<SdfData>,
    ) -> PhysicsResult<EntityId> {
        if positions.is_empty() {
            return Err(PhysicsError::EmptyEntity {
                kind: EntityKind::Rigidbody.name().to_string(),
            });
        }
        validate_mass(mass)?;
        if sdf.len() != positions.len() {
            return Err(invalid_parameter(
                "sdf",
                format!("{} samples for {} particles", sdf.len(), positions.len()),
            ));
        }

        let inverse_mass = if mass.is_infinite() { 0.0 } else { 1.0 / mass };
        let (id, indices) = self.push_particles(positions, inverse_mass, EntityKind::Rigidbody);

        let mut entity = Entity::new(EntityKind::Rigidbody, indices.clone(), mass);
        entity.sdf = sdf;
        self.attach_entity(entity)?;

        if indices.len() >= 2 && inverse_mass > 0.0 {
            let shape = ShapeMatchingConstraint::new(id, indices, &self.particles);
            self.arena.add(ConstraintGroup::Shape, Constraint::Shape(shape));
        }

        log::info!(
            "Created rigidbody {} with {} particles (mass {})",
            id,
            positions.len(),
            mass
        );
        Ok(id)
    }

    /// Fluid body at `rest_density`. Particle mass is chosen so that a
    /// lattice at `fluid_rest_distance` spacing sits exactly at rest density.
    pub fn create_fluid(&mut self, positions: &[Vec3], rest_density: f32) -> PhysicsResult<EntityId> {
        if positions.is_empty() {
            return Err(PhysicsError::EmptyEntity {
                kind: EntityKind::Fluid.name().to_string(),
            });
        }
        if !rest_density.is_finite() || rest_density <= 0.0 {
            return Err(invalid_parameter(
                "rest_density",
                format!("must be positive and finite, got {rest_density}"),
            ));
        }

        let kernel = self.params.kernel.build(self.params.smoothing_radius);
        let mass = fluid_particle_mass(&kernel, self.params.fluid_rest_distance, rest_density);
        let (id, indices) = self.push_particles(positions, 1.0 / mass, EntityKind::Fluid);

        let mut entity = Entity::new(EntityKind::Fluid, indices.clone(), mass);
        entity.rest_density = rest_density;
        self.attach_entity(entity)?;

        let density = DensityConstraint::new(id, indices, rest_density, kernel);
        self.arena.add(ConstraintGroup::Standard, Constraint::Density(density));

        log::info!(
            "Created fluid {} with {} particles (rest density {}, particle mass {:.4})",
            id,
            positions.len(),
            rest_density,
            mass
        );
        Ok(id)
    }

    /// Fill `bounds` with fluid at the configured rest distance and density.
    pub fn create_fluid_block(&mut self, bounds: Aabb) -> PhysicsResult<EntityId> {
        let positions = points_from_box(&bounds, self.params.fluid_rest_distance);
        self.create_fluid(&positions, self.params.rest_density)
    }

    /// Shell of immovable boundary particles wrapped around `bounds`, thick
    /// enough to fill the fluid kernel support.
    pub fn create_boundary(&mut self, bounds: Aabb) -> PhysicsResult<EntityId> {
        let spacing = self.params.contact_distance();
        if spacing <= 0.0 {
            return Err(invalid_parameter("radius", "must be positive"));
        }
        let layers = ((self.params.smoothing_radius / spacing).ceil() as u32).max(1);
        let positions = points_from_bound(&bounds, spacing, layers);
        if positions.is_empty() {
            return Err(PhysicsError::EmptyEntity {
                kind: EntityKind::Boundary.name().to_string(),
            });
        }

        let (id, indices) = self.push_particles(&positions, 0.0, EntityKind::Boundary);
        let entity = Entity::new(EntityKind::Boundary, indices, f32::INFINITY);
        self.attach_entity(entity)?;
        self.refresh_boundary_volumes();

        log::info!(
            "Created boundary {} with {} particles in {} layers",
            id,
            positions.len(),
            layers
        );
        Ok(id)
    }

    /// Boundary shell around the current confining planes.
    pub fn create_boundary_from_planes(&mut self) -> PhysicsResult<EntityId> {
        let bounds = self.bounds.aabb();
        self.create_boundary(bounds)
    }

    fn next_entity_id(&self) -> EntityId {
        EntityId(self.entities.len() as u32)
    }

    fn push_particles(
        &mut self,
        positions: &[Vec3],
        inverse_mass: f32,
        kind: EntityKind,
    ) -> (EntityId, Vec<usize>) {
        let id = self.next_entity_id();
        let first = self.particles.len();
        self.particles.extend(
            positions
                .iter()
                .map(|&p| Particle::new(p, inverse_mass, kind.phase(), id)),
        );
        self.boundary_volumes.resize(self.particles.len(), 0.0);
        (id, (first..self.particles.len()).collect())
    }

    fn attach_entity(&mut self, mut entity: Entity) -> PhysicsResult<()> {
        entity.add_external_force(Force::gravity(self.params.gravity))?;
        self.entities.push(entity);
        Ok(())
    }

    fn refresh_boundary_volumes(&mut self) {
        let indices: Vec<usize> = self
            .particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.phase == Phase::Boundary)
            .map(|(index, _)| index)
            .collect();
        let positions: Vec<Vec3> = indices.iter().map(|&i| self.particles[i].position).collect();
        let kernel = self.params.kernel.build(self.params.smoothing_radius);
        let volumes = compute_boundary_volumes(&positions, &kernel);
        for (index, volume) in indices.into_iter().zip(volumes) {
            self.boundary_volumes[index] = volume;
        }
    }
}

fn validate_mass(mass: f32) -> PhysicsResult<()> {
    if mass.is_nan() || mass <= 0.0 {
        return Err(invalid_parameter(
            "mass",
            format!("must be positive, got {mass}"),
        ));
    }
    Ok(())
}

/// Smallest distance between two distinct positions, taken as the lattice
/// spacing of a particle body.
fn lattice_spacing(positions: &[Vec3]) -> Option<f32> {
    let mut best = f32::INFINITY;
    for (i, a) in positions.iter().enumerate() {
        for b in &positions[i + 1..] {
            let d = a.distance(*b);
            if d > EPSILON && d < best {
                best = d;
            }
        }
    }
    best.is_finite().then_some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::BoundarySide;

    fn cube(origin: Vec3, n: usize, spacing: f32) -> Vec<Vec3> {
        let mut points = Vec::new();
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    points.push(origin + Vec3::new(x as f32, y as f32, z as f32) * spacing);
                }
            }
        }
        points
    }

    #[test]
    fn test_every_entity_gets_gravity() {
        let mut solver = Solver::default();
        let body = solver.create_rigidbody(&cube(Vec3::ZERO, 2, 0.2), 1.0).unwrap();
        let fluid = solver.create_fluid(&[Vec3::new(3.0, 0.0, 0.0)], 1000.0).unwrap();

        for id in [body, fluid] {
            let entity = solver.entity(id).unwrap();
            assert_eq!(entity.external_forces.len(), 1);
            assert_eq!(entity.external_forces[0].kind, ForceKind::Gravity);
        }
        assert_eq!(solver.particle_count(), 9);
        assert_eq!(solver.entity_count(), 2);
    }

    #[test]
    fn test_set_gravity_rewrites_attached_forces() {
        let mut solver = Solver::default();
        let body = solver.create_rigidbody(&[Vec3::ZERO], 1.0).unwrap();
        solver.set_gravity(Vec3::new(0.0, -1.0, 0.0));
        let entity = solver.entity(body).unwrap();
        assert_eq!(entity.total_force(), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_rigidbody_validation() {
        let mut solver = Solver::default();
        assert!(matches!(
            solver.create_rigidbody(&[], 1.0),
            Err(PhysicsError::EmptyEntity { .. })
        ));
        assert!(matches!(
            solver.create_rigidbody(&[Vec3::ZERO], 0.0),
            Err(PhysicsError::InvalidParameter { .. })
        ));
        assert!(matches!(
            solver.create_rigidbody(&[Vec3::ZERO], f32::NAN),
            Err(PhysicsError::InvalidParameter { .. })
        ));
        assert!(matches!(
            solver.create_rigidbody_with_sdf(&[Vec3::ZERO, Vec3::X], 1.0, vec![SdfData::default()]),
            Err(PhysicsError::InvalidParameter { .. })
        ));
        assert_eq!(solver.particle_count(), 0);
        assert_eq!(solver.entity_count(), 0);
    }

    #[test]
    fn test_infinite_mass_is_static_without_shape() {
        let mut solver = Solver::default();
        solver
            .create_rigidbody(&cube(Vec3::ZERO, 2, 0.2), f32::INFINITY)
            .unwrap();
        assert!(solver.particles().iter().all(Particle::is_static));
        assert!(solver.constraints().group(ConstraintGroup::Shape).is_empty());
    }

    #[test]
    fn test_rigidbody_gets_shape_and_sdf() {
        let mut solver = Solver::default();
        let id = solver.create_rigidbody(&cube(Vec3::ZERO, 3, 0.2), 2.0).unwrap();
        let entity = solver.entity(id).unwrap();
        assert_eq!(entity.sdf.len(), 27);
        // Centre of a 3x3x3 block is the only interior particle.
        assert!(entity.sdf[13].distance < entity.sdf[0].distance);
        assert_eq!(solver.constraints().group(ConstraintGroup::Shape).len(), 1);
    }

    #[test]
    fn test_fluid_gets_density_constraint() {
        let mut solver = Solver::default();
        let id = solver
            .create_fluid_block(Aabb::new(Vec3::ZERO, Vec3::splat(0.6)))
            .unwrap();
        assert_eq!(solver.entity(id).unwrap().particles.len(), 27);
        let density = solver.density_constraint(id).unwrap().unwrap();
        assert_eq!(density.rest_density(), 1000.0);

        assert!(matches!(
            solver.create_fluid(&[Vec3::ZERO], -1.0),
            Err(PhysicsError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_boundary_particles_have_volumes() {
        let mut solver = Solver::default();
        let id = solver
            .create_boundary(Aabb::new(Vec3::ZERO, Vec3::splat(1.0)))
            .unwrap();
        let entity = solver.entity(id).unwrap();
        assert!(!entity.particles.is_empty());
        for &index in &entity.particles {
            assert!(solver.particles()[index].is_static());
            assert!(solver.boundary_volumes[index] > 0.0);
        }
    }

    #[test]
    fn test_invalid_handles_are_rejected() {
        let mut solver = Solver::default();
        let id = solver.create_rigidbody(&[Vec3::ZERO], 1.0).unwrap();

        assert!(matches!(
            solver.entity(EntityId(7)),
            Err(PhysicsError::InvalidEntity { id: 7 })
        ));
        assert!(solver.entity_positions(EntityId::INVALID).is_err());
        assert!(matches!(
            solver.destroy_entity(id),
            Err(PhysicsError::NotSupported { .. })
        ));
        assert!(matches!(
            solver.destroy_entity(EntityId(3)),
            Err(PhysicsError::InvalidEntity { .. })
        ));
        assert_eq!(solver.entity_positions(id).unwrap(), vec![Vec3::ZERO]);
    }

    #[test]
    fn test_boundary_planes_update_bounds() {
        let mut solver = Solver::default();
        let planes = [
            Vec4::new(1.0, 0.0, 0.0, 2.0),
            Vec4::new(-1.0, 0.0, 0.0, 2.0),
            Vec4::new(0.0, -1.0, 0.0, 5.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -1.0, 2.0),
            Vec4::new(0.0, 0.0, 1.0, 2.0),
        ];
        solver.set_boundary_planes(planes).unwrap();
        assert_eq!(solver.bounds().value(BoundarySide::Bottom), 0.0);
        assert_eq!(solver.bounds().value(BoundarySide::Top), 5.0);
    }

    #[test]
    fn test_lattice_spacing() {
        assert_eq!(lattice_spacing(&[Vec3::ZERO]), None);
        let spacing = lattice_spacing(&cube(Vec3::ZERO, 2, 0.25)).unwrap();
        assert!((spacing - 0.25).abs() < 1e-6);
    }
}
