// Unified Particles Solver API Integration Tests
//
// Entity handles, force bookkeeping, boundary planes, parameter files and
// the capacity overflow policies, exercised from outside the crate.

use std::io::Write;

use unified_particles::{
    Aabb, EntityId, Force, ForceKind, NeighborStrategy, OverflowPolicy, PhysicsError, Solver,
    SolverParams, Vec3, Vec4,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn clustered_fluid(params: SolverParams) -> Solver {
    let mut solver = Solver::new(params);
    solver
        .create_fluid_block(Aabb::new(Vec3::ZERO, Vec3::splat(0.6)))
        .unwrap();
    solver
}

fn overflow_params(policy: OverflowPolicy) -> SolverParams {
    SolverParams {
        neighbor_strategy: NeighborStrategy::HashGrid,
        bucket_capacity: 4,
        overflow_policy: policy,
        ..SolverParams::default()
    }
}

#[test]
fn test_entity_handles_are_dense_and_stable() {
    init_logging();
    let mut solver = Solver::default();
    let a = solver.create_rigidbody(&[Vec3::ZERO], 1.0).unwrap();
    let b = solver.create_fluid(&[Vec3::new(2.0, 0.0, 0.0)], 1000.0).unwrap();
    let c = solver
        .create_boundary(Aabb::new(Vec3::splat(5.0), Vec3::splat(6.0)))
        .unwrap();

    assert_eq!((a, b, c), (EntityId(0), EntityId(1), EntityId(2)));
    assert_eq!(solver.entity_count(), 3);
    assert_eq!(solver.entity_positions(b).unwrap(), vec![Vec3::new(2.0, 0.0, 0.0)]);
}

#[test]
fn test_unknown_handles_are_rejected() {
    let mut solver = Solver::default();
    solver.create_rigidbody(&[Vec3::ZERO], 1.0).unwrap();

    for id in [EntityId(7), EntityId::INVALID] {
        assert!(matches!(
            solver.entity_positions(id),
            Err(PhysicsError::InvalidEntity { .. })
        ));
        assert!(matches!(
            solver.add_external_force(id, Force::wind(Vec3::X)),
            Err(PhysicsError::InvalidEntity { .. })
        ));
        assert!(matches!(
            solver.destroy_entity(id),
            Err(PhysicsError::InvalidEntity { .. })
        ));
    }
}

#[test]
fn test_destroy_entity_is_not_supported() {
    let mut solver = Solver::default();
    let id = solver.create_rigidbody(&[Vec3::ZERO], 1.0).unwrap();

    let err = solver.destroy_entity(id).unwrap_err();
    assert!(matches!(err, PhysicsError::NotSupported { .. }));
    assert_eq!(solver.entity_positions(id).unwrap().len(), 1);
}

#[test]
fn test_force_kinds_are_unique_per_entity() {
    let mut solver = Solver::default();
    let id = solver.create_rigidbody(&[Vec3::new(0.0, 5.0, 0.0)], 1.0).unwrap();

    let err = solver
        .add_external_force(id, Force::gravity(Vec3::new(0.0, -1.0, 0.0)))
        .unwrap_err();
    assert!(matches!(err, PhysicsError::ForceAlreadyPresent { ref kind } if kind == ForceKind::Gravity.name()));

    let removed = solver.remove_external_force(id, ForceKind::Gravity).unwrap();
    assert_eq!(removed.map(|f| f.value), Some(SolverParams::default().gravity));
    solver.add_internal_force(id, Force::wind(Vec3::new(2.0, 0.0, 0.0))).unwrap();

    solver.step(0.1, 1).unwrap();
    let p = solver.entity_positions(id).unwrap()[0];
    assert!((p.y - 5.0).abs() < 1e-6, "gravity still applied");
    assert!((p.x - 0.02).abs() < 1e-5);
}

#[test]
fn test_boundary_planes_are_validated() {
    let mut solver = Solver::default();
    let before = *solver.bounds();

    let mut planes = [
        Vec4::new(1.0, 0.0, 0.0, 2.0),
        Vec4::new(-1.0, 0.0, 0.0, 2.0),
        Vec4::new(0.0, -1.0, 0.0, 2.0),
        Vec4::new(0.0, 1.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, -1.0, 2.0),
        Vec4::new(0.0, 0.0, 1.0, 2.0),
    ];
    solver.set_boundary_planes(planes).unwrap();
    assert_eq!(solver.bounds().min, Vec3::new(-2.0, 0.0, -2.0));
    assert_eq!(solver.bounds().max, Vec3::new(2.0, 2.0, 2.0));

    // Bottom plane facing down.
    planes[3] = Vec4::new(0.0, -1.0, 0.0, 0.0);
    assert!(matches!(
        solver.set_boundary_planes(planes),
        Err(PhysicsError::InvalidBoundary { .. })
    ));
    assert_ne!(*solver.bounds(), before);
    assert_eq!(solver.bounds().min.y, 0.0);
}

#[test]
fn test_params_load_from_file() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
iterations = 6
radius = 0.05
restitution = 0.25
kernel = "cubic"
neighbor_strategy = "list"
"#
    )
    .unwrap();

    let params = SolverParams::load(file.path()).unwrap();
    assert_eq!(params.iterations, 6);
    assert_eq!(params.radius, 0.05);
    assert_eq!(params.restitution, 0.25);
    assert_eq!(params.neighbor_strategy, NeighborStrategy::List);
    assert_eq!(params.smoothing_radius, SolverParams::default().smoothing_radius);

    let mut solver = Solver::new(params);
    solver.create_rigidbody(&[Vec3::ZERO], 1.0).unwrap();
    solver.step(1.0 / 60.0, 1).unwrap();
}

#[test]
fn test_missing_params_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SolverParams::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, PhysicsError::Config { .. }));
}

#[test]
fn test_zero_substeps_is_rejected() {
    let mut solver = Solver::default();
    solver.create_rigidbody(&[Vec3::new(0.0, 1.0, 0.0)], 1.0).unwrap();

    let err = solver.step(1.0 / 60.0, 0).unwrap_err();
    assert!(matches!(err, PhysicsError::InvalidParameter { ref name, .. } if name == "substeps"));
    assert_eq!(solver.particles()[0].position, Vec3::new(0.0, 1.0, 0.0));
}

#[test]
fn test_failed_step_rolls_back() {
    init_logging();
    let mut solver = clustered_fluid(overflow_params(OverflowPolicy::Fail));
    let positions: Vec<Vec3> = solver.particles().iter().map(|p| p.position).collect();
    let velocities: Vec<Vec3> = solver.particles().iter().map(|p| p.velocity).collect();

    let err = solver.step(1.0 / 60.0, 2).unwrap_err();
    assert!(matches!(err, PhysicsError::CapacityOverflow { capacity: 4, .. }));

    let after: Vec<Vec3> = solver.particles().iter().map(|p| p.position).collect();
    assert_eq!(after, positions);
    let after: Vec<Vec3> = solver.particles().iter().map(|p| p.velocity).collect();
    assert_eq!(after, velocities);
    assert_eq!(solver.constraints().live(), 1);
    assert_eq!(solver.stats().substeps, 0);
}

#[test]
fn test_truncating_step_reports_drops() {
    init_logging();
    let mut solver = clustered_fluid(overflow_params(OverflowPolicy::Truncate));

    solver.step(1.0 / 60.0, 1).unwrap();
    let stats = solver.stats();
    assert!(stats.dropped_from_grid > 0);
    assert!(stats.overflowed());
    assert!(solver.particles().iter().all(|p| p.position.is_finite()));
}
