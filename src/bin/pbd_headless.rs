/// Headless dam-break scene
///
/// Runs a fluid column collapsing against a rigid cube inside a closed box
/// and logs per-frame solver statistics. Usage:
///
/// ```text
/// pbd_headless [params.toml] [frames]
/// ```
use anyhow::{Context, Result};
use unified_particles::{Aabb, Solver, SolverParams, Vec3, Vec4};

const DEFAULT_FRAMES: u32 = 120;
const FRAME_TIME: f32 = 1.0 / 60.0;
const SUBSTEPS: u32 = 1;

fn box_planes(min: Vec3, max: Vec3) -> [Vec4; 6] {
    [
        Vec4::new(1.0, 0.0, 0.0, -min.x),
        Vec4::new(-1.0, 0.0, 0.0, max.x),
        Vec4::new(0.0, -1.0, 0.0, max.y),
        Vec4::new(0.0, 1.0, 0.0, -min.y),
        Vec4::new(0.0, 0.0, -1.0, max.z),
        Vec4::new(0.0, 0.0, 1.0, -min.z),
    ]
}

fn cube(center: Vec3, per_side: usize, spacing: f32) -> Vec<Vec3> {
    let half = (per_side as f32 - 1.0) * spacing * 0.5;
    let mut points = Vec::with_capacity(per_side.pow(3));
    for z in 0..per_side {
        for y in 0..per_side {
            for x in 0..per_side {
                let offset = Vec3::new(x as f32, y as f32, z as f32) * spacing - Vec3::splat(half);
                points.push(center + offset);
            }
        }
    }
    points
}

fn build_scene(params: SolverParams) -> Result<Solver> {
    let mut solver = Solver::new(params);
    let min = Vec3::new(-2.0, 0.0, -1.0);
    let max = Vec3::new(2.0, 4.0, 1.0);

    solver.set_boundary_planes(box_planes(min, max))?;
    solver.create_boundary_from_planes()?;

    let column = Aabb::new(min, Vec3::new(-0.8, 1.6, max.z));
    let fluid = solver.create_fluid_block(column)?;
    log::info!(
        "Fluid column {} holds {} particles",
        fluid,
        solver.entity(fluid)?.particles.len()
    );

    let spacing = solver.params().contact_distance();
    let positions = cube(Vec3::new(1.0, 1.0, 0.0), 3, spacing);
    solver.create_rigidbody(&positions, 1.0)?;

    Ok(solver)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let params = match args.next() {
        Some(path) => SolverParams::load(&path)
            .with_context(|| format!("loading solver params from {path}"))?,
        None => SolverParams::default(),
    };
    let frames = match args.next() {
        Some(text) => text
            .parse::<u32>()
            .with_context(|| format!("invalid frame count {text:?}"))?,
        None => DEFAULT_FRAMES,
    };

    let mut solver = build_scene(params)?;
    log::info!(
        "Simulating {} frames with {} particles in {} entities",
        frames,
        solver.particle_count(),
        solver.entity_count()
    );

    for frame in 0..frames {
        solver
            .step(FRAME_TIME, SUBSTEPS)
            .with_context(|| format!("frame {frame}"))?;

        let stats = solver.stats();
        log::info!(
            "frame {:4}: {} transient constraints, {} density, {} shape, {} sleeping, {}us",
            frame,
            stats.transient_constraints(),
            stats.density_constraints,
            stats.shape_constraints,
            stats.sleeping_particles,
            stats.total_time_us
        );
        if stats.overflowed() {
            log::warn!(
                "frame {}: {} particles dropped from grid, {} neighbours truncated",
                frame,
                stats.dropped_from_grid,
                stats.truncated_neighbors
            );
        }
    }

    let lowest = solver
        .particles()
        .iter()
        .map(|p| p.position.y)
        .fold(f32::INFINITY, f32::min);
    log::info!("Finished; lowest particle at y = {lowest:.3}");
    Ok(())
}
