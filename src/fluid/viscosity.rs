/// Velocity post passes for fluids
///
/// Both run after reconciliation on committed positions, Jacobi style: every
/// update is computed from the same velocity snapshot, then written.
use glam::Vec3;
use rayon::prelude::*;

use crate::entity::Entity;
use crate::kernel::Kernel;
use crate::math::EPSILON;
use crate::neighbor::{NeighborIndex, NeighborSearch};
use crate::particle::{Particle, Phase};

fn rest_density_of(particle: &Particle, entities: &[Entity]) -> f32 {
    entities
        .get(particle.entity.index())
        .map(|entity| entity.rest_density)
        .filter(|density| *density > 0.0)
        .unwrap_or(1.0)
}

/// Visit fluid neighbours of `i` (excluding `i`) found in `index`.
fn for_each_fluid_neighbor<F>(
    particles: &[Particle],
    index: &NeighborIndex,
    i: usize,
    h: f32,
    mut f: F,
) where
    F: FnMut(usize, &Particle),
{
    index.for_each_nearby(particles, particles[i].predicted, h, |_, j| {
        if j != i && particles[j].phase == Phase::Fluid {
            f(j, &particles[j]);
        }
    });
}

/// XSPH viscosity: blend each fluid velocity toward the kernel-weighted
/// average of its neighbours.
pub fn apply_xsph_viscosity<K: Kernel>(
    particles: &mut [Particle],
    fluid: &[usize],
    index: &NeighborIndex,
    entities: &[Entity],
    kernel: &K,
    coefficient: f32,
) {
    if coefficient <= 0.0 || fluid.is_empty() {
        return;
    }
    let h = kernel.radius();

    let deltas: Vec<Vec3> = {
        let snapshot: &[Particle] = particles;
        fluid
            .par_iter()
            .map(|&i| {
                let pi = &snapshot[i];
                let rest = rest_density_of(pi, entities);
                let mut delta = Vec3::ZERO;
                for_each_fluid_neighbor(snapshot, index, i, h, |_, pj| {
                    let w = kernel.w(pi.predicted - pj.predicted);
                    delta += (pj.mass() / rest) * (pj.velocity - pi.velocity) * w;
                });
                coefficient * delta
            })
            .collect()
    };

    for (&i, delta) in fluid.iter().zip(deltas) {
        if !particles[i].is_static() {
            particles[i].velocity += delta;
        }
    }
}

/// Vorticity confinement: re-inject rotational energy lost to damping by
/// pushing along `N × ω`, where `N` points toward higher vorticity.
pub fn apply_vorticity_confinement<K: Kernel>(
    particles: &mut [Particle],
    fluid: &[usize],
    index: &NeighborIndex,
    entities: &[Entity],
    kernel: &K,
    epsilon: f32,
    dt: f32,
) {
    if epsilon <= 0.0 || fluid.is_empty() {
        return;
    }
    let h = kernel.radius();

    let snapshot: &[Particle] = particles;
    let mut vorticity = vec![Vec3::ZERO; snapshot.len()];
    let curls: Vec<Vec3> = fluid
        .par_iter()
        .map(|&i| {
            let pi = &snapshot[i];
            let rest = rest_density_of(pi, entities);
            let mut omega = Vec3::ZERO;
            for_each_fluid_neighbor(snapshot, index, i, h, |_, pj| {
                let grad = kernel.grad_w(pi.predicted - pj.predicted);
                omega += (pj.mass() / rest) * (pj.velocity - pi.velocity).cross(grad);
            });
            omega
        })
        .collect();
    for (&i, omega) in fluid.iter().zip(curls) {
        vorticity[i] = omega;
    }

    let forces: Vec<Vec3> = fluid
        .par_iter()
        .map(|&i| {
            let pi = &snapshot[i];
            let rest = rest_density_of(pi, entities);
            let mut eta = Vec3::ZERO;
            for_each_fluid_neighbor(snapshot, index, i, h, |j, pj| {
                let grad = kernel.grad_w(pi.predicted - pj.predicted);
                eta += (pj.mass() / rest) * vorticity[j].length() * grad;
            });
            if eta.length() < EPSILON {
                return Vec3::ZERO;
            }
            epsilon * eta.normalize().cross(vorticity[i])
        })
        .collect();

    for (&i, force) in fluid.iter().zip(forces) {
        if !particles[i].is_static() {
            particles[i].velocity += force * dt;
        }
    }
}
