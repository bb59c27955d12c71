// Smoothed Particle Hydrodynamics solver for fluid and granular populations
// (spec.md §4.4).
//
// The solver owns its own dense parallel arrays (density, pressure, force,
// neighbour lists) indexed separately from the particle store's dense index,
// since only a subset of particles are SPH-integrated. A particle's "fluid
// handle" (spec.md §3) is just its position in these arrays.

use crate::particle::ParticleId;
use crate::spatial_hash::SpatialHash;
use crate::store::{ForceAccumulator, ParticleStore};
use crate::vector::{self, poly6, spiky_gradient, viscosity_laplacian, Vec2};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    Fluid,
    Granular,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub smoothing_radius: f32,
    pub gas_constant: f32,
    pub viscosity: f32,
    pub rest_density: f32,
    pub particle_radius: f32,
    pub gravity: f32,
    pub damping: f32,
    pub max_velocity: f32,
    /// Granular-only; ignored for `Material::Fluid`.
    pub friction_angle: f32,
    pub cohesion: f32,
    /// Accepted per spec.md §4.4's parameter list but not consumed by any
    /// granular force formula there -- kept for forward compatibility, see
    /// DESIGN.md.
    pub dilatancy: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            smoothing_radius: 0.08,
            gas_constant: 2000.0,
            viscosity: 0.01,
            rest_density: 1000.0,
            particle_radius: 0.02,
            gravity: 9.81,
            damping: 0.98,
            max_velocity: 10.0,
            friction_angle: 30f32.to_radians(),
            cohesion: 0.0,
            dilatancy: 0.0,
        }
    }
}

const DENSITY_FLOOR: f32 = 1e-6;
const QUADRATIC_DRAG_COEFF: f32 = 4.0;
const SETTLING_COEFF: f32 = 6.0;

#[derive(Debug, Default)]
pub struct SphSolver {
    pub fluid_params: MaterialParams,
    pub granular_params: MaterialParams,

    ids: Vec<ParticleId>,
    handle_of: HashMap<ParticleId, usize>,
    materials: Vec<Material>,

    density: Vec<f32>,
    pressure: Vec<f32>,
    force: Vec<Vec2>,
    neighbours: Vec<Vec<usize>>,
}

impl SphSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Registers a particle with the solver (spec.md §3: "Created by
    /// AddParticle"). Idempotent.
    pub fn register(&mut self, id: ParticleId, material: Material) {
        if self.handle_of.contains_key(&id) {
            return;
        }
        let handle = self.ids.len();
        self.ids.push(id);
        self.materials.push(material);
        self.density.push(0.0);
        self.pressure.push(0.0);
        self.force.push(Vec2::ZERO);
        self.neighbours.push(Vec::new());
        self.handle_of.insert(id, handle);
    }

    /// Deregisters a particle (spec.md §3 lifecycle: the SPH solver
    /// registers/deregisters whenever a particle joins or leaves; bulk
    /// `clear()` tears down every handle).
    pub fn deregister(&mut self, id: ParticleId) {
        let Some(handle) = self.handle_of.remove(&id) else {
            return;
        };
        self.ids.swap_remove(handle);
        self.materials.swap_remove(handle);
        self.density.swap_remove(handle);
        self.pressure.swap_remove(handle);
        self.force.swap_remove(handle);
        self.neighbours.swap_remove(handle);
        if handle < self.ids.len() {
            let moved_id = self.ids[handle];
            self.handle_of.insert(moved_id, handle);
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.handle_of.clear();
        self.materials.clear();
        self.density.clear();
        self.pressure.clear();
        self.force.clear();
        self.neighbours.clear();
    }

    pub fn diagnostics(&self, id: ParticleId) -> Option<(f32, f32, usize)> {
        let &handle = self.handle_of.get(&id)?;
        Some((self.density[handle], self.pressure[handle], self.neighbours[handle].len()))
    }

    fn params_for(&self, material: Material) -> &MaterialParams {
        match material {
            Material::Fluid => &self.fluid_params,
            Material::Granular => &self.granular_params,
        }
    }

    /// Runs one SPH step for every registered particle and injects the
    /// resulting per-particle force (SPH + gravity + drag) into
    /// `accumulator`. Never fails: zero neighbours is a legitimate state
    /// (spec.md §4.4 "Failures").
    pub fn step(
        &mut self,
        store: &ParticleStore,
        spatial_hash: &SpatialHash,
        gravity: Vec2,
        floor_y: Option<f32>,
        accumulator: &mut ForceAccumulator,
    ) {
        if self.is_empty() {
            return;
        }

        self.rebuild_neighbour_lists(store, spatial_hash);
        self.compute_densities(store);
        self.compute_pressures();
        self.compute_forces(store, gravity, floor_y);
        self.inject_forces(store, accumulator);
    }

    fn rebuild_neighbour_lists(&mut self, store: &ParticleStore, spatial_hash: &SpatialHash) {
        let mut scratch = Vec::new();
        for handle in 0..self.ids.len() {
            let id = self.ids[handle];
            let Some(particle) = store.get(id) else {
                self.neighbours[handle].clear();
                continue;
            };
            let material = self.materials[handle];
            let h = self.params_for(material).smoothing_radius;

            spatial_hash.neighbours(particle.position, &mut scratch);
            let mut seen_indices = Vec::with_capacity(scratch.len());
            let list = &mut self.neighbours[handle];
            list.clear();
            for &candidate_id in &scratch {
                if candidate_id == id {
                    continue;
                }
                let Some(&candidate_handle) = self.handle_of.get(&candidate_id) else {
                    continue;
                };
                if seen_indices.contains(&candidate_handle) {
                    continue;
                }
                let Some(candidate) = store.get(candidate_id) else {
                    continue;
                };
                let dist_sq = (candidate.position - particle.position).length_sq();
                if dist_sq < h * h {
                    seen_indices.push(candidate_handle);
                    list.push(candidate_handle);
                }
            }
        }
    }

    fn density_for(&self, handle: usize, store: &ParticleStore) -> f32 {
        let id = self.ids[handle];
        let Some(particle) = store.get(id) else { return DENSITY_FLOOR };
        let material = self.materials[handle];
        let h = self.params_for(material).smoothing_radius;
        let self_mass = vector::safe_mass(particle.mass, 1.0);

        // Self-term with r = 0.
        let mut density = self_mass * poly6(0.0, h);
        for &neighbour_handle in &self.neighbours[handle] {
            let neighbour_id = self.ids[neighbour_handle];
            let Some(neighbour) = store.get(neighbour_id) else { continue };
            let r = (neighbour.position - particle.position).length();
            let mj = vector::safe_mass(neighbour.mass, 1.0);
            density += mj * poly6(r, h);
        }
        density.max(DENSITY_FLOOR)
    }

    // Density is an embarrassingly-parallel per-particle reduction over
    // already-built neighbour lists (spec.md §5): no handle writes any other
    // handle's slot, so the `parallel` feature fans this out with rayon.
    #[cfg(feature = "parallel")]
    fn compute_densities(&mut self, store: &ParticleStore) {
        use rayon::prelude::*;
        self.density = (0..self.ids.len())
            .into_par_iter()
            .map(|handle| self.density_for(handle, store))
            .collect();
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_densities(&mut self, store: &ParticleStore) {
        for handle in 0..self.ids.len() {
            self.density[handle] = self.density_for(handle, store);
        }
    }

    fn compute_pressures(&mut self) {
        for handle in 0..self.ids.len() {
            let material = self.materials[handle];
            let params = self.params_for(material);
            let rho = self.density[handle];
            self.pressure[handle] = (params.gas_constant * (rho / params.rest_density - 1.0)).max(0.0);
        }
    }

    fn force_for(&self, handle: usize, store: &ParticleStore, gravity: Vec2, floor_y: Option<f32>) -> Vec2 {
        let id = self.ids[handle];
        let Some(particle) = store.get(id) else { return Vec2::ZERO };
        let material = self.materials[handle];
        let params = *self.params_for(material);
        let mi = vector::safe_mass(particle.mass, 1.0);

        let mut force = match material {
            Material::Fluid => self.fluid_force(handle, store, &params),
            Material::Granular => self.granular_force(handle, store, &params),
        };

        let accel_cap = match material {
            Material::Fluid => 10.0,
            Material::Granular => 15.0,
        };
        let g_mag = gravity.length().max(1e-6);
        force = force.clamp_length(accel_cap * g_mag.max(params.gravity) * mi);

        let max_upward = 0.5 * g_mag.max(params.gravity) * mi;
        if force.y > max_upward {
            force.y = max_upward;
        }

        if let Some(floor_y) = floor_y {
            let radius = params.particle_radius;
            if particle.position.y - floor_y <= 2.0 * radius {
                force.y = force.y.max(0.0);
                force -= Vec2::new(2.0 * mi * particle.velocity.x, 0.0);
            }
        }

        // Gravity + drag injected after the material-specific force has been
        // clamped and near-floor-zeroed, since the scheduler skips its own
        // gravity step for SPH-integrated particles (spec.md §4.9 step 4)
        // and this is the only place that weight gets added back in.
        force += gravity.scale(mi);
        if let Some(collision_drag) = particle.components.gravity.map(|g| g.drag_coefficient) {
            force -= particle.velocity.scale(collision_drag * mi);
        }

        force
    }

    // Same independence argument as `compute_densities`: each handle's force
    // depends only on the (already-finalised) density/pressure arrays and its
    // own neighbour list, never another handle's force slot.
    #[cfg(feature = "parallel")]
    fn compute_forces(&mut self, store: &ParticleStore, gravity: Vec2, floor_y: Option<f32>) {
        use rayon::prelude::*;
        self.force = (0..self.ids.len())
            .into_par_iter()
            .map(|handle| self.force_for(handle, store, gravity, floor_y))
            .collect();
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_forces(&mut self, store: &ParticleStore, gravity: Vec2, floor_y: Option<f32>) {
        for handle in 0..self.ids.len() {
            self.force[handle] = self.force_for(handle, store, gravity, floor_y);
        }
    }

    fn fluid_force(&self, handle: usize, store: &ParticleStore, params: &MaterialParams) -> Vec2 {
        let id = self.ids[handle];
        let particle = store.get(id).expect("handle refers to live particle");
        let mi = vector::safe_mass(particle.mass, 1.0);
        let rho_i = self.density[handle];
        let p_i = self.pressure[handle];
        let r_particle = params.particle_radius;
        let h = params.smoothing_radius;

        let mut force = Vec2::ZERO;
        for &neighbour_handle in &self.neighbours[handle] {
            let neighbour_id = self.ids[neighbour_handle];
            let Some(neighbour) = store.get(neighbour_id) else { continue };
            let mj = vector::safe_mass(neighbour.mass, 1.0);
            let rho_j = self.density[neighbour_handle];
            let p_j = self.pressure[neighbour_handle];

            let offset = particle.position - neighbour.position;
            let dist = offset.length();
            if dist <= 0.1 * r_particle || dist >= h {
                continue;
            }

            let pressure_term = p_i / (rho_i * rho_i) + p_j / (rho_j * rho_j);
            let grad = spiky_gradient(dist, h, offset);
            force -= grad.scale(mi * mj * pressure_term);

            if dist < 0.95 * r_particle {
                let (dir, ok) = offset.safe_normalize(1e-8);
                if ok {
                    let magnitude = params.gas_constant * (0.95 * r_particle - dist) * 0.3 * mj;
                    force += dir.scale(magnitude);
                }
            }

            let rel_vel = neighbour.velocity - particle.velocity;
            let w_visc = viscosity_laplacian(dist, h);
            force += rel_vel.scale(params.viscosity * mj * w_visc / rho_j);
        }

        let speed = particle.velocity.length();
        force -= particle.velocity.scale(2.0 * (1.0 - params.damping) * mi);
        if speed > 0.5 {
            let excess = speed - 0.5;
            let (dir, ok) = particle.velocity.safe_normalize(1e-8);
            if ok {
                force -= dir.scale(QUADRATIC_DRAG_COEFF * excess * excess * mi);
            }
        }
        if speed < 0.3 {
            force -= particle.velocity.scale(SETTLING_COEFF * mi);
        }

        force
    }

    fn granular_force(&self, handle: usize, store: &ParticleStore, params: &MaterialParams) -> Vec2 {
        let id = self.ids[handle];
        let particle = store.get(id).expect("handle refers to live particle");
        let r = params.particle_radius;

        let mut force = Vec2::ZERO;
        for &neighbour_handle in &self.neighbours[handle] {
            let neighbour_id = self.ids[neighbour_handle];
            let Some(neighbour) = store.get(neighbour_id) else { continue };

            let offset = particle.position - neighbour.position;
            let dist = offset.length();
            if dist >= 2.0 * r || dist <= 1e-8 {
                continue;
            }
            let (normal, ok) = offset.safe_normalize(1e-8);
            if !ok {
                continue;
            }

            let normal_magnitude = params.gas_constant * (2.0 * r - dist);
            force += normal.scale(normal_magnitude);

            let rel_vel = particle.velocity - neighbour.velocity;
            let normal_component = rel_vel.dot(normal);
            let tangential = rel_vel - normal.scale(normal_component);
            let (tangent_dir, ok_t) = tangential.safe_normalize(1e-8);
            if ok_t {
                let friction_magnitude = params.friction_angle.tan() * normal_magnitude.abs();
                force -= tangent_dir.scale(friction_magnitude);
            }

            if dist < 2.4 * r {
                let cohesion_magnitude = params.cohesion * (1.0 - dist / (2.4 * r));
                force -= normal.scale(cohesion_magnitude);
            }

            force -= rel_vel.scale(params.viscosity);
        }

        force
    }

    fn inject_forces(&self, store: &ParticleStore, accumulator: &mut ForceAccumulator) {
        for handle in 0..self.ids.len() {
            let id = self.ids[handle];
            if let Some(index) = store.index_of(id) {
                accumulator.add(index, self.force[handle]);
            }
        }
    }
}
