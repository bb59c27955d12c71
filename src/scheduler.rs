// The per-tick pipeline and external step/mutation surface (spec.md §4.9,
// §6).

use crate::boundary::{self, WorldBounds};
use crate::bonds::BondNetwork;
use crate::config::{Preset, SimConfig, Spawner};
use crate::contacts;
use crate::error::Result;
use crate::particle::{Particle, ParticleId};
use crate::resolver::{self, ResolveParams};
use crate::snapshot::Snapshot;
use crate::sph::{Material, SphSolver};
use crate::spatial_hash::SpatialHash;
use crate::store::{ForceAccumulator, ParticleStore};
use crate::vector::Vec2;

/// Global post-integration speed cap, independent of material (spec.md
/// §4.9): keeps a runaway contact resolution or SPH blow-up from producing
/// particles that tunnel through the next frame's spatial hash cell.
const GLOBAL_VELOCITY_CLAMP: f32 = 15.0;

pub struct StepScheduler {
    store: ParticleStore,
    spatial_hash: SpatialHash,
    bonds: BondNetwork,
    sph: SphSolver,
    bounds: WorldBounds,
    gravity: Vec2,
    config: SimConfig,
    resolve_params: ResolveParams,
    accumulator: ForceAccumulator,
    last_contacts: Vec<(ParticleId, ParticleId, contacts::Contact)>,
    tick: u64,
}

impl StepScheduler {
    pub fn new(cell_size: f32) -> Self {
        Self {
            store: ParticleStore::new(),
            spatial_hash: SpatialHash::new(cell_size),
            bonds: BondNetwork::new(),
            sph: SphSolver::new(),
            bounds: WorldBounds::default(),
            gravity: Vec2::new(0.0, -9.81),
            config: SimConfig::default(),
            resolve_params: ResolveParams::default(),
            accumulator: ForceAccumulator::new(),
            last_contacts: Vec::new(),
            tick: 0,
        }
    }

    pub fn particle_count(&self) -> usize {
        self.store.len()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn add_particle(&mut self, particle: Particle) -> Result<ParticleId> {
        let material = if particle.components.collision.map(|c| c.is_fluid).unwrap_or(false) {
            Some(Material::Fluid)
        } else if particle.components.dynamics.map(|d| d.sph_solver).unwrap_or(false) {
            Some(Material::Granular)
        } else {
            None
        };

        let radius = particle.radius_or_bounding();
        let position = particle.position;
        let id = self.store.add(particle)?;
        self.spatial_hash.insert(id, position, radius);
        if let Some(material) = material {
            self.sph.register(id, material);
        }
        Ok(id)
    }

    pub fn spawn_from_preset(&mut self, preset: &Preset) -> Result<Vec<ParticleId>> {
        Spawner::build(preset)
            .into_iter()
            .map(|p| self.add_particle(p))
            .collect()
    }

    pub fn remove_in_rect(&mut self, left: f32, right: f32, top: f32, bottom: f32) -> Vec<ParticleId> {
        let removed = self.store.remove_in_rect(left, right, top, bottom);
        for id in &removed {
            self.spatial_hash.remove(*id);
            self.sph.deregister(*id);
            self.bonds.remove_involving(*id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.spatial_hash.clear();
        self.bonds.clear();
        self.sph.clear();
        self.tick = 0;
    }

    pub fn add_bond(&mut self, a: ParticleId, b: ParticleId, stiffness: f32, damping: f32, rest_length: f32) -> bool {
        self.bonds.add(a, b, stiffness, damping, rest_length)
    }

    pub fn clear_bonds(&mut self) {
        self.bonds.clear();
    }

    pub fn set_world_bounds(&mut self, bounds: WorldBounds) {
        self.bounds = bounds;
    }

    pub fn world_bounds(&self) -> WorldBounds {
        self.bounds
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SimConfig {
        &mut self.config
    }

    /// Runs the full per-tick pipeline (spec.md §4.9):
    /// 1. reset the force accumulator
    /// 2. clear the grounded flag ahead of this tick's contact pass
    /// 3. gravity (skipped for SPH-integrated particles)
    /// 4. bond forces
    /// 5. SPH solve
    /// 6. integrate forces into velocities, then velocities into positions
    /// 7. broad/narrow-phase collision resolution
    /// 8. boundary constraint
    /// 9. rebuild the spatial hash for the next tick's queries
    pub fn step(&mut self, dt: f32) {
        let n = self.store.len();
        self.accumulator.reset(n);
        self.clear_grounded_flags();

        self.apply_gravity(dt);
        self.bonds.update(&self.store, &mut self.accumulator);

        let floor_y = Some(self.bounds.bottom);
        self.sph.step(&self.store, &self.spatial_hash, self.effective_gravity(), floor_y, &mut self.accumulator);

        self.accumulator.apply_to_velocities(&mut self.store, dt);
        self.clamp_velocities();
        self.integrate_positions(dt);

        self.resolve_collisions(dt);
        self.apply_boundaries();
        self.rebuild_spatial_hash();

        self.tick += 1;
    }

    fn clear_grounded_flags(&mut self) {
        for particle in self.store.iter_mut() {
            if let Some(collision) = particle.components.collision.as_mut() {
                collision.grounded = false;
            }
        }
    }

    /// Gravity direction taken from `set_gravity` (default straight down),
    /// magnitude driven by the process-wide `gravity_constant` tunable
    /// (spec.md §6) rather than whatever magnitude `set_gravity` was called
    /// with.
    fn effective_gravity(&self) -> Vec2 {
        let (direction, ok) = self.gravity.safe_normalize(1e-6);
        let direction = if ok { direction } else { Vec2::new(0.0, -1.0) };
        direction.scale(self.config.gravity_constant)
    }

    fn apply_gravity(&mut self, dt: f32) {
        let gravity = self.effective_gravity();
        let air_resistance = self.config.air_resistance;
        for (index, particle) in self.store.iter_mut().enumerate() {
            let Some(gravity_params) = particle.components.gravity else { continue };
            let is_sph = particle.components.collision.map(|c| c.sph_integrated).unwrap_or(false);
            if is_sph {
                continue;
            }
            let is_static = particle.components.collision.map(|c| c.is_static).unwrap_or(false);
            if is_static {
                continue;
            }
            let mass = crate::vector::safe_mass(particle.mass, 1.0);
            let drag_coefficient = gravity_params.drag_coefficient + air_resistance;
            let drag_force = particle.velocity.scale(drag_coefficient * mass);
            let force = gravity.scale(mass) - drag_force;
            let _ = dt;
            self.accumulator.add(index, force);
        }
    }

    fn clamp_velocities(&mut self) {
        for particle in self.store.iter_mut() {
            particle.velocity = particle.velocity.clamp_length(GLOBAL_VELOCITY_CLAMP);
            if let Some(gravity_params) = particle.components.gravity {
                if gravity_params.terminal_velocity.is_finite() {
                    particle.velocity = particle.velocity.clamp_length(gravity_params.terminal_velocity);
                }
            }
        }
    }

    fn integrate_positions(&mut self, dt: f32) {
        for particle in self.store.iter_mut() {
            let is_static = particle.components.collision.map(|c| c.is_static).unwrap_or(false);
            if is_static {
                continue;
            }
            particle.position += particle.velocity.scale(dt);
            particle.orientation += particle.angular_velocity * dt;
        }
    }

    fn resolve_collisions(&mut self, dt: f32) {
        self.rebuild_spatial_hash();
        self.last_contacts.clear();
        let pairs = self.spatial_hash.collision_pairs();
        for (a, b) in pairs {
            let (Some(ia), Some(ib)) = (self.store.index_of(a), self.store.index_of(b)) else {
                continue;
            };
            let contact = {
                let particle_a = self.store.get(a).expect("index_of returned a live id");
                let particle_b = self.store.get(b).expect("index_of returned a live id");
                contacts::generate(particle_a, particle_b)
            };
            if let Some(contact) = contact {
                let (pa, pb) = self.store.get_pair_mut(ia, ib);
                resolver::resolve(&contact, pa, pb, dt, &self.resolve_params);
                self.last_contacts.push((a, b, contact));
            }
        }
    }

    fn apply_boundaries(&mut self) {
        let bounds = self.bounds;
        let wall_restitution = self.config.wall_restitution;
        for particle in self.store.iter_mut() {
            let radius = particle.radius_or_bounding();
            boundary::apply(particle, &bounds, radius, wall_restitution);
        }
    }

    fn rebuild_spatial_hash(&mut self) {
        self.spatial_hash.clear();
        for particle in self.store.iter() {
            let radius = particle.radius_or_bounding();
            self.spatial_hash.insert(particle.id, particle.position, radius);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.store, &self.sph, &self.last_contacts, self.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::{ComponentBag, CollisionParams, GravityParams, Shape, Tint};

    fn falling_circle(pos: Vec2) -> Particle {
        Particle {
            id: ParticleId(0),
            position: pos,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            orientation: 0.0,
            mass: 1.0,
            shape: Shape::Circle { radius: 0.1 },
            tint: Tint::default(),
            components: ComponentBag {
                gravity: Some(GravityParams::default()),
                collision: Some(CollisionParams::default()),
                boundary: Some(crate::particle::BoundaryPolicy::BounceAndClamp),
                ..Default::default()
            },
        }
    }

    #[test]
    fn a_falling_particle_settles_above_the_floor() {
        let mut scheduler = StepScheduler::new(0.5);
        scheduler.set_world_bounds(WorldBounds { left: -5.0, right: 5.0, top: 5.0, bottom: -5.0 });
        scheduler.add_particle(falling_circle(Vec2::new(0.0, 4.0))).unwrap();

        for _ in 0..600 {
            scheduler.step(1.0 / 60.0);
        }

        let snapshot = scheduler.snapshot();
        let (_, pos) = snapshot.positions().next().unwrap();
        assert!(pos.y >= -5.0 - 1e-3);
        assert!(pos.y < 4.0);
    }

    #[test]
    fn clear_removes_all_particles_and_bonds() {
        let mut scheduler = StepScheduler::new(0.5);
        let a = scheduler.add_particle(falling_circle(Vec2::new(0.0, 0.0))).unwrap();
        let b = scheduler.add_particle(falling_circle(Vec2::new(0.2, 0.0))).unwrap();
        scheduler.add_bond(a, b, 10.0, 0.0, 0.2);

        scheduler.clear();
        assert_eq!(scheduler.particle_count(), 0);
        scheduler.step(1.0 / 60.0);
    }

    #[test]
    fn two_bonded_particles_remain_at_finite_positions() {
        let mut scheduler = StepScheduler::new(0.5);
        let a = scheduler.add_particle(falling_circle(Vec2::new(0.0, 0.0))).unwrap();
        let b = scheduler.add_particle(falling_circle(Vec2::new(0.3, 0.0))).unwrap();
        scheduler.add_bond(a, b, 20.0, 1.0, 0.2);

        for _ in 0..120 {
            scheduler.step(1.0 / 60.0);
        }

        for (_, pos) in scheduler.snapshot().positions() {
            assert!(pos.is_finite());
        }
    }

    #[test]
    fn remove_in_rect_deregisters_from_every_subsystem() {
        let mut scheduler = StepScheduler::new(0.5);
        scheduler.add_particle(falling_circle(Vec2::new(0.0, 0.0))).unwrap();
        let removed = scheduler.remove_in_rect(-1.0, 1.0, 1.0, -1.0);
        assert_eq!(removed.len(), 1);
        assert_eq!(scheduler.particle_count(), 0);
        // Stepping an empty scheduler after removal must not panic due to
        // stale spatial-hash/SPH/bond registrations.
        scheduler.step(1.0 / 60.0);
    }
}
