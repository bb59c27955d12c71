// Particle store (dense array + O(1) id lookup) and the force accumulator
// (spec.md §4.3).

use crate::particle::{validate_shape, Particle, ParticleId, Shape};
use crate::vector::Vec2;
use std::collections::HashMap;

pub struct ParticleStore {
    particles: Vec<Particle>,
    index_of: HashMap<ParticleId, usize>,
    next_id: u64,
}

impl Default for ParticleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleStore {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            index_of: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Validates shape invariants, assigns a fresh id, and appends the
    /// particle in registration order. Returns a `ConfigurationError` if the
    /// shape or mass is invalid (spec.md §7 admission rejection).
    pub fn add(&mut self, mut spec: Particle) -> crate::error::Result<ParticleId> {
        validate_shape(&spec.shape)?;
        if !spec.position.is_finite() || !spec.velocity.is_finite() {
            return Err(crate::error::PhysicsError::ConfigurationError(
                "particle position/velocity must be finite".to_string(),
            ));
        }
        let id = ParticleId(self.next_id);
        self.next_id += 1;
        spec.id = id;
        let index = self.particles.len();
        self.particles.push(spec);
        self.index_of.insert(id, index);
        Ok(id)
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.index_of.get(&id).map(|&i| &self.particles[i])
    }

    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        match self.index_of.get(&id).copied() {
            Some(i) => Some(&mut self.particles[i]),
            None => None,
        }
    }

    pub fn index_of(&self, id: ParticleId) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    /// Two disjoint mutable borrows by dense index, for pairwise collision
    /// resolution. Panics if `ia == ib` (callers never form self-contacts).
    pub fn get_pair_mut(&mut self, ia: usize, ib: usize) -> (&mut Particle, &mut Particle) {
        assert_ne!(ia, ib, "cannot borrow the same particle twice");
        if ia < ib {
            let (left, right) = self.particles.split_at_mut(ib);
            (&mut left[ia], &mut right[0])
        } else {
            let (left, right) = self.particles.split_at_mut(ia);
            (&mut right[0], &mut left[ib])
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = ParticleId> + '_ {
        self.particles.iter().map(|p| p.id)
    }

    /// Swap-remove by id; patches the moved particle's index in O(1).
    /// Returns the removed particle so callers (spatial hash, SPH solver)
    /// can deregister it.
    pub fn remove(&mut self, id: ParticleId) -> Option<Particle> {
        let index = self.index_of.remove(&id)?;
        let removed = self.particles.swap_remove(index);
        if index < self.particles.len() {
            let moved_id = self.particles[index].id;
            self.index_of.insert(moved_id, index);
        }
        Some(removed)
    }

    /// Removes every particle whose AABB centre falls within `(left, right,
    /// top, bottom)`. Returns the removed ids so callers can deregister them
    /// from the spatial hash / SPH solver / bond network.
    pub fn remove_in_rect(&mut self, left: f32, right: f32, top: f32, bottom: f32) -> Vec<ParticleId> {
        let victims: Vec<ParticleId> = self
            .particles
            .iter()
            .filter(|p| {
                p.position.x >= left && p.position.x <= right && p.position.y <= top && p.position.y >= bottom
            })
            .map(|p| p.id)
            .collect();
        for id in &victims {
            self.remove(*id);
        }
        victims
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.index_of.clear();
        self.next_id = 0;
    }

    pub fn shape_of(&self, id: ParticleId) -> Option<&Shape> {
        self.get(id).map(|p| &p.shape)
    }
}

/// Additive per-tick force map, reset at the top of each step. Keyed by the
/// store's dense index rather than `ParticleId` hash for cache locality
/// (spec.md §9: "prefer the dense-index form").
#[derive(Debug, Default)]
pub struct ForceAccumulator {
    forces: Vec<Vec2>,
}

impl ForceAccumulator {
    pub fn new() -> Self {
        Self { forces: Vec::new() }
    }

    /// Resizes (if needed) and zeroes the accumulator for `n` particles.
    pub fn reset(&mut self, n: usize) {
        if self.forces.len() != n {
            self.forces.resize(n, Vec2::ZERO);
        } else {
            self.forces.iter_mut().for_each(|f| *f = Vec2::ZERO);
        }
    }

    pub fn add(&mut self, index: usize, force: Vec2) {
        self.forces[index] += force;
    }

    pub fn get(&self, index: usize) -> Vec2 {
        self.forces[index]
    }

    /// Merges a batch of `(index, force)` contributions computed
    /// independently (e.g. by a rayon parallel map over neighbour lists).
    /// Sequential by design: this is the barrier where parallel reads become
    /// additive writes (spec.md §5).
    pub fn merge(&mut self, contributions: impl IntoIterator<Item = (usize, Vec2)>) {
        for (index, force) in contributions {
            self.add(index, force);
        }
    }

    /// `v <- v + (f/m) * dt` for each non-static particle with a collision
    /// component (spec.md §4.3). Fluid particles whose SPH-integrated flag
    /// is set pass through this path too, since the SPH solver expresses its
    /// result as a force rather than a direct velocity write.
    pub fn apply_to_velocities(&self, store: &mut ParticleStore, dt: f32) {
        for (index, particle) in store.iter_mut().enumerate() {
            let Some(collision) = particle.components.collision else {
                continue;
            };
            if collision.is_static {
                continue;
            }
            let mass = crate::vector::safe_mass(particle.mass, 1.0);
            let force = self.forces[index];
            particle.velocity += force.scale(dt / mass);
        }
    }
}
