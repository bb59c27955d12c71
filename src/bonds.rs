// Persistent undirected bond network: Hookean spring + damping (spec.md
// §4.5, §3 "Bond").

use crate::particle::ParticleId;
use crate::store::{ForceAccumulator, ParticleStore};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    pub a: ParticleId,
    pub b: ParticleId,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

fn canonical(a: ParticleId, b: ParticleId) -> (ParticleId, ParticleId) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Default)]
pub struct BondNetwork {
    bonds: Vec<Bond>,
    present: HashSet<(ParticleId, ParticleId)>,
}

impl BondNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }

    /// Deduplicated by canonical identity order (spec.md §3). Returns `true`
    /// if a new bond was inserted, `false` if this pair was already bonded.
    pub fn add(&mut self, a: ParticleId, b: ParticleId, stiffness: f32, damping: f32, rest_length: f32) -> bool {
        let key = canonical(a, b);
        if !self.present.insert(key) {
            return false;
        }
        self.bonds.push(Bond {
            a: key.0,
            b: key.1,
            rest_length,
            stiffness,
            damping,
        });
        true
    }

    pub fn clear(&mut self) {
        self.bonds.clear();
        self.present.clear();
    }

    pub fn remove_involving(&mut self, id: ParticleId) {
        self.bonds.retain(|bond| {
            let keep = bond.a != id && bond.b != id;
            if !keep {
                self.present.remove(&canonical(bond.a, bond.b));
            }
            keep
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bond> {
        self.bonds.iter()
    }

    /// For each bond with neither endpoint static: F = -k(d - L0) -
    /// c((vB-vA)*d_hat); apply +F*d_hat to A, -F*d_hat to B. Zero-length
    /// bonds are skipped, not reported (spec.md §4.5).
    pub fn update(&self, store: &ParticleStore, accumulator: &mut ForceAccumulator) {
        for bond in &self.bonds {
            let (Some(a), Some(b)) = (store.get(bond.a), store.get(bond.b)) else {
                continue;
            };
            let a_static = a.components.collision.map(|c| c.is_static).unwrap_or(false);
            let b_static = b.components.collision.map(|c| c.is_static).unwrap_or(false);
            if a_static && b_static {
                continue;
            }

            let delta = b.position - a.position;
            let d = delta.length();
            if d < 1e-6 {
                continue;
            }
            let d_hat = delta.scale(1.0 / d);
            let relative_vel = b.velocity - a.velocity;
            let magnitude = -bond.stiffness * (d - bond.rest_length) - bond.damping * relative_vel.dot(d_hat);
            let force = d_hat.scale(magnitude);

            if !a_static {
                if let Some(idx) = store.index_of(bond.a) {
                    accumulator.add(idx, force);
                }
            }
            if !b_static {
                if let Some(idx) = store.index_of(bond.b) {
                    accumulator.add(idx, -force);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::{ComponentBag, Particle, Shape, Tint};
    use crate::vector::Vec2;

    fn particle(id: u64, pos: Vec2) -> Particle {
        Particle {
            id: ParticleId(id),
            position: pos,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            orientation: 0.0,
            mass: 1.0,
            shape: Shape::Circle { radius: 0.02 },
            tint: Tint::default(),
            components: ComponentBag {
                collision: Some(Default::default()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn adding_same_pair_twice_increments_count_once() {
        let mut bonds = BondNetwork::new();
        let a = ParticleId(1);
        let b = ParticleId(2);
        assert!(bonds.add(a, b, 1.0, 0.0, 0.05));
        assert!(!bonds.add(a, b, 1.0, 0.0, 0.05));
        assert!(!bonds.add(b, a, 1.0, 0.0, 0.05));
        assert_eq!(bonds.len(), 1);
    }

    #[test]
    fn stretched_bond_pulls_endpoints_together() {
        let mut store = ParticleStore::new();
        let a = store.add(particle(0, Vec2::new(0.0, 0.0))).unwrap();
        let b = store.add(particle(1, Vec2::new(0.1, 0.0))).unwrap();

        let mut bonds = BondNetwork::new();
        bonds.add(a, b, 100.0, 0.0, 0.05);

        let mut acc = ForceAccumulator::new();
        acc.reset(store.len());
        bonds.update(&store, &mut acc);

        let fa = acc.get(store.index_of(a).unwrap());
        let fb = acc.get(store.index_of(b).unwrap());
        assert!(fa.x > 0.0, "A should be pulled toward B");
        assert!(fb.x < 0.0, "B should be pulled toward A");
        assert!((fa.x + fb.x).abs() < 1e-5, "forces should be equal and opposite");
    }

    #[test]
    fn zero_length_bond_is_skipped_without_error() {
        let mut store = ParticleStore::new();
        let a = store.add(particle(0, Vec2::new(1.0, 1.0))).unwrap();
        let b = store.add(particle(1, Vec2::new(1.0, 1.0))).unwrap();

        let mut bonds = BondNetwork::new();
        bonds.add(a, b, 100.0, 0.0, 0.05);

        let mut acc = ForceAccumulator::new();
        acc.reset(store.len());
        bonds.update(&store, &mut acc);

        assert_eq!(acc.get(0), Vec2::ZERO);
        assert_eq!(acc.get(1), Vec2::ZERO);
    }
}
