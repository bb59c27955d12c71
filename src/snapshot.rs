// Read-only per-tick view handed to the demo server and tests (spec.md §6).

use crate::contacts::Contact;
use crate::particle::ParticleId;
use crate::sph::SphSolver;
use crate::store::ParticleStore;
use crate::vector::Vec2;

#[derive(Debug, Clone)]
pub struct Snapshot {
    tick: u64,
    positions: Vec<(ParticleId, Vec2)>,
    diagnostics: std::collections::HashMap<ParticleId, (f32, f32, usize)>,
    contacts: Vec<(ParticleId, ParticleId, Contact)>,
}

impl Snapshot {
    pub(crate) fn capture(
        store: &ParticleStore,
        sph: &SphSolver,
        last_contacts: &[(ParticleId, ParticleId, Contact)],
        tick: u64,
    ) -> Self {
        let positions = store.iter().map(|p| (p.id, p.position)).collect();
        let diagnostics = store
            .iter()
            .filter_map(|p| sph.diagnostics(p.id).map(|d| (p.id, d)))
            .collect();
        Snapshot { tick, positions, diagnostics, contacts: last_contacts.to_vec() }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn positions(&self) -> impl Iterator<Item = (ParticleId, Vec2)> + '_ {
        self.positions.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// `(density, pressure, neighbour_count)` for an SPH-integrated
    /// particle; `None` for particles the solver never registered.
    pub fn diagnostics(&self, id: ParticleId) -> Option<(f32, f32, usize)> {
        self.diagnostics.get(&id).copied()
    }

    pub fn iterate_contacts(&self) -> impl Iterator<Item = &(ParticleId, ParticleId, Contact)> {
        self.contacts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::{ComponentBag, Particle, Shape, Tint};

    #[test]
    fn capture_reflects_current_store_contents() {
        let mut store = ParticleStore::new();
        let id = store
            .add(Particle {
                id: ParticleId(0),
                position: Vec2::new(1.0, 2.0),
                velocity: Vec2::ZERO,
                angular_velocity: 0.0,
                orientation: 0.0,
                mass: 1.0,
                shape: Shape::Circle { radius: 0.1 },
                tint: Tint::default(),
                components: ComponentBag::default(),
            })
            .unwrap();
        let sph = SphSolver::new();

        let snapshot = Snapshot::capture(&store, &sph, &[], 7);
        assert_eq!(snapshot.tick(), 7);
        assert_eq!(snapshot.len(), 1);
        let (found_id, pos) = snapshot.positions().next().unwrap();
        assert_eq!(found_id, id);
        assert_eq!(pos, Vec2::new(1.0, 2.0));
        assert!(snapshot.diagnostics(id).is_none());
    }
}
