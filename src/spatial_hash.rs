// Uniform spatial hash: cell -> particle list, plus a reverse map for O(cells)
// removal (spec.md §4.2).

use crate::particle::ParticleId;
use crate::vector::Vec2;
use std::collections::{HashMap, HashSet};

pub type CellCoord = (i32, i32);

#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f32,
    cells: HashMap<CellCoord, Vec<ParticleId>>,
    occupied_cells: HashMap<ParticleId, HashSet<CellCoord>>,
}

fn cell_of(pos: Vec2, cell_size: f32) -> CellCoord {
    ((pos.x / cell_size).floor() as i32, (pos.y / cell_size).floor() as i32)
}

impl SpatialHash {
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "spatial hash cell size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
            occupied_cells: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cells covered by a circular AABB of `radius` centred on `pos`.
    fn covered_cells(&self, pos: Vec2, radius: f32) -> Vec<CellCoord> {
        let min = cell_of(Vec2::new(pos.x - radius, pos.y - radius), self.cell_size);
        let max = cell_of(Vec2::new(pos.x + radius, pos.y + radius), self.cell_size);
        let mut out = Vec::with_capacity(((max.0 - min.0 + 1) * (max.1 - min.1 + 1)) as usize);
        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                out.push((cx, cy));
            }
        }
        out
    }

    /// Idempotent against double-insertion: a particle already present keeps
    /// its existing cell membership rather than duplicating entries.
    pub fn insert(&mut self, id: ParticleId, pos: Vec2, radius: f32) {
        if self.occupied_cells.contains_key(&id) {
            return;
        }
        let covered = self.covered_cells(pos, radius);
        let mut set = HashSet::with_capacity(covered.len());
        for cell in covered {
            self.cells.entry(cell).or_default().push(id);
            set.insert(cell);
        }
        self.occupied_cells.insert(id, set);
    }

    pub fn remove(&mut self, id: ParticleId) {
        if let Some(cells) = self.occupied_cells.remove(&id) {
            for cell in cells {
                if let Some(list) = self.cells.get_mut(&cell) {
                    list.retain(|&p| p != id);
                    if list.is_empty() {
                        self.cells.remove(&cell);
                    }
                }
            }
        }
    }

    pub fn update_position(&mut self, id: ParticleId, pos: Vec2, radius: f32) {
        self.remove(id);
        self.insert(id, pos, radius);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.occupied_cells.clear();
    }

    /// Clears `out` and appends all occupants of the 3x3 block of cells
    /// centred on `pos`. May contain duplicates when a particle straddles
    /// more than one of those cells -- callers must tolerate that and
    /// self-hits (spec.md §4.2).
    pub fn neighbours(&self, pos: Vec2, out: &mut Vec<ParticleId>) {
        out.clear();
        let centre = cell_of(pos, self.cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(list) = self.cells.get(&(centre.0 + dx, centre.1 + dy)) {
                    out.extend_from_slice(list);
                }
            }
        }
    }

    /// Every unordered pair sharing at least one cell, each reported at most
    /// once per call (spec.md §4.2).
    pub fn collision_pairs(&self) -> Vec<(ParticleId, ParticleId)> {
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for list in self.cells.values() {
            for i in 0..list.len() {
                for j in (i + 1)..list.len() {
                    let (pa, pb) = (list[i], list[j]);
                    let canon = if pa.0 < pb.0 { (pa, pb) } else { (pb, pa) };
                    if seen.insert(canon) {
                        pairs.push(canon);
                    }
                }
            }
        }
        pairs
    }

    #[cfg(test)]
    pub fn occupied_cell_count(&self) -> usize {
        self.cells.len()
    }
}
