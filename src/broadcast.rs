// Binary encoding of a `Snapshot` for efficient WebSocket broadcast.

use crate::snapshot::Snapshot;
use anyhow::Result;

/// Wire-encoded snapshot: a tick header followed by one 16-byte record per
/// particle (`id: u64`, `x: f32`, `y: f32`), all little-endian.
#[derive(Clone)]
pub struct BroadcastState {
    pub tick: u64,
    pub particle_count: usize,
    pub data: Vec<u8>,
}

const RECORD_SIZE: usize = 16;

impl BroadcastState {
    pub fn encode(snapshot: &Snapshot) -> Result<Self> {
        let particle_count = snapshot.len();
        let mut data = Vec::with_capacity(particle_count * RECORD_SIZE);

        for (id, pos) in snapshot.positions() {
            data.extend_from_slice(&id.0.to_le_bytes());
            data.extend_from_slice(&pos.x.to_le_bytes());
            data.extend_from_slice(&pos.y.to_le_bytes());
        }

        Ok(Self { tick: snapshot.tick(), particle_count, data })
    }

    pub fn decode(data: &[u8]) -> Result<Vec<(u64, f32, f32)>> {
        let mut out = Vec::with_capacity(data.len() / RECORD_SIZE);
        for chunk in data.chunks_exact(RECORD_SIZE) {
            let id = u64::from_le_bytes(chunk[0..8].try_into().unwrap());
            let x = f32::from_le_bytes(chunk[8..12].try_into().unwrap());
            let y = f32::from_le_bytes(chunk[12..16].try_into().unwrap());
            out.push((id, x, y));
        }
        Ok(out)
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}
