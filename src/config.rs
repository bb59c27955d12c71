// Presets and the process-wide mutable tunables (spec.md §6).
//
// Presets are data (loaded via the `config` crate, same as the teacher's
// settings layer) rather than code, so new scenarios don't need a recompile.
// The three global tunables are passed by reference into the scheduler
// rather than living as thread-local/global statics (spec.md §9
// re-architecture note).

use crate::error::{PhysicsError, Result};
use crate::particle::{BoundaryPolicy, CollisionParams, ComponentBag, DynamicsParams, GravityParams, Particle, Shape, Tint};
use crate::vector::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MaterialKind {
    Solid,
    Fluid,
    Granular,
}

impl Default for MaterialKind {
    fn default() -> Self {
        MaterialKind::Solid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompositionEntry {
    pub material: MaterialKind,
    pub count: u32,
    pub mass: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpawnRegion {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub spacing: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Preset {
    pub name: String,
    pub composition: Vec<CompositionEntry>,
    pub region: SpawnRegion,
}

/// Interleaves a preset's composition entries into a flat spawn list, one
/// round per entry rather than exhausting each entry before moving to the
/// next, so mixed-material presets come out visually interleaved (spec.md
/// §6 spawn ordering).
pub struct Spawner;

impl Spawner {
    pub fn build(preset: &Preset) -> Vec<Particle> {
        let mut remaining: Vec<u32> = preset.composition.iter().map(|e| e.count).collect();
        let mut out = Vec::new();
        let region = preset.region;
        let spacing = region.spacing.max(1e-3);
        let columns = ((region.right - region.left) / spacing).floor().max(1.0) as u32;
        let mut slot = 0u32;

        loop {
            let mut any_left = false;
            for (entry_index, entry) in preset.composition.iter().enumerate() {
                if remaining[entry_index] == 0 {
                    continue;
                }
                any_left = true;
                remaining[entry_index] -= 1;

                let col = (slot % columns) as f32;
                let row = (slot / columns) as f32;
                let position = Vec2::new(region.left + col * spacing, region.top - row * spacing);
                out.push(particle_for(entry, position));
                slot += 1;
            }
            if !any_left {
                break;
            }
        }
        out
    }
}

fn particle_for(entry: &CompositionEntry, position: Vec2) -> Particle {
    let is_fluid = matches!(entry.material, MaterialKind::Fluid);
    let is_sph = matches!(entry.material, MaterialKind::Fluid | MaterialKind::Granular);

    Particle {
        id: crate::particle::ParticleId(0),
        position,
        velocity: Vec2::ZERO,
        angular_velocity: 0.0,
        orientation: 0.0,
        mass: entry.mass,
        shape: Shape::Circle { radius: entry.radius },
        tint: Tint::default(),
        components: ComponentBag {
            gravity: Some(GravityParams::default()),
            collision: Some(CollisionParams {
                is_fluid,
                sph_integrated: is_sph,
                ..Default::default()
            }),
            dynamics: Some(DynamicsParams { sph_solver: is_sph, pressure_radius: entry.radius, ..Default::default() }),
            boundary: Some(BoundaryPolicy::BounceAndClamp),
        },
    }
}

/// Process-wide mutable tunables (spec.md §6). Held by the scheduler and
/// passed by reference into each step rather than as global statics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    pub gravity_constant: f32,
    pub air_resistance: f32,
    pub wall_restitution: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { gravity_constant: 9.81, air_resistance: 0.0, wall_restitution: 0.7 }
    }
}

impl SimConfig {
    pub fn set_gravity(&mut self, value: f32) -> Result<()> {
        if !value.is_finite() || value < 0.0 || value > 50.0 {
            return Err(PhysicsError::ConfigurationError(format!(
                "gravity constant must be in 0..=50, got {value}"
            )));
        }
        self.gravity_constant = value;
        Ok(())
    }

    pub fn set_air_resistance(&mut self, value: f32) -> Result<()> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(PhysicsError::ConfigurationError(format!(
                "air resistance must be in 0..=1, got {value}"
            )));
        }
        self.air_resistance = value;
        Ok(())
    }

    pub fn set_wall_restitution(&mut self, value: f32) -> Result<()> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(PhysicsError::ConfigurationError(format!(
                "wall restitution must be in 0..=1, got {value}"
            )));
        }
        self.wall_restitution = value;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Loads presets from a config file (TOML/YAML/JSON, resolved by the
/// `config` crate's file-extension sniffing).
pub fn load_presets(path: &str) -> Result<Vec<Preset>> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path))
        .build()
        .map_err(|e| PhysicsError::ConfigurationError(format!("failed to load presets from {path}: {e}")))?;

    settings
        .try_deserialize::<Vec<Preset>>()
        .map_err(|e| PhysicsError::ConfigurationError(format!("failed to parse presets: {e}")))
}
