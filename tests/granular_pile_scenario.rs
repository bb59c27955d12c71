// A block of granular particles dropped onto the floor should come to rest
// as a pile rather than spreading out like a fluid or exploding apart.

use physics_core::boundary::WorldBounds;
use physics_core::particle::{BoundaryPolicy, CollisionParams, ComponentBag, DynamicsParams, GravityParams, Particle, ParticleId, Shape, Tint};
use physics_core::vector::Vec2;
use physics_core::StepScheduler;

fn grain(pos: Vec2) -> Particle {
    Particle {
        id: ParticleId(0),
        position: pos,
        velocity: Vec2::ZERO,
        angular_velocity: 0.0,
        orientation: 0.0,
        mass: 0.2,
        shape: Shape::Circle { radius: 0.03 },
        tint: Tint::default(),
        components: ComponentBag {
            gravity: Some(GravityParams::default()),
            collision: Some(CollisionParams { sph_integrated: true, ..Default::default() }),
            dynamics: Some(DynamicsParams { sph_solver: true, pressure_radius: 0.03, ..Default::default() }),
            boundary: Some(BoundaryPolicy::BounceAndClamp),
        },
    }
}

#[test]
fn granular_block_settles_into_a_pile() {
    let mut scheduler = StepScheduler::new(0.1);
    scheduler.set_world_bounds(WorldBounds { left: -2.0, right: 2.0, top: 3.0, bottom: 0.0 });

    let mut ids = Vec::new();
    for row in 0..6 {
        for col in 0..6 {
            let pos = Vec2::new(-0.5 + col as f32 * 0.06, 2.0 + row as f32 * 0.06);
            ids.push(scheduler.add_particle(grain(pos)).unwrap());
        }
    }

    for _ in 0..900 {
        scheduler.step(1.0 / 60.0);
    }

    let snapshot = scheduler.snapshot();
    let mut max_height = f32::NEG_INFINITY;
    for id in &ids {
        let (_, pos) = snapshot.positions().find(|(p, _)| p == id).unwrap();
        assert!(pos.is_finite(), "granular particle escaped to infinity: {pos:?}");
        assert!(pos.y >= 0.0 - 1e-2, "granular particle sank through the floor: {pos:?}");
        max_height = max_height.max(pos.y);
    }

    // A settled pile of 36 grains each ~0.06 apart should be noticeably
    // taller than a single layer, not flattened out like a puddle.
    assert!(max_height > 0.1, "pile collapsed flatter than a single layer: max height {max_height}");
}

// Boundary scenario 5 (spec.md §8): 200 granular particles (friction angle
// 30 deg, no cohesion -- the `grain` defaults) dropped into a confined box
// should settle with a repose slope between 25 and 35 degrees.
#[test]
fn granular_pile_settles_with_a_realistic_repose_slope() {
    let mut scheduler = StepScheduler::new(0.1);
    let floor = -0.4;
    scheduler.set_world_bounds(WorldBounds { left: -1.0, right: 1.0, top: 1.0, bottom: floor });

    let mut ids = Vec::new();
    let columns = 20;
    for i in 0..200u32 {
        let col = (i % columns) as f32;
        let row = (i / columns) as f32;
        let pos = Vec2::new(-0.3 + col * 0.03, 0.39 - row * 0.03);
        ids.push(scheduler.add_particle(grain(pos)).unwrap());
    }

    for _ in 0..1000 {
        scheduler.step(1.0 / 60.0);
    }

    let snapshot = scheduler.snapshot();
    let mut positions = Vec::with_capacity(ids.len());
    for id in &ids {
        let (_, pos) = snapshot.positions().find(|(p, _)| p == id).unwrap();
        assert!(pos.is_finite(), "granular particle escaped to infinity: {pos:?}");
        positions.push(pos);
    }

    let apex = positions.iter().fold(f32::NEG_INFINITY, |m, p| m.max(p.y));
    let apex_height = apex - floor;

    // Footprint half-width measured from the particles resting in a thin
    // band just above the floor -- the base of the heap.
    let base_band = floor + 0.05;
    let half_width = positions
        .iter()
        .filter(|p| p.y <= base_band)
        .map(|p| p.x.abs())
        .fold(0.0_f32, f32::max)
        .max(1e-3);

    let repose_angle = (apex_height / half_width).atan().to_degrees();
    assert!(
        (25.0..=35.0).contains(&repose_angle),
        "repose angle {repose_angle} outside the expected 25-35 degree range (apex height {apex_height}, half-width {half_width})"
    );
}
