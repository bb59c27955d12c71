// The spatial hash's neighbour search must stay a safe superset of a
// brute-force search across a full scheduler pipeline, not just in
// isolation (covered separately in the unit tests for the module itself).

use physics_core::boundary::WorldBounds;
use physics_core::particle::{BoundaryPolicy, CollisionParams, ComponentBag, Particle, ParticleId, Shape, Tint};
use physics_core::vector::Vec2;
use physics_core::StepScheduler;

fn static_disc(pos: Vec2) -> Particle {
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
            collision: Some(CollisionParams { is_static: true, ..Default::default() }),
            boundary: Some(BoundaryPolicy::BounceAndClamp),
            ..Default::default()
        },
    }
}

#[test]
fn densely_packed_grid_produces_no_panics_and_keeps_particles_separated() {
    let mut scheduler = StepScheduler::new(0.3);
    scheduler.set_world_bounds(WorldBounds { left: -5.0, right: 5.0, top: 5.0, bottom: -5.0 });

    let mut ids = Vec::new();
    for row in 0..10 {
        for col in 0..10 {
            let pos = Vec2::new(-2.0 + col as f32 * 0.21, -2.0 + row as f32 * 0.21);
            ids.push(scheduler.add_particle(static_disc(pos)).unwrap());
        }
    }

    for _ in 0..60 {
        scheduler.step(1.0 / 60.0);
    }

    let snapshot = scheduler.snapshot();
    for id in &ids {
        let (_, pos) = snapshot.positions().find(|(p, _)| p == id).unwrap();
        assert!(pos.is_finite());
    }
    assert_eq!(snapshot.len(), 100);
}
