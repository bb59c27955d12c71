// A single circle dropped above the floor should come to rest inside
// bounds without tunnelling or escaping to infinity.

use physics_core::boundary::WorldBounds;
use physics_core::particle::{BoundaryPolicy, CollisionParams, ComponentBag, GravityParams, Particle, ParticleId, Shape, Tint};
use physics_core::vector::Vec2;
use physics_core::StepScheduler;

fn dropped_circle(height: f32) -> Particle {
    Particle {
        id: ParticleId(0),
        position: Vec2::new(0.0, height),
        velocity: Vec2::ZERO,
        angular_velocity: 0.0,
        orientation: 0.0,
        mass: 1.0,
        shape: Shape::Circle { radius: 0.2 },
        tint: Tint::default(),
        components: ComponentBag {
            gravity: Some(GravityParams::default()),
            collision: Some(CollisionParams { restitution: 0.4, friction: 0.3, ..Default::default() }),
            boundary: Some(BoundaryPolicy::BounceAndClamp),
            ..Default::default()
        },
    }
}

#[test]
fn dropped_circle_settles_above_the_floor_without_escaping_bounds() {
    let mut scheduler = StepScheduler::new(0.5);
    scheduler.set_world_bounds(WorldBounds { left: -5.0, right: 5.0, top: 10.0, bottom: -5.0 });
    let id = scheduler.add_particle(dropped_circle(8.0)).unwrap();

    for _ in 0..1800 {
        scheduler.step(1.0 / 60.0);
    }

    let snapshot = scheduler.snapshot();
    let (_, pos) = snapshot.positions().find(|(pid, _)| *pid == id).unwrap();
    assert!(pos.is_finite());
    assert!(pos.y >= -5.0 - 1e-2, "particle tunnelled through the floor: {pos:?}");
    assert!(pos.y <= 10.0 + 1e-2);
}

// Boundary scenario 1 (spec.md §8): a single circle dropped from the centre
// of a (-1,1,-1,1) box bounces once off the floor and its subsequent apex
// height should match the closed-form restitution-squared prediction.
#[test]
fn bounce_apex_matches_the_closed_form_after_one_ground_contact() {
    let mut scheduler = StepScheduler::new(0.5);
    scheduler.set_world_bounds(WorldBounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 });

    let particle = Particle {
        id: ParticleId(0),
        position: Vec2::new(0.0, 0.0),
        velocity: Vec2::ZERO,
        angular_velocity: 0.0,
        orientation: 0.0,
        mass: 1.0,
        shape: Shape::Circle { radius: 0.02 },
        tint: Tint::default(),
        components: ComponentBag {
            gravity: Some(GravityParams::default()),
            collision: Some(CollisionParams { restitution: 0.8, friction: 0.0, ..Default::default() }),
            boundary: Some(BoundaryPolicy::BounceAndClamp),
            ..Default::default()
        },
    };
    let id = scheduler.add_particle(particle).unwrap();

    let dt = 1.0 / 60.0;
    let mut bounced = false;
    let mut prev_y = 0.0;
    let mut apex = f32::NEG_INFINITY;

    for _ in 0..3000 {
        scheduler.step(dt);
        let snapshot = scheduler.snapshot();
        let (_, pos) = snapshot.positions().find(|(pid, _)| *pid == id).unwrap();

        if !bounced {
            if pos.y > prev_y {
                bounced = true;
            }
        } else if pos.y < prev_y {
            apex = prev_y;
            break;
        }
        prev_y = pos.y;
    }

    assert!(apex.is_finite(), "particle never reached an apex after bouncing");
    let expected = -1.0 + 0.8f32.powi(2) * 0.5;
    assert!((apex - expected).abs() <= 0.02, "apex {apex} deviates from expected {expected}");
}

#[test]
fn loop_wrap_particle_reappears_on_the_opposite_edge() {
    let mut scheduler = StepScheduler::new(0.5);
    scheduler.set_world_bounds(WorldBounds { left: -2.0, right: 2.0, top: 2.0, bottom: -2.0 });
    scheduler.set_gravity(Vec2::ZERO);

    let mut particle = dropped_circle(0.0);
    particle.velocity = Vec2::new(-5.0, 0.0);
    particle.components.boundary = Some(BoundaryPolicy::LoopWrap);
    particle.components.gravity = None;
    let id = scheduler.add_particle(particle).unwrap();

    for _ in 0..30 {
        scheduler.step(1.0 / 60.0);
    }

    let snapshot = scheduler.snapshot();
    let (_, pos) = snapshot.positions().find(|(pid, _)| *pid == id).unwrap();
    assert!(pos.is_finite());
    assert!(pos.x >= -2.0 && pos.x <= 2.0, "wrapped particle should stay within bounds: {pos:?}");
}
