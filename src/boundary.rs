// World bounds and the per-particle boundary constraint (spec.md §4.8).

use crate::particle::{BoundaryPolicy, Particle};
use crate::vector::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self { left: -10.0, right: 10.0, top: 10.0, bottom: -10.0 }
    }
}

impl WorldBounds {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= self.left && pos.x <= self.right && pos.y >= self.bottom && pos.y <= self.top
    }
}

const SLEEP_THRESHOLD: f32 = 0.02;
/// Fraction of speed shed on wall contact for SPH-integrated particles,
/// keeping fluid from sliding indefinitely along a boundary.
const FLUID_WALL_DAMPING: f32 = 0.2;

/// Applies one particle's boundary policy in place. `radius` is the
/// particle's bounding radius, used to keep the full extent inside bounds
/// rather than just the centre point. `wall_restitution` is the process-wide
/// tunable (spec.md §6), combined multiplicatively with the particle's own
/// restitution on bounce.
pub fn apply(particle: &mut Particle, bounds: &WorldBounds, radius: f32, wall_restitution: f32) {
    let policy = particle.components.boundary.unwrap_or_default();
    match policy {
        BoundaryPolicy::LoopWrap => wrap(particle, bounds),
        BoundaryPolicy::BounceAndClamp => bounce_and_clamp(particle, bounds, radius, wall_restitution),
    }
}

fn wrap(particle: &mut Particle, bounds: &WorldBounds) {
    let width = bounds.width();
    let height = bounds.height();
    if width <= 0.0 || height <= 0.0 {
        return;
    }
    if particle.position.x < bounds.left {
        particle.position.x += width;
    } else if particle.position.x > bounds.right {
        particle.position.x -= width;
    }
    if particle.position.y < bounds.bottom {
        particle.position.y += height;
    } else if particle.position.y > bounds.top {
        particle.position.y -= height;
    }
}

fn bounce_and_clamp(particle: &mut Particle, bounds: &WorldBounds, radius: f32, wall_restitution: f32) {
    let is_fluid = particle
        .components
        .collision
        .map(|c| c.is_fluid)
        .unwrap_or(false);
    let restitution = particle.components.collision.map(|c| c.restitution).unwrap_or(0.3);

    // Snap inside by half-extent plus a small recovery margin so a particle
    // doesn't immediately re-trigger the same boundary next tick (spec.md
    // §4.8).
    let recovery = radius * if is_fluid { 0.15 } else { 0.08 };
    let min_x = bounds.left + radius + recovery;
    let max_x = bounds.right - radius - recovery;
    let min_y = bounds.bottom + radius + recovery;
    let max_y = bounds.top - radius - recovery;

    if particle.position.x < min_x {
        particle.position.x = min_x;
        reflect_axis(&mut particle.velocity.x, restitution, wall_restitution);
    } else if particle.position.x > max_x {
        particle.position.x = max_x;
        reflect_axis(&mut particle.velocity.x, restitution, wall_restitution);
    }

    if particle.position.y < min_y {
        particle.position.y = min_y;
        reflect_axis(&mut particle.velocity.y, restitution, wall_restitution);
        if let Some(collision) = particle.components.collision.as_mut() {
            collision.grounded = true;
        }
    } else if particle.position.y > max_y {
        particle.position.y = max_y;
        reflect_axis(&mut particle.velocity.y, restitution, wall_restitution);
    }

    if is_fluid {
        particle.velocity = particle.velocity.scale(1.0 - FLUID_WALL_DAMPING);
    }
}

/// `v <- -v * eWall * eBody` (spec.md §4.8), collapsing to a sleep when the
/// post-reflection speed would be negligible.
fn reflect_axis(component: &mut f32, restitution: f32, wall_restitution: f32) {
    if component.abs() < SLEEP_THRESHOLD {
        *component = 0.0;
    } else {
        *component = -*component * restitution * wall_restitution;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::{ComponentBag, CollisionParams, ParticleId, Shape, Tint};

    fn particle(pos: Vec2, vel: Vec2, policy: BoundaryPolicy, is_fluid: bool) -> Particle {
        Particle {
            id: ParticleId(0),
            position: pos,
            velocity: vel,
            angular_velocity: 0.0,
            orientation: 0.0,
            mass: 1.0,
            shape: Shape::Circle { radius: 0.1 },
            tint: Tint::default(),
            components: ComponentBag {
                collision: Some(CollisionParams { is_fluid, restitution: 0.5, ..Default::default() }),
                boundary: Some(policy),
                ..Default::default()
            },
        }
    }

    #[test]
    fn wrap_moves_particle_to_opposite_edge() {
        let bounds = WorldBounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 };
        let mut p = particle(Vec2::new(-1.1, 0.0), Vec2::new(-1.0, 0.0), BoundaryPolicy::LoopWrap, false);
        apply(&mut p, &bounds, 0.1, 1.0);
        assert!(p.position.x > 0.0);
    }

    #[test]
    fn bounce_reflects_velocity_with_restitution() {
        let bounds = WorldBounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 };
        let mut p = particle(Vec2::new(-1.0, 0.0), Vec2::new(-2.0, 0.0), BoundaryPolicy::BounceAndClamp, false);
        apply(&mut p, &bounds, 0.1, 1.0);
        assert!(p.velocity.x > 0.0);
        assert!((p.velocity.x - 1.0).abs() < 1e-5);
        assert!(p.position.x >= -0.9 - 1e-5);
    }

    #[test]
    fn wall_restitution_scales_bounce_alongside_body_restitution() {
        let bounds = WorldBounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 };
        let mut p = particle(Vec2::new(-1.0, 0.0), Vec2::new(-2.0, 0.0), BoundaryPolicy::BounceAndClamp, false);
        apply(&mut p, &bounds, 0.1, 0.5);
        assert!((p.velocity.x - 0.5).abs() < 1e-5, "expected restitution(0.5) * wall_restitution(0.5) * 2.0");
    }

    #[test]
    fn slow_bounce_sleeps_instead_of_reflecting() {
        let bounds = WorldBounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 };
        let mut p = particle(Vec2::new(-1.0, 0.0), Vec2::new(-0.005, 0.0), BoundaryPolicy::BounceAndClamp, false);
        apply(&mut p, &bounds, 0.1, 1.0);
        assert_eq!(p.velocity.x, 0.0);
    }

    #[test]
    fn floor_contact_sets_grounded() {
        let bounds = WorldBounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 };
        let mut p = particle(Vec2::new(0.0, -1.0), Vec2::new(0.0, -1.0), BoundaryPolicy::BounceAndClamp, false);
        apply(&mut p, &bounds, 0.1, 1.0);
        assert!(p.components.collision.unwrap().grounded);
    }

    #[test]
    fn fluid_particles_shed_velocity_on_wall_contact() {
        let bounds = WorldBounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 };
        let mut p = particle(Vec2::new(-1.0, 0.0), Vec2::new(-2.0, 0.0), BoundaryPolicy::BounceAndClamp, true);
        apply(&mut p, &bounds, 0.1, 1.0);
        assert!(p.velocity.x < 1.0, "fluid wall contact should shed some velocity");
    }

    #[test]
    fn recovery_margin_pushes_position_past_bare_half_extent() {
        let bounds = WorldBounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 };
        let mut p = particle(Vec2::new(-1.0, 0.0), Vec2::new(-2.0, 0.0), BoundaryPolicy::BounceAndClamp, false);
        apply(&mut p, &bounds, 0.1, 1.0);
        assert!(p.position.x > -0.9 + 1e-4, "expected a recovery push beyond bounds+radius");
    }
}
