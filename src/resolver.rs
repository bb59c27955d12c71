// Impulse-based collision resolution (spec.md §4.7): positional correction,
// normal impulse with restitution, Coulomb friction, angular response for
// circles, and the grounded-flag side effect used by the SPH "near-floor"
// heuristic and gameplay code alike.

use crate::particle::{CollisionParams, Particle, Shape};
use crate::vector::{inverse_mass, Vec2};

use crate::contacts::Contact;

/// Post-step linear speed cap (spec.md §4.7 "Post-step"), applied after
/// every resolution regardless of branch so a resolver-introduced spike
/// can never itself violate the §8 boundedness invariant.
const MAX_LINEAR_SPEED: f32 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveParams {
    /// Allowed penetration before positional correction kicks in.
    pub slop: f32,
    /// Fraction of slop-reduced penetration corrected per positional-correction step.
    pub positional_correction_factor: f32,
    /// Upper bound on the positional-correction magnitude itself.
    pub positional_correction_cap: f32,
    /// Coefficient on the Baumgarte velocity-bias term in the normal impulse.
    pub velocity_bias_coeff: f32,
    /// Below this closing speed, restitution collapses to zero to kill
    /// microscopic bounce jitter.
    pub restitution_velocity_threshold: f32,
    /// Contact normal y-component magnitude above which the "supported"
    /// particle is marked grounded.
    pub grounded_normal_threshold: f32,
    /// Relative normal speed below which the grounded flag may be set.
    pub grounded_velocity_threshold: f32,
}

impl Default for ResolveParams {
    fn default() -> Self {
        Self {
            slop: 0.001,
            positional_correction_factor: 0.4,
            positional_correction_cap: 0.01,
            velocity_bias_coeff: 0.08,
            restitution_velocity_threshold: 0.2,
            grounded_normal_threshold: 0.7,
            grounded_velocity_threshold: 0.15,
        }
    }
}

fn moment_of_inertia(mass: f32, shape: &Shape) -> f32 {
    match shape {
        Shape::Circle { radius } => 0.5 * mass * radius * radius,
        Shape::Polygon { .. } => f32::INFINITY,
    }
}

/// Resolves one contact in place. `a`'s id must precede `b`'s in whatever
/// caller-side canonical ordering was used to build the contact (only
/// affects which particle is "above" for the grounded flag). `dt` is the
/// tick's timestep, clamped to at least `1e-5` (spec.md §4.7 "Inputs").
pub fn resolve(contact: &Contact, a: &mut Particle, b: &mut Particle, dt: f32, params: &ResolveParams) {
    let a_collision = a.components.collision.unwrap_or_default();
    let b_collision = b.components.collision.unwrap_or_default();

    let inv_mass_a = inverse_mass(a.mass, a_collision.is_static);
    let inv_mass_b = inverse_mass(b.mass, b_collision.is_static);
    let total_inv = inv_mass_a + inv_mass_b;
    if total_inv <= 0.0 {
        return;
    }

    let dt = dt.max(1e-5);
    let normal = contact.normal;
    let fluid_pair = a_collision.is_fluid || b_collision.is_fluid;
    let both_fluid = a_collision.is_fluid && b_collision.is_fluid;

    positional_correction(contact, a, b, inv_mass_a, inv_mass_b, total_inv, fluid_pair, params);

    let rel_vel = b.velocity - a.velocity;
    let vel_along_normal = rel_vel.dot(normal);

    if vel_along_normal <= 0.0 {
        let restitution = if fluid_pair || vel_along_normal.abs() < params.restitution_velocity_threshold {
            0.0
        } else {
            a_collision.restitution.min(b_collision.restitution)
        };

        let bias = if fluid_pair {
            0.0
        } else {
            params.velocity_bias_coeff * (contact.penetration - params.slop).max(0.0) / dt
        };

        let j = ((-(1.0 + restitution) * vel_along_normal) + bias) / total_inv;
        let j = j.max(0.0);
        let impulse = normal.scale(j);
        a.velocity -= impulse.scale(inv_mass_a);
        b.velocity += impulse.scale(inv_mass_b);

        if both_fluid {
            clamp_velocities(a, b);
            return;
        }
        if fluid_pair {
            project_out_closing_velocity(a, b, normal, &a_collision, &b_collision);
            clamp_velocities(a, b);
            return;
        }

        apply_friction(contact, a, b, inv_mass_a, inv_mass_b, total_inv, j, &a_collision, &b_collision);
        apply_angular(contact, a, b, &a_collision, &b_collision, j);
    }

    apply_grounded(contact, a, b, params);
    clamp_velocities(a, b);
}

fn clamp_velocities(a: &mut Particle, b: &mut Particle) {
    a.velocity = a.velocity.clamp_length(MAX_LINEAR_SPEED);
    b.velocity = b.velocity.clamp_length(MAX_LINEAR_SPEED);
}

/// "Project out only the closing component of the fluid participant's
/// velocity along n" (spec.md §4.7) for a mixed fluid/rigid pair.
fn project_out_closing_velocity(
    a: &mut Particle,
    b: &mut Particle,
    normal: Vec2,
    a_collision: &CollisionParams,
    b_collision: &CollisionParams,
) {
    if a_collision.is_fluid {
        let closing = a.velocity.dot(normal);
        if closing > 0.0 {
            a.velocity -= normal.scale(closing);
        }
    }
    if b_collision.is_fluid {
        let closing = -b.velocity.dot(normal);
        if closing > 0.0 {
            b.velocity += normal.scale(closing);
        }
    }
}

fn positional_correction(
    contact: &Contact,
    a: &mut Particle,
    b: &mut Particle,
    inv_mass_a: f32,
    inv_mass_b: f32,
    total_inv: f32,
    fluid_pair: bool,
    params: &ResolveParams,
) {
    let magnitude = if fluid_pair {
        contact.penetration
    } else {
        let reduced = (contact.penetration - params.slop).max(0.0) * params.positional_correction_factor;
        reduced.min(params.positional_correction_cap)
    };
    if magnitude <= 0.0 {
        return;
    }
    let correction = contact.normal.scale(magnitude / total_inv);
    a.position -= correction.scale(inv_mass_a);
    b.position += correction.scale(inv_mass_b);
}

fn apply_friction(
    contact: &Contact,
    a: &mut Particle,
    b: &mut Particle,
    inv_mass_a: f32,
    inv_mass_b: f32,
    total_inv: f32,
    normal_impulse: f32,
    a_collision: &CollisionParams,
    b_collision: &CollisionParams,
) {
    let rel_vel = b.velocity - a.velocity;
    let tangent_component = rel_vel - contact.normal.scale(rel_vel.dot(contact.normal));
    let (tangent, ok) = tangent_component.safe_normalize(1e-8);
    if !ok {
        return;
    }

    let vel_along_tangent = rel_vel.dot(tangent);
    let jt = -vel_along_tangent / total_inv;

    let combined_friction = (a_collision.friction * b_collision.friction).max(0.0).sqrt();
    let max_friction = normal_impulse * combined_friction;
    let jt = jt.clamp(-max_friction, max_friction);

    let friction_impulse = tangent.scale(jt);
    a.velocity -= friction_impulse.scale(inv_mass_a);
    b.velocity += friction_impulse.scale(inv_mass_b);
}

fn apply_angular(
    contact: &Contact,
    a: &mut Particle,
    b: &mut Particle,
    a_collision: &CollisionParams,
    b_collision: &CollisionParams,
    normal_impulse: f32,
) {
    let lever_a = contact.point - a.position;
    let lever_b = contact.point - b.position;
    let tangential_force = contact.normal.perp().scale(normal_impulse * 0.1);

    if !a_collision.is_static {
        if let Shape::Circle { radius } = a.shape {
            let i = moment_of_inertia(a.mass, &Shape::Circle { radius });
            if i.is_finite() && i > 0.0 {
                let torque = cross(lever_a, -tangential_force);
                a.angular_velocity += torque / i;
            }
        }
    }
    if !b_collision.is_static {
        if let Shape::Circle { radius } = b.shape {
            let i = moment_of_inertia(b.mass, &Shape::Circle { radius });
            if i.is_finite() && i > 0.0 {
                let torque = cross(lever_b, tangential_force);
                b.angular_velocity += torque / i;
            }
        }
    }
}

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Sets the grounded flag on the "supported" participant (spec.md §4.7
/// "Post-step") when the contact normal is sufficiently vertical and the
/// relative normal speed has settled, and zeroes any residual positive
/// vertical velocity on that participant.
fn apply_grounded(contact: &Contact, a: &mut Particle, b: &mut Particle, params: &ResolveParams) {
    if contact.normal.y.abs() < params.grounded_normal_threshold {
        return;
    }
    let rel_vel = b.velocity - a.velocity;
    let vn = rel_vel.dot(contact.normal);
    if vn.abs() >= params.grounded_velocity_threshold {
        return;
    }

    if contact.normal.y > 0.0 {
        if let Some(collision) = a.components.collision.as_mut() {
            collision.grounded = true;
        }
        if a.velocity.y > 0.0 {
            a.velocity.y = 0.0;
        }
    } else {
        if let Some(collision) = b.components.collision.as_mut() {
            collision.grounded = true;
        }
        if b.velocity.y > 0.0 {
            b.velocity.y = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::{ComponentBag, ParticleId, Tint};

    fn moving_circle(id: u64, pos: Vec2, vel: Vec2, restitution: f32, friction: f32) -> Particle {
        Particle {
            id: ParticleId(id),
            position: pos,
            velocity: vel,
            angular_velocity: 0.0,
            orientation: 0.0,
            mass: 1.0,
            shape: Shape::Circle { radius: 0.5 },
            tint: Tint::default(),
            components: ComponentBag {
                collision: Some(CollisionParams { restitution, friction, ..Default::default() }),
                ..Default::default()
            },
        }
    }

    #[test]
    fn static_pair_is_left_untouched() {
        let mut a = moving_circle(0, Vec2::new(0.0, 0.0), Vec2::ZERO, 0.5, 0.0);
        let mut b = moving_circle(1, Vec2::new(0.5, 0.0), Vec2::ZERO, 0.5, 0.0);
        a.components.collision.as_mut().unwrap().is_static = true;
        b.components.collision.as_mut().unwrap().is_static = true;

        let contact = Contact { normal: Vec2::new(1.0, 0.0), penetration: 0.5, point: Vec2::ZERO };
        resolve(&contact, &mut a, &mut b, 1.0 / 60.0, &ResolveParams::default());
        assert_eq!(a.velocity, Vec2::ZERO);
        assert_eq!(b.velocity, Vec2::ZERO);
    }

    #[test]
    fn approaching_bodies_separate_after_resolution() {
        let mut a = moving_circle(0, Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), 0.0, 0.0);
        let mut b = moving_circle(1, Vec2::new(0.9, 0.0), Vec2::new(-1.0, 0.0), 0.0, 0.0);
        let contact = Contact { normal: Vec2::new(1.0, 0.0), penetration: 0.1, point: Vec2::new(0.45, 0.0) };

        resolve(&contact, &mut a, &mut b, 1.0 / 60.0, &ResolveParams::default());

        let rel_vel_after = (b.velocity - a.velocity).dot(contact.normal);
        assert!(rel_vel_after >= -1e-5, "bodies should no longer be approaching");
    }

    #[test]
    fn high_restitution_bounces_at_high_closing_speed() {
        let mut a = moving_circle(0, Vec2::new(0.0, 0.0), Vec2::new(5.0, 0.0), 1.0, 0.0);
        let mut b = moving_circle(1, Vec2::new(0.9, 0.0), Vec2::new(-5.0, 0.0), 1.0, 0.0);
        let contact = Contact { normal: Vec2::new(1.0, 0.0), penetration: 0.1, point: Vec2::new(0.45, 0.0) };

        resolve(&contact, &mut a, &mut b, 1.0 / 60.0, &ResolveParams::default());
        assert!(a.velocity.x < 0.0, "a should rebound");
        assert!(b.velocity.x > 0.0, "b should rebound");
    }

    #[test]
    fn low_speed_impacts_do_not_bounce() {
        let mut a = moving_circle(0, Vec2::new(0.0, 0.0), Vec2::new(0.05, 0.0), 1.0, 0.0);
        let mut b = moving_circle(1, Vec2::new(0.9, 0.0), Vec2::ZERO, 1.0, 0.0);
        let contact = Contact { normal: Vec2::new(1.0, 0.0), penetration: 0.1, point: Vec2::new(0.45, 0.0) };

        resolve(&contact, &mut a, &mut b, 1.0 / 60.0, &ResolveParams::default());
        assert!(a.velocity.x <= 1e-5, "restitution should collapse to zero below threshold");
    }

    #[test]
    fn grounded_flag_set_on_the_supported_particle() {
        let mut a = moving_circle(0, Vec2::new(0.0, 1.0), Vec2::ZERO, 0.3, 0.5);
        let mut b = moving_circle(1, Vec2::new(0.0, 0.0), Vec2::ZERO, 0.3, 0.5);
        let contact = Contact { normal: Vec2::new(0.0, -1.0), penetration: 0.05, point: Vec2::new(0.0, 0.5) };

        resolve(&contact, &mut a, &mut b, 1.0 / 60.0, &ResolveParams::default());
        assert!(b.components.collision.unwrap().grounded);
        assert!(!a.components.collision.unwrap().grounded);
    }

    #[test]
    fn restitution_uses_the_weaker_of_the_two_bodies() {
        // e = min(eA, eB), not the average -- a bouncy ball against a dead
        // one should not bounce at all.
        let mut a = moving_circle(0, Vec2::new(0.0, 0.0), Vec2::new(5.0, 0.0), 1.0, 0.0);
        let mut b = moving_circle(1, Vec2::new(0.9, 0.0), Vec2::ZERO, 0.0, 0.0);
        let contact = Contact { normal: Vec2::new(1.0, 0.0), penetration: 0.1, point: Vec2::new(0.45, 0.0) };

        resolve(&contact, &mut a, &mut b, 1.0 / 60.0, &ResolveParams::default());
        // With e=min(1,0)=0 the pair should merely stop, not rebound hard.
        assert!(a.velocity.x >= -1e-4 && a.velocity.x <= 2.6);
    }

    #[test]
    fn fluid_pair_skips_friction_and_angular_and_never_bounces() {
        let mut a = moving_circle(0, Vec2::new(0.0, 0.0), Vec2::new(3.0, 1.0), 1.0, 1.0);
        let mut b = moving_circle(1, Vec2::new(0.9, 0.0), Vec2::new(-3.0, -1.0), 1.0, 1.0);
        a.components.collision.as_mut().unwrap().is_fluid = true;
        b.components.collision.as_mut().unwrap().is_fluid = true;
        let contact = Contact { normal: Vec2::new(1.0, 0.0), penetration: 0.1, point: Vec2::new(0.45, 0.0) };

        resolve(&contact, &mut a, &mut b, 1.0 / 60.0, &ResolveParams::default());
        assert_eq!(a.angular_velocity, 0.0);
        assert_eq!(b.angular_velocity, 0.0);
        let rel_vel_after = (b.velocity - a.velocity).dot(contact.normal);
        assert!(rel_vel_after >= -1e-4, "fluid pair must not bounce");
    }

    #[test]
    fn resolution_never_produces_speeds_above_the_global_cap() {
        let mut a = moving_circle(0, Vec2::new(0.0, 0.0), Vec2::new(500.0, 0.0), 1.0, 0.0);
        let mut b = moving_circle(1, Vec2::new(0.01, 0.0), Vec2::new(-500.0, 0.0), 1.0, 0.0);
        let contact = Contact { normal: Vec2::new(1.0, 0.0), penetration: 0.5, point: Vec2::new(0.005, 0.0) };

        resolve(&contact, &mut a, &mut b, 1.0 / 60.0, &ResolveParams::default());
        assert!(a.velocity.length() <= 15.0 + 1e-3);
        assert!(b.velocity.length() <= 15.0 + 1e-3);
    }
}
