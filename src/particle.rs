// Particle records and the per-particle component bag (spec.md §3).
//
// Each particle carries at most one of each named component. Rather than a
// runtime-typed attribute dictionary (the pattern spec.md §9 flags for
// re-architecture), components live as plain `Option<T>` fields on a small
// struct-of-arrays-friendly bag -- O(1) access, no type metadata.

use crate::error::{PhysicsError, Result};
use crate::vector::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    /// Closed, ordered ring of local-frame vertices. Must be simple and
    /// counter-clockwise (spec.md §3 invariant); validated at construction.
    Polygon { vertices: Vec<PolyVertex> },
}

/// A single polygon vertex; kept as its own type (rather than bare `Vec2`)
/// so `Vec<PolyVertex>` reads clearly as "the local-frame ring" at call
/// sites.
pub type PolyVertex = Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tint {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Tint {
    fn default() -> Self {
        Tint { r: 1.0, g: 1.0, b: 1.0, a: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GravityParams {
    pub acceleration: Vec2,
    pub terminal_velocity: f32,
    pub drag_coefficient: f32,
}

impl Default for GravityParams {
    fn default() -> Self {
        Self {
            acceleration: Vec2::new(0.0, -9.81),
            terminal_velocity: f32::INFINITY,
            drag_coefficient: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionParams {
    pub restitution: f32,
    pub friction: f32,
    pub is_static: bool,
    pub is_fluid: bool,
    pub sph_integrated: bool,
    /// Output flag; cleared at the start of each contact pass (spec.md §3).
    pub grounded: bool,
}

impl Default for CollisionParams {
    fn default() -> Self {
        Self {
            restitution: 0.3,
            friction: 0.5,
            is_static: false,
            is_fluid: false,
            sph_integrated: false,
            grounded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsParams {
    pub max_force: f32,
    pub velocity_damping: f32,
    pub pressure_radius: f32,
    pub sph_solver: bool,
}

impl Default for DynamicsParams {
    fn default() -> Self {
        Self {
            max_force: f32::INFINITY,
            velocity_damping: 0.0,
            pressure_radius: 0.02,
            sph_solver: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    LoopWrap,
    BounceAndClamp,
}

impl Default for BoundaryPolicy {
    fn default() -> Self {
        BoundaryPolicy::BounceAndClamp
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComponentBag {
    pub gravity: Option<GravityParams>,
    pub collision: Option<CollisionParams>,
    pub dynamics: Option<DynamicsParams>,
    pub boundary: Option<BoundaryPolicy>,
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub id: ParticleId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub orientation: f32,
    pub mass: f32,
    pub shape: Shape,
    pub tint: Tint,
    pub components: ComponentBag,
}

impl Particle {
    pub fn half_extent_along(&self, axis: Vec2) -> f32 {
        match &self.shape {
            Shape::Circle { radius } => *radius,
            Shape::Polygon { vertices } => {
                let (unit, ok) = axis.safe_normalize(1e-12);
                if !ok {
                    return 0.0;
                }
                vertices
                    .iter()
                    .map(|v| v.dot(unit).abs())
                    .fold(0.0, f32::max)
            }
        }
    }

    pub fn radius_or_bounding(&self) -> f32 {
        match &self.shape {
            Shape::Circle { radius } => *radius,
            Shape::Polygon { vertices } => vertices
                .iter()
                .map(|v| v.length())
                .fold(0.0, f32::max),
        }
    }

    /// World-space vertex ring for a polygon (rotated by `orientation`,
    /// translated by `position`). Returns `None` for circles.
    pub fn world_vertices(&self) -> Option<Vec<Vec2>> {
        match &self.shape {
            Shape::Circle { .. } => None,
            Shape::Polygon { vertices } => {
                let (s, c) = self.orientation.sin_cos();
                Some(
                    vertices
                        .iter()
                        .map(|v| {
                            let rotated = Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c);
                            rotated + self.position
                        })
                        .collect(),
                )
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.angular_velocity.is_finite()
    }
}

/// Validates shape invariants at admission (spec.md §3: "radius > 0 for
/// circles", "polygon vertex rings are simple and counter-clockwise").
pub fn validate_shape(shape: &Shape) -> Result<()> {
    match shape {
        Shape::Circle { radius } => {
            if *radius <= 0.0 || !radius.is_finite() {
                return Err(PhysicsError::ConfigurationError(format!(
                    "circle radius must be positive and finite, got {radius}"
                )));
            }
        }
        Shape::Polygon { vertices } => {
            if vertices.len() < 3 {
                return Err(PhysicsError::ConfigurationError(
                    "polygon must have at least 3 vertices".to_string(),
                ));
            }
            if !vertices.iter().all(|v| v.is_finite()) {
                return Err(PhysicsError::ConfigurationError(
                    "polygon vertices must be finite".to_string(),
                ));
            }
            let area = signed_area(vertices);
            if area.abs() < 1e-12 {
                return Err(PhysicsError::ConfigurationError(
                    "polygon is degenerate (zero area)".to_string(),
                ));
            }
            if area < 0.0 {
                return Err(PhysicsError::ConfigurationError(
                    "polygon vertices must be wound counter-clockwise".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn signed_area(vertices: &[Vec2]) -> f32 {
    let n = vertices.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}
