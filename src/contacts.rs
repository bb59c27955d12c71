// Contact generation: circle-circle closed form and polygon/mixed SAT
// (spec.md §4.6).

use crate::particle::{Particle, Shape};
use crate::vector::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub normal: Vec2,
    pub penetration: f32,
    pub point: Vec2,
}

/// Tries to build a contact between `a` and `b`. Returns `None` when the
/// shapes don't overlap. The returned normal always points from `a` toward
/// `b` (spec.md §4.6 convention).
pub fn generate(a: &Particle, b: &Particle) -> Option<Contact> {
    match (&a.shape, &b.shape) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => circle_circle(a, *ra, b, *rb),
        _ => sat(a, b),
    }
}

fn circle_circle(a: &Particle, ra: f32, b: &Particle, rb: f32) -> Option<Contact> {
    let delta = b.position - a.position;
    let dist = delta.length();
    let combined = ra + rb;
    if dist >= combined {
        return None;
    }
    let (normal, ok) = delta.safe_normalize(1e-8);
    let normal = if ok {
        normal
    } else {
        // Perfectly coincident centres: derive a separation axis from the
        // dominant component of the relative velocity, falling back to +Y
        // when that's also degenerate (spec.md §4.6).
        dominant_axis(b.velocity - a.velocity)
    };
    let penetration = combined - dist;
    let point = a.position + normal.scale(ra - penetration * 0.5);
    Some(Contact { normal, penetration, point })
}

/// Dominant axis of a relative-velocity vector, signed to point along that
/// velocity; falls back to +Y when the vector itself is degenerate.
fn dominant_axis(rel_vel: Vec2) -> Vec2 {
    if rel_vel.x.abs() < 1e-8 && rel_vel.y.abs() < 1e-8 {
        return Vec2::new(0.0, 1.0);
    }
    if rel_vel.x.abs() >= rel_vel.y.abs() {
        Vec2::new(rel_vel.x.signum(), 0.0)
    } else {
        Vec2::new(0.0, rel_vel.y.signum())
    }
}

/// Axis candidates for SAT: a circle contributes the axis from its centre to
/// the nearest polygon vertex, a polygon contributes its edge normals.
fn axes_for(shape: &Particle, other_vertices: Option<&[Vec2]>) -> Vec<Vec2> {
    match &shape.shape {
        Shape::Circle { .. } => {
            let Some(vertices) = other_vertices else { return Vec::new() };
            let nearest = vertices
                .iter()
                .copied()
                .min_by(|v1, v2| {
                    let d1 = (*v1 - shape.position).length_sq();
                    let d2 = (*v2 - shape.position).length_sq();
                    d1.partial_cmp(&d2).unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(shape.position);
            vec![nearest - shape.position]
        }
        Shape::Polygon { vertices } => {
            let n = vertices.len();
            let (s, c) = shape.orientation.sin_cos();
            (0..n)
                .map(|i| {
                    let p0 = vertices[i];
                    let p1 = vertices[(i + 1) % n];
                    let edge = rotate(p1, s, c) - rotate(p0, s, c);
                    edge.perp()
                })
                .collect()
        }
    }
}

fn rotate(v: Vec2, s: f32, c: f32) -> Vec2 {
    Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

fn world_poly_vertices(p: &Particle) -> Option<Vec<Vec2>> {
    p.world_vertices()
}

fn project(vertices: &[Vec2], axis: Vec2) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for v in vertices {
        let proj = v.dot(axis);
        min = min.min(proj);
        max = max.max(proj);
    }
    (min, max)
}

fn project_circle(centre: Vec2, radius: f32, axis: Vec2) -> (f32, f32) {
    let c = centre.dot(axis);
    (c - radius, c + radius)
}

/// Dedups near-parallel axes (dot > 0.9995, spec.md §4.6) so two shapes with
/// shared or near-shared edge orientations don't get tested twice.
fn dedup_axes(mut axes: Vec<Vec2>) -> Vec<Vec2> {
    let mut out: Vec<Vec2> = Vec::with_capacity(axes.len());
    axes.retain(|a| a.length_sq() > 1e-12);
    'outer: for axis in axes {
        let (unit, ok) = axis.safe_normalize(1e-8);
        if !ok {
            continue;
        }
        for existing in &out {
            if unit.dot(*existing).abs() > 0.9995 {
                continue 'outer;
            }
        }
        out.push(unit);
    }
    out
}

fn sat(a: &Particle, b: &Particle) -> Option<Contact> {
    let a_verts = world_poly_vertices(a);
    let b_verts = world_poly_vertices(b);

    let mut axes = Vec::new();
    axes.extend(axes_for(a, b_verts.as_deref()));
    axes.extend(axes_for(b, a_verts.as_deref()));
    let axes = dedup_axes(axes);
    if axes.is_empty() {
        return None;
    }

    let mut min_overlap = f32::INFINITY;
    let mut best_axis = Vec2::new(1.0, 0.0);

    for axis in &axes {
        let (a_min, a_max) = match &a_verts {
            Some(v) => project(v, *axis),
            None => project_circle(a.position, a.radius_or_bounding(), *axis),
        };
        let (b_min, b_max) = match &b_verts {
            Some(v) => project(v, *axis),
            None => project_circle(b.position, b.radius_or_bounding(), *axis),
        };

        let overlap = a_max.min(b_max) - a_min.max(b_min);
        if overlap <= 0.0 {
            return None;
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            best_axis = *axis;
        }
    }

    // Canonicalise the separation axis to point from a toward b (spec.md
    // §4.6 normal convention), independent of which shape contributed it.
    let centre_delta = b.position - a.position;
    if best_axis.dot(centre_delta) < 0.0 {
        best_axis = -best_axis;
    }

    let point = midpoint_estimate(a, &a_verts, b, &b_verts);

    Some(Contact { normal: best_axis, penetration: min_overlap, point })
}

fn midpoint_estimate(a: &Particle, a_verts: &Option<Vec<Vec2>>, b: &Particle, b_verts: &Option<Vec<Vec2>>) -> Vec2 {
    let a_point = a_verts
        .as_ref()
        .map(|v| deepest_vertex(v, b.position))
        .unwrap_or(a.position);
    let b_point = b_verts
        .as_ref()
        .map(|v| deepest_vertex(v, a.position))
        .unwrap_or(b.position);
    Vec2::new((a_point.x + b_point.x) * 0.5, (a_point.y + b_point.y) * 0.5)
}

fn deepest_vertex(vertices: &[Vec2], toward: Vec2) -> Vec2 {
    vertices
        .iter()
        .copied()
        .min_by(|v1, v2| {
            let d1 = (*v1 - toward).length_sq();
            let d2 = (*v2 - toward).length_sq();
            d1.partial_cmp(&d2).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(toward)
}
