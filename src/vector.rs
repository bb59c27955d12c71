// 2D vector arithmetic and SPH smoothing kernels.
//
// Kept deliberately small and hand-rolled rather than pulled from a 3D math
// crate: the solver needs a handful of finite-checked, failure-safe helpers
// (`safe_normalize`, `safe_mass`, `clamp_length`) that general-purpose vector
// crates don't provide, and the rest of the pipeline never touches a third
// dimension.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn splat(v: f32) -> Self {
        Self { x: v, y: v }
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn length_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn scale(self, s: f32) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }

    pub fn perp(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns (normalized, true) or (Vec2::ZERO, false) if the magnitude is
    /// below `eps`. Callers must check the flag rather than assume a unit
    /// vector came back.
    pub fn safe_normalize(self, eps: f32) -> (Vec2, bool) {
        let len = self.length();
        if len < eps {
            (Vec2::ZERO, false)
        } else {
            (self.scale(1.0 / len), true)
        }
    }

    pub fn clamp_length(self, max: f32) -> Vec2 {
        let len = self.length();
        if len > max && len > 0.0 {
            self.scale(max / len)
        } else {
            self
        }
    }

    pub fn project_onto(self, axis: Vec2) -> Vec2 {
        let (unit, ok) = axis.safe_normalize(1e-12);
        if !ok {
            return Vec2::ZERO;
        }
        unit.scale(self.dot(unit))
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        self.scale(rhs)
    }
}

/// Returns `mass` if it is strictly positive; otherwise `fallback`, per
/// spec.md §3: "a non-positive mass signals 'effectively infinite'".
pub fn safe_mass(mass: f32, fallback: f32) -> f32 {
    if mass > 0.0 {
        mass
    } else {
        fallback
    }
}

/// Inverse mass used throughout the resolver: zero for static/massless
/// bodies, `1/mass` otherwise.
pub fn inverse_mass(mass: f32, is_static: bool) -> f32 {
    if is_static || mass <= 0.0 {
        0.0
    } else {
        1.0 / mass
    }
}

/// Poly6 smoothing kernel. Returns 0 at and beyond r = h (C0 continuity).
/// Implementers must not substitute other normalisation constants (spec.md
/// §4.1) -- the rest of the solver's pressure/force balance assumes these.
pub fn poly6(r: f32, h: f32) -> f32 {
    if r < 0.0 || r >= h || h <= 0.0 {
        return 0.0;
    }
    let h2 = h * h;
    let r2 = r * r;
    let term = h2 - r2;
    (4.0 / (std::f32::consts::PI * h2 * h2 * h2 * h2)) * term * term * term
}

/// Gradient of the Spiky kernel, oriented along `dir` (should point from the
/// sampled particle toward the source of the gradient; direction is the
/// caller's responsibility). Returns zero if r is outside (0, h) or `dir` is
/// degenerate.
pub fn spiky_gradient(r: f32, h: f32, dir: Vec2) -> Vec2 {
    if r <= 0.0 || r >= h || h <= 0.0 {
        return Vec2::ZERO;
    }
    let (unit, ok) = dir.safe_normalize(1e-8);
    if !ok {
        return Vec2::ZERO;
    }
    let h5 = h.powi(5);
    let coeff = (-10.0 / (std::f32::consts::PI * h5)) * (h - r) * (h - r);
    unit.scale(coeff)
}

/// Viscosity kernel Laplacian.
pub fn viscosity_laplacian(r: f32, h: f32) -> f32 {
    if r < 0.0 || r >= h || h <= 0.0 {
        return 0.0;
    }
    let h5 = h.powi(5);
    (10.0 / (std::f32::consts::PI * h5)) * (h - r)
}
