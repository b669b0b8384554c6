//! 2D vector/rotation primitives and signed-distance functions for the three
//! static collider shapes.
//!
//! Mirrors the teacher's `Scalar`/`Vector` type-alias convention so the rest
//! of the crate can be made generic over precision later without touching
//! call sites.

use glam::Vec2;

/// Floating-point precision used throughout the core. Single precision by
/// policy (spec §4.16).
pub type Scalar = f32;

/// 2D vector type used throughout the core.
pub type Vector = Vec2;

/// A small epsilon used to guard denominators that could otherwise divide by
/// (near) zero, e.g. degenerate rod/angle edges or coincident capsule axes.
pub const EPSILON: Scalar = 1e-8;

/// A 2D rotation represented as a unit `(cos, sin)` pair.
///
/// Storing the pair instead of a bare angle avoids repeated trig calls when
/// composing many rotations in a substep loop, and matches how the teacher
/// represents `Rotation` internally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub cos: Scalar,
    pub sin: Scalar,
}

impl Rotation {
    pub const IDENTITY: Self = Self { cos: 1.0, sin: 0.0 };

    #[must_use]
    pub fn from_radians(angle: Scalar) -> Self {
        Self {
            cos: angle.cos(),
            sin: angle.sin(),
        }
    }

    #[must_use]
    pub fn as_radians(self) -> Scalar {
        self.sin.atan2(self.cos)
    }

    #[must_use]
    pub fn rotate(self, v: Vector) -> Vector {
        Vector::new(
            self.cos * v.x - self.sin * v.y,
            self.sin * v.x + self.cos * v.y,
        )
    }
}

/// Rotates a vector by `angle` radians (CCW, right-handed).
#[must_use]
pub fn rotate(v: Vector, angle: Scalar) -> Vector {
    Rotation::from_radians(angle).rotate(v)
}

/// Perpendicular vector, rotated 90 degrees CCW: `(x, y) -> (-y, x)`.
#[must_use]
pub fn perp(v: Vector) -> Vector {
    Vector::new(-v.y, v.x)
}

/// 2D scalar cross product `u.x*v.y - u.y*v.x`.
#[must_use]
pub fn cross(u: Vector, v: Vector) -> Scalar {
    u.x * v.y - u.y * v.x
}

/// Wraps an angle into `(-pi, pi]`.
#[must_use]
pub fn wrap_angle(angle: Scalar) -> Scalar {
    use core::f32::consts::PI;
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

/// Signed distance + outward normal at a query point, relative to a static
/// collider's surface. `phi < 0` means the query point is inside/overlapping.
#[derive(Debug, Clone, Copy)]
pub struct SdfResult {
    pub phi: Scalar,
    pub normal: Vector,
}

/// The three static collider shapes supported by the core (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum StaticCollider {
    Circle {
        center: Vector,
        radius: Scalar,
    },
    Capsule {
        center: Vector,
        axis: Vector,
        half_length: Scalar,
        radius: Scalar,
    },
    Obb {
        center: Vector,
        x_axis: Vector,
        half_x: Scalar,
        half_y: Scalar,
    },
}

impl StaticCollider {
    /// Signed distance from a query point (of the given probe radius) to this
    /// collider's surface, with outward normal. `probe_radius` is the radius
    /// of the querying circle/particle/geom, folded into `phi` per spec §4.2.
    #[must_use]
    pub fn sdf(&self, point: Vector, probe_radius: Scalar) -> SdfResult {
        match *self {
            StaticCollider::Circle { center, radius } => circle_sdf(point, center, radius, probe_radius),
            StaticCollider::Capsule {
                center,
                axis,
                half_length,
                radius,
            } => capsule_sdf(point, center, axis, half_length, radius, probe_radius),
            StaticCollider::Obb {
                center,
                x_axis,
                half_x,
                half_y,
            } => obb_sdf(point, center, x_axis, half_x, half_y, probe_radius),
        }
    }
}

#[must_use]
pub fn circle_sdf(point: Vector, center: Vector, radius: Scalar, probe_radius: Scalar) -> SdfResult {
    let delta = point - center;
    let dist = delta.length();
    let normal = if dist > EPSILON {
        delta / dist
    } else {
        Vector::new(1.0, 0.0)
    };
    SdfResult {
        phi: dist - radius - probe_radius,
        normal,
    }
}

#[must_use]
pub fn capsule_sdf(
    point: Vector,
    center: Vector,
    axis: Vector,
    half_length: Scalar,
    radius: Scalar,
    probe_radius: Scalar,
) -> SdfResult {
    let axis = if axis.length_squared() > EPSILON {
        axis.normalize()
    } else {
        Vector::new(1.0, 0.0)
    };
    let local = point - center;
    let t = local.dot(axis).clamp(-half_length, half_length);
    let closest = center + axis * t;
    let delta = point - closest;
    let dist = delta.length();
    let normal = if dist > EPSILON {
        delta / dist
    } else {
        // Coincident with the axis: fall back to the perpendicular of the axis.
        perp(axis)
    };
    SdfResult {
        phi: dist - radius - probe_radius,
        normal,
    }
}

#[must_use]
pub fn obb_sdf(
    point: Vector,
    center: Vector,
    x_axis: Vector,
    half_x: Scalar,
    half_y: Scalar,
    probe_radius: Scalar,
) -> SdfResult {
    let x_axis = if x_axis.length_squared() > EPSILON {
        x_axis.normalize()
    } else {
        Vector::new(1.0, 0.0)
    };
    let y_axis = perp(x_axis);

    let delta = point - center;
    let local = Vector::new(delta.dot(x_axis), delta.dot(y_axis));
    let clamped = Vector::new(
        local.x.clamp(-half_x, half_x),
        local.y.clamp(-half_y, half_y),
    );

    let outside = local != clamped;
    if outside {
        let residual = local - clamped;
        let dist = residual.length();
        let local_normal = if dist > EPSILON {
            residual / dist
        } else {
            Vector::new(1.0, 0.0)
        };
        let normal = x_axis * local_normal.x + y_axis * local_normal.y;
        SdfResult {
            phi: dist - probe_radius,
            normal,
        }
    } else {
        let dist_to_right = half_x - local.x;
        let dist_to_left = half_x + local.x;
        let dist_to_top = half_y - local.y;
        let dist_to_bottom = half_y + local.y;

        let (min_dist, local_normal) = [
            (dist_to_right, Vector::new(1.0, 0.0)),
            (dist_to_left, Vector::new(-1.0, 0.0)),
            (dist_to_top, Vector::new(0.0, 1.0)),
            (dist_to_bottom, Vector::new(0.0, -1.0)),
        ]
        .into_iter()
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
        .unwrap();

        let normal = x_axis * local_normal.x + y_axis * local_normal.y;
        SdfResult {
            phi: -min_dist - probe_radius,
            normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn circle_sdf_outside() {
        let result = circle_sdf(Vector::new(3.0, 0.0), Vector::ZERO, 1.0, 0.0);
        assert_relative_eq!(result.phi, 2.0, epsilon = 1e-6);
        assert_relative_eq!(result.normal, Vector::new(1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn obb_sdf_inside_picks_nearest_face() {
        let result = obb_sdf(
            Vector::new(0.0, 0.4),
            Vector::ZERO,
            Vector::new(1.0, 0.0),
            1.0,
            0.5,
            0.0,
        );
        assert!(result.phi < 0.0);
        assert_relative_eq!(result.normal, Vector::new(0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn wrap_angle_bounds() {
        use core::f32::consts::PI;
        assert_relative_eq!(wrap_angle(3.0 * PI), PI, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(-3.0 * PI), PI, epsilon = 1e-5);
    }
}
