//! Pairwise circle collision: time of impact, velocity exchange, separation

use crate::util::vec2::Vec2;

use super::arena::round_small_negative;
use super::body::Body;

/// Smallest non-negative time at which the two circles touch, if they are
/// approaching.
///
/// Substituting linear motion into `|Δp + Δm·t|² = (r₁ + r₂)²` gives
/// `a·t² + b·t + c = 0` with `a = Δm·Δm`, `b = 2·Δp·Δm`,
/// `c = Δp·Δp − (r₁ + r₂)²`. Bodies that are already touching or
/// overlapping and still closing in collide now.
pub fn collision_time(a: &Body, b: &Body) -> Option<f64> {
    let dp = b.position - a.position;
    let dm = b.motion() - a.motion();
    let reach = a.radius + b.radius;

    let qa = dm.length_sq();
    let qb = 2.0 * dp.dot(dm);
    let qc = dp.length_sq() - reach * reach;

    // Separating or moving in parallel
    if qb >= 0.0 || qa <= f64::EPSILON {
        return None;
    }

    if qc <= 0.0 {
        return Some(0.0);
    }

    let discriminant = qb * qb - 4.0 * qa * qc;
    if discriminant < 0.0 || discriminant.is_nan() {
        return None;
    }

    let time = round_small_negative((-qb - discriminant.sqrt()) / (2.0 * qa));
    (time >= 0.0).then_some(time)
}

/// Exchange the normal components of the two bodies' motion along the axis
/// between their centers. Tangential components are untouched.
///
/// The exchange is written into velocity, so each body leaves with the
/// other's normal motion while its held input keeps acting on its own.
pub fn resolve_collision(a: &mut Body, b: &mut Body) {
    let Some(normal) = (b.position - a.position).try_normalize() else {
        return;
    };

    let a_normal = a.motion().dot(normal);
    let b_normal = b.motion().dot(normal);
    let exchange = b_normal - a_normal;

    a.velocity += normal * exchange;
    b.velocity -= normal * exchange;
}

/// How far the two circles interpenetrate (positive when overlapping)
pub fn overlap_depth(a: &Body, b: &Body) -> f64 {
    a.radius + b.radius - a.position.distance_to(b.position)
}

/// Push two overlapping bodies apart along the line between them, half the
/// overlap each. Coincident centers are split along the x axis.
pub fn separate(a: &mut Body, b: &mut Body) {
    let delta = b.position - a.position;
    let depth = overlap_depth(a, b);
    if depth <= 0.0 {
        return;
    }

    let normal = delta.try_normalize().unwrap_or(Vec2::new(1.0, 0.0));
    let push = depth / 2.0 + super::arena::ROUNDING_ERROR / 2.0;

    a.position -= normal * push;
    b.position += normal * push;
}
