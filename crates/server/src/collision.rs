//! Collision primitives and predicates.
//!
//! Fish carry two hitboxes: a circular mouth that decides eating and an
//! oriented rectangle body that decides bouncing and pickup. Food and
//! powerups are plain circles.

use glam::Vec2;
use std::f32::consts::{PI, TAU};

/// A circle in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

/// A rectangle centred on `center`, rotated by `rotation` radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedRect {
    pub center: Vec2,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
}

/// Check if two circles overlap.
#[inline]
pub fn circles_overlap(a: &Circle, b: &Circle) -> bool {
    let r = a.radius + b.radius;
    a.center.distance_squared(b.center) < r * r
}

/// Check if a circle overlaps an oriented rectangle.
///
/// The circle centre is rotated into the rectangle's local space, clamped
/// to the half-extents, and the clamped point is compared against the
/// radius.
pub fn circle_rect_overlap(circle: &Circle, rect: &OrientedRect) -> bool {
    let local = Vec2::from_angle(-rect.rotation).rotate(circle.center - rect.center);
    let half = Vec2::new(rect.width / 2.0, rect.height / 2.0);
    let closest = local.clamp(-half, half);
    local.distance_squared(closest) < circle.radius * circle.radius
}

/// Check if two oriented rectangles overlap, returning the unit separation
/// vector from `a` to `b`.
///
/// The test treats both rectangles as circles of their combined half-widths;
/// the coarse result keeps the bounce response stable regardless of how the
/// bodies are rotated. Coincident centres separate along +x.
pub fn rect_rect_overlap(a: &OrientedRect, b: &OrientedRect) -> (bool, Vec2) {
    let combined = (a.width + b.width) / 2.0;
    let delta = b.center - a.center;
    let dist_sq = delta.length_squared();
    if dist_sq == 0.0 {
        return (true, Vec2::X);
    }
    let collides = dist_sq < combined * combined;
    (collides, delta / dist_sq.sqrt())
}

/// Wrap an angle into `(-PI, PI]`.
#[inline]
pub fn wrap_angle(mut angle: f32) -> f32 {
    while angle > PI {
        angle -= TAU;
    }
    while angle <= -PI {
        angle += TAU;
    }
    angle
}

/// Heading transmitted on the wire and used to project the mouth hitbox.
///
/// The renderer's fish sprites point left, so the wire orientation is the
/// velocity angle plus PI, wrapped back into `(-PI, PI]`.
#[inline]
pub fn heading_from_velocity(velocity: Vec2) -> f32 {
    wrap_angle(velocity.y.atan2(velocity.x) + PI)
}
