//! Collision detection and response for a circular ball
//!
//! The ball is always a circle; obstacles are circles, boxes or diamonds.
//! Every test returns the surface normal pointing from the obstacle toward
//! the ball center, plus the penetration depth for position correction.

use glam::Vec2;

use super::body::Shape;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Closest point on the obstacle surface
    pub point: Vec2,
    /// Surface normal at collision (pointing toward ball center)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Dispatch on the obstacle's shape
pub fn ball_shape_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    center: Vec2,
    shape: &Shape,
) -> CollisionResult {
    match *shape {
        Shape::Circle { radius } => ball_circle_collision(ball_pos, ball_radius, center, radius),
        Shape::Rect { half_extents } => ball_rect_collision(ball_pos, ball_radius, center, half_extents),
        Shape::Diamond { half_extents } => {
            ball_diamond_collision(ball_pos, ball_radius, center, half_extents)
        }
    }
}

/// Ball against a circle
pub fn ball_circle_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    center: Vec2,
    radius: f32,
) -> CollisionResult {
    let delta = ball_pos - center;
    let dist = delta.length();
    let reach = ball_radius + radius;
    if dist >= reach {
        return CollisionResult::miss();
    }
    // Concentric: push straight up
    let normal = if dist > 1e-5 { delta / dist } else { Vec2::NEG_Y };
    CollisionResult {
        hit: true,
        point: center + normal * radius,
        normal,
        penetration: reach - dist,
    }
}

/// Ball against an axis-aligned box
pub fn ball_rect_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    center: Vec2,
    half_extents: Vec2,
) -> CollisionResult {
    let local = ball_pos - center;
    let closest = local.clamp(-half_extents, half_extents);
    let inside = closest == local;

    if !inside {
        let delta = local - closest;
        let dist = delta.length();
        if dist >= ball_radius {
            return CollisionResult::miss();
        }
        let normal = if dist > 1e-5 { delta / dist } else { Vec2::NEG_Y };
        return CollisionResult {
            hit: true,
            point: center + closest,
            normal,
            penetration: ball_radius - dist,
        };
    }

    // Center inside the box (tunneling case): exit through the nearest face
    let to_x = half_extents.x - local.x.abs();
    let to_y = half_extents.y - local.y.abs();
    let (normal, depth, point) = if to_x < to_y {
        let sign = if local.x < 0.0 { -1.0 } else { 1.0 };
        (
            Vec2::new(sign, 0.0),
            to_x,
            Vec2::new(sign * half_extents.x, local.y),
        )
    } else {
        let sign = if local.y < 0.0 { -1.0 } else { 1.0 };
        (
            Vec2::new(0.0, sign),
            to_y,
            Vec2::new(local.x, sign * half_extents.y),
        )
    };
    CollisionResult {
        hit: true,
        point: center + point,
        normal,
        penetration: depth + ball_radius,
    }
}

/// Ball against a diamond (rhombus)
pub fn ball_diamond_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    center: Vec2,
    half_extents: Vec2,
) -> CollisionResult {
    if half_extents.x <= 0.0 || half_extents.y <= 0.0 {
        return CollisionResult::miss();
    }
    let local = ball_pos - center;
    let vertices = [
        Vec2::new(half_extents.x, 0.0),
        Vec2::new(0.0, half_extents.y),
        Vec2::new(-half_extents.x, 0.0),
        Vec2::new(0.0, -half_extents.y),
    ];

    let mut closest = vertices[0];
    let mut best = f32::MAX;
    for i in 0..vertices.len() {
        let candidate = closest_point_on_segment(local, vertices[i], vertices[(i + 1) % 4]);
        let d = local.distance_squared(candidate);
        if d < best {
            best = d;
            closest = candidate;
        }
    }
    let dist = best.sqrt();
    let inside = local.x.abs() / half_extents.x + local.y.abs() / half_extents.y <= 1.0;

    if inside {
        let outward = closest.normalize_or(Vec2::NEG_Y);
        return CollisionResult {
            hit: true,
            point: center + closest,
            normal: outward,
            penetration: ball_radius + dist,
        };
    }
    if dist >= ball_radius {
        return CollisionResult::miss();
    }
    let normal = (local - closest).normalize_or(Vec2::NEG_Y);
    CollisionResult {
        hit: true,
        point: center + closest,
        normal,
        penetration: ball_radius - dist,
    }
}

fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-8 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Reflect velocity off a surface
///
/// v' = v - (1 + e)(v·n)n, applied only when moving into the surface
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2, restitution: f32) -> Vec2 {
    let vn = velocity.dot(normal);
    if vn >= 0.0 {
        return velocity;
    }
    velocity - (1.0 + restitution) * vn * normal
}
