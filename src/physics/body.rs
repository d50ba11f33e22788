//! Rigid body descriptors and force fields

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Stable handle to a body inside a physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyId(pub u32);

/// Which boundary a wall body guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WallSide {
    Left,
    Right,
    Top,
    Bottom,
}

/// Gameplay role of a body, used to route contacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyLabel {
    Ball,
    Paddle,
    Brick,
    Wall(WallSide),
    Hazard,
}

/// How the world moves a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Integrated every step and collided against everything else
    Dynamic,
    /// Moved only by game code
    Kinematic,
    /// Never moves
    Static,
}

/// Collider shape, centered on the body position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle { radius: f32 },
    Rect { half_extents: Vec2 },
    /// Rhombus with vertices at (±half_extents.x, 0) and (0, ±half_extents.y)
    Diamond { half_extents: Vec2 },
}

impl Shape {
    /// Radius of the smallest enclosing circle
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Shape::Circle { radius } => radius,
            Shape::Rect { half_extents } => half_extents.length(),
            Shape::Diamond { half_extents } => half_extents.x.max(half_extents.y),
        }
    }
}

/// Everything needed to spawn a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub label: BodyLabel,
    pub kind: BodyKind,
    pub shape: Shape,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Sensors report contacts but never push back
    pub is_sensor: bool,
    pub restitution: f32,
}

impl BodyDesc {
    pub fn ball(position: Vec2, radius: f32) -> Self {
        Self {
            label: BodyLabel::Ball,
            kind: BodyKind::Dynamic,
            shape: Shape::Circle { radius },
            position,
            velocity: Vec2::ZERO,
            is_sensor: false,
            restitution: 1.0,
        }
    }

    pub fn paddle(position: Vec2, size: Vec2) -> Self {
        Self {
            label: BodyLabel::Paddle,
            kind: BodyKind::Kinematic,
            shape: Shape::Rect {
                half_extents: size / 2.0,
            },
            position,
            velocity: Vec2::ZERO,
            is_sensor: false,
            restitution: 1.0,
        }
    }

    pub fn brick(position: Vec2, shape: Shape) -> Self {
        Self {
            label: BodyLabel::Brick,
            kind: BodyKind::Static,
            shape,
            position,
            velocity: Vec2::ZERO,
            is_sensor: false,
            restitution: 1.0,
        }
    }

    /// Boundary wall; the bottom wall is a sensor so balls fall through it
    pub fn wall(side: WallSide, position: Vec2, size: Vec2) -> Self {
        Self {
            label: BodyLabel::Wall(side),
            kind: BodyKind::Static,
            shape: Shape::Rect {
                half_extents: size / 2.0,
            },
            position,
            velocity: Vec2::ZERO,
            is_sensor: side == WallSide::Bottom,
            restitution: 1.0,
        }
    }

    pub fn hazard_sensor(position: Vec2, radius: f32) -> Self {
        Self {
            label: BodyLabel::Hazard,
            kind: BodyKind::Kinematic,
            shape: Shape::Circle { radius },
            position,
            velocity: Vec2::ZERO,
            is_sensor: true,
            restitution: 0.0,
        }
    }
}

/// Distance falloff law for a force field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Falloff {
    /// Strength fades linearly to zero at the field edge
    #[default]
    Linear,
    /// Strength fades with the square of the normalized distance
    Quadratic,
}

impl Falloff {
    /// Strength factor in `[0, 1]` at `distance` inside a field of `radius`
    pub fn factor(self, distance: f32, radius: f32) -> f32 {
        if radius <= 0.0 || !distance.is_finite() || distance >= radius {
            return 0.0;
        }
        let t = 1.0 - (distance / radius).max(0.0);
        match self {
            Falloff::Linear => t,
            Falloff::Quadratic => t * t,
        }
    }
}

/// Radial force applied to dynamic bodies every step
///
/// Positive strength pulls toward the center, negative pushes away.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceField {
    pub center: Vec2,
    pub radius: f32,
    /// Acceleration at the center, in velocity units per reference frame
    pub strength: f32,
    pub falloff: Falloff,
}

impl ForceField {
    /// Acceleration felt by a body at `pos`
    pub fn acceleration_at(&self, pos: Vec2) -> Vec2 {
        let delta = self.center - pos;
        let dist = delta.length();
        // Dead center: no defined direction
        if dist < 1e-3 {
            return Vec2::ZERO;
        }
        let factor = self.falloff.factor(dist, self.radius);
        delta / dist * self.strength * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falloff_shapes() {
        assert_eq!(Falloff::Linear.factor(0.0, 100.0), 1.0);
        assert!((Falloff::Linear.factor(50.0, 100.0) - 0.5).abs() < 1e-6);
        assert!((Falloff::Quadratic.factor(50.0, 100.0) - 0.25).abs() < 1e-6);
        assert_eq!(Falloff::Quadratic.factor(150.0, 100.0), 0.0);
        assert_eq!(Falloff::Linear.factor(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_force_field_direction() {
        let pull = ForceField {
            center: Vec2::ZERO,
            radius: 100.0,
            strength: 0.5,
            falloff: Falloff::Linear,
        };
        let accel = pull.acceleration_at(Vec2::new(50.0, 0.0));
        assert!(accel.x < 0.0);
        let push = ForceField {
            strength: -0.5,
            ..pull
        };
        assert!(push.acceleration_at(Vec2::new(50.0, 0.0)).x > 0.0);
        assert_eq!(pull.acceleration_at(Vec2::ZERO), Vec2::ZERO);
    }

    #[test]
    fn test_bottom_wall_is_sensor() {
        let bottom = BodyDesc::wall(WallSide::Bottom, Vec2::ZERO, Vec2::ONE);
        let top = BodyDesc::wall(WallSide::Top, Vec2::ZERO, Vec2::ONE);
        assert!(bottom.is_sensor);
        assert!(!top.is_sensor);
    }
}
