//! Game state and core simulation types
//!
//! Ball, paddle and session snapshot types. Physics bodies hold positions
//! and velocities; these types hold what the physics world does not know.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::scoring::MomentumMetrics;
use crate::level::BrickPlacement;
use crate::physics::BodyId;

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GamePhase {
    /// Ball attached to paddle, waiting for launch
    Serve,
    /// Ball in play
    Playing,
    /// Every breakable brick is gone
    Cleared,
    /// No lives left
    GameOver,
}

impl GamePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::Cleared | GamePhase::GameOver)
    }
}

/// Ball state - attached to paddle or free-moving
///
/// Attached → Free on launch; Free → Attached on a life loss with lives left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BallState {
    /// Glued to the paddle at a fixed offset from its center
    Attached { offset: Vec2 },
    /// Physics-integrated
    Free,
}

/// The ball
#[derive(Debug, Clone)]
pub struct Ball {
    pub body: BodyId,
    pub radius: f32,
    pub state: BallState,
}

impl Ball {
    pub fn is_attached(&self) -> bool {
        matches!(self.state, BallState::Attached { .. })
    }

    /// Offset the ball sits at while attached
    pub fn rest_offset(radius: f32, paddle_height: f32) -> Vec2 {
        Vec2::new(0.0, -(paddle_height / 2.0 + radius + 1.0))
    }
}

/// The player's paddle
///
/// Moved kinematically by game code, never by physics.
#[derive(Debug, Clone)]
pub struct Paddle {
    pub body: BodyId,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub width: f32,
    pub height: f32,
}

impl Paddle {
    pub fn new(body: BodyId, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            body,
            x,
            y,
            target_x: x,
            width,
            height,
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Ease toward the target, snapping once within `snap_threshold`
    ///
    /// The paddle stays fully inside `[0, playfield_width]`.
    pub fn follow(&mut self, responsiveness: f32, snap_threshold: f32, playfield_width: f32) {
        let half = self.width / 2.0;
        let (min_x, max_x) = if playfield_width > self.width {
            (half, playfield_width - half)
        } else {
            (playfield_width / 2.0, playfield_width / 2.0)
        };
        let target = if self.target_x.is_finite() {
            self.target_x.clamp(min_x, max_x)
        } else {
            self.x
        };
        let delta = target - self.x;
        if delta.abs() <= snap_threshold {
            self.x = target;
        } else {
            self.x += delta * responsiveness.clamp(0.0, 1.0);
        }
        self.x = self.x.clamp(min_x, max_x);
    }

    /// -1 at the left edge, 1 at the right edge
    pub fn hit_offset(&self, ball_x: f32) -> f32 {
        if self.width <= 0.0 {
            return 0.0;
        }
        ((ball_x - self.x) / (self.width / 2.0)).clamp(-1.0, 1.0)
    }
}

/// A brick body and its remaining hp
#[derive(Debug, Clone)]
pub struct BrickState {
    pub placement: BrickPlacement,
    pub hp: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub attached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaddleSnapshot {
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub width: f32,
    pub height: f32,
}

/// Final session state reported with a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: GamePhase,
    pub level: String,
    pub round: u32,
    pub score: u64,
    pub lives: u32,
    pub combo: u32,
    pub bricks_remaining: u32,
    pub breakable_total: u32,
    pub elapsed_ms: f64,
    pub rng_draws: u64,
    pub ball: BallSnapshot,
    pub paddle: PaddleSnapshot,
    pub momentum: MomentumMetrics,
}
