//! Brick Sim - deterministic headless engine for an arcade brick breaker
//!
//! Core modules:
//! - `rng`: Seedable mulberry32 stream shared by every random decision
//! - `level`: Level presets, loop remixing and procedural brick layout
//! - `physics`: Rigid-body capability and a small circle/box solver
//! - `sim`: Deterministic simulation (orchestrator, hazards, scoring, replay)
//! - `tuning`: Batched seeded runs with a determinism check

pub mod error;
pub mod level;
pub mod physics;
pub mod rng;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use error::{ReplayError, SettingsError, SimulationError};
pub use rng::Mulberry32;
pub use settings::Settings;
pub use sim::{SimulationRequest, SimulationResult, run_simulation};
pub use tuning::{TuningConfig, TuningReport, run_tuning};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep in milliseconds (120 Hz)
    pub const SIM_DT_MS: f64 = 1000.0 / 120.0;
    /// Velocities are expressed in pixels per reference frame (60 Hz)
    pub const REFERENCE_FRAME_MS: f64 = 1000.0 / 60.0;

    /// Playfield dimensions
    pub const PLAYFIELD_WIDTH: f32 = 800.0;
    pub const PLAYFIELD_HEIGHT: f32 = 600.0;
    /// Thickness of the boundary walls placed outside the playfield
    pub const WALL_THICKNESS: f32 = 40.0;

    /// Paddle defaults
    pub const PADDLE_WIDTH: f32 = 104.0;
    pub const PADDLE_HEIGHT: f32 = 16.0;
    pub const PADDLE_Y: f32 = 560.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 9.0;
    pub const BALL_BASE_SPEED: f32 = 7.5;
    pub const BALL_MAX_SPEED: f32 = 14.0;
    pub const BALL_MIN_VERTICAL_SPEED: f32 = 2.4;

    /// Brick defaults
    pub const BRICK_WIDTH: f32 = 64.0;
    pub const BRICK_HEIGHT: f32 = 24.0;
    /// Top of the brick field
    pub const BRICK_TOP_OFFSET: f32 = 72.0;
    /// Highest hp a breakable brick may carry
    pub const MAX_BRICK_HP: u32 = 12;
    /// Sentinel hp for unbreakable bricks, unreachable by damage
    pub const WALL_BRICK_HP: u32 = 1_000_000;

    /// Lives at the start of a run
    pub const STARTING_LIVES: u32 = 3;
    /// Attached ball launches on its own after this long
    pub const AUTO_LAUNCH_DELAY_MS: f64 = 750.0;
}

/// Unit vector from `from` to `to`, or `fallback` when the points coincide
#[inline]
pub fn direction_or(from: Vec2, to: Vec2, fallback: Vec2) -> Vec2 {
    let delta = to - from;
    let len = delta.length();
    if len.is_finite() && len > 1e-4 {
        delta / len
    } else {
        fallback
    }
}

/// Clamp a velocity's magnitude into `[min, max]` keeping its direction
///
/// Inverted bounds are swapped; a NaN bound is ignored.
#[inline]
pub fn clamp_speed(vel: Vec2, min: f32, max: f32) -> Vec2 {
    let speed = vel.length();
    if !speed.is_finite() || speed < 1e-6 {
        return vel;
    }
    let (lo, hi) = (min.min(max), min.max(max));
    if lo.is_nan() {
        return vel;
    }
    let target = speed.clamp(lo, hi);
    vel * (target / speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_or_degenerate() {
        let fallback = Vec2::new(0.0, -1.0);
        assert_eq!(direction_or(Vec2::ONE, Vec2::ONE, fallback), fallback);
        let dir = direction_or(Vec2::ZERO, Vec2::new(3.0, 4.0), fallback);
        assert!((dir.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_speed() {
        let slow = clamp_speed(Vec2::new(1.0, 0.0), 5.0, 10.0);
        assert!((slow.length() - 5.0).abs() < 1e-5);
        let fast = clamp_speed(Vec2::new(0.0, 30.0), 5.0, 10.0);
        assert!((fast.y - 10.0).abs() < 1e-5);
        assert_eq!(clamp_speed(Vec2::ZERO, 5.0, 10.0), Vec2::ZERO);
    }

    #[test]
    fn test_clamp_speed_tolerates_bad_bounds() {
        let inverted = clamp_speed(Vec2::new(3.0, 4.0), 20.0, 14.0);
        assert!((inverted.length() - 14.0).abs() < 1e-4);
        let half_nan = clamp_speed(Vec2::new(0.0, 30.0), f32::NAN, 10.0);
        assert!((half_nan.length() - 10.0).abs() < 1e-4);
        let v = Vec2::new(1.0, 2.0);
        assert_eq!(clamp_speed(v, f32::NAN, f32::NAN), v);
    }
}
