//! Engine settings
//!
//! Every tunable constant of a run lives here. Settings load from JSON;
//! missing fields fall back to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SettingsError;
use crate::level::{LayoutDims, LayoutOptions};
use crate::sim::scoring::ScoringConfig;

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // === Playfield ===
    pub playfield_width: f32,
    pub playfield_height: f32,
    /// Thickness of the boundary walls outside the playfield
    pub wall_thickness: f32,

    // === Paddle ===
    pub paddle_width: f32,
    pub paddle_height: f32,
    /// Y of the paddle center
    pub paddle_y: f32,
    /// Fraction of the remaining distance covered per tick (0 - 1)
    pub paddle_responsiveness: f32,
    /// Distance below which the paddle snaps onto its target
    pub paddle_snap_threshold: f32,

    // === Ball ===
    pub ball_radius: f32,
    pub launch_speed: f32,
    /// Free ball speed never drops below this
    pub base_speed: f32,
    pub max_speed: f32,
    /// Keeps trajectories from going flat
    pub min_vertical_speed: f32,
    /// Launch angle range from vertical, in radians
    pub launch_cone_min: f32,
    pub launch_cone_max: f32,
    /// Exit angle from vertical at the very edge of the paddle, in radians
    pub max_bounce_angle: f32,
    pub min_bounce_speed: f32,

    // === Session ===
    pub starting_lives: u32,
    pub auto_launch_delay_ms: f64,

    // === Bricks ===
    pub brick_width: f32,
    pub brick_height: f32,
    pub brick_top_offset: f32,
    pub layout: LayoutOptions,

    // === Scoring ===
    pub scoring: ScoringConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playfield_width: PLAYFIELD_WIDTH,
            playfield_height: PLAYFIELD_HEIGHT,
            wall_thickness: WALL_THICKNESS,

            paddle_width: PADDLE_WIDTH,
            paddle_height: PADDLE_HEIGHT,
            paddle_y: PADDLE_Y,
            paddle_responsiveness: 0.28,
            paddle_snap_threshold: 0.75,

            ball_radius: BALL_RADIUS,
            launch_speed: BALL_BASE_SPEED,
            base_speed: BALL_BASE_SPEED,
            max_speed: BALL_MAX_SPEED,
            min_vertical_speed: BALL_MIN_VERTICAL_SPEED,
            launch_cone_min: 0.12,
            launch_cone_max: 0.6,
            max_bounce_angle: 1.05, // ~60 degrees
            min_bounce_speed: BALL_BASE_SPEED,

            starting_lives: STARTING_LIVES,
            auto_launch_delay_ms: AUTO_LAUNCH_DELAY_MS,

            brick_width: BRICK_WIDTH,
            brick_height: BRICK_HEIGHT,
            brick_top_offset: BRICK_TOP_OFFSET,
            layout: LayoutOptions::default(),

            scoring: ScoringConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file and validate them
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings: Self = serde_json::from_str(&json)?;
        settings.validate()?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Reject values the engine cannot simulate
    pub fn validate(&self) -> Result<(), SettingsError> {
        fn positive(field: &'static str, value: f32) -> Result<(), SettingsError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SettingsError::Invalid {
                    field,
                    reason: format!("must be positive, got {value}"),
                })
            }
        }

        positive("playfieldWidth", self.playfield_width)?;
        positive("playfieldHeight", self.playfield_height)?;
        positive("wallThickness", self.wall_thickness)?;
        positive("paddleWidth", self.paddle_width)?;
        positive("paddleHeight", self.paddle_height)?;
        positive("ballRadius", self.ball_radius)?;
        positive("launchSpeed", self.launch_speed)?;
        positive("baseSpeed", self.base_speed)?;
        positive("maxSpeed", self.max_speed)?;
        positive("brickWidth", self.brick_width)?;
        positive("brickHeight", self.brick_height)?;

        if self.base_speed > self.max_speed {
            return Err(SettingsError::Invalid {
                field: "baseSpeed",
                reason: format!("{} exceeds maxSpeed {}", self.base_speed, self.max_speed),
            });
        }
        if !(self.min_vertical_speed >= 0.0 && self.min_vertical_speed < self.max_speed) {
            return Err(SettingsError::Invalid {
                field: "minVerticalSpeed",
                reason: format!("must be in [0, maxSpeed), got {}", self.min_vertical_speed),
            });
        }
        if self.paddle_width >= self.playfield_width {
            return Err(SettingsError::Invalid {
                field: "paddleWidth",
                reason: "paddle must fit inside the playfield".into(),
            });
        }
        if !(self.paddle_y > 0.0 && self.paddle_y < self.playfield_height) {
            return Err(SettingsError::Invalid {
                field: "paddleY",
                reason: format!("must lie inside the playfield, got {}", self.paddle_y),
            });
        }
        if self.starting_lives == 0 {
            return Err(SettingsError::Invalid {
                field: "startingLives",
                reason: "at least one life is required".into(),
            });
        }
        Ok(())
    }

    /// Geometry handed to the layout generator
    pub fn layout_dims(&self) -> LayoutDims {
        LayoutDims {
            brick_width: self.brick_width,
            brick_height: self.brick_height,
            playfield_width: self.playfield_width,
            top_offset: self.brick_top_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "startingLives": 5, "scoring": { "basePoints": 50 } }"#).unwrap();
        assert_eq!(settings.starting_lives, 5);
        assert_eq!(settings.scoring.base_points, 50.0);
        assert_eq!(settings.playfield_width, PLAYFIELD_WIDTH);
        assert_eq!(settings.scoring.combo_heat_cap, ScoringConfig::default().combo_heat_cap);
    }

    #[test]
    fn test_validate_rejects_inverted_speeds() {
        let settings = Settings {
            base_speed: 20.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { field: "baseSpeed", .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("brick-sim-settings-{}.json", std::process::id()));
        let settings = Settings {
            starting_lives: 4,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.starting_lives, 4);
        std::fs::remove_file(&path).ok();
    }
}
