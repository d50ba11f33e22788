//! Scoring, combo and momentum
//!
//! A brick break is worth `base × combo × scarcity × speed`. Each factor is
//! clamped on its own before multiplying so no single term can run away.

use serde::{Deserialize, Serialize};

/// Tunable scoring curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Points for a break with every multiplier at 1
    pub base_points: f64,
    /// Multiplier gained per combo step
    pub combo_step: f64,
    pub max_combo_multiplier: f64,
    /// Extra multiplier when the last brick falls
    pub max_scarcity_bonus: f64,
    /// Extra multiplier for a break at full ball speed
    pub max_speed_bonus: f64,
    /// Seconds without a break before the combo drops to 0
    pub combo_decay_seconds: f64,
    /// Combo at which combo heat reads 1.0
    pub combo_heat_cap: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points: 100.0,
            combo_step: 0.15,
            max_combo_multiplier: 4.0,
            max_scarcity_bonus: 0.5,
            max_speed_bonus: 0.5,
            combo_decay_seconds: 2.5,
            combo_heat_cap: 20,
        }
    }
}

impl ScoringConfig {
    pub fn combo_multiplier(&self, combo: u32) -> f64 {
        sane(1.0 + combo as f64 * self.combo_step, 1.0, self.max_combo_multiplier.max(1.0))
    }

    /// Grows as the board empties
    pub fn scarcity_multiplier(&self, remaining: u32, total: u32) -> f64 {
        if total == 0 {
            return 1.0;
        }
        let density = remaining as f64 / total as f64;
        let bonus = self.max_scarcity_bonus.max(0.0);
        sane(1.0 + bonus * (1.0 - density), 1.0, 1.0 + bonus)
    }

    /// Grows toward full speed
    pub fn speed_multiplier(&self, impact_speed: f32, max_speed: f32) -> f64 {
        if max_speed <= 0.0 {
            return 1.0;
        }
        let ratio = (impact_speed / max_speed) as f64;
        let bonus = self.max_speed_bonus.max(0.0);
        sane(1.0 + bonus * ratio.clamp(0.0, 1.0), 1.0, 1.0 + bonus)
    }
}

/// Clamp, mapping non-finite values to the floor
fn sane(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() { value.clamp(min, max) } else { min }
}

/// Board state at the moment a brick breaks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakContext {
    /// Breakable bricks left after this break
    pub bricks_remaining: u32,
    pub bricks_total: u32,
    pub impact_speed: f32,
    pub max_speed: f32,
}

/// Points awarded for one break
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreAward {
    pub points: u64,
    /// Combo after the break
    pub combo: u32,
    pub combo_multiplier: f64,
    pub scarcity_multiplier: f64,
    pub speed_multiplier: f64,
}

/// Normalized telemetry gauges
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentumMetrics {
    pub volley_length: u32,
    /// Current ball speed over max speed
    pub speed_pressure: f64,
    /// Remaining breakable bricks over total
    pub brick_density: f64,
    /// Combo over the heat cap
    pub combo_heat: f64,
}

/// Running score for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringState {
    pub score: u64,
    pub combo: u32,
    /// Seconds since the last break
    pub combo_timer: f64,
    /// Breaks since the last life loss
    pub volley: u32,
    pub longest_volley: u32,
    impact_speed_total: f64,
    impact_samples: u32,
}

impl ScoringState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Award a break and advance combo and volley
    pub fn register_break(&mut self, config: &ScoringConfig, ctx: BreakContext) -> ScoreAward {
        let combo_multiplier = config.combo_multiplier(self.combo);
        let scarcity_multiplier = config.scarcity_multiplier(ctx.bricks_remaining, ctx.bricks_total);
        let speed_multiplier = config.speed_multiplier(ctx.impact_speed, ctx.max_speed);
        let base = sane(config.base_points, 0.0, f64::MAX);
        let points = (base * combo_multiplier * scarcity_multiplier * speed_multiplier).round() as u64;

        self.score = self.score.saturating_add(points);
        self.combo += 1;
        self.combo_timer = 0.0;
        self.volley += 1;
        self.longest_volley = self.longest_volley.max(self.volley);
        if ctx.impact_speed.is_finite() {
            self.impact_speed_total += ctx.impact_speed as f64;
            self.impact_samples += 1;
        }

        ScoreAward {
            points,
            combo: self.combo,
            combo_multiplier,
            scarcity_multiplier,
            speed_multiplier,
        }
    }

    /// Advance the idle timer; returns true if the combo just expired
    pub fn decay(&mut self, config: &ScoringConfig, dt_seconds: f64) -> bool {
        self.combo_timer += dt_seconds;
        if self.combo > 0 && self.combo_timer >= config.combo_decay_seconds {
            self.combo = 0;
            return true;
        }
        false
    }

    /// Zero combo and volley; returns the combo that was lost
    pub fn reset_on_life_lost(&mut self) -> u32 {
        let previous = self.combo;
        self.combo = 0;
        self.combo_timer = 0.0;
        self.volley = 0;
        previous
    }

    pub fn average_impact_speed(&self) -> f64 {
        if self.impact_samples == 0 {
            0.0
        } else {
            self.impact_speed_total / self.impact_samples as f64
        }
    }

    pub fn momentum(
        &self,
        config: &ScoringConfig,
        ball_speed: f32,
        max_speed: f32,
        remaining: u32,
        total: u32,
    ) -> MomentumMetrics {
        let speed_pressure = if max_speed > 0.0 {
            ((ball_speed / max_speed) as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let brick_density = if total > 0 {
            remaining as f64 / total as f64
        } else {
            0.0
        };
        let combo_heat = if config.combo_heat_cap > 0 {
            (self.combo as f64 / config.combo_heat_cap as f64).min(1.0)
        } else {
            0.0
        };
        MomentumMetrics {
            volley_length: self.volley,
            speed_pressure,
            brick_density,
            combo_heat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ctx(remaining: u32, speed: f32) -> BreakContext {
        BreakContext {
            bricks_remaining: remaining,
            bricks_total: 10,
            impact_speed: speed,
            max_speed: 14.0,
        }
    }

    #[test]
    fn test_first_break_base_points() {
        let config = ScoringConfig::default();
        let mut state = ScoringState::new();
        let award = state.register_break(&config, ctx(10, 0.0));
        assert_eq!(award.points, 100);
        assert_eq!(award.combo, 1);
        assert_eq!(state.volley, 1);
    }

    #[test]
    fn test_multipliers_grow() {
        let config = ScoringConfig::default();
        assert!(config.combo_multiplier(3) > config.combo_multiplier(1));
        assert_relative_eq!(config.combo_multiplier(1000), config.max_combo_multiplier);
        assert!(config.scarcity_multiplier(1, 10) > config.scarcity_multiplier(9, 10));
        assert!(config.speed_multiplier(14.0, 14.0) > config.speed_multiplier(7.0, 14.0));
        assert_relative_eq!(config.speed_multiplier(99.0, 14.0), 1.5);
        assert_relative_eq!(config.speed_multiplier(f32::NAN, 14.0), 1.0);
    }

    #[test]
    fn test_combo_decays_after_idle_window() {
        let config = ScoringConfig::default();
        let mut state = ScoringState::new();
        state.register_break(&config, ctx(9, 7.0));
        assert!(!state.decay(&config, 1.0));
        assert_eq!(state.combo, 1);
        assert!(state.decay(&config, 1.6));
        assert_eq!(state.combo, 0);
        // Volley survives decay
        assert_eq!(state.volley, 1);
    }

    #[test]
    fn test_life_loss_resets_combo_and_volley() {
        let config = ScoringConfig::default();
        let mut state = ScoringState::new();
        for remaining in (5..9).rev() {
            state.register_break(&config, ctx(remaining, 10.0));
        }
        assert_eq!(state.reset_on_life_lost(), 4);
        assert_eq!(state.combo, 0);
        assert_eq!(state.volley, 0);
        assert_eq!(state.longest_volley, 4);
        assert_relative_eq!(state.average_impact_speed(), 10.0);
    }

    #[test]
    fn test_momentum_metrics() {
        let config = ScoringConfig::default();
        let mut state = ScoringState::new();
        state.register_break(&config, ctx(5, 7.0));
        let m = state.momentum(&config, 7.0, 14.0, 5, 10);
        assert_eq!(m.volley_length, 1);
        assert_relative_eq!(m.speed_pressure, 0.5);
        assert_relative_eq!(m.brick_density, 0.5);
        assert_relative_eq!(m.combo_heat, 0.05);
    }
}
