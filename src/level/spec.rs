//! Level presets and loop remixing
//!
//! The preset pool is finite. Once a player runs past the last preset the pool
//! repeats, and each repetition ("loop") is remixed to be tougher: bricks gain
//! hp, the grid tightens and power-ups get rarer.

use std::borrow::Cow;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::consts::MAX_BRICK_HP;

/// Per-row hit point curve
///
/// Row 0 is the top row; rows further from the paddle are tougher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HpCurve {
    /// Hp of the bottom row before scaling
    pub base: f64,
    /// Extra hp per row above the bottom row
    pub per_row: f64,
    /// Loop scaling multiplier
    #[serde(default = "one")]
    pub multiplier: f64,
    /// Loop scaling additive bonus
    #[serde(default)]
    pub bonus: f64,
}

fn one() -> f64 {
    1.0
}

impl HpCurve {
    pub const fn new(base: f64, per_row: f64) -> Self {
        Self {
            base,
            per_row,
            multiplier: 1.0,
            bonus: 0.0,
        }
    }

    /// Unclamped hp for a row, before rounding
    pub fn raw_hp(&self, row: u32, rows: u32) -> f64 {
        let from_bottom = rows.saturating_sub(row + 1) as f64;
        (self.base + self.per_row * from_bottom) * self.multiplier + self.bonus
    }

    /// Hp for a row, rounded and clamped to `[1, MAX_BRICK_HP]`
    pub fn hp_for_row(&self, row: u32, rows: u32) -> u32 {
        let raw = self.raw_hp(row, rows);
        if !raw.is_finite() {
            return 1;
        }
        (raw.round().max(1.0) as u32).min(MAX_BRICK_HP)
    }
}

/// Immutable description of a level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSpec {
    pub name: String,
    pub rows: u32,
    pub cols: u32,
    pub hp: HpCurve,
    /// Spacing between bricks in pixels
    pub gap: f32,
    /// Multiplier on the base power-up drop chance
    pub power_up_chance: f64,
}

impl LevelSpec {
    /// Mean hp across all rows
    pub fn average_hp(&self) -> f64 {
        if self.rows == 0 {
            return 0.0;
        }
        let total: u32 = (0..self.rows)
            .map(|row| self.hp.hp_for_row(row, self.rows))
            .sum();
        total as f64 / self.rows as f64
    }
}

/// Difficulty applied to one loop through the preset pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopScaling {
    pub hp_multiplier: f64,
    pub hp_bonus: f64,
    /// Fraction of the original gap that remains
    pub gap_factor: f32,
    /// Fraction of the original power-up chance that remains
    pub power_up_factor: f64,
}

/// Hand-tuned scaling for the first few loops (index = loop count)
const LOOP_PROGRESSION: [LoopScaling; 5] = [
    LoopScaling {
        hp_multiplier: 1.0,
        hp_bonus: 0.0,
        gap_factor: 1.0,
        power_up_factor: 1.0,
    },
    LoopScaling {
        hp_multiplier: 1.2,
        hp_bonus: 1.0,
        gap_factor: 0.85,
        power_up_factor: 0.8,
    },
    LoopScaling {
        hp_multiplier: 1.35,
        hp_bonus: 1.0,
        gap_factor: 0.75,
        power_up_factor: 0.65,
    },
    LoopScaling {
        hp_multiplier: 1.5,
        hp_bonus: 2.0,
        gap_factor: 0.65,
        power_up_factor: 0.55,
    },
    LoopScaling {
        hp_multiplier: 1.7,
        hp_bonus: 2.0,
        gap_factor: 0.6,
        power_up_factor: 0.45,
    },
];

/// Scaling for a loop count; loops past the table extrapolate from its tail
pub fn loop_scaling(loop_count: u32) -> LoopScaling {
    let idx = loop_count as usize;
    if let Some(scaling) = LOOP_PROGRESSION.get(idx) {
        return *scaling;
    }
    let last = LOOP_PROGRESSION[LOOP_PROGRESSION.len() - 1];
    let extra = (idx + 1 - LOOP_PROGRESSION.len()) as f64;
    LoopScaling {
        hp_multiplier: last.hp_multiplier + 0.15 * extra,
        hp_bonus: last.hp_bonus + (extra / 2.0).ceil(),
        gap_factor: (last.gap_factor - 0.02 * extra as f32).max(0.5),
        power_up_factor: (last.power_up_factor / (1.0 + 0.1 * extra)).max(0.2),
    }
}

/// Remix a preset for repeated play
///
/// Loop counts of zero or below hand the spec back untouched (borrowed, not
/// copied). Positive loop counts produce a tougher owned spec.
pub fn remix_level(spec: &LevelSpec, loop_count: i32) -> Cow<'_, LevelSpec> {
    if loop_count <= 0 {
        return Cow::Borrowed(spec);
    }
    let scaling = loop_scaling(loop_count as u32);
    let mut remixed = spec.clone();
    remixed.name = format!("{} (loop {})", spec.name, loop_count);
    remixed.hp.multiplier = spec.hp.multiplier * scaling.hp_multiplier;
    remixed.hp.bonus = spec.hp.bonus + scaling.hp_bonus;
    remixed.gap = spec.gap * scaling.gap_factor;
    remixed.power_up_chance = spec.power_up_chance * scaling.power_up_factor;
    Cow::Owned(remixed)
}

/// Built-in preset pool, played in order
pub static LEVEL_PRESETS: LazyLock<Vec<LevelSpec>> = LazyLock::new(|| {
    vec![
        LevelSpec {
            name: "Opening Wall".into(),
            rows: 4,
            cols: 10,
            hp: HpCurve::new(1.0, 0.0),
            gap: 6.0,
            power_up_chance: 1.0,
        },
        LevelSpec {
            name: "Staircase".into(),
            rows: 5,
            cols: 10,
            hp: HpCurve::new(1.0, 0.5),
            gap: 6.0,
            power_up_chance: 1.0,
        },
        LevelSpec {
            name: "Citadel".into(),
            rows: 6,
            cols: 11,
            hp: HpCurve::new(1.0, 0.6),
            gap: 5.0,
            power_up_chance: 0.9,
        },
        LevelSpec {
            name: "Overhang".into(),
            rows: 6,
            cols: 13,
            hp: HpCurve::new(2.0, 0.4),
            gap: 5.0,
            power_up_chance: 0.85,
        },
        LevelSpec {
            name: "Bastion".into(),
            rows: 7,
            cols: 12,
            hp: HpCurve::new(2.0, 0.5),
            gap: 4.0,
            power_up_chance: 0.75,
        },
    ]
});

/// Level for a 1-based round number
///
/// `loop_count = (round - 1) / preset_count`; the first loop returns the
/// preset itself.
pub fn level_for_round(round: u32) -> Cow<'static, LevelSpec> {
    let presets: &'static [LevelSpec] = LEVEL_PRESETS.as_slice();
    let level_index = round.max(1) as usize - 1;
    let preset = &presets[level_index % presets.len()];
    let loop_count = (level_index / presets.len()) as i32;
    remix_level(preset, loop_count)
}
