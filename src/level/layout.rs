//! Procedural brick layout
//!
//! Turns a [`LevelSpec`] and the session RNG into concrete brick placements.
//! The number and order of RNG draws depends only on the level spec and options, so
//! the same seed always yields the same brick list.

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::spec::LevelSpec;
use crate::consts::{MAX_BRICK_HP, WALL_BRICK_HP};
use crate::rng::Mulberry32;

/// Extra hp granted to fortified bricks
pub const FORTIFY_HP_BONUS: u32 = 1;

bitflags! {
    /// Brick traits assigned by the generator
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct BrickTraits: u8 {
        /// Extra hp, more likely near the center
        const FORTIFIED = 0x01;
        /// Unbreakable border brick
        const WALL = 0x02;
        /// High-risk brick with hp forced to 1
        const GAMBLE = 0x04;
        /// Slot left empty
        const VOID_SKIP = 0x08;
    }
}

/// Collider shape of a brick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrickForm {
    #[default]
    Rectangle,
    Circle,
    Diamond,
}

/// A brick produced by the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrickPlacement {
    pub row: u32,
    /// Slot index across the full row, wall flanks included
    pub col: u32,
    pub center: Vec2,
    pub width: f32,
    pub height: f32,
    pub hp: u32,
    pub form: BrickForm,
    pub traits: BrickTraits,
    pub breakable: bool,
}

/// Slot metadata handed to the decoration hook
#[derive(Debug, Clone, PartialEq)]
pub struct BrickSlot {
    pub row: u32,
    pub col: u32,
    pub rows: u32,
    /// Breakable columns in the row
    pub cols: u32,
    pub center: Vec2,
    pub hp: u32,
    pub form: BrickForm,
    pub traits: BrickTraits,
    /// 0 at the center column, 1 at the outermost breakable column
    pub edge_distance: f32,
}

/// Overrides returned by the decoration hook
///
/// `hp` is a float so out-of-range values (NaN, infinities, negatives) can be
/// normalized instead of rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrickOverride {
    pub form: Option<BrickForm>,
    pub hp: Option<f64>,
    pub breakable: Option<bool>,
    pub traits: Option<BrickTraits>,
}

/// Decoration hook. A plain function pointer, so it cannot carry state.
pub type DecorateFn = fn(&BrickSlot) -> Option<BrickOverride>;

/// Generator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    pub fortified_chance: f64,
    pub void_column_chance: f64,
    /// 0 = uniform, 1 = fortified bricks only near the center
    pub center_fortified_bias: f64,
    pub max_void_columns: u32,
    pub gamble_chance: f64,
    pub max_gamble_bricks: u32,
    #[serde(skip)]
    pub decorate_brick: Option<DecorateFn>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            fortified_chance: 0.18,
            void_column_chance: 0.12,
            center_fortified_bias: 0.6,
            max_void_columns: 2,
            gamble_chance: 0.06,
            max_gamble_bricks: 3,
            decorate_brick: None,
        }
    }
}

/// Geometry the grid is laid into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutDims {
    pub brick_width: f32,
    pub brick_height: f32,
    pub playfield_width: f32,
    /// Y of the top edge of the first row
    pub top_offset: f32,
}

/// Generator output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelLayout {
    pub bricks: Vec<BrickPlacement>,
    pub breakable_count: u32,
    /// Breakable column indices left empty
    pub void_columns: Vec<u32>,
    /// Number of wall columns flanking the grid (0 or 2)
    pub wall_columns: u32,
}

impl LevelLayout {
    /// Y of the lowest brick edge, or `None` for an empty layout
    pub fn bottom_edge(&self) -> Option<f32> {
        self.bricks
            .iter()
            .map(|b| b.center.y + b.height / 2.0)
            .reduce(f32::max)
    }
}

/// Build the brick placements for a level
pub fn generate_level_layout(
    spec: &LevelSpec,
    dims: LayoutDims,
    rng: &mut Mulberry32,
    options: &LayoutOptions,
) -> LevelLayout {
    let gap = if spec.gap.is_finite() { spec.gap.max(0.0) } else { 0.0 };
    let pitch = dims.brick_width + gap;
    let grid_width = |slots: u32| slots as f32 * dims.brick_width + slots.saturating_sub(1) as f32 * gap;

    // Too wide: keep what fits and flank it with walls
    let mut slots = spec.cols;
    let mut flanked = false;
    if grid_width(spec.cols) > dims.playfield_width {
        slots = ((dims.playfield_width + gap) / pitch).floor().max(0.0) as u32;
        flanked = slots >= 3;
    }
    if slots == 0 || spec.rows == 0 {
        return LevelLayout::default();
    }
    let wall_columns = if flanked { 2 } else { 0 };
    let usable = slots - wall_columns;
    let first_usable = wall_columns / 2;

    let left = (dims.playfield_width - grid_width(slots)) / 2.0;
    let slot_x = |slot: u32| left + dims.brick_width / 2.0 + slot as f32 * pitch;
    let row_y = |row: u32| {
        dims.top_offset + dims.brick_height / 2.0 + row as f32 * (dims.brick_height + gap)
    };

    // Never void every column
    let max_void = options.max_void_columns.min(usable.saturating_sub(1));
    let mut void_columns = Vec::new();
    for col in 0..usable {
        if (void_columns.len() as u32) < max_void && rng.chance(options.void_column_chance) {
            void_columns.push(col);
        }
    }

    let mid = (usable.saturating_sub(1)) as f32 / 2.0;
    let mut bricks = Vec::with_capacity((slots * spec.rows) as usize);
    let mut gamble_count = 0u32;

    for row in 0..spec.rows {
        let y = row_y(row);
        if flanked {
            bricks.push(wall_brick(row, 0, Vec2::new(slot_x(0), y), dims));
        }

        for col in 0..usable {
            if void_columns.contains(&col) {
                continue;
            }
            let slot = col + first_usable;
            let center = Vec2::new(slot_x(slot), y);
            let edge_distance = if mid > 0.0 {
                ((col as f32 - mid).abs() / mid).min(1.0)
            } else {
                0.0
            };

            let mut hp = spec.hp.hp_for_row(row, spec.rows);
            let mut traits = BrickTraits::empty();

            let bias = options.center_fortified_bias.clamp(0.0, 1.0);
            let center_weight = 1.0 - edge_distance as f64;
            let fortify_chance = options.fortified_chance * ((1.0 - bias) + bias * 2.0 * center_weight);
            if rng.chance(fortify_chance) {
                traits |= BrickTraits::FORTIFIED;
                hp = (hp + FORTIFY_HP_BONUS).min(MAX_BRICK_HP);
            }

            if gamble_count < options.max_gamble_bricks && rng.chance(options.gamble_chance) {
                traits.remove(BrickTraits::FORTIFIED);
                traits |= BrickTraits::GAMBLE;
                hp = 1;
                gamble_count += 1;
            }

            let slot_desc = BrickSlot {
                row,
                col: slot,
                rows: spec.rows,
                cols: usable,
                center,
                hp,
                form: BrickForm::Rectangle,
                traits,
                edge_distance,
            };
            let decorated = options.decorate_brick.and_then(|decorate| decorate(&slot_desc));
            if let Some(brick) = apply_override(slot_desc, decorated, dims) {
                bricks.push(brick);
            }
        }

        if flanked {
            let last = slots - 1;
            bricks.push(wall_brick(row, last, Vec2::new(slot_x(last), y), dims));
        }
    }

    let breakable_count = bricks.iter().filter(|b| b.breakable).count() as u32;
    log::debug!(
        "Layout '{}': {} bricks ({} breakable), void columns {:?}, walls {}",
        spec.name,
        bricks.len(),
        breakable_count,
        void_columns,
        wall_columns
    );

    LevelLayout {
        bricks,
        breakable_count,
        void_columns,
        wall_columns,
    }
}

fn wall_brick(row: u32, col: u32, center: Vec2, dims: LayoutDims) -> BrickPlacement {
    BrickPlacement {
        row,
        col,
        center,
        width: dims.brick_width,
        height: dims.brick_height,
        hp: WALL_BRICK_HP,
        form: BrickForm::Rectangle,
        traits: BrickTraits::WALL,
        breakable: false,
    }
}

/// Merge a decoration override into a slot; `None` drops the slot
fn apply_override(
    slot: BrickSlot,
    decorated: Option<BrickOverride>,
    dims: LayoutDims,
) -> Option<BrickPlacement> {
    let ov = decorated.unwrap_or_default();
    let mut traits = ov.traits.unwrap_or(slot.traits);
    if traits.contains(BrickTraits::VOID_SKIP) {
        return None;
    }
    let mut form = ov.form.unwrap_or(slot.form);
    let mut hp = match ov.hp {
        Some(raw) => normalize_hp(raw, slot.hp),
        None => slot.hp,
    };
    let breakable = ov.breakable.unwrap_or(true) && !traits.contains(BrickTraits::WALL);
    if !breakable {
        traits |= BrickTraits::WALL;
        form = BrickForm::Rectangle;
        hp = WALL_BRICK_HP;
    }

    Some(BrickPlacement {
        row: slot.row,
        col: slot.col,
        center: slot.center,
        width: dims.brick_width,
        height: dims.brick_height,
        hp,
        form,
        traits,
        breakable,
    })
}

/// Clamp a decorated hp into `[1, MAX_BRICK_HP]`
fn normalize_hp(raw: f64, fallback: u32) -> u32 {
    if raw.is_nan() {
        log::warn!("Decorated brick hp is NaN, keeping {fallback}");
        return fallback;
    }
    if raw == f64::INFINITY {
        return MAX_BRICK_HP;
    }
    let clamped = raw.round().clamp(1.0, MAX_BRICK_HP as f64);
    if clamped != raw.round() {
        log::warn!("Decorated brick hp {raw} clamped to {clamped}");
    }
    clamped as u32
}
