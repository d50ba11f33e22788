//! Level content: presets, loop remixing and procedural layout

pub mod layout;
pub mod spec;

pub use layout::{
    BrickForm, BrickOverride, BrickPlacement, BrickSlot, BrickTraits, DecorateFn, LayoutDims,
    LayoutOptions, LevelLayout, generate_level_layout,
};
pub use spec::{HpCurve, LEVEL_PRESETS, LevelSpec, LoopScaling, level_for_round, loop_scaling, remix_level};
