//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by body ID)
//! - No I/O during a run; replays are loaded and validated up front

pub mod events;
pub mod hazard;
pub mod replay;
pub mod result;
pub mod scoring;
pub mod state;
pub mod tick;

pub use events::{EventLog, EventSink, GameEvent, NullSink, TimedEvent};
pub use hazard::{
    HazardBand, HazardDescriptor, HazardEffect, HazardKind, HazardOutcome, HazardRegistry,
    HazardSummary, plan_hazards,
};
pub use replay::{
    Point, REPLAY_EPSILON, ReplayAction, ReplayCursor, ReplayEvent, ReplayRecorder,
    ReplayRecording, ReplayStep,
};
pub use result::{HazardContactCounts, RunMetrics, RunOutcome, SimulationResult, VolleyStats};
pub use scoring::{BreakContext, MomentumMetrics, ScoreAward, ScoringConfig, ScoringState};
pub use state::{Ball, BallState, BrickState, GamePhase, Paddle, SessionSnapshot};
pub use tick::{
    HeadlessEngine, SimulationRequest, TickInput, enforce_speed_envelope, paddle_bounce,
    record_autoplay, run_simulation, session_id, target_frames,
};
