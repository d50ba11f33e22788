//! Typed gameplay events and the sink they are published to
//!
//! The simulation only needs somewhere to append events; it never waits on
//! subscribers. Headless runs either discard events or keep them in an
//! [`EventLog`] for telemetry.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::hazard::HazardKind;
use crate::physics::{BodyId, WallSide};

/// Something that happened during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum GameEvent {
    BrickHit {
        brick: BodyId,
        row: u32,
        col: u32,
        hp_remaining: u32,
    },
    BrickBreak {
        brick: BodyId,
        row: u32,
        col: u32,
        points: u64,
        combo: u32,
        impact_speed: f32,
    },
    PaddleHit {
        /// -1 at the left edge, 1 at the right edge
        offset: f32,
        speed: f32,
    },
    WallHit {
        side: WallSide,
    },
    LifeLost {
        lives_remaining: u32,
    },
    BallLaunched {
        velocity: Vec2,
    },
    RoundCompleted {
        score: u64,
    },
    ComboReset {
        previous: u32,
    },
    HazardContact {
        hazard: BodyId,
        kind: HazardKind,
        /// Whether the hazard acted on the ball (false inside a cooldown)
        triggered: bool,
    },
}

/// An event stamped with simulated time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedEvent {
    pub frame: u64,
    pub time_ms: f64,
    #[serde(flatten)]
    pub event: GameEvent,
}

/// Append-only destination for gameplay events
pub trait EventSink {
    fn publish(&mut self, event: TimedEvent);
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&mut self, _event: TimedEvent) {}
}

/// Keeps every event in publish order
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<TimedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TimedEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, event: TimedEvent) {
        self.events.push(event);
    }
}
