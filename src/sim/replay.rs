//! Recorded input streams and deterministic playback
//!
//! A recording is a seed plus timestamped input events (seconds of simulated
//! time, ascending). The cursor walks it forward only: every event is applied
//! exactly once, in order, at the first tick whose time reaches it.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;
use crate::rng::Mulberry32;

/// Slack when comparing event times against the simulated clock
pub const REPLAY_EPSILON: f64 = 1e-6;

/// Plain `{x, y}` point as stored in replay files
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl From<Point> for Vec2 {
    fn from(p: Point) -> Self {
        Vec2::new(p.x, p.y)
    }
}

impl From<Vec2> for Point {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Input carried by a replay event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReplayAction {
    PaddleTarget { position: Point },
    Launch,
    SeedChange { seed: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    /// Seconds of simulated time
    pub time: f64,
    #[serde(flatten)]
    pub action: ReplayAction,
}

/// A recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecording {
    pub seed: u32,
    pub events: Vec<ReplayEvent>,
}

impl ReplayRecording {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            events: Vec::new(),
        }
    }

    /// Parse and validate a recording
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let recording: Self = serde_json::from_str(json)?;
        recording.validate()?;
        Ok(recording)
    }

    /// Read, parse and validate a recording file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Times must be finite and non-decreasing
    pub fn validate(&self) -> Result<(), ReplayError> {
        let mut previous = f64::NEG_INFINITY;
        for (index, event) in self.events.iter().enumerate() {
            if !event.time.is_finite() {
                return Err(ReplayError::NonFiniteTime { index });
            }
            if event.time < previous {
                return Err(ReplayError::OutOfOrder {
                    index,
                    time: event.time,
                    previous,
                });
            }
            previous = event.time;
        }
        Ok(())
    }
}

/// Inputs that came due during one `advance` call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayStep {
    /// Most recent paddle target, if any came due
    pub paddle_target: Option<Point>,
    pub launch: bool,
    pub seed_changes: u32,
}

/// Forward-only playback position in a recording
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    events: Vec<ReplayEvent>,
    index: usize,
}

impl ReplayCursor {
    pub fn new(recording: &ReplayRecording) -> Self {
        Self {
            events: recording.events.clone(),
            index: 0,
        }
    }

    /// Events consumed so far
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.events.len()
    }

    /// Consume every event due at `elapsed_seconds`
    ///
    /// Seed changes reseed `rng` on the spot.
    pub fn advance(&mut self, elapsed_seconds: f64, rng: &mut Mulberry32) -> ReplayStep {
        let mut step = ReplayStep::default();
        while let Some(event) = self.events.get(self.index) {
            if event.time > elapsed_seconds + REPLAY_EPSILON {
                break;
            }
            match event.action {
                ReplayAction::PaddleTarget { position } => step.paddle_target = Some(position),
                ReplayAction::Launch => step.launch = true,
                ReplayAction::SeedChange { seed } => {
                    rng.set_seed(seed);
                    step.seed_changes += 1;
                }
            }
            self.index += 1;
        }
        step
    }
}

/// Captures inputs as a run plays so it can be replayed verbatim
#[derive(Debug, Clone)]
pub struct ReplayRecorder {
    recording: ReplayRecording,
    last_target: Option<Point>,
}

impl ReplayRecorder {
    pub fn new(seed: u32) -> Self {
        Self {
            recording: ReplayRecording::new(seed),
            last_target: None,
        }
    }

    /// Record a paddle target if it differs from the last one
    pub fn paddle_target(&mut self, time: f64, position: Point) {
        if self.last_target == Some(position) {
            return;
        }
        self.last_target = Some(position);
        self.recording.events.push(ReplayEvent {
            time,
            action: ReplayAction::PaddleTarget { position },
        });
    }

    pub fn launch(&mut self, time: f64) {
        self.recording.events.push(ReplayEvent {
            time,
            action: ReplayAction::Launch,
        });
    }

    pub fn finish(self) -> ReplayRecording {
        self.recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "seed": 7,
        "events": [
            { "time": 0.0, "type": "paddle-target", "position": { "x": 100, "y": 560 } },
            { "time": 0.05, "type": "paddle-target", "position": { "x": 140, "y": 560 } },
            { "time": 0.05, "type": "launch" },
            { "time": 0.5, "type": "seed-change", "seed": 99 },
            { "time": 1.0, "type": "paddle-target", "position": { "x": 400, "y": 560 } }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let recording = ReplayRecording::from_json(SAMPLE).unwrap();
        assert_eq!(recording.seed, 7);
        assert_eq!(recording.events.len(), 5);
        assert_eq!(recording.events[2].action, ReplayAction::Launch);
    }

    #[test]
    fn test_malformed_replays_fail_fast() {
        assert!(matches!(
            ReplayRecording::from_json("{ not json"),
            Err(ReplayError::Json(_))
        ));
        // paddle-target without a position
        let missing = r#"{ "seed": 1, "events": [ { "time": 0.1, "type": "paddle-target" } ] }"#;
        assert!(matches!(ReplayRecording::from_json(missing), Err(ReplayError::Json(_))));
        let unknown = r#"{ "seed": 1, "events": [ { "time": 0.1, "type": "teleport" } ] }"#;
        assert!(ReplayRecording::from_json(unknown).is_err());
        let unordered = r#"{ "seed": 1, "events": [
            { "time": 0.5, "type": "launch" },
            { "time": 0.1, "type": "launch" } ] }"#;
        assert!(matches!(
            ReplayRecording::from_json(unordered),
            Err(ReplayError::OutOfOrder { index: 1, .. })
        ));
    }

    #[test]
    fn test_cursor_consumes_in_order() {
        let recording = ReplayRecording::from_json(SAMPLE).unwrap();
        let mut cursor = ReplayCursor::new(&recording);
        let mut rng = Mulberry32::new(recording.seed);

        let step = cursor.advance(0.0, &mut rng);
        assert_eq!(step.paddle_target, Some(Point { x: 100.0, y: 560.0 }));
        assert!(!step.launch);

        let step = cursor.advance(0.2, &mut rng);
        assert_eq!(step.paddle_target, Some(Point { x: 140.0, y: 560.0 }));
        assert!(step.launch);

        // Nothing new is due; consumed events never come back
        let step = cursor.advance(0.2, &mut rng);
        assert_eq!(step, ReplayStep::default());
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_seed_change_resyncs_rng() {
        let recording = ReplayRecording::from_json(SAMPLE).unwrap();
        let mut cursor = ReplayCursor::new(&recording);
        let mut rng = Mulberry32::new(recording.seed);
        rng.next_f64();

        let step = cursor.advance(0.5, &mut rng);
        assert_eq!(step.seed_changes, 1);
        assert_eq!(rng, Mulberry32::new(99));
        assert!(!cursor.is_finished());
        cursor.advance(10.0, &mut rng);
        assert!(cursor.is_finished());
    }

    #[test]
    fn test_epsilon_boundary() {
        let mut recording = ReplayRecording::new(1);
        recording.events.push(ReplayEvent {
            time: 1.0 / 120.0,
            action: ReplayAction::Launch,
        });
        let mut cursor = ReplayCursor::new(&recording);
        let mut rng = Mulberry32::new(1);
        let elapsed = (1000.0 / 120.0) / 1000.0;
        assert!(cursor.advance(elapsed - 1e-7, &mut rng).launch);
    }

    #[test]
    fn test_recorder_dedupes_targets() {
        let mut recorder = ReplayRecorder::new(3);
        let p = Point { x: 10.0, y: 0.0 };
        recorder.paddle_target(0.0, p);
        recorder.paddle_target(0.1, p);
        recorder.launch(0.1);
        recorder.paddle_target(0.2, Point { x: 12.0, y: 0.0 });
        let recording = recorder.finish();
        assert_eq!(recording.events.len(), 3);
        assert!(recording.validate().is_ok());
        let json = recording.to_json().unwrap();
        assert_eq!(ReplayRecording::from_json(&json).unwrap(), recording);
    }
}
