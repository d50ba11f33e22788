//! Run results
//!
//! Everything here is plain data; a result is built once at the end of a run
//! and never changes afterwards.

use serde::{Deserialize, Serialize};

use super::events::TimedEvent;
use super::hazard::{HazardKind, HazardSummary};
use super::state::SessionSnapshot;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Every breakable brick was destroyed
    Cleared,
    /// Lives ran out
    Failed,
    /// Requested duration reached first
    DurationElapsed,
}

/// Hazard contacts split by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardContactCounts {
    #[serde(rename = "gravity-well")]
    pub gravity_well: u32,
    #[serde(rename = "moving-bumper")]
    pub moving_bumper: u32,
    pub portal: u32,
}

impl HazardContactCounts {
    pub fn record(&mut self, kind: HazardKind) {
        match kind {
            HazardKind::GravityWell => self.gravity_well += 1,
            HazardKind::MovingBumper => self.moving_bumper += 1,
            HazardKind::Portal => self.portal += 1,
        }
    }

    pub fn get(&self, kind: HazardKind) -> u32 {
        match kind {
            HazardKind::GravityWell => self.gravity_well,
            HazardKind::MovingBumper => self.moving_bumper,
            HazardKind::Portal => self.portal,
        }
    }

    pub fn total(&self) -> u32 {
        self.gravity_well + self.moving_bumper + self.portal
    }
}

/// Counters gathered while a run plays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub bricks_broken: u32,
    pub paddle_hits: u32,
    /// Side and top walls; the bottom is a life loss, not a hit
    pub wall_hits: u32,
    pub lives_lost: u32,
    /// Simulated frames per simulated second
    pub average_fps: f64,
    pub bricks_per_second: f64,
    pub hazard_contacts: u32,
    pub hazard_contacts_by_type: HazardContactCounts,
    pub moving_bumper_impacts: u32,
    pub portal_transports: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolleyStats {
    pub longest_volley: u32,
    pub average_impact_speed: f64,
}

/// Result of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub session_id: String,
    pub seed: u32,
    pub round: u32,
    /// Simulated time actually played, capped at the request
    pub duration_ms: f64,
    pub frames: u64,
    pub outcome: RunOutcome,
    pub metrics: RunMetrics,
    pub volley: VolleyStats,
    /// Empty unless telemetry was requested
    pub events: Vec<TimedEvent>,
    pub score: u64,
    pub snapshot: SessionSnapshot,
    pub hazards: Vec<HazardSummary>,
}

impl SimulationResult {
    /// Compact JSON, the form compared by determinism checks
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn bricks_cleared(&self) -> u32 {
        self.metrics.bricks_broken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hazard_counts_json_keys() {
        let mut counts = HazardContactCounts::default();
        counts.record(HazardKind::MovingBumper);
        counts.record(HazardKind::Portal);
        counts.record(HazardKind::Portal);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.get(HazardKind::Portal), 2);

        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json["moving-bumper"], 1);
        assert_eq!(json["gravity-well"], 0);
        assert_eq!(json["portal"], 2);
    }

    #[test]
    fn test_outcome_names() {
        assert_eq!(
            serde_json::to_string(&RunOutcome::DurationElapsed).unwrap(),
            "\"duration-elapsed\""
        );
    }
}
