//! Batched seeded runs with a determinism check
//!
//! Runs are strictly sequential and share nothing but the derived seed. After
//! the batch, the first configuration is played once more and its serialized
//! result must match the original byte for byte.

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::settings::Settings;
use crate::sim::{HeadlessEngine, HazardKind, NullSink, RunOutcome, SimulationResult};

/// Batch parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TuningConfig {
    pub runs: u32,
    /// Run `i` uses `seed + i`
    pub seed: u32,
    pub round: u32,
    pub duration_ms: f64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            runs: 10,
            seed: 1,
            round: 1,
            duration_ms: 60_000.0,
        }
    }
}

/// Headline numbers of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub session_id: String,
    pub seed: u32,
    pub outcome: RunOutcome,
    pub frames: u64,
    pub duration_ms: f64,
    pub score: u64,
    pub bricks_broken: u32,
    pub bricks_per_second: f64,
    pub longest_volley: u32,
    pub lives_lost: u32,
    pub hazard_contacts: u32,
    pub portal_transports: u32,
}

impl From<&SimulationResult> for RunSummary {
    fn from(result: &SimulationResult) -> Self {
        Self {
            session_id: result.session_id.clone(),
            seed: result.seed,
            outcome: result.outcome,
            frames: result.frames,
            duration_ms: result.duration_ms,
            score: result.score,
            bricks_broken: result.metrics.bricks_broken,
            bricks_per_second: result.metrics.bricks_per_second,
            longest_volley: result.volley.longest_volley,
            lives_lost: result.metrics.lives_lost,
            hazard_contacts: result.metrics.hazard_contacts,
            portal_transports: result.metrics.portal_transports,
        }
    }
}

/// Mean hazard contacts per run, split by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanHazardContacts {
    #[serde(rename = "gravity-well")]
    pub gravity_well: f64,
    #[serde(rename = "moving-bumper")]
    pub moving_bumper: f64,
    pub portal: f64,
}

/// Aggregates over a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningReport {
    pub run_count: u32,
    pub round: u32,
    pub duration_ms: f64,
    pub mean_score: f64,
    pub best_score: u64,
    pub mean_bricks_per_second: f64,
    pub mean_longest_volley: f64,
    pub mean_lives_lost: f64,
    pub mean_hazard_contacts: f64,
    pub mean_hazard_contacts_by_type: MeanHazardContacts,
    pub mean_portal_transports: f64,
    /// Population standard deviation of bricks broken
    pub bricks_cleared_std_dev: f64,
    /// The duplicate of the first run serialized identically
    pub deterministic_check: bool,
    pub runs: Vec<RunSummary>,
}

/// Play one autoplay run with no event log
pub fn simulate(seed: u32, round: u32, duration_ms: f64, settings: &Settings) -> SimulationResult {
    let mut engine = HeadlessEngine::new(seed, round, settings.clone());
    engine.run(duration_ms, &mut NullSink);
    engine.result(duration_ms, Vec::new())
}

/// Run the batch described by `config`
///
/// A batch always plays at least one run. Settings are validated first.
pub fn run_tuning(config: &TuningConfig, settings: &Settings) -> Result<TuningReport, SettingsError> {
    settings.validate()?;
    let runs = config.runs.max(1);
    if config.runs == 0 {
        log::warn!("Tuning batch asked for 0 runs, playing 1");
    }

    let results: Vec<SimulationResult> = (0..runs)
        .map(|i| {
            let seed = config.seed.wrapping_add(i);
            let result = simulate(seed, config.round, config.duration_ms, settings);
            log::debug!(
                "Tuning run {}/{} seed {}: score {} ({:?})",
                i + 1,
                runs,
                seed,
                result.score,
                result.outcome
            );
            result
        })
        .collect();

    let duplicate = simulate(config.seed, config.round, config.duration_ms, settings);
    let deterministic_check = match (results[0].to_json(), duplicate.to_json()) {
        (Ok(first), Ok(again)) => match first_divergence(&first, &again) {
            None => true,
            Some(offset) => {
                log::warn!(
                    "Duplicate of seed {} diverged at byte {}",
                    config.seed,
                    offset
                );
                false
            }
        },
        _ => false,
    };

    let report = aggregate(config, &results, deterministic_check);
    log::info!(
        "Tuning: {} runs, mean score {:.1}, best {}, deterministic: {}",
        report.run_count,
        report.mean_score,
        report.best_score,
        report.deterministic_check
    );
    Ok(report)
}

fn aggregate(config: &TuningConfig, results: &[SimulationResult], deterministic_check: bool) -> TuningReport {
    let mean = |f: &dyn Fn(&SimulationResult) -> f64| -> f64 {
        if results.is_empty() {
            0.0
        } else {
            results.iter().map(f).sum::<f64>() / results.len() as f64
        }
    };
    let by_type = |kind: HazardKind| mean(&|r| r.metrics.hazard_contacts_by_type.get(kind) as f64);

    TuningReport {
        run_count: results.len() as u32,
        round: config.round,
        duration_ms: config.duration_ms,
        mean_score: mean(&|r| r.score as f64),
        best_score: results.iter().map(|r| r.score).max().unwrap_or(0),
        mean_bricks_per_second: mean(&|r| r.metrics.bricks_per_second),
        mean_longest_volley: mean(&|r| r.volley.longest_volley as f64),
        mean_lives_lost: mean(&|r| r.metrics.lives_lost as f64),
        mean_hazard_contacts: mean(&|r| r.metrics.hazard_contacts as f64),
        mean_hazard_contacts_by_type: MeanHazardContacts {
            gravity_well: by_type(HazardKind::GravityWell),
            moving_bumper: by_type(HazardKind::MovingBumper),
            portal: by_type(HazardKind::Portal),
        },
        mean_portal_transports: mean(&|r| r.metrics.portal_transports as f64),
        bricks_cleared_std_dev: population_std_dev(
            &results
                .iter()
                .map(|r| r.bricks_cleared() as f64)
                .collect::<Vec<_>>(),
        ),
        deterministic_check,
        runs: results.iter().map(RunSummary::from).collect(),
    }
}

/// Population standard deviation; 0 for an empty slice
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Byte offset of the first difference, if any
fn first_divergence(a: &str, b: &str) -> Option<usize> {
    if a == b {
        return None;
    }
    Some(
        a.bytes()
            .zip(b.bytes())
            .position(|(x, y)| x != y)
            .unwrap_or_else(|| a.len().min(b.len())),
    )
}
