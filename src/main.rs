//! Brick Sim entry point
//!
//! Runs a tuning batch with the default configuration and prints the report
//! as JSON. Usage: `brick-sim [settings.json]`

use anyhow::{Context, Result, bail};

use brick_sim::{Settings, TuningConfig, run_tuning};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Brick Sim (headless) starting...");

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(&path).with_context(|| format!("loading settings from {path}"))?,
        None => Settings::default(),
    };

    let config = TuningConfig::default();
    let report = run_tuning(&config, &settings).context("invalid settings")?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.deterministic_check {
        bail!("duplicate of seed {} did not reproduce its result", config.seed);
    }
    Ok(())
}
