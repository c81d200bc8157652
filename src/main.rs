//! rxtrace CLI
//!
//! Runs a star scenario and reports the channel measurements it collected.
//!
//! ```bash
//! # Stock three-node scenario
//! rxtrace
//!
//! # Custom scenario, stop early, export records
//! rxtrace --config scenario.toml --stop 5 --json records.json
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rxtrace::{
    run_scenario, summarize_by_receiver, write_records_json, MeasurementRecord, ScenarioConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Deterministic channel telemetry simulator.
#[derive(Parser, Debug)]
#[command(name = "rxtrace")]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario file (TOML). The built-in star scenario when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the stop time, in simulated seconds
    #[arg(long)]
    stop: Option<f64>,

    /// Write the records to this file as a JSON array
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,rxtrace=info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let report = run_scenario(config).context("scenario run failed")?;
    info!(
        frames = report.frames_sent,
        records = report.records.len(),
        dropped = report.dropped,
        events = report.summary.events_executed,
        end = %report.summary.final_time,
        "simulation complete"
    );
    for rx in summarize_by_receiver(&report.records) {
        info!(
            node = %rx.node_id,
            records = rx.records,
            distance_m = rx.mean_distance_m,
            mean_snr_db = rx.mean_snr_db,
            "receiver"
        );
    }

    if let Some(path) = &args.json {
        export_json(path, &report.records)?;
        info!(path = %path.display(), "records exported");
    }
    Ok(())
}

/// The scenario named on the command line with `--stop` applied.
fn load_config(args: &Args) -> Result<ScenarioConfig> {
    let mut config = match &args.config {
        Some(path) => ScenarioConfig::load(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };
    if let Some(stop) = args.stop {
        config.stop_time = stop;
        config.validate().context("applying --stop")?;
    }
    Ok(config)
}

fn export_json(path: &Path, records: &[MeasurementRecord]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_records_json(BufWriter::new(file), records)
        .with_context(|| format!("writing {}", path.display()))
}
