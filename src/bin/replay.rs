// Replays a recorded sensor log through a NavigationSession and prints
// a JSON summary of every event plus the final state. The session core
// is deterministic, so a replayed log reproduces the live decisions
// exactly and makes threshold tuning an offline exercise.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::Parser;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::json;

use wayfinder_rs::session::{NavEvent, NavigationSession};
use wayfinder_rs::types::{BeaconAdvert, GeoFix, HeadingSample, Route};
use wayfinder_rs::NavConfig;

#[derive(Parser, Debug)]
struct Args {
    /// Path to session log (.json or .json.gz)
    #[arg(long)]
    log: PathBuf,

    /// Path to route definition (.json)
    #[arg(long)]
    route: PathBuf,

    /// Replay-clock seconds between beacon timeout sweeps
    #[arg(long, default_value = "1.0")]
    sweep_interval: f64,

    /// Override the fix accuracy gate (meters)
    #[arg(long)]
    accuracy_limit: Option<f64>,

    /// Override the position smoothing alpha
    #[arg(long)]
    position_alpha: Option<f64>,

    /// Override the beacon silence timeout (seconds)
    #[arg(long)]
    device_timeout: Option<f64>,

    /// Override the waypoint re-trigger cooldown (seconds)
    #[arg(long)]
    reached_cooldown: Option<f64>,
}

/// One logged record. Any subset of the sources may be present.
#[derive(Deserialize)]
struct Record {
    timestamp: f64,
    fix: Option<GeoFix>,
    heading: Option<HeadingSample>,
    beacons: Option<Vec<BeaconAdvert>>,
}

#[derive(Deserialize)]
struct LogFile {
    records: Vec<Record>,
}

fn load_log(path: &Path) -> anyhow::Result<LogFile> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn load_route(path: &Path) -> anyhow::Result<Route> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    anyhow::ensure!(args.sweep_interval > 0.0, "sweep interval must be positive");

    let route = load_route(&args.route)?;
    let mut log_file = load_log(&args.log)?;
    log_file.records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let mut config = NavConfig::default();
    if let Some(v) = args.accuracy_limit {
        config.accuracy_limit_m = v;
    }
    if let Some(v) = args.position_alpha {
        config.position_alpha = v;
    }
    if let Some(v) = args.device_timeout {
        config.device_timeout_secs = v;
    }
    if let Some(v) = args.reached_cooldown {
        config.reached_cooldown_secs = v;
    }

    let mut session = NavigationSession::start(route, config)?;
    let mut events: Vec<(f64, NavEvent)> = Vec::new();
    let mut last_sweep = log_file.records.first().map(|r| r.timestamp).unwrap_or(0.0);

    for record in &log_file.records {
        // Run the sweeps the live timer would have fired by now.
        while record.timestamp - last_sweep >= args.sweep_interval {
            last_sweep += args.sweep_interval;
            events.extend(
                session
                    .sweep_timeouts(last_sweep)
                    .into_iter()
                    .map(|e| (last_sweep, e)),
            );
        }
        if let Some(fix) = &record.fix {
            events.extend(session.feed_fix(fix).into_iter().map(|e| (record.timestamp, e)));
        }
        if let Some(sample) = &record.heading {
            events.extend(session.feed_heading(sample).into_iter().map(|e| (record.timestamp, e)));
        }
        if let Some(batch) = &record.beacons {
            events.extend(session.feed_beacons(batch).into_iter().map(|e| (record.timestamp, e)));
        }
    }

    let snapshot = session.snapshot();
    let reached_waypoints: Vec<String> = snapshot
        .waypoints
        .iter()
        .filter(|w| w.reached)
        .map(|w| w.id.clone())
        .collect();
    let summary = json!({
        "log": args.log.display().to_string(),
        "records": log_file.records.len(),
        "events": events
            .iter()
            .map(|(timestamp, event)| json!({ "timestamp": timestamp, "event": event }))
            .collect::<Vec<_>>(),
        "reached_waypoints": reached_waypoints,
        "completed_count": snapshot.completed_count,
        "destination_reached": snapshot.destination_reached,
        "final_snapshot": snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
