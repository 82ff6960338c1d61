use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use serde::Deserialize;
use tempfile::tempdir;

#[derive(Debug, Deserialize)]
struct MovementLog {
    actor: i32,
    samples: Vec<MovementSample>,
}

#[derive(Debug, Deserialize)]
struct MovementSample {
    tick: u64,
    x: i32,
    y: i32,
    walk_box: Option<u8>,
    moving: u8,
}

#[derive(Debug, Deserialize)]
struct EventLog {
    events: Vec<EventEntry>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    sequence: usize,
    tick: u64,
    label: String,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn run(args: &[&str]) -> Result<()> {
    let status = Command::new(env!("CARGO_BIN_EXE_scumm_engine"))
        .args(args)
        .status()
        .context("executing scumm_engine")?;
    assert!(status.success(), "scumm_engine exited with {status:?}");
    Ok(())
}

#[test]
fn demo_run_writes_movement_and_event_logs() -> Result<()> {
    let temp_dir = tempdir().context("creating temporary directory for logs")?;
    let movement_path = temp_dir.path().join("movement.json");
    let events_path = temp_dir.path().join("events.json");
    let movement_str = movement_path
        .to_str()
        .context("movement log path is not valid UTF-8")?;
    let events_str = events_path
        .to_str()
        .context("event log path is not valid UTF-8")?;

    run(&[
        "--ticks",
        "300",
        "--until-idle",
        "--movement-log-json",
        movement_str,
        "--event-log-json",
        events_str,
    ])?;

    let log: MovementLog = read_json(&movement_path)?;
    assert_eq!(log.actor, 1);
    assert!(log.samples.len() < 300, "demo never went idle");
    for (index, pair) in log.samples.windows(2).enumerate() {
        assert_eq!(pair[1].tick, pair[0].tick + 1, "tick gap at sample {index}");
        assert!(pair[1].x >= pair[0].x, "actor walked backwards at sample {index}");
    }
    assert!(log.samples.iter().any(|s| s.x == 80 && s.y == 120));
    let last = log.samples.last().context("movement log is empty")?;
    assert_eq!((last.x, last.y), (200, 120));
    assert_eq!(last.walk_box, Some(2));
    assert_eq!(last.moving, 0);

    let events: EventLog = read_json(&events_path)?;
    for (index, entry) in events.events.iter().enumerate() {
        assert_eq!(entry.sequence, index);
    }
    let labels: Vec<&str> = events.events.iter().map(|e| e.label.as_str()).collect();
    let begin = labels
        .iter()
        .position(|l| *l == "cutscene.begin depth 1")
        .context("cutscene never began")?;
    let end = labels
        .iter()
        .position(|l| *l == "cutscene.end depth 1")
        .context("cutscene never ended")?;
    assert!(begin < end);
    assert_eq!(events.events[begin].tick, 0);
    Ok(())
}

#[test]
fn scenario_file_with_locked_box_stops_at_the_edge() -> Result<()> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let scenario = manifest_dir.join("tests/fixtures/locked_corridor.json");
    let scenario_str = scenario.to_str().context("fixture path is not valid UTF-8")?;

    let temp_dir = tempdir().context("creating temporary directory for logs")?;
    let movement_path = temp_dir.path().join("movement.json");
    let movement_str = movement_path
        .to_str()
        .context("movement log path is not valid UTF-8")?;

    run(&[
        "--scenario",
        scenario_str,
        "--ticks",
        "100",
        "--until-idle",
        "--movement-log-json",
        movement_str,
    ])?;

    let log: MovementLog = read_json(&movement_path)?;
    let last = log.samples.last().context("movement log is empty")?;
    assert_eq!((last.x, last.y), (80, 120));
    assert_eq!(last.walk_box, Some(0));
    assert!(log.samples.iter().all(|s| s.x <= 80));
    Ok(())
}

#[test]
fn unknown_trace_actor_fails() -> Result<()> {
    let status = Command::new(env!("CARGO_BIN_EXE_scumm_engine"))
        .args(["--ticks", "1", "--trace-actor", "99"])
        .status()
        .context("executing scumm_engine")?;
    assert!(!status.success());
    Ok(())
}
