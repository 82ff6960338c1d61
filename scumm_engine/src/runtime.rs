use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::actors::Actor;
use crate::cli::Args;
use crate::config::EngineConfig;
use crate::engine::{Camera, Engine};
use crate::scenario::Scenario;
use crate::scheduler::ScriptSlot;

/// Position of the traced actor after one tick.
#[derive(Debug, Clone, Serialize)]
pub struct MovementSample {
    pub tick: u64,
    pub x: i32,
    pub y: i32,
    pub facing: i32,
    pub walk_box: Option<u8>,
    pub moving: u8,
}

impl MovementSample {
    fn capture(tick: u64, actor: &Actor) -> Self {
        MovementSample {
            tick,
            x: actor.pos.x,
            y: actor.pos.y,
            facing: actor.facing,
            walk_box: actor.current_box(),
            moving: actor.moving.0,
        }
    }
}

#[derive(Debug, Serialize)]
struct MovementLog {
    actor: i32,
    samples: Vec<MovementSample>,
}

#[derive(Debug, Serialize)]
struct EventLog {
    events: Vec<EventLogEntry>,
}

#[derive(Debug, Serialize)]
struct EventLogEntry {
    sequence: usize,
    tick: u64,
    label: String,
}

#[derive(Serialize)]
struct StateSnapshot<'a> {
    ticks: u64,
    room: i32,
    camera: Camera,
    cutscene_depth: usize,
    live_slots: Vec<(usize, &'a ScriptSlot)>,
    actors: Vec<&'a Actor>,
}

/// Result of a simulated run, kept for printing and JSON output.
pub struct RunSummary {
    pub scenario: String,
    pub ticks: u64,
    pub samples: Vec<MovementSample>,
    /// `(tick, label)` in emission order; tick 0 covers setup and boot.
    pub events: Vec<(u64, String)>,
}

pub fn execute(args: Args) -> Result<()> {
    let Args {
        scenario,
        config,
        ticks,
        until_idle,
        abort_cutscene_at,
        trace_actor,
        movement_log_json,
        event_log_json,
        state_json,
        verbose,
    } = args;

    let config = match config.as_ref() {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let scenario = match scenario.as_ref() {
        Some(path) => {
            eprintln!("[scumm_engine] info: loading scenario {}", path.display());
            Scenario::from_json_file(path)?
        }
        None => {
            eprintln!("[scumm_engine] info: no --scenario given, running the corridor demo");
            Scenario::demo()?
        }
    };

    let mut engine = scenario
        .build_engine(config)
        .context("setting up scenario")?;
    engine
        .actor(trace_actor)
        .with_context(|| format!("--trace-actor={trace_actor}"))?;
    scenario.boot(&mut engine)?;

    let summary = simulate(
        &scenario,
        &mut engine,
        ticks,
        until_idle,
        abort_cutscene_at,
        trace_actor,
    )?;

    if let Some(path) = movement_log_json.as_ref() {
        let log = MovementLog {
            actor: trace_actor,
            samples: summary.samples.clone(),
        };
        write_json(path, &log, "movement log")?;
    }

    if let Some(path) = event_log_json.as_ref() {
        let log = build_event_log(&summary.events);
        write_json(path, &log, "event log")?;
    }

    if let Some(path) = state_json.as_ref() {
        let snapshot = StateSnapshot {
            ticks: engine.ticks(),
            room: engine.room(),
            camera: engine.camera(),
            cutscene_depth: engine.cutscenes().depth(),
            live_slots: engine
                .scheduler()
                .slots()
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_live())
                .collect(),
            actors: engine
                .actors()
                .iter()
                .filter(|actor| actor.room != 0)
                .collect(),
        };
        write_json(path, &snapshot, "engine state")?;
    }

    print_summary(&summary, &engine, trace_actor, verbose);
    Ok(())
}

/// Boots nothing; ticks an already booted engine and samples `trace_actor`.
pub fn simulate(
    scenario: &Scenario,
    engine: &mut Engine,
    ticks: u32,
    until_idle: bool,
    abort_cutscene_at: Option<u32>,
    trace_actor: i32,
) -> Result<RunSummary> {
    let mut events: Vec<(u64, String)> = engine
        .take_events()
        .into_iter()
        .map(|label| (0, label))
        .collect();
    let mut samples = Vec::with_capacity(ticks as usize);

    for tick in 0..ticks {
        if abort_cutscene_at == Some(tick) && !engine.abort_cutscene() {
            eprintln!("[scumm_engine] warning: no cutscene to abort at tick {tick}");
        }
        engine
            .tick()
            .with_context(|| format!("running tick {}", engine.ticks() + 1))?;

        let now = engine.ticks();
        events.extend(engine.take_events().into_iter().map(|label| (now, label)));
        samples.push(MovementSample::capture(now, engine.actor(trace_actor)?));

        if until_idle && is_idle(engine) {
            break;
        }
    }

    Ok(RunSummary {
        scenario: scenario.name.clone(),
        ticks: engine.ticks(),
        samples,
        events,
    })
}

fn is_idle(engine: &Engine) -> bool {
    engine.scheduler().live_count() == 0
        && engine.actors().iter().all(|actor| !actor.is_moving())
        && engine.camera().is_settled()
}

fn build_event_log(events: &[(u64, String)]) -> EventLog {
    EventLog {
        events: events
            .iter()
            .enumerate()
            .map(|(sequence, (tick, label))| EventLogEntry {
                sequence,
                tick: *tick,
                label: label.clone(),
            })
            .collect(),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {what} to JSON"))?;
    fs::write(path, json).with_context(|| format!("writing {what} to {}", path.display()))?;
    println!("Saved {what} to {}", path.display());
    Ok(())
}

fn print_summary(summary: &RunSummary, engine: &Engine, trace_actor: i32, verbose: bool) {
    let label = if summary.scenario.is_empty() {
        "(unnamed)"
    } else {
        summary.scenario.as_str()
    };
    println!("Scenario: {label}");
    println!(
        "Ticks run: {} | live slots: {} | cutscene depth: {}",
        summary.ticks,
        engine.scheduler().live_count(),
        engine.cutscenes().depth()
    );

    if let Ok(actor) = engine.actor(trace_actor) {
        let walk_box = actor
            .current_box()
            .map_or_else(|| "none".to_string(), |id| id.to_string());
        println!(
            "Actor {trace_actor}: ({}, {}) facing {} box {walk_box}{}",
            actor.pos.x,
            actor.pos.y,
            actor.facing,
            if actor.is_moving() { " (moving)" } else { "" }
        );
    }
    let camera = engine.camera();
    println!("Camera: x={} (target {})", camera.cur_x, camera.dest_x);

    let limit = if verbose {
        summary.events.len()
    } else {
        summary.events.len().min(12)
    };
    if limit == 0 {
        return;
    }
    println!("\nEvents:");
    for (tick, label) in summary.events.iter().take(limit) {
        println!("  [{tick:>4}] {label}");
    }
    if !verbose && summary.events.len() > limit {
        println!("  ... +{} more events", summary.events.len() - limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_engine() -> (Scenario, Engine) {
        let scenario = Scenario::demo().unwrap();
        let mut engine = scenario.build_engine(EngineConfig::default()).unwrap();
        scenario.boot(&mut engine).unwrap();
        (scenario, engine)
    }

    #[test]
    fn until_idle_stops_after_the_demo_finishes() {
        let (scenario, mut engine) = demo_engine();
        let summary = simulate(&scenario, &mut engine, 500, true, None, 1).unwrap();
        assert!(summary.ticks < 500);
        let last = summary.samples.last().unwrap();
        assert_eq!((last.x, last.y, last.walk_box), (200, 120, Some(2)));
        assert_eq!(last.moving, 0);
        assert!(summary
            .events
            .iter()
            .any(|(_, label)| label == "cutscene.end depth 1"));
    }

    #[test]
    fn setup_events_are_stamped_tick_zero() {
        let (scenario, mut engine) = demo_engine();
        let summary = simulate(&scenario, &mut engine, 1, false, None, 1).unwrap();
        let (tick, label) = &summary.events[0];
        assert_eq!(*tick, 0);
        assert!(label.starts_with("room.enter 1"));
        assert_eq!(summary.samples.len(), 1);
        assert_eq!(summary.samples[0].tick, 1);
    }

    #[test]
    fn aborting_the_demo_cutscene_teleports_the_actor() {
        let (scenario, mut engine) = demo_engine();
        let summary = simulate(&scenario, &mut engine, 3, false, Some(1), 1).unwrap();
        let last = summary.samples.last().unwrap();
        assert_eq!((last.x, last.y), (200, 120));
        assert_eq!(engine.cutscenes().depth(), 0);
        assert!(summary
            .events
            .iter()
            .any(|(tick, label)| *tick == 2 && label.starts_with("cutscene.abort")));
    }

    #[test]
    fn event_log_numbers_entries_in_order() {
        let log = build_event_log(&[(0, "a".into()), (3, "b".into())]);
        assert_eq!(log.events[1].sequence, 1);
        assert_eq!(log.events[1].tick, 3);
        assert_eq!(log.events[1].label, "b");
    }
}
