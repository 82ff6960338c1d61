use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Runs a room scenario through the script VM and records actor movement",
    version
)]
pub struct Args {
    /// Scenario JSON to load (default: built-in corridor demo)
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Engine configuration JSON; missing fields keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of game ticks to simulate
    #[arg(long, default_value_t = 60)]
    pub ticks: u32,

    /// Stop early once no script slot is live and no actor is moving
    #[arg(long)]
    pub until_idle: bool,

    /// Skip the running cutscene at the start of this tick
    #[arg(long)]
    pub abort_cutscene_at: Option<u32>,

    /// Actor whose position is sampled into the movement log
    #[arg(long, default_value_t = 1)]
    pub trace_actor: i32,

    /// Path to write the per-tick movement samples as JSON
    #[arg(long)]
    pub movement_log_json: Option<PathBuf>,

    /// Path to write the engine event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the final engine state (slots, actors, camera) as JSON
    #[arg(long)]
    pub state_json: Option<PathBuf>,

    /// Print every engine event instead of the compact summary
    #[arg(long)]
    pub verbose: bool,
}
