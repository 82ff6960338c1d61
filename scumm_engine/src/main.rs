use anyhow::Result;
use clap::Parser;

use scumm_engine::cli::Args;
use scumm_engine::runtime;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    runtime::execute(args)
}
