use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scumm_formats::BoxBlocks;

/// Decode room box blocks (BOXD + BOXM payloads) into scenario JSON.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// BOXD payload (block header already stripped)
    #[arg(long)]
    boxd: PathBuf,

    /// BOXM payload (block header already stripped)
    #[arg(long)]
    boxm: Option<PathBuf>,

    /// Write the JSON here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let blocks = BoxBlocks::read_files(&args.boxd, args.boxm.as_deref())?;

    for (index, record) in blocks.boxes.iter().enumerate() {
        eprintln!(
            "box {index:>3} ul={:?} lr={:?} flags=0x{:02X} scale={}",
            (record.coords.ul.x, record.coords.ul.y),
            (record.coords.lr.x, record.coords.lr.y),
            record.flags.0,
            record.scale
        );
    }
    eprintln!("{} routing groups", blocks.box_matrix.groups().len());

    let json = serde_json::to_string_pretty(&blocks).context("serializing boxes to JSON")?;
    match args.out {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("Saved box JSON to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
