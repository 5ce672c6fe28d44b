// Tooling binary; items are crate-private and need no rustdoc.
#![allow(missing_docs)]

mod logging;
mod merge;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "ESP32 firmware image tasks", long_about = None)]
#[command(version)]
struct Cli {
    /// Show debug logs (equivalent to RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge bootloader, partition table and application into one flashable image
    ///
    /// The environment is taken from --env, else `default_envs` in
    /// platformio.ini, else the only built environment under .pio/build.
    Merge(merge::MergeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Commands::Merge(args) => merge::run(&args),
    }
}
