//! kcc-sim - run a character controller scene headless and print the agent's track

use std::path::PathBuf;

use clap::Parser;
use sim::{Runner, SceneConfig, SimError};

#[derive(Parser)]
#[command(name = "kcc-sim")]
#[command(about = "Run a kinematic character controller scene headless", long_about = None)]
struct Cli {
    /// Path to the scene TOML file
    scene: PathBuf,
    /// Number of ticks to run (default: the scene's `ticks`)
    #[arg(short, long)]
    ticks: Option<u64>,
    /// Print a sample every N ticks
    #[arg(short, long, default_value = "30")]
    every: u64,
}

fn main() -> Result<(), SimError> {
    env_logger::init();
    let cli = Cli::parse();

    let scene = SceneConfig::from_file(&cli.scene).inspect_err(|e| log::error!("{e}"))?;
    let ticks = cli.ticks.unwrap_or(scene.ticks);
    let mut runner = Runner::new(scene)?;

    let every = cli.every.max(1);
    for sample in runner.run(ticks) {
        if sample.tick % every == 0 || sample.tick + 1 == ticks {
            println!(
                "{:>6}  pos ({:>8.3}, {:>8.3}, {:>8.3})  vel ({:>7.3}, {:>7.3}, {:>7.3})  {:<8}  {:?}",
                sample.tick,
                sample.position.x,
                sample.position.y,
                sample.position.z,
                sample.velocity.x,
                sample.velocity.y,
                sample.velocity.z,
                if sample.sliding {
                    "sliding"
                } else if sample.standing {
                    "standing"
                } else {
                    "falling"
                },
                sample.attachment,
            );
        }
    }
    Ok(())
}
