//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tracks-sim")]
#[command(about = "Drive the track engine against a built-in sound library")]
pub struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the theme and tick the engine
    Run {
        /// Ticks to run
        #[arg(long, default_value_t = 600)]
        ticks: u64,

        /// Hook to set on the theme (1 takes the loop jump)
        #[arg(long, default_value_t = 0)]
        hook: i32,

        /// Start the radio voice line at this tick
        #[arg(long)]
        voice_at: Option<u64>,

        /// Arm a trigger on this marker at start
        #[arg(long)]
        trigger: Option<String>,

        /// Fade-out length for the trigger, in ticks
        #[arg(long, default_value_t = 30)]
        trigger_delay: i32,

        /// Continue with the combat cue when the trigger fires
        #[arg(long)]
        follow_up: bool,

        /// Print the track table every N ticks
        #[arg(long, default_value_t = 60)]
        report_every: u64,

        /// Write engine state here when done
        #[arg(long)]
        save: Option<PathBuf>,

        /// Drive the engine from the scheduler thread in real time
        #[arg(long)]
        realtime: bool,
    },

    /// Restore a saved state and keep ticking
    Resume {
        /// Save file written by `run --save`
        file: PathBuf,

        /// Ticks to run after restoring
        #[arg(long, default_value_t = 300)]
        ticks: u64,

        /// Print the track table every N ticks
        #[arg(long, default_value_t = 60)]
        report_every: u64,
    },
}
