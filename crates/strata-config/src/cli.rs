//! Command-line argument parsing for the Strata server.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;
use crate::config::{NonResidentEditPolicy, StorageBackend};

/// Strata server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata-server", about = "Strata voxel chunk streaming server")]
pub struct CliArgs {
    /// Horizontal load radius in chunks.
    #[arg(long)]
    pub load_radius: Option<u32>,

    /// Vertical load radius in chunks.
    #[arg(long)]
    pub vertical_radius: Option<u32>,

    /// Chunks materialized per tick.
    #[arg(long)]
    pub max_chunks_per_tick: Option<u32>,

    /// Keep chunks in memory only.
    #[arg(long)]
    pub in_memory: bool,

    /// Directory for chunk files.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Drop edits that target chunks which are not loaded.
    #[arg(long)]
    pub discard_non_resident_edits: bool,

    /// Number of simulated players.
    #[arg(long)]
    pub players: Option<u32>,

    /// Simulated run length in seconds.
    #[arg(long)]
    pub duration: Option<f64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(r) = args.load_radius {
            self.streaming.load_radius = r;
        }
        if let Some(ry) = args.vertical_radius {
            self.streaming.vertical_radius = ry;
        }
        if let Some(n) = args.max_chunks_per_tick {
            self.streaming.max_chunks_per_tick = n;
        }
        if args.in_memory {
            self.storage.backend = StorageBackend::Memory;
        }
        if let Some(ref dir) = args.data_dir {
            self.storage.backend = StorageBackend::Directory;
            self.storage.data_dir = Some(dir.clone());
        }
        if args.discard_non_resident_edits {
            self.edits.non_resident = NonResidentEditPolicy::Discard;
        }
        if let Some(players) = args.players {
            self.simulation.players = players;
        }
        if let Some(secs) = args.duration {
            self.simulation.duration_secs = secs;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
