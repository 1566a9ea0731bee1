//! Standalone Strata server.
//!
//! Loads `config.ron`, opens the chunk store, and streams terrain around a
//! few simulated players for a fixed amount of simulated time. Chunks edited
//! along the way are persisted on the flush timer, on disconnect, and at
//! shutdown.
//!
//! Run with: `cargo run -p strata-server -- --in-memory --players 4`

mod setup;
mod sim;

use std::process::ExitCode;

use clap::Parser;
use strata_config::{CliArgs, Config, default_config_dir};
use tracing::{error, info};

use crate::setup::SetupError;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().or_else(default_config_dir);
    let (mut config, config_error) = match config_dir.as_deref() {
        Some(dir) => match Config::load_or_create(dir) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
        None => (Config::default(), None),
    };
    config.apply_cli_overrides(&args);

    strata_log::init_logging(
        config.debug.log_dir.as_deref(),
        cfg!(debug_assertions),
        Some(&config),
    );

    if let Some(e) = config_error {
        error!("Config not loaded, using defaults: {e}");
    }

    match serve(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server stopped: {e}");
            ExitCode::FAILURE
        }
    }
}

fn serve(config: &Config) -> Result<(), SetupError> {
    info!("Strata server starting");
    info!(
        "Streaming: radius {}x{}, {} chunk(s)/tick, tick {:.2}s, flush {:.0}s",
        config.streaming.load_radius,
        config.streaming.vertical_radius,
        config.streaming.max_chunks_per_tick,
        config.streaming.tick_interval_secs,
        config.streaming.flush_interval_secs,
    );

    let mut world = setup::build_world(config)?;
    let summary = sim::run(&mut world, &config.simulation, &config.streaming);
    info!(
        "Run finished: {} flush(es), {} chunk(s) saved, {} edit(s) lost",
        summary.flushes, summary.chunks_saved, summary.edits_lost
    );

    let (_store, view) = world.shutdown();
    info!("World view holds {} solid voxel(s)", view.solid_count());
    Ok(())
}
