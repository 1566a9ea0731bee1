//! Configuration for the Strata chunk streaming server.
//!
//! Settings persist to disk as `config.ron`, tolerate missing or unknown
//! fields, and can be overridden from the command line via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, EditConfig, MAX_SEED_STRIDE, MAX_TERRAIN_EXTENT, NonResidentEditPolicy,
    SimulationConfig, StorageBackend, StorageConfig, StreamingConfig, TerrainConfig,
    default_config_dir, default_data_dir,
};
pub use error::ConfigError;
