//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Largest accepted magnitude for terrain heights, amplitudes and dirt depth, in voxels.
pub const MAX_TERRAIN_EXTENT: f64 = 1.0e6;

/// Largest accepted magnitude for `terrain.seed_stride`.
pub const MAX_SEED_STRIDE: i64 = 1_000_000_000;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Chunk streaming settings.
    pub streaming: StreamingConfig,
    /// Terrain generator parameters.
    pub terrain: TerrainConfig,
    /// Durable chunk storage.
    pub storage: StorageConfig,
    /// Handling of voxel edits.
    pub edits: EditConfig,
    /// Simulated player load for the standalone server.
    pub simulation: SimulationConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Chunk streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    /// Horizontal load radius in chunks (X and Z).
    pub load_radius: u32,
    /// Vertical load radius in chunks (Y). 0 keeps a single layer.
    pub vertical_radius: u32,
    /// Maximum chunks materialized per tick.
    pub max_chunks_per_tick: u32,
    /// Seconds between streaming ticks.
    pub tick_interval_secs: f64,
    /// Seconds between flushes of dirty chunks.
    pub flush_interval_secs: f64,
}

/// Terrain generator parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Mean surface height in voxels.
    pub base_height: f64,
    /// Amplitude of the X sinusoid.
    pub amplitude_x: f64,
    /// Amplitude of the Z sinusoid.
    pub amplitude_z: f64,
    /// Frequency along world X.
    pub frequency_x: f64,
    /// Frequency along world Z.
    pub frequency_z: f64,
    /// Chunk X multiplier in the per-chunk seed.
    pub seed_stride: i64,
    /// Dirt band thickness below the surface.
    pub dirt_depth: i32,
}

/// Where chunk encodings are persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process memory. Nothing survives a restart.
    Memory,
    /// One file per chunk under `data_dir`.
    #[default]
    Directory,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Store implementation.
    pub backend: StorageBackend,
    /// Chunk directory. `None` uses the platform data directory.
    pub data_dir: Option<PathBuf>,
}

/// What happens to an edit in a chunk that is not resident.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NonResidentEditPolicy {
    /// Load the chunk, then apply the edit.
    #[default]
    ForceLoad,
    /// Keep the edit in the world view only.
    Discard,
}

/// Edit handling configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditConfig {
    /// Policy for edits outside resident chunks.
    pub non_resident: NonResidentEditPolicy,
}

/// Simulated players driven by the standalone server loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of simulated players.
    pub players: u32,
    /// Walking speed in voxels per second.
    pub walk_speed: f64,
    /// Simulated run length in seconds.
    pub duration_secs: f64,
    /// Simulation step in seconds.
    pub step_secs: f64,
    /// Seconds between scripted voxel edits. 0 disables them.
    pub edit_interval_secs: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files in debug builds.
    pub log_dir: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_radius: 2,
            vertical_radius: 0,
            max_chunks_per_tick: 2,
            tick_interval_secs: 0.5,
            flush_interval_secs: 30.0,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            base_height: 15.0,
            amplitude_x: 5.0,
            amplitude_z: 5.0,
            frequency_x: 0.1,
            frequency_z: 0.15,
            seed_stride: 1000,
            dirt_depth: 5,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            players: 2,
            walk_speed: 8.0,
            duration_secs: 120.0,
            step_secs: 1.0 / 20.0,
            edit_interval_secs: 5.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// Platform config directory for Strata (`<config_dir>/strata`).
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("strata"))
}

/// Platform data directory for chunk files (`<data_dir>/strata/chunks`).
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("strata").join("chunks"))
}

impl StorageConfig {
    /// Chunk directory to use: the configured one, else the platform default.
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(default_data_dir)
    }
}

// --- Validation ---

impl Config {
    /// Rejects values the streaming core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.streaming;
        if s.max_chunks_per_tick == 0 {
            return Err(ConfigError::InvalidValue {
                field: "streaming.max_chunks_per_tick",
                reason: "must be at least 1".to_string(),
            });
        }
        positive("streaming.tick_interval_secs", s.tick_interval_secs)?;
        positive("streaming.flush_interval_secs", s.flush_interval_secs)?;
        positive("simulation.step_secs", self.simulation.step_secs)?;
        self.terrain.validate()
    }
}

impl TerrainConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        bounded("terrain.base_height", self.base_height)?;
        bounded("terrain.amplitude_x", self.amplitude_x)?;
        bounded("terrain.amplitude_z", self.amplitude_z)?;
        finite("terrain.frequency_x", self.frequency_x)?;
        finite("terrain.frequency_z", self.frequency_z)?;
        if self.seed_stride.unsigned_abs() > MAX_SEED_STRIDE.unsigned_abs() {
            return Err(ConfigError::InvalidValue {
                field: "terrain.seed_stride",
                reason: format!("{} exceeds +/-{MAX_SEED_STRIDE}", self.seed_stride),
            });
        }
        if self.dirt_depth < 0 || f64::from(self.dirt_depth) > MAX_TERRAIN_EXTENT {
            return Err(ConfigError::InvalidValue {
                field: "terrain.dirt_depth",
                reason: format!("{} is not in 0..={MAX_TERRAIN_EXTENT}", self.dirt_depth),
            });
        }
        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} is not a finite number"),
        })
    }
}

fn bounded(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value.abs() <= MAX_TERRAIN_EXTENT {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} exceeds +/-{MAX_TERRAIN_EXTENT} voxels"),
        })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} is not a positive number of seconds"),
        })
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::WriteError {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::WriteError {
            path: config_path.clone(),
            source,
        })
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = read_config(&config_dir.join(CONFIG_FILE))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}
