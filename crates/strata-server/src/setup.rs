//! Turns loaded configuration into streaming components.

use std::path::PathBuf;

use strata_config::{
    Config, ConfigError, NonResidentEditPolicy, StorageBackend, StorageConfig, StreamingConfig,
    TerrainConfig,
};
use strata_stream::{NonResidentEdits, StreamConfig, VoxelWorldView, World};
use strata_terrain::{TerrainGenerator, TerrainParams};
use strata_voxel::{ChunkStore, DirStore, MemoryStore, StoreError};

/// Store selected at runtime from `storage.backend`.
pub type DynStore = Box<dyn ChunkStore>;

/// The world type the server runs.
pub type ServerWorld = World<DynStore, VoxelWorldView>;

/// Startup failures.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot open chunk directory {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("no chunk directory configured and no platform data directory available")]
    NoDataDir,
}

pub fn stream_config(streaming: &StreamingConfig) -> StreamConfig {
    StreamConfig {
        load_radius: streaming.load_radius,
        vertical_radius: streaming.vertical_radius,
        max_chunks_per_tick: streaming.max_chunks_per_tick.max(1) as usize,
    }
}

pub fn terrain_params(terrain: &TerrainConfig) -> TerrainParams {
    TerrainParams {
        base_height: terrain.base_height,
        amplitude_x: terrain.amplitude_x,
        amplitude_z: terrain.amplitude_z,
        frequency_x: terrain.frequency_x,
        frequency_z: terrain.frequency_z,
        seed_stride: terrain.seed_stride,
        dirt_depth: terrain.dirt_depth,
    }
}

pub fn edit_policy(policy: NonResidentEditPolicy) -> NonResidentEdits {
    match policy {
        NonResidentEditPolicy::ForceLoad => NonResidentEdits::ForceLoad,
        NonResidentEditPolicy::Discard => NonResidentEdits::Discard,
    }
}

/// Opens the configured store.
pub fn open_store(storage: &StorageConfig) -> Result<DynStore, SetupError> {
    match storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Chunk storage: memory (nothing survives a restart)");
            Ok(Box::new(MemoryStore::new()))
        }
        StorageBackend::Directory => {
            let path = storage.resolved_data_dir().ok_or(SetupError::NoDataDir)?;
            let store = DirStore::open(&path).map_err(|source| SetupError::Store {
                path: path.clone(),
                source,
            })?;
            tracing::info!("Chunk storage: {}", path.display());
            Ok(Box::new(store))
        }
    }
}

/// Validates `config` and assembles the world it describes.
pub fn build_world(config: &Config) -> Result<ServerWorld, SetupError> {
    config.validate()?;
    let store = open_store(&config.storage)?;
    Ok(World::new(
        store,
        VoxelWorldView::new(),
        TerrainGenerator::new(terrain_params(&config.terrain)),
        stream_config(&config.streaming),
        edit_policy(config.edits.non_resident),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_maps_to_default_components() {
        let config = Config::default();
        assert_eq!(stream_config(&config.streaming), StreamConfig::default());
        assert_eq!(terrain_params(&config.terrain), TerrainParams::default());
        assert_eq!(
            edit_policy(config.edits.non_resident),
            NonResidentEdits::default()
        );
    }

    #[test]
    fn test_directory_store_created_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            backend: StorageBackend::Directory,
            data_dir: Some(dir.path().join("world")),
        };
        let mut store = open_store(&storage).unwrap();
        store.set("chunk_0,0,0", "AAAA".to_string()).unwrap();
        assert!(dir.path().join("world").exists());
        assert!(store.has("chunk_0,0,0").unwrap());
    }

    #[test]
    fn test_build_world_rejects_invalid_config() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;
        config.streaming.tick_interval_secs = -1.0;
        assert!(matches!(
            build_world(&config),
            Err(SetupError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
