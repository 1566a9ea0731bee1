//! Procedural terrain: a deterministic column-height function filling chunks with stone, dirt and grass.

mod generator;

pub use generator::{TerrainGenerator, TerrainParams, chunk_seed};
