//! Voxel chunk data: coordinate mapping, dense grids, the text codec, and durable stores.

pub mod block;
pub mod chunk;
pub mod codec;
pub mod coord;
pub mod grid;
pub mod store;

pub use block::BlockId;
pub use chunk::Chunk;
pub use codec::{CodecError, ENCODED_BYTE_LEN};
pub use coord::{ChunkCoord, LocalIndex, MAX_CHUNK, MIN_CHUNK, voxel_at};
pub use grid::{CHUNK_SIZE, CHUNK_VOLUME, VoxelGrid, flat_index};
pub use store::{ChunkStore, DirStore, MemoryStore, StoreError};
