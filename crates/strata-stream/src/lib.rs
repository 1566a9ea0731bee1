//! Chunk streaming: the resident chunk cache, the per-tick load/unload scheduler,
//! the voxel-edit hook, and the `World` that composes them around a world view.

pub mod cache;
pub mod mutation;
pub mod player;
pub mod scheduler;
pub mod timer;
pub mod view;
pub mod world;

pub use cache::{CacheError, CacheStats, ChunkCache, FlushReport};
pub use mutation::{EditOutcome, MutationHook, NonResidentEdits};
pub use player::{PlayerChunkIndex, PlayerId, PlayerSnapshot};
pub use scheduler::{StreamConfig, StreamScheduler, TickReport};
pub use timer::{IntervalTimer, MAX_CATCH_UP_FIRES};
pub use view::{ViewError, VoxelWorldView, WorldView};
pub use world::World;
