//! Replays external voxel edits into the chunk cache.
//!
//! The hook runs after the world view accepted an edit. It resolves the
//! edited voxel to a chunk and local index, writes the new block into the
//! resident grid, and marks the chunk dirty so the next flush or eviction
//! persists it.

use glam::IVec3;
use serde::{Deserialize, Serialize};
use strata_voxel::{BlockId, ChunkCoord, ChunkStore, LocalIndex};

use crate::cache::ChunkCache;

/// What to do with an edit that lands in a chunk that is not resident.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonResidentEdits {
    /// Load (or generate) the chunk, then apply the edit. Nothing is lost.
    #[default]
    ForceLoad,
    /// Leave the cache alone. The edit lives only in the world view and is
    /// overwritten the next time the chunk is materialized.
    Discard,
}

/// Result of replaying one edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// Written into an already resident chunk.
    Applied(ChunkCoord),
    /// The chunk was loaded first, then written.
    AppliedAfterLoad(ChunkCoord),
    /// The chunk was not resident and the policy is [`NonResidentEdits::Discard`].
    Discarded(ChunkCoord),
    /// The edit could not be applied (index fault or store failure).
    Dropped(ChunkCoord),
}

impl EditOutcome {
    /// Chunk the edit resolved to.
    pub fn coord(self) -> ChunkCoord {
        match self {
            Self::Applied(c) | Self::AppliedAfterLoad(c) | Self::Discarded(c) | Self::Dropped(c) => c,
        }
    }

    /// Whether the edit reached the cache.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied(_) | Self::AppliedAfterLoad(_))
    }
}

/// Applies voxel edits to resident chunks.
#[derive(Clone, Copy, Debug, Default)]
pub struct MutationHook {
    policy: NonResidentEdits,
}

impl MutationHook {
    /// Creates a hook with the given non-resident policy.
    pub fn new(policy: NonResidentEdits) -> Self {
        Self { policy }
    }

    /// Replays `block` at world voxel `voxel` into the cache.
    pub fn apply<S: ChunkStore>(
        &self,
        cache: &mut ChunkCache<S>,
        voxel: IVec3,
        block: BlockId,
    ) -> EditOutcome {
        let coord = ChunkCoord::from_voxel(voxel);
        let Some(local) = LocalIndex::of(voxel, coord) else {
            tracing::error!("Voxel {voxel} does not map into its own chunk {coord}; edit dropped");
            return EditOutcome::Dropped(coord);
        };

        let loaded = if cache.is_resident(coord) {
            false
        } else {
            match self.policy {
                NonResidentEdits::Discard => {
                    tracing::debug!("Edit at {voxel} targets non-resident chunk {coord}; discarded");
                    return EditOutcome::Discarded(coord);
                }
                NonResidentEdits::ForceLoad => {
                    if let Err(e) = cache.request(coord) {
                        tracing::warn!("Edit at {voxel} dropped, chunk could not be loaded: {e}");
                        return EditOutcome::Dropped(coord);
                    }
                    true
                }
            }
        };

        if !cache.write_voxel(coord, local.flat, block) {
            tracing::error!(
                "Local index {} out of bounds for chunk {coord}; edit dropped",
                local.flat
            );
            return EditOutcome::Dropped(coord);
        }

        if loaded {
            EditOutcome::AppliedAfterLoad(coord)
        } else {
            EditOutcome::Applied(coord)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use strata_terrain::TerrainGenerator;
    use strata_voxel::{MemoryStore, flat_index};

    fn cache() -> ChunkCache<MemoryStore> {
        ChunkCache::new(MemoryStore::new(), TerrainGenerator::default())
    }

    #[test]
    fn test_edit_to_resident_chunk_marks_dirty() {
        let mut cache = cache();
        let coord = ChunkCoord::new(0, 0, 0);
        cache.request(coord).unwrap();

        let hook = MutationHook::default();
        let outcome = hook.apply(&mut cache, IVec3::new(5, 10, 5), BlockId(9));
        assert_eq!(outcome, EditOutcome::Applied(coord));

        let chunk = cache.get(coord).unwrap();
        assert_eq!(chunk.grid().get_flat(10 * 32 * 32 + 5 * 32 + 5), Some(BlockId(9)));
        assert!(cache.is_dirty(coord));
    }

    #[test]
    fn test_edit_with_negative_coordinates() {
        let mut cache = cache();
        let coord = ChunkCoord::new(-1, -1, -1);
        cache.request(coord).unwrap();

        let outcome = MutationHook::default().apply(&mut cache, IVec3::new(-1, -1, -32), BlockId(4));
        assert_eq!(outcome, EditOutcome::Applied(coord));
        assert_eq!(
            cache.get(coord).unwrap().grid().get_flat(flat_index(31, 31, 0)),
            Some(BlockId(4))
        );
    }

    #[test]
    fn test_discard_policy_leaves_cache_untouched() {
        let mut cache = cache();
        let hook = MutationHook::new(NonResidentEdits::Discard);
        let outcome = hook.apply(&mut cache, IVec3::new(100, 5, 100), BlockId::STONE);

        assert_eq!(outcome, EditOutcome::Discarded(ChunkCoord::new(3, 0, 3)));
        assert!(!outcome.is_applied());
        assert_eq!(cache.resident_count(), 0);
        assert_eq!(cache.dirty_count(), 0);
    }

    #[test]
    fn test_force_load_policy_loads_then_applies() {
        let mut cache = cache();
        let hook = MutationHook::new(NonResidentEdits::ForceLoad);
        let outcome = hook.apply(&mut cache, IVec3::new(100, 5, 100), BlockId(50));

        let coord = ChunkCoord::new(3, 0, 3);
        assert_eq!(outcome, EditOutcome::AppliedAfterLoad(coord));
        assert!(cache.is_resident(coord));
        assert!(cache.is_dirty(coord));
        assert_eq!(
            cache.get(coord).unwrap().grid().get(4, 5, 4),
            BlockId(50)
        );
    }
}
