//! Connected players and the last chunk each one was seen in.

use glam::DVec3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strata_voxel::ChunkCoord;

/// Stable identifier of a connected player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

/// A player's position as reported by the host for the current tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerSnapshot {
    /// Player identifier.
    pub id: PlayerId,
    /// World-space position.
    pub position: DVec3,
}

impl PlayerSnapshot {
    /// Creates a snapshot.
    pub fn new(id: PlayerId, position: DVec3) -> Self {
        Self { id, position }
    }

    /// Chunk the player currently stands in.
    pub fn chunk(&self) -> ChunkCoord {
        ChunkCoord::from_world(self.position)
    }
}

/// Maps each connected player to the last chunk they were observed in.
///
/// `None` means connected but not observed yet. Entries are removed outright
/// on disconnect so stale players stop contributing to the active set.
#[derive(Debug, Default, Clone)]
pub struct PlayerChunkIndex {
    entries: FxHashMap<PlayerId, Option<ChunkCoord>>,
}

impl PlayerChunkIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly connected player. Existing entries are kept.
    pub fn register(&mut self, id: PlayerId) {
        self.entries.entry(id).or_insert(None);
    }

    /// Records that `id` is in `coord`.
    ///
    /// Returns `true` on first observation or when the player crossed into a
    /// different chunk.
    pub fn observe(&mut self, id: PlayerId, coord: ChunkCoord) -> bool {
        let slot = self.entries.entry(id).or_insert(None);
        if *slot == Some(coord) {
            return false;
        }
        *slot = Some(coord);
        true
    }

    /// Removes a player, returning their last-known chunk if they had one.
    pub fn remove(&mut self, id: PlayerId) -> Option<ChunkCoord> {
        self.entries.remove(&id).flatten()
    }

    /// Last-known chunk of `id`.
    pub fn last_known(&self, id: PlayerId) -> Option<ChunkCoord> {
        self.entries.get(&id).copied().flatten()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Last-known chunks of every observed player.
    pub fn known_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.entries.values().filter_map(|c| *c)
    }

    /// Number of registered players.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no players are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
