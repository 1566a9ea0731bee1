//! A resident chunk: coordinate, voxel grid, and save-dirty flag.

use crate::block::BlockId;
use crate::coord::{ChunkCoord, LocalIndex};
use crate::grid::VoxelGrid;

/// A voxel chunk held in memory.
///
/// The dirty flag means "modified since the last successful persist". It is
/// set by [`Chunk::write`] and [`Chunk::mark_dirty`], and cleared only by the
/// owner once the chunk has been saved.
#[derive(Clone, Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    grid: VoxelGrid,
    dirty: bool,
}

impl Chunk {
    /// Wraps a freshly generated or decoded grid. New chunks are clean.
    pub fn new(coord: ChunkCoord, grid: VoxelGrid) -> Self {
        Self {
            coord,
            grid,
            dirty: false,
        }
    }

    /// This chunk's grid coordinate.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Read access to the voxels.
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Returns the block at a local position.
    pub fn get(&self, local: &LocalIndex) -> BlockId {
        self.grid.get_flat(local.flat).unwrap_or(BlockId::AIR)
    }

    /// Writes one voxel and marks the chunk dirty.
    ///
    /// Returns `false` without touching anything if the flat index is out of
    /// range.
    pub fn write(&mut self, flat: usize, block: BlockId) -> bool {
        match self.grid.get_flat_mut(flat) {
            Some(cell) => {
                *cell = block;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Whether the chunk has unsaved modifications.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sets the dirty flag.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears the dirty flag after a successful save.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
