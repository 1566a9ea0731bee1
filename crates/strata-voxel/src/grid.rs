//! Dense voxel storage for one 32×32×32 chunk.
//!
//! The grid is laid out y-major, then z, then x: the voxel at local
//! `(x, y, z)` lives at `y*S*S + z*S + x`. Changing [`CHUNK_SIZE`] invalidates
//! every persisted encoding.

use crate::block::BlockId;

/// Side length of a chunk in voxels.
pub const CHUNK_SIZE: usize = 32;

/// Total number of voxels in a chunk (32³).
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Flat index of local `(x, y, z)`. Each coordinate must be in `0..32`.
#[inline]
pub const fn flat_index(x: usize, y: usize, z: usize) -> usize {
    y * CHUNK_SIZE * CHUNK_SIZE + z * CHUNK_SIZE + x
}

/// Dense array of [`CHUNK_VOLUME`] block ids.
#[derive(Clone, PartialEq, Eq)]
pub struct VoxelGrid {
    cells: Box<[BlockId]>,
}

impl VoxelGrid {
    /// Creates a grid filled entirely with the given block.
    pub fn filled(block: BlockId) -> Self {
        Self {
            cells: vec![block; CHUNK_VOLUME].into_boxed_slice(),
        }
    }

    /// Creates a grid of air.
    pub fn empty() -> Self {
        Self::filled(BlockId::AIR)
    }

    /// Builds a grid from exactly [`CHUNK_VOLUME`] cells.
    ///
    /// Returns `None` for any other length.
    pub fn from_cells(cells: Vec<BlockId>) -> Option<Self> {
        (cells.len() == CHUNK_VOLUME).then(|| Self {
            cells: cells.into_boxed_slice(),
        })
    }

    /// Returns the block at local `(x, y, z)`.
    pub fn get(&self, x: usize, y: usize, z: usize) -> BlockId {
        self.cells[flat_index(x, y, z)]
    }

    /// Sets the block at local `(x, y, z)`.
    pub fn set(&mut self, x: usize, y: usize, z: usize, block: BlockId) {
        self.cells[flat_index(x, y, z)] = block;
    }

    /// Bounds-checked access by flat index.
    pub fn get_flat(&self, index: usize) -> Option<BlockId> {
        self.cells.get(index).copied()
    }

    /// Bounds-checked mutable access by flat index.
    pub fn get_flat_mut(&mut self, index: usize) -> Option<&mut BlockId> {
        self.cells.get_mut(index)
    }

    /// All cells in flat-index order.
    pub fn cells(&self) -> &[BlockId] {
        &self.cells
    }

    /// Iterates `(flat_index, block)` over every non-air voxel.
    pub fn iter_solid(&self) -> impl Iterator<Item = (usize, BlockId)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, block)| !block.is_air())
            .map(|(i, block)| (i, *block))
    }

    /// Number of non-air voxels.
    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|b| !b.is_air()).count()
    }
}

impl Default for VoxelGrid {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for VoxelGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 32k cells are useless in assertion output.
        f.debug_struct("VoxelGrid")
            .field("solid", &self.solid_count())
            .finish()
    }
}
