//! The externally visible world that chunks are materialized into.

use glam::IVec3;
use rustc_hash::FxHashMap;
use strata_voxel::BlockId;

/// Failure of the host world view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// The host rejected the write or is not ready.
    #[error("world view unavailable: {0}")]
    Unavailable(String),
}

/// The authoritative, playable world owned by the host.
pub trait WorldView {
    /// Places `block` at world voxel `voxel`.
    fn set_voxel(&mut self, voxel: IVec3, block: BlockId) -> Result<(), ViewError>;
}

impl<V: WorldView + ?Sized> WorldView for &mut V {
    fn set_voxel(&mut self, voxel: IVec3, block: BlockId) -> Result<(), ViewError> {
        (**self).set_voxel(voxel, block)
    }
}

impl<V: WorldView + ?Sized> WorldView for Box<V> {
    fn set_voxel(&mut self, voxel: IVec3, block: BlockId) -> Result<(), ViewError> {
        (**self).set_voxel(voxel, block)
    }
}

/// Sparse in-memory world view. Unset voxels read as air.
#[derive(Debug, Default, Clone)]
pub struct VoxelWorldView {
    voxels: FxHashMap<IVec3, BlockId>,
    writes: u64,
}

impl VoxelWorldView {
    /// Creates an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block currently at `voxel`.
    pub fn get(&self, voxel: IVec3) -> BlockId {
        self.voxels.get(&voxel).copied().unwrap_or(BlockId::AIR)
    }

    /// Number of non-air voxels.
    pub fn solid_count(&self) -> usize {
        self.voxels.len()
    }

    /// Total `set_voxel` calls received.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl WorldView for VoxelWorldView {
    fn set_voxel(&mut self, voxel: IVec3, block: BlockId) -> Result<(), ViewError> {
        self.writes += 1;
        if block.is_air() {
            self.voxels.remove(&voxel);
        } else {
            self.voxels.insert(voxel, block);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_remove_voxels() {
        let mut view = VoxelWorldView::new();
        view.set_voxel(IVec3::new(1, 2, 3), BlockId::STONE).unwrap();
        assert_eq!(view.get(IVec3::new(1, 2, 3)), BlockId::STONE);
        assert_eq!(view.solid_count(), 1);

        view.set_voxel(IVec3::new(1, 2, 3), BlockId::AIR).unwrap();
        assert_eq!(view.get(IVec3::new(1, 2, 3)), BlockId::AIR);
        assert_eq!(view.solid_count(), 0);
        assert_eq!(view.writes(), 2);
    }

    #[test]
    fn test_mut_ref_forwards() {
        fn place<V: WorldView>(mut view: V) {
            view.set_voxel(IVec3::new(-4, 0, 9), BlockId::GRASS).unwrap();
        }

        let mut view = VoxelWorldView::new();
        place(&mut view);
        assert_eq!(view.get(IVec3::new(-4, 0, 9)), BlockId::GRASS);
    }
}
