//! Block-type identifiers stored in every voxel cell.

use serde::{Deserialize, Serialize};

/// Compact identifier stored inside every voxel cell (2 bytes).
///
/// Air is always ID 0 so that a zeroed grid represents empty space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Empty space. Never written into the world view during materialization.
    pub const AIR: Self = Self(0);
    /// Deep fill below the dirt layer.
    pub const STONE: Self = Self(1);
    /// Layer just below the surface.
    pub const DIRT: Self = Self(2);
    /// Topmost voxel of every terrain column.
    pub const GRASS: Self = Self(3);

    /// Returns `true` if this block is air.
    pub fn is_air(self) -> bool {
        self == Self::AIR
    }

    /// Short name for the built-in terrain blocks, `None` for anything else.
    pub fn terrain_name(self) -> Option<&'static str> {
        match self {
            Self::AIR => Some("air"),
            Self::STONE => Some("stone"),
            Self::DIRT => Some("dirt"),
            Self::GRASS => Some("grass"),
            _ => None,
        }
    }
}

impl From<u16> for BlockId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}
