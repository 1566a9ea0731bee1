//! Chunk addressing: world positions to chunk coordinates and chunk-local indices.
//!
//! All divisions are true floor divisions, so negative world coordinates map
//! onto decreasing chunk coordinates without a gap or overlap around zero.

use std::fmt;
use std::ops::RangeInclusive;

use glam::{DVec3, IVec3};

use crate::grid::{CHUNK_SIZE, flat_index};

/// [`CHUNK_SIZE`] as a signed integer for coordinate arithmetic.
const SIZE_I32: i32 = CHUNK_SIZE as i32;

/// Lowest chunk coordinate on any axis; holds the voxel `i32::MIN`.
pub const MIN_CHUNK: i32 = i32::MIN.div_euclid(SIZE_I32);

/// Highest chunk coordinate on any axis; holds the voxel `i32::MAX`.
pub const MAX_CHUNK: i32 = i32::MAX.div_euclid(SIZE_I32);

/// Identifies a chunk's position in the chunk grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// Chunk-grid X coordinate.
    pub x: i32,
    /// Chunk-grid Y coordinate.
    pub y: i32,
    /// Chunk-grid Z coordinate.
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing the given voxel.
    pub fn from_voxel(voxel: IVec3) -> Self {
        Self {
            x: voxel.x.div_euclid(SIZE_I32),
            y: voxel.y.div_euclid(SIZE_I32),
            z: voxel.z.div_euclid(SIZE_I32),
        }
    }

    /// Chunk containing a floating-point world position (e.g. a player).
    pub fn from_world(position: DVec3) -> Self {
        Self::from_voxel(voxel_at(position))
    }

    /// Returns the coordinate offset by `(dx, dy, dz)` chunks, saturating at the `i32` bounds.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }

    /// Whether every axis lies in `[MIN_CHUNK, MAX_CHUNK]`, i.e. the chunk
    /// covers real `i32` voxels.
    pub fn in_voxel_range(self) -> bool {
        let range = MIN_CHUNK..=MAX_CHUNK;
        range.contains(&self.x) && range.contains(&self.y) && range.contains(&self.z)
    }

    /// World voxel of this chunk's local `(0, 0, 0)` corner.
    ///
    /// Saturates for coordinates outside [`ChunkCoord::in_voxel_range`].
    pub fn origin(self) -> IVec3 {
        IVec3::new(
            self.x.saturating_mul(SIZE_I32),
            self.y.saturating_mul(SIZE_I32),
            self.z.saturating_mul(SIZE_I32),
        )
    }

    /// World voxel for a local position inside this chunk.
    pub fn world_voxel(self, local: &LocalIndex) -> IVec3 {
        let origin = self.origin();
        IVec3::new(
            origin.x.saturating_add(local.x as i32),
            origin.y.saturating_add(local.y as i32),
            origin.z.saturating_add(local.z as i32),
        )
    }

    /// Key under which this chunk is persisted in a [`ChunkStore`](crate::ChunkStore).
    pub fn store_key(self) -> String {
        format!("chunk_{self}")
    }

    /// Whether `other` lies within the box `|dx| <= radius, |dy| <= vertical, |dz| <= radius`.
    pub fn within_box(self, other: ChunkCoord, radius: u32, vertical: u32) -> bool {
        self.x.abs_diff(other.x) <= radius
            && self.y.abs_diff(other.y) <= vertical
            && self.z.abs_diff(other.z) <= radius
    }

    /// Every coordinate in the box around `self`, x-major then y then z.
    ///
    /// The box is clipped to `[MIN_CHUNK, MAX_CHUNK]` on each axis.
    pub fn box_around(self, radius: u32, vertical: u32) -> impl Iterator<Item = ChunkCoord> {
        let zs = axis_span(self.z, radius);
        let ys = axis_span(self.y, vertical);
        axis_span(self.x, radius).flat_map(move |x| {
            let zs = zs.clone();
            ys.clone()
                .flat_map(move |y| zs.clone().map(move |z| ChunkCoord::new(x, y, z)))
        })
    }
}

/// `center ± radius`, clipped to the chunk range.
fn axis_span(center: i32, radius: u32) -> RangeInclusive<i32> {
    let lo = (i64::from(center) - i64::from(radius)).max(i64::from(MIN_CHUNK));
    let hi = (i64::from(center) + i64::from(radius)).min(i64::from(MAX_CHUNK));
    // Both bounds are inside [MIN_CHUNK, MAX_CHUNK] after clamping.
    lo as i32..=hi as i32
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// Floors a floating-point world position onto the voxel containing it.
pub fn voxel_at(position: DVec3) -> IVec3 {
    position.floor().as_ivec3()
}

/// A voxel position local to one chunk, plus its flat grid index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalIndex {
    /// Local X in `[0, CHUNK_SIZE)`.
    pub x: usize,
    /// Local Y in `[0, CHUNK_SIZE)`.
    pub y: usize,
    /// Local Z in `[0, CHUNK_SIZE)`.
    pub z: usize,
    /// `y*S*S + z*S + x`.
    pub flat: usize,
}

impl LocalIndex {
    /// Resolves `voxel` relative to `coord`.
    ///
    /// Returns `None` if the voxel does not lie inside that chunk.
    pub fn of(voxel: IVec3, coord: ChunkCoord) -> Option<Self> {
        let origin = coord.origin();
        let range = 0..i64::from(SIZE_I32);
        let local = [
            i64::from(voxel.x) - i64::from(origin.x),
            i64::from(voxel.y) - i64::from(origin.y),
            i64::from(voxel.z) - i64::from(origin.z),
        ];
        if !local.iter().all(|v| range.contains(v)) {
            return None;
        }
        let [x, y, z] = local.map(|v| v as usize);
        Some(Self {
            x,
            y,
            z,
            flat: flat_index(x, y, z),
        })
    }

    /// Inverse of the flat index formula.
    pub fn from_flat(flat: usize) -> Self {
        Self {
            x: flat % CHUNK_SIZE,
            y: flat / (CHUNK_SIZE * CHUNK_SIZE),
            z: (flat / CHUNK_SIZE) % CHUNK_SIZE,
            flat,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
