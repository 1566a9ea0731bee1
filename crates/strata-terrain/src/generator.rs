//! Chunk terrain generation.
//!
//! Every world column gets a surface height from two sinusoids seeded by the
//! chunk coordinate. Below the surface sits a dirt band of `dirt_depth`
//! voxels, then stone. Generation has no hidden state: the same coordinate
//! always produces the same grid.

use strata_voxel::{BlockId, CHUNK_SIZE, ChunkCoord, VoxelGrid, flat_index};

/// Parameters of the height function.
///
/// `height = floor(base + A·sin(wx·f1 + seed) + B·cos(wz·f2 + seed))` where
/// `seed = cx·seed_stride + cz`.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainParams {
    /// Mean surface height in voxels.
    pub base_height: f64,
    /// Amplitude `A` of the X sinusoid.
    pub amplitude_x: f64,
    /// Amplitude `B` of the Z sinusoid.
    pub amplitude_z: f64,
    /// Frequency `f1` along world X.
    pub frequency_x: f64,
    /// Frequency `f2` along world Z.
    pub frequency_z: f64,
    /// Multiplier applied to the chunk X coordinate when deriving the seed.
    pub seed_stride: i64,
    /// Thickness of the dirt band below the grass voxel.
    pub dirt_depth: i32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            base_height: 15.0,
            amplitude_x: 5.0,
            amplitude_z: 5.0,
            frequency_x: 0.1,
            frequency_z: 0.15,
            seed_stride: 1000,
            dirt_depth: 5,
        }
    }
}

/// Derive the phase seed for a chunk: `cx * stride + cz`, saturating at the `i64` bounds.
pub fn chunk_seed(coord: ChunkCoord, stride: i64) -> f64 {
    i64::from(coord.x)
        .saturating_mul(stride)
        .saturating_add(i64::from(coord.z)) as f64
}

/// Deterministic terrain generator.
#[derive(Clone, Debug, Default)]
pub struct TerrainGenerator {
    params: TerrainParams,
}

impl TerrainGenerator {
    /// Creates a generator with the given parameters.
    pub fn new(params: TerrainParams) -> Self {
        Self { params }
    }

    /// Surface height of world column `(wx, wz)` as seen by chunk `coord`.
    ///
    /// `sin`/`cos` go through `libm` so results are bit-identical on every
    /// platform.
    pub fn column_height(&self, wx: i32, wz: i32, coord: ChunkCoord) -> i32 {
        let p = &self.params;
        let seed = chunk_seed(coord, p.seed_stride);
        let h = p.base_height
            + libm::sin(wx as f64 * p.frequency_x + seed) * p.amplitude_x
            + libm::cos(wz as f64 * p.frequency_z + seed) * p.amplitude_z;
        libm::floor(h) as i32
    }

    /// Block for world height `wy` in a column whose surface is at `height`.
    pub fn block_at(&self, wy: i32, height: i32) -> BlockId {
        if wy < height.saturating_sub(self.params.dirt_depth) {
            BlockId::STONE
        } else if wy < height {
            BlockId::DIRT
        } else if wy == height {
            BlockId::GRASS
        } else {
            BlockId::AIR
        }
    }

    /// Generates the full voxel grid for `coord`.
    pub fn generate(&self, coord: ChunkCoord) -> VoxelGrid {
        let mut grid = VoxelGrid::empty();
        let origin = coord.origin();

        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let wx = origin.x.saturating_add(x as i32);
                let wz = origin.z.saturating_add(z as i32);
                let height = self.column_height(wx, wz, coord);

                // Whole column above the surface: nothing to write.
                if origin.y > height {
                    continue;
                }
                for y in 0..CHUNK_SIZE {
                    let block = self.block_at(origin.y.saturating_add(y as i32), height);
                    if let Some(cell) = grid.get_flat_mut(flat_index(x, y, z)) {
                        *cell = block;
                    }
                }
            }
        }

        tracing::trace!("Generated chunk {coord} ({} solid)", grid.solid_count());
        grid
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
