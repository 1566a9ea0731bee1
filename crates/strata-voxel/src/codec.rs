//! Text encoding of a [`VoxelGrid`] for the durable store.
//!
//! ## Layout
//!
//! | Step | Form |
//! |------|------|
//! | 1 | [`CHUNK_VOLUME`] block ids in flat-index order |
//! | 2 | each id as a little-endian `u16`, `2 × 32768 = 65536` bytes |
//! | 3 | standard base64 with padding |
//!
//! The store only accepts text values, hence step 3. There is no header and
//! no version byte: a grid of any other size fails to decode.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::block::BlockId;
use crate::grid::{CHUNK_VOLUME, VoxelGrid};

/// Exact byte length of a decoded grid.
pub const ENCODED_BYTE_LEN: usize = 2 * CHUNK_VOLUME;

/// Errors that can occur while decoding a stored chunk.
///
/// Callers treat every variant as a cache miss and regenerate the chunk.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The stored text is not valid base64.
    #[error("invalid base64 chunk encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    /// The decoded payload does not hold exactly one chunk.
    #[error("corrupt chunk data: expected {expected} bytes, got {actual}")]
    CorruptChunkData {
        /// Required byte count.
        expected: usize,
        /// Byte count actually decoded.
        actual: usize,
    },
}

/// Encodes a grid as base64 text.
pub fn encode(grid: &VoxelGrid) -> String {
    let mut bytes = Vec::with_capacity(ENCODED_BYTE_LEN);
    for block in grid.cells() {
        bytes.extend_from_slice(&block.0.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Decodes text produced by [`encode`].
pub fn decode(text: &str) -> Result<VoxelGrid, CodecError> {
    let bytes = STANDARD.decode(text.trim())?;
    if bytes.len() != ENCODED_BYTE_LEN {
        return Err(CodecError::CorruptChunkData {
            expected: ENCODED_BYTE_LEN,
            actual: bytes.len(),
        });
    }

    let cells: Vec<BlockId> = bytes
        .chunks_exact(2)
        .map(|pair| BlockId(u16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    VoxelGrid::from_cells(cells).ok_or(CodecError::CorruptChunkData {
        expected: ENCODED_BYTE_LEN,
        actual: bytes.len(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
