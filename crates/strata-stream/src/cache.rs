//! The resident chunk cache.
//!
//! [`ChunkCache`] is the single owner of every in-memory [`Chunk`]. A miss is
//! served from the durable store when an encoding exists there, otherwise
//! from the terrain generator. Modified chunks are tracked in a dirty set and
//! written back on flush or before eviction.
//!
//! The cache records *what* must happen through two FIFO queues but never
//! drains them itself; the [`StreamScheduler`](crate::StreamScheduler)
//! decides how fast.
//!
//! Invariants:
//! - every dirty coordinate is resident;
//! - every coordinate in the load queue is resident;
//! - a dirty chunk is only evicted after it was persisted successfully, and
//!   eviction removes the coordinate from the map, the dirty set, and both
//!   queues.

use std::collections::VecDeque;
use std::collections::hash_map::Entry;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_terrain::TerrainGenerator;
use strata_voxel::{BlockId, Chunk, ChunkCoord, ChunkStore, StoreError, VoxelGrid, codec};

/// Errors surfaced by cache operations that touch the durable store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The store failed while loading or saving a chunk.
    #[error("store failure for chunk {coord}: {source}")]
    Store {
        /// Chunk being loaded or saved.
        coord: ChunkCoord,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

/// Cumulative counters describing cache activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Chunks produced by the terrain generator.
    pub generated: u64,
    /// Chunks restored from the store.
    pub decoded: u64,
    /// Stored encodings that failed to decode and were regenerated.
    pub decode_failures: u64,
    /// Successful writes to the store.
    pub persisted: u64,
    /// Chunks removed from memory.
    pub evicted: u64,
    /// Store calls that failed.
    pub store_errors: u64,
}

/// Outcome of [`ChunkCache::flush_dirty`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Chunks written to the store.
    pub persisted: usize,
    /// Chunks whose write failed; they stay dirty.
    pub failed: usize,
}

/// Owns the resident chunk set and orchestrates generation, decoding and persistence.
pub struct ChunkCache<S> {
    chunks: FxHashMap<ChunkCoord, Chunk>,
    load_queue: VecDeque<ChunkCoord>,
    unload_queue: VecDeque<ChunkCoord>,
    dirty: FxHashSet<ChunkCoord>,
    store: S,
    generator: TerrainGenerator,
    stats: CacheStats,
}

impl<S: ChunkStore> ChunkCache<S> {
    /// Creates an empty cache over `store`, generating misses with `generator`.
    pub fn new(store: S, generator: TerrainGenerator) -> Self {
        Self {
            chunks: FxHashMap::default(),
            load_queue: VecDeque::new(),
            unload_queue: VecDeque::new(),
            dirty: FxHashSet::default(),
            store,
            generator,
            stats: CacheStats::default(),
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Returns the resident chunk at `coord`, creating it on a miss.
    ///
    /// A miss reads `coord.store_key()` from the store and decodes it; a
    /// missing or undecodable value falls back to fresh generation. New chunks
    /// are clean and appended to the load queue. Store failures leave the
    /// cache unchanged so the caller can retry.
    ///
    /// Voxel writes go through [`ChunkCache::write_voxel`] so the dirty set
    /// always sees them.
    pub fn request(&mut self, coord: ChunkCoord) -> Result<&Chunk, CacheError> {
        match self.chunks.entry(coord) {
            Entry::Occupied(entry) => Ok(&*entry.into_mut()),
            Entry::Vacant(entry) => {
                let grid = load_or_generate(&self.store, &self.generator, &mut self.stats, coord)?;
                self.load_queue.push_back(coord);
                Ok(&*entry.insert(Chunk::new(coord, grid)))
            }
        }
    }

    /// Writes `block` at `flat` in a resident chunk and marks it dirty.
    ///
    /// Returns `false` if the chunk is not resident or `flat` is out of range.
    pub fn write_voxel(&mut self, coord: ChunkCoord, flat: usize, block: BlockId) -> bool {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return false;
        };
        if !chunk.write(flat, block) {
            return false;
        }
        self.dirty.insert(coord);
        true
    }

    /// Flags a resident chunk as modified. Returns `false` if not resident.
    pub fn mark_dirty(&mut self, coord: ChunkCoord) -> bool {
        match self.chunks.get_mut(&coord) {
            Some(chunk) => {
                chunk.mark_dirty();
                self.dirty.insert(coord);
                true
            }
            None => false,
        }
    }

    /// Encodes and writes a resident chunk to the store, dirty or not.
    ///
    /// Returns `Ok(false)` if the chunk is not resident. On failure the chunk
    /// keeps its dirty state.
    pub fn persist(&mut self, coord: ChunkCoord) -> Result<bool, CacheError> {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return Ok(false);
        };

        let encoded = codec::encode(chunk.grid());
        if let Err(source) = self.store.set(&coord.store_key(), encoded) {
            self.stats.store_errors += 1;
            tracing::warn!("Failed to persist chunk {coord}: {source}");
            return Err(CacheError::Store { coord, source });
        }

        chunk.clear_dirty();
        self.dirty.remove(&coord);
        self.stats.persisted += 1;
        tracing::debug!("Persisted chunk {coord}");
        Ok(true)
    }

    /// Persists `coord` only if it is resident and dirty.
    pub fn persist_if_dirty(&mut self, coord: ChunkCoord) -> Result<bool, CacheError> {
        let flagged = self.chunks.get(&coord).is_some_and(Chunk::is_dirty);
        if flagged || self.dirty.contains(&coord) {
            self.persist(coord)
        } else {
            Ok(false)
        }
    }

    /// Removes a chunk from memory, persisting it first if dirty.
    ///
    /// Returns `Ok(false)` if the chunk was not resident. If the save fails
    /// the chunk stays resident and dirty.
    pub fn evict(&mut self, coord: ChunkCoord) -> Result<bool, CacheError> {
        self.persist_if_dirty(coord)?;

        let removed = self.chunks.remove(&coord).is_some();
        self.dirty.remove(&coord);
        self.load_queue.retain(|c| *c != coord);
        self.unload_queue.retain(|c| *c != coord);

        if removed {
            self.stats.evicted += 1;
            tracing::debug!("Evicted chunk {coord}");
        }
        Ok(removed)
    }

    /// Persists every dirty chunk. Chunks that fail to save stay dirty.
    pub fn flush_dirty(&mut self) -> FlushReport {
        let mut coords: Vec<ChunkCoord> = self.dirty.iter().copied().collect();
        coords.sort_unstable();

        let mut report = FlushReport::default();
        for coord in coords {
            match self.persist(coord) {
                Ok(true) => report.persisted += 1,
                Ok(false) => {
                    self.dirty.remove(&coord);
                }
                Err(_) => report.failed += 1,
            }
        }
        report
    }

    // -- queues -------------------------------------------------------------

    /// Pops the oldest chunk awaiting materialization.
    pub fn pop_load(&mut self) -> Option<ChunkCoord> {
        self.load_queue.pop_front()
    }

    /// Puts a chunk back at the head of the load queue after a failed materialization.
    pub fn requeue_load_front(&mut self, coord: ChunkCoord) {
        if self.chunks.contains_key(&coord) && !self.load_queue.contains(&coord) {
            self.load_queue.push_front(coord);
        }
    }

    /// Appends a resident chunk to the unload queue.
    ///
    /// Returns `false` if it is not resident or already queued.
    pub fn enqueue_unload(&mut self, coord: ChunkCoord) -> bool {
        if !self.chunks.contains_key(&coord) || self.unload_queue.contains(&coord) {
            return false;
        }
        self.unload_queue.push_back(coord);
        true
    }

    /// Pops the oldest chunk awaiting eviction.
    pub fn pop_unload(&mut self) -> Option<ChunkCoord> {
        self.unload_queue.pop_front()
    }

    /// Chunks awaiting materialization, oldest first.
    pub fn load_queue(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.load_queue.iter().copied()
    }

    /// Length of the load queue.
    pub fn load_queue_len(&self) -> usize {
        self.load_queue.len()
    }

    /// Length of the unload queue.
    pub fn unload_queue_len(&self) -> usize {
        self.unload_queue.len()
    }

    // -- queries ------------------------------------------------------------

    /// Whether `coord` is resident.
    pub fn is_resident(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Whether `coord` is resident and dirty.
    pub fn is_dirty(&self, coord: ChunkCoord) -> bool {
        self.dirty.contains(&coord)
    }

    /// Whether the store holds an encoding for `coord`.
    pub fn is_persisted(&self, coord: ChunkCoord) -> Result<bool, CacheError> {
        self.store
            .has(&coord.store_key())
            .map_err(|source| CacheError::Store { coord, source })
    }

    /// Immutable access to a resident chunk.
    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Iterates over resident coordinates.
    pub fn resident_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// Number of resident chunks.
    pub fn resident_count(&self) -> usize {
        self.chunks.len()
    }

    /// Iterates over dirty coordinates.
    pub fn dirty_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.dirty.iter().copied()
    }

    /// Number of dirty chunks.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Cumulative counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the backing store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consumes the cache, returning the store. Unsaved changes are dropped.
    pub fn into_store(self) -> S {
        self.store
    }
}

/// Miss path: decode the stored encoding if there is one, else generate.
fn load_or_generate<S: ChunkStore>(
    store: &S,
    generator: &TerrainGenerator,
    stats: &mut CacheStats,
    coord: ChunkCoord,
) -> Result<VoxelGrid, CacheError> {
    let stored = store.get(&coord.store_key()).map_err(|source| {
        stats.store_errors += 1;
        tracing::warn!("Failed to read chunk {coord} from store: {source}");
        CacheError::Store { coord, source }
    })?;

    if let Some(text) = stored {
        match codec::decode(&text) {
            Ok(grid) => {
                stats.decoded += 1;
                tracing::debug!("Restored chunk {coord} from store");
                return Ok(grid);
            }
            Err(e) => {
                stats.decode_failures += 1;
                tracing::warn!("Stored chunk {coord} is unreadable, regenerating: {e}");
            }
        }
    }

    stats.generated += 1;
    tracing::debug!("Generated chunk {coord}");
    Ok(generator.generate(coord))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use strata_voxel::MemoryStore;

    fn cache() -> ChunkCache<MemoryStore> {
        ChunkCache::new(MemoryStore::new(), TerrainGenerator::default())
    }

    fn c(x: i32, y: i32, z: i32) -> ChunkCoord {
        ChunkCoord::new(x, y, z)
    }

    /// Store that can be switched into a failing state.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        down: Cell<bool>,
    }

    impl ChunkStore for FlakyStore {
        fn has(&self, key: &str) -> Result<bool, StoreError> {
            if self.down.get() {
                return Err(StoreError::Unavailable("down".into()));
            }
            self.inner.has(key)
        }

        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            if self.down.get() {
                return Err(StoreError::Unavailable("down".into()));
            }
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
            if self.down.get() {
                return Err(StoreError::Unavailable("down".into()));
            }
            self.inner.set(key, value)
        }
    }

    #[test]
    fn test_request_miss_generates_and_enqueues() {
        let mut cache = cache();
        let chunk = cache.request(c(0, 0, 0)).unwrap();
        assert!(!chunk.is_dirty());
        assert_eq!(cache.resident_count(), 1);
        assert_eq!(cache.load_queue().collect::<Vec<_>>(), vec![c(0, 0, 0)]);
        assert_eq!(cache.stats().generated, 1);
    }

    #[test]
    fn test_request_is_idempotent() {
        let mut cache = cache();
        let first: *const Chunk = cache.request(c(1, 0, 1)).unwrap();
        let second: *const Chunk = cache.request(c(1, 0, 1)).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.stats().generated, 1);
        assert_eq!(cache.stats().decoded, 0);
        assert_eq!(cache.load_queue_len(), 1);
    }

    #[test]
    fn test_mark_dirty_only_for_resident() {
        let mut cache = cache();
        assert!(!cache.mark_dirty(c(0, 0, 0)));
        assert_eq!(cache.dirty_count(), 0);

        cache.request(c(0, 0, 0)).unwrap();
        assert!(cache.mark_dirty(c(0, 0, 0)));
        assert!(cache.is_dirty(c(0, 0, 0)));
        assert!(cache.get(c(0, 0, 0)).unwrap().is_dirty());
    }

    #[test]
    fn test_dirty_evict_then_request_restores_edit() {
        let mut cache = cache();
        let coord = c(0, 0, 0);
        cache.request(coord).unwrap();
        assert!(cache.write_voxel(coord, 100, BlockId(777)));
        assert!(cache.is_dirty(coord));
        assert!(cache.get(coord).unwrap().is_dirty());

        assert!(cache.evict(coord).unwrap());
        assert!(!cache.is_resident(coord));
        assert!(!cache.is_dirty(coord));
        assert_eq!(cache.load_queue_len(), 0);
        assert!(cache.is_persisted(coord).unwrap());

        let restored = cache.request(coord).unwrap();
        assert_eq!(restored.grid().get_flat(100), Some(BlockId(777)));
        assert_eq!(cache.stats().decoded, 1);
        assert_eq!(cache.stats().generated, 1);
    }

    #[test]
    fn test_write_voxel_requires_resident_chunk_and_valid_index() {
        let mut cache = cache();
        assert!(!cache.write_voxel(c(0, 0, 0), 0, BlockId::STONE));
        assert_eq!(cache.dirty_count(), 0);

        cache.request(c(0, 0, 0)).unwrap();
        assert!(!cache.write_voxel(c(0, 0, 0), usize::MAX, BlockId::STONE));
        assert_eq!(cache.dirty_count(), 0);
        assert!(!cache.get(c(0, 0, 0)).unwrap().is_dirty());
    }

    #[test]
    fn test_clean_evict_does_not_persist() {
        let mut cache = cache();
        cache.request(c(2, 0, 2)).unwrap();
        assert!(cache.evict(c(2, 0, 2)).unwrap());
        assert!(cache.store().is_empty());
        assert!(!cache.evict(c(2, 0, 2)).unwrap());
    }

    #[test]
    fn test_corrupt_store_entry_falls_back_to_generation() {
        let mut cache = cache();
        let coord = c(3, 0, -1);
        cache
            .store_mut()
            .set(&coord.store_key(), "AAAA".to_string())
            .unwrap();

        let expected = TerrainGenerator::default().generate(coord);
        let chunk = cache.request(coord).unwrap();
        assert_eq!(chunk.grid(), &expected);
        assert_eq!(cache.stats().decode_failures, 1);
        assert_eq!(cache.stats().generated, 1);
    }

    #[test]
    fn test_persist_absent_is_noop() {
        let mut cache = cache();
        assert!(!cache.persist(c(9, 9, 9)).unwrap());
        assert!(cache.store().is_empty());
    }

    #[test]
    fn test_flush_persists_all_dirty_and_clears_set() {
        let mut cache = cache();
        for x in 0..3 {
            cache.request(c(x, 0, 0)).unwrap();
        }
        cache.mark_dirty(c(0, 0, 0));
        cache.mark_dirty(c(2, 0, 0));

        let report = cache.flush_dirty();
        assert_eq!(report, FlushReport { persisted: 2, failed: 0 });
        assert_eq!(cache.dirty_count(), 0);
        assert_eq!(cache.store().len(), 2);
        assert!(!cache.get(c(0, 0, 0)).unwrap().is_dirty());
    }

    #[test]
    fn test_evict_clears_both_queues() {
        let mut cache = cache();
        cache.request(c(0, 0, 0)).unwrap();
        assert!(cache.enqueue_unload(c(0, 0, 0)));
        assert!(!cache.enqueue_unload(c(0, 0, 0)));
        assert!(!cache.enqueue_unload(c(5, 0, 0)));

        cache.evict(c(0, 0, 0)).unwrap();
        assert_eq!(cache.load_queue_len(), 0);
        assert_eq!(cache.unload_queue_len(), 0);
    }

    #[test]
    fn test_store_failure_on_request_leaves_cache_untouched() {
        let store = FlakyStore::default();
        store.down.set(true);
        let mut cache = ChunkCache::new(store, TerrainGenerator::default());

        assert!(matches!(
            cache.request(c(0, 0, 0)),
            Err(CacheError::Store { .. })
        ));
        assert!(!cache.is_resident(c(0, 0, 0)));
        assert_eq!(cache.load_queue_len(), 0);
        assert_eq!(cache.stats().store_errors, 1);

        cache.store().down.set(false);
        assert!(cache.request(c(0, 0, 0)).is_ok());
    }

    #[test]
    fn test_failed_save_blocks_eviction_and_keeps_dirty() {
        let mut cache = ChunkCache::new(FlakyStore::default(), TerrainGenerator::default());
        let coord = c(1, 0, 0);
        cache.request(coord).unwrap();
        cache.mark_dirty(coord);

        cache.store().down.set(true);
        assert!(cache.evict(coord).is_err());
        assert!(cache.is_resident(coord));
        assert!(cache.is_dirty(coord));

        let report = cache.flush_dirty();
        assert_eq!(report, FlushReport { persisted: 0, failed: 1 });
        assert!(cache.is_dirty(coord));

        cache.store().down.set(false);
        assert!(cache.evict(coord).unwrap());
        assert!(cache.store().inner.has(&coord.store_key()).unwrap());
    }

    #[test]
    fn test_requeue_load_front() {
        let mut cache = cache();
        cache.request(c(0, 0, 0)).unwrap();
        cache.request(c(1, 0, 0)).unwrap();
        let head = cache.pop_load().unwrap();
        assert_eq!(head, c(0, 0, 0));

        cache.requeue_load_front(head);
        assert_eq!(
            cache.load_queue().collect::<Vec<_>>(),
            vec![c(0, 0, 0), c(1, 0, 0)]
        );
        cache.requeue_load_front(c(7, 7, 7));
        assert_eq!(cache.load_queue_len(), 2);
    }
}
