//! Per-tick chunk streaming around connected players.
//!
//! Each tick runs, in order:
//!
//! 1. **Interest**: players whose chunk changed since the last tick (or who
//!    were never observed) request every chunk in their load box.
//! 2. **Active set**: resident chunks outside the union of all load boxes are
//!    queued for unload.
//! 3. **Load drain**: at most `max_chunks_per_tick` queued chunks are written
//!    into the world view. The rest wait, so a chunk may be resident before it
//!    is visible.
//! 4. **Unload drain**: the whole unload queue is evicted (dirty chunks are
//!    persisted first).
//!
//! Dirty flushing runs on its own, slower timer through
//! [`StreamScheduler::flush`]. A tick never fails; collaborator faults are
//! counted in the [`TickReport`] and retried later.

use rustc_hash::FxHashSet;
use strata_voxel::{Chunk, ChunkCoord, ChunkStore, LocalIndex};

use crate::cache::{ChunkCache, FlushReport};
use crate::player::{PlayerChunkIndex, PlayerId, PlayerSnapshot};
use crate::view::{ViewError, WorldView};

/// Configuration for the streaming scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Horizontal half-extent of the load box, in chunks (`|dx|, |dz| <= R`).
    pub load_radius: u32,
    /// Vertical half-extent of the load box, in chunks (`|dy| <= Ry`).
    pub vertical_radius: u32,
    /// Maximum chunks materialized into the world view per tick.
    pub max_chunks_per_tick: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            load_radius: 2,
            vertical_radius: 0,
            max_chunks_per_tick: 2,
        }
    }
}

/// Result of a single streaming tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Chunks newly made resident this tick.
    pub requested: u32,
    /// Chunks written into the world view.
    pub materialized: u32,
    /// Voxels written into the world view.
    pub voxels_written: u64,
    /// Chunks appended to the unload queue.
    pub unload_queued: u32,
    /// Chunks removed from memory.
    pub evicted: u32,
    /// Requests that failed on the store and will be retried.
    pub request_failures: u32,
    /// Materializations aborted by the world view.
    pub view_failures: u32,
    /// Evictions aborted because a dirty chunk could not be saved.
    pub evict_failures: u32,
}

/// Drives the chunk cache from player positions.
#[derive(Debug)]
pub struct StreamScheduler {
    config: StreamConfig,
    players: PlayerChunkIndex,
    /// Coordinates whose request failed on the store.
    retry: FxHashSet<ChunkCoord>,
    ticks: u64,
}

impl StreamScheduler {
    /// Creates a scheduler with the given configuration.
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            players: PlayerChunkIndex::new(),
            retry: FxHashSet::default(),
            ticks: 0,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The player → last-known chunk index.
    pub fn players(&self) -> &PlayerChunkIndex {
        &self.players
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Coordinates waiting for a request retry.
    pub fn pending_retries(&self) -> usize {
        self.retry.len()
    }

    /// Registers a newly connected player.
    pub fn player_connected(&mut self, id: PlayerId) {
        self.players.register(id);
        tracing::info!("Player {} connected", id.0);
    }

    /// Removes a player, first persisting dirty chunks inside their load box.
    ///
    /// Saving is best-effort: failures are logged and the chunks stay dirty
    /// for the next flush. Returns the number of chunks persisted.
    pub fn player_disconnected<S: ChunkStore>(
        &mut self,
        id: PlayerId,
        cache: &mut ChunkCache<S>,
    ) -> usize {
        let Some(last) = self.players.remove(id) else {
            tracing::info!("Player {} disconnected", id.0);
            return 0;
        };

        let (r, ry) = (self.config.load_radius, self.config.vertical_radius);
        let mut area: Vec<ChunkCoord> = cache
            .dirty_coords()
            .filter(|coord| last.within_box(*coord, r, ry))
            .collect();
        area.sort_unstable();

        let mut persisted = 0;
        for coord in area {
            if let Ok(true) = cache.persist(coord) {
                persisted += 1;
            }
        }
        tracing::info!(
            "Player {} disconnected, saved {persisted} chunk(s) around {last}",
            id.0
        );
        persisted
    }

    /// Applies interest for one player immediately, outside of a tick.
    ///
    /// Returns the number of chunks that became resident.
    pub fn observe_player<S: ChunkStore>(
        &mut self,
        player: &PlayerSnapshot,
        cache: &mut ChunkCache<S>,
    ) -> u32 {
        let mut report = TickReport::default();
        self.update_player(player, cache, &mut report);
        report.requested
    }

    /// Union of the load boxes around every observed player.
    pub fn active_set(&self) -> FxHashSet<ChunkCoord> {
        let (r, ry) = (self.config.load_radius, self.config.vertical_radius);
        self.players
            .known_coords()
            .flat_map(|center| center.box_around(r, ry))
            .collect()
    }

    /// Runs one streaming tick.
    pub fn tick<S, V>(
        &mut self,
        players: &[PlayerSnapshot],
        cache: &mut ChunkCache<S>,
        view: &mut V,
    ) -> TickReport
    where
        S: ChunkStore,
        V: WorldView + ?Sized,
    {
        self.ticks += 1;
        let mut report = TickReport::default();

        self.retry_requests(cache, &mut report);
        for player in players {
            self.update_player(player, cache, &mut report);
        }

        let active = self.active_set();
        self.queue_unloads(&active, cache, &mut report);
        self.drain_loads(cache, view, &mut report);
        self.drain_unloads(cache, &mut report);

        if report != TickReport::default() {
            tracing::debug!(
                "Tick {}: +{} resident, {} materialized, {} evicted, {} queued for load",
                self.ticks,
                report.requested,
                report.materialized,
                report.evicted,
                cache.load_queue_len()
            );
        }
        report
    }

    /// Persists every dirty chunk. Driven by the slower save timer.
    pub fn flush<S: ChunkStore>(&mut self, cache: &mut ChunkCache<S>) -> FlushReport {
        let report = cache.flush_dirty();
        if report.persisted > 0 || report.failed > 0 {
            tracing::info!(
                "Flushed {} dirty chunk(s), {} failed",
                report.persisted,
                report.failed
            );
        }
        report
    }

    // -- steps --------------------------------------------------------------

    fn update_player<S: ChunkStore>(
        &mut self,
        player: &PlayerSnapshot,
        cache: &mut ChunkCache<S>,
        report: &mut TickReport,
    ) {
        let center = player.chunk();
        if !self.players.observe(player.id, center) {
            return;
        }
        tracing::debug!("Player {} entered chunk {center}", player.id.0);

        let (r, ry) = (self.config.load_radius, self.config.vertical_radius);
        for coord in center.box_around(r, ry) {
            self.request(coord, cache, report);
        }
    }

    fn request<S: ChunkStore>(
        &mut self,
        coord: ChunkCoord,
        cache: &mut ChunkCache<S>,
        report: &mut TickReport,
    ) {
        let was_resident = cache.is_resident(coord);
        match cache.request(coord) {
            Ok(_) => {
                self.retry.remove(&coord);
                if !was_resident {
                    report.requested += 1;
                }
            }
            Err(e) => {
                tracing::warn!("Chunk request failed, will retry: {e}");
                self.retry.insert(coord);
                report.request_failures += 1;
            }
        }
    }

    /// Re-requests chunks whose load failed on an earlier tick, as long as
    /// they are still wanted.
    fn retry_requests<S: ChunkStore>(&mut self, cache: &mut ChunkCache<S>, report: &mut TickReport) {
        if self.retry.is_empty() {
            return;
        }
        let active = self.active_set();
        let mut pending: Vec<ChunkCoord> = std::mem::take(&mut self.retry)
            .into_iter()
            .filter(|coord| active.contains(coord))
            .collect();
        pending.sort_unstable();
        for coord in pending {
            self.request(coord, cache, report);
        }
    }

    fn queue_unloads<S: ChunkStore>(
        &self,
        active: &FxHashSet<ChunkCoord>,
        cache: &mut ChunkCache<S>,
        report: &mut TickReport,
    ) {
        let mut stale: Vec<ChunkCoord> = cache
            .resident_coords()
            .filter(|coord| !active.contains(coord))
            .collect();
        stale.sort_unstable();
        for coord in stale {
            if cache.enqueue_unload(coord) {
                report.unload_queued += 1;
            }
        }
    }

    fn drain_loads<S, V>(&self, cache: &mut ChunkCache<S>, view: &mut V, report: &mut TickReport)
    where
        S: ChunkStore,
        V: WorldView + ?Sized,
    {
        let mut budget = self.config.max_chunks_per_tick;
        while budget > 0 {
            let Some(coord) = cache.pop_load() else {
                break;
            };
            let Some(chunk) = cache.get(coord) else {
                continue;
            };
            match materialize(chunk, view) {
                Ok(written) => {
                    report.materialized += 1;
                    report.voxels_written += written;
                    budget -= 1;
                }
                Err(e) => {
                    tracing::warn!("Materializing chunk {coord} failed, will retry: {e}");
                    report.view_failures += 1;
                    cache.requeue_load_front(coord);
                    break;
                }
            }
        }
    }

    fn drain_unloads<S: ChunkStore>(&self, cache: &mut ChunkCache<S>, report: &mut TickReport) {
        while let Some(coord) = cache.pop_unload() {
            match cache.evict(coord) {
                Ok(true) => report.evicted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Eviction of chunk {coord} postponed: {e}");
                    report.evict_failures += 1;
                }
            }
        }
    }
}

impl Default for StreamScheduler {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

/// Writes every non-air voxel of `chunk` into `view`. Returns the voxel count.
pub fn materialize<V: WorldView + ?Sized>(chunk: &Chunk, view: &mut V) -> Result<u64, ViewError> {
    let coord = chunk.coord();
    let mut written = 0u64;
    for (flat, block) in chunk.grid().iter_solid() {
        view.set_voxel(coord.world_voxel(&LocalIndex::from_flat(flat)), block)?;
        written += 1;
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::VoxelWorldView;
    use glam::{DVec3, IVec3};
    use strata_terrain::TerrainGenerator;
    use strata_voxel::{BlockId, MemoryStore};

    fn cache() -> ChunkCache<MemoryStore> {
        ChunkCache::new(MemoryStore::new(), TerrainGenerator::default())
    }

    fn player_at(id: u64, x: f64, z: f64) -> PlayerSnapshot {
        PlayerSnapshot::new(PlayerId(id), DVec3::new(x, 20.0, z))
    }

    fn config(load_radius: u32, max_chunks_per_tick: usize) -> StreamConfig {
        StreamConfig {
            load_radius,
            vertical_radius: 0,
            max_chunks_per_tick,
        }
    }

    /// View that rejects every write.
    struct BrokenView;

    impl WorldView for BrokenView {
        fn set_voxel(&mut self, _: IVec3, _: BlockId) -> Result<(), ViewError> {
            Err(ViewError::Unavailable("not ready".into()))
        }
    }

    #[test]
    fn test_first_tick_requests_load_box() {
        let mut scheduler = StreamScheduler::new(config(2, 2));
        let mut cache = cache();
        let mut view = VoxelWorldView::new();

        let report = scheduler.tick(&[player_at(1, 10.0, 10.0)], &mut cache, &mut view);
        assert_eq!(report.requested, 25);
        assert_eq!(cache.resident_count(), 25);
        assert_eq!(report.materialized, 2);
        assert_eq!(cache.load_queue_len(), 23);
        assert_eq!(report.evicted, 0);
    }

    #[test]
    fn test_stationary_player_requests_nothing_new() {
        let mut scheduler = StreamScheduler::new(config(1, 100));
        let mut cache = cache();
        let mut view = VoxelWorldView::new();
        let players = [player_at(1, 0.0, 0.0)];

        scheduler.tick(&players, &mut cache, &mut view);
        let generated = cache.stats().generated;
        let report = scheduler.tick(&players, &mut cache, &mut view);
        assert_eq!(report.requested, 0);
        assert_eq!(cache.stats().generated, generated);
    }

    #[test]
    fn test_load_rate_is_bounded() {
        let mut scheduler = StreamScheduler::new(config(2, 2));
        let mut cache = cache();
        let mut view = VoxelWorldView::new();
        let players = [player_at(1, 0.0, 0.0)];

        let mut total = 0;
        let mut ticks = 0;
        loop {
            let report = scheduler.tick(&players, &mut cache, &mut view);
            assert!(report.materialized <= 2);
            total += report.materialized;
            ticks += 1;
            if cache.load_queue_len() == 0 {
                break;
            }
        }
        assert_eq!(total, 25);
        assert_eq!(ticks, 13); // ceil(25 / 2)
    }

    #[test]
    fn test_players_at_world_edge_get_clipped_boxes() {
        let mut scheduler = StreamScheduler::new(config(2, 100));
        let mut cache = cache();
        let mut view = VoxelWorldView::new();
        let players = [player_at(1, -3.0e9, 0.0), player_at(2, 3.0e9, 0.0)];

        let report = scheduler.tick(&players, &mut cache, &mut view);
        assert_eq!(report.requested, 30);
        assert_eq!(report.materialized, 30);
        assert!(cache.is_resident(ChunkCoord::new(strata_voxel::MIN_CHUNK, 0, 0)));
        assert!(cache.is_resident(ChunkCoord::new(strata_voxel::MAX_CHUNK, 0, 0)));
        assert!(cache.resident_coords().all(ChunkCoord::in_voxel_range));
        assert!(view.solid_count() > 0);

        let report = scheduler.tick(&[player_at(1, 0.0, 0.0)], &mut cache, &mut view);
        assert_eq!(report.evicted, 15);
        assert_eq!(cache.resident_count(), 40);
        assert!(!cache.is_resident(ChunkCoord::new(strata_voxel::MIN_CHUNK, 0, 0)));
    }

    #[test]
    fn test_materialize_skips_air() {
        let mut cache = cache();
        let coord = ChunkCoord::new(0, 0, 0);
        cache.request(coord).unwrap();
        let chunk = cache.get(coord).unwrap();
        let mut view = VoxelWorldView::new();

        let written = materialize(chunk, &mut view).unwrap();
        assert_eq!(written as usize, chunk.grid().solid_count());
        assert_eq!(view.writes(), written);
        assert_eq!(view.get(IVec3::new(0, 0, 0)), BlockId::STONE);
        assert_eq!(view.get(IVec3::new(0, 31, 0)), BlockId::AIR);
    }

    #[test]
    fn test_chunks_outside_active_set_are_evicted() {
        let mut scheduler = StreamScheduler::new(config(1, 100));
        let mut cache = cache();
        let mut view = VoxelWorldView::new();

        scheduler.tick(&[player_at(1, 0.0, 0.0)], &mut cache, &mut view);
        assert_eq!(cache.resident_count(), 9);

        // Move three chunks east: the old box no longer overlaps.
        let report = scheduler.tick(&[player_at(1, 100.0, 0.0)], &mut cache, &mut view);
        assert_eq!(report.evicted, 9);
        assert_eq!(cache.resident_count(), 9);
        assert!(cache.is_resident(ChunkCoord::new(3, 0, 0)));
        assert!(!cache.is_resident(ChunkCoord::new(0, 0, 0)));
    }

    #[test]
    fn test_dirty_chunk_is_persisted_on_eviction() {
        let mut scheduler = StreamScheduler::new(config(0, 100));
        let mut cache = cache();
        let mut view = VoxelWorldView::new();

        scheduler.tick(&[player_at(1, 0.0, 0.0)], &mut cache, &mut view);
        cache.mark_dirty(ChunkCoord::new(0, 0, 0));

        scheduler.tick(&[player_at(1, 40.0, 0.0)], &mut cache, &mut view);
        assert!(!cache.is_resident(ChunkCoord::new(0, 0, 0)));
        assert!(cache.is_persisted(ChunkCoord::new(0, 0, 0)).unwrap());
    }

    #[test]
    fn test_view_failure_keeps_chunk_queued() {
        let mut scheduler = StreamScheduler::new(config(0, 2));
        let mut cache = cache();

        let report = scheduler.tick(&[player_at(1, 0.0, 0.0)], &mut cache, &mut BrokenView);
        assert_eq!(report.view_failures, 1);
        assert_eq!(report.materialized, 0);
        assert_eq!(cache.load_queue_len(), 1);

        let mut view = VoxelWorldView::new();
        let report = scheduler.tick(&[player_at(1, 0.0, 0.0)], &mut cache, &mut view);
        assert_eq!(report.materialized, 1);
        assert_eq!(cache.load_queue_len(), 0);
    }

    #[test]
    fn test_disconnect_flushes_area_and_removes_player() {
        let mut scheduler = StreamScheduler::new(config(1, 100));
        let mut cache = cache();
        let mut view = VoxelWorldView::new();

        scheduler.player_connected(PlayerId(1));
        scheduler.player_connected(PlayerId(2));
        scheduler.tick(
            &[player_at(1, 0.0, 0.0), player_at(2, 320.0, 0.0)],
            &mut cache,
            &mut view,
        );
        cache.mark_dirty(ChunkCoord::new(1, 0, 0));
        cache.mark_dirty(ChunkCoord::new(10, 0, 0));

        let saved = scheduler.player_disconnected(PlayerId(1), &mut cache);
        assert_eq!(saved, 1);
        assert!(!cache.is_dirty(ChunkCoord::new(1, 0, 0)));
        assert!(cache.is_dirty(ChunkCoord::new(10, 0, 0)));
        assert!(!scheduler.players().contains(PlayerId(1)));

        // The departed player's box no longer keeps chunks alive.
        let report = scheduler.tick(&[player_at(2, 320.0, 0.0)], &mut cache, &mut view);
        assert_eq!(report.evicted, 9);
        assert_eq!(scheduler.active_set().len(), 9);
    }

    #[test]
    fn test_unobserved_player_contributes_no_box() {
        let mut scheduler = StreamScheduler::default();
        scheduler.player_connected(PlayerId(7));
        assert!(scheduler.active_set().is_empty());
    }
}
