//! Composition root: one streamed world instance.
//!
//! [`World`] owns the chunk cache, the scheduler, the mutation hook and the
//! host world view. There is exactly one per world, built once at startup.
//! Every entry point takes `&mut self`, which is how the single-writer model
//! is enforced.
//!
//! [`World::set_voxel`] is the decorated voxel setter the host routes edits
//! through: it forwards to the wrapped view first, then replays the edit into
//! the cache. Materialization writes go to the wrapped view directly and
//! never dirty a chunk.

use glam::IVec3;
use strata_terrain::TerrainGenerator;
use strata_voxel::{BlockId, ChunkStore};

use crate::cache::{ChunkCache, FlushReport};
use crate::mutation::{EditOutcome, MutationHook, NonResidentEdits};
use crate::player::{PlayerId, PlayerSnapshot};
use crate::scheduler::{StreamConfig, StreamScheduler, TickReport};
use crate::view::{ViewError, WorldView};

/// A streamed voxel world bound to a store and a host view.
pub struct World<S, V> {
    cache: ChunkCache<S>,
    scheduler: StreamScheduler,
    hook: MutationHook,
    view: V,
}

impl<S: ChunkStore, V: WorldView> World<S, V> {
    /// Builds a world over `store`, wrapping `view`.
    pub fn new(
        store: S,
        view: V,
        generator: TerrainGenerator,
        config: StreamConfig,
        edits: NonResidentEdits,
    ) -> Self {
        tracing::info!(
            "World created: load radius {}x{}, {} chunk(s)/tick, non-resident edits {:?}",
            config.load_radius,
            config.vertical_radius,
            config.max_chunks_per_tick,
            edits
        );
        Self {
            cache: ChunkCache::new(store, generator),
            scheduler: StreamScheduler::new(config),
            hook: MutationHook::new(edits),
            view,
        }
    }

    /// The decorated voxel setter.
    ///
    /// The wrapped view is written first so gameplay sees the edit
    /// immediately; if the view rejects it the cache is left alone.
    pub fn set_voxel(&mut self, voxel: IVec3, block: BlockId) -> Result<EditOutcome, ViewError> {
        self.view.set_voxel(voxel, block)?;
        Ok(self.hook.apply(&mut self.cache, voxel, block))
    }

    /// Runs one streaming tick for the given player positions.
    pub fn tick(&mut self, players: &[PlayerSnapshot]) -> TickReport {
        self.scheduler.tick(players, &mut self.cache, &mut self.view)
    }

    /// Persists every dirty chunk.
    pub fn flush(&mut self) -> FlushReport {
        self.scheduler.flush(&mut self.cache)
    }

    /// Registers a player and immediately requests the chunks around them.
    pub fn player_connected(&mut self, player: &PlayerSnapshot) -> u32 {
        self.scheduler.player_connected(player.id);
        self.scheduler.observe_player(player, &mut self.cache)
    }

    /// Saves the player's surroundings (best-effort) and forgets them.
    pub fn player_disconnected(&mut self, id: PlayerId) -> usize {
        self.scheduler.player_disconnected(id, &mut self.cache)
    }

    /// The chunk cache.
    pub fn cache(&self) -> &ChunkCache<S> {
        &self.cache
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &StreamScheduler {
        &self.scheduler
    }

    /// The wrapped host view.
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Flushes and tears the world down, returning the store and view.
    pub fn shutdown(mut self) -> (S, V) {
        let report = self.flush();
        if report.failed > 0 {
            tracing::warn!("{} dirty chunk(s) could not be saved at shutdown", report.failed);
        }
        let stats = self.cache.stats();
        tracing::info!(
            "World shut down after {} tick(s): {} generated, {} restored, {} persisted, {} evicted",
            self.scheduler.ticks(),
            stats.generated,
            stats.decoded,
            stats.persisted,
            stats.evicted
        );
        let Self { cache, view, .. } = self;
        (cache.into_store(), view)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::VoxelWorldView;
    use glam::DVec3;
    use strata_voxel::{ChunkCoord, MemoryStore};

    fn world(edits: NonResidentEdits) -> World<MemoryStore, VoxelWorldView> {
        World::new(
            MemoryStore::new(),
            VoxelWorldView::new(),
            TerrainGenerator::default(),
            StreamConfig {
                load_radius: 1,
                vertical_radius: 0,
                max_chunks_per_tick: 100,
            },
            edits,
        )
    }

    #[test]
    fn test_connect_requests_before_first_tick() {
        let mut world = world(NonResidentEdits::default());
        let player = PlayerSnapshot::new(PlayerId(1), DVec3::new(1.0, 1.0, 1.0));
        assert_eq!(world.player_connected(&player), 9);
        assert_eq!(world.cache().resident_count(), 9);
        assert_eq!(world.view().solid_count(), 0);

        world.tick(&[player]);
        assert!(world.view().solid_count() > 0);
    }

    #[test]
    fn test_set_voxel_reaches_view_and_cache() {
        let mut world = world(NonResidentEdits::default());
        let player = PlayerSnapshot::new(PlayerId(1), DVec3::ZERO);
        world.player_connected(&player);
        world.tick(&[player]);

        let outcome = world.set_voxel(IVec3::new(3, 30, 3), BlockId(99)).unwrap();
        assert_eq!(outcome, EditOutcome::Applied(ChunkCoord::new(0, 0, 0)));
        assert_eq!(world.view().get(IVec3::new(3, 30, 3)), BlockId(99));
        assert!(world.cache().is_dirty(ChunkCoord::new(0, 0, 0)));
    }

    #[test]
    fn test_materialization_does_not_dirty_chunks() {
        let mut world = world(NonResidentEdits::default());
        let player = PlayerSnapshot::new(PlayerId(1), DVec3::ZERO);
        world.player_connected(&player);
        let report = world.tick(&[player]);
        assert_eq!(report.materialized, 9);
        assert_eq!(world.cache().dirty_count(), 0);
        assert_eq!(world.scheduler().ticks(), 1);
    }

    #[test]
    fn test_shutdown_flushes_dirty_chunks() {
        let mut world = world(NonResidentEdits::default());
        let player = PlayerSnapshot::new(PlayerId(1), DVec3::ZERO);
        world.player_connected(&player);
        world.set_voxel(IVec3::new(0, 31, 0), BlockId::GRASS).unwrap();

        let (store, _view) = world.shutdown();
        assert!(store.has(&ChunkCoord::new(0, 0, 0).store_key()).unwrap());
        assert_eq!(store.len(), 1);
    }
}
