//! Simulated players for the standalone server.
//!
//! Each player starts at the origin and walks outward along its own heading,
//! so the load boxes drift apart and chunks stream in and out. Every
//! `edit_interval_secs` each player drops a stone voxel where it stands.

use std::f64::consts::TAU;

use glam::DVec3;
use strata_config::{SimulationConfig, StreamingConfig};
use strata_stream::{IntervalTimer, PlayerId, PlayerSnapshot, World, WorldView};
use strata_voxel::{BlockId, ChunkStore, voxel_at};

/// Walking height above the terrain base.
const WALK_HEIGHT: f64 = 20.0;

/// A player walking in a straight line.
#[derive(Clone, Debug)]
pub struct Walker {
    pub id: PlayerId,
    origin: DVec3,
    heading: DVec3,
    speed: f64,
}

impl Walker {
    /// Position after `elapsed_secs` seconds.
    pub fn position(&self, elapsed_secs: f64) -> DVec3 {
        self.origin + self.heading * (self.speed * elapsed_secs)
    }

    pub fn snapshot(&self, elapsed_secs: f64) -> PlayerSnapshot {
        PlayerSnapshot::new(self.id, self.position(elapsed_secs))
    }
}

/// Spreads `count` walkers evenly around the origin.
pub fn walkers(count: u32, speed: f64) -> Vec<Walker> {
    (0..count)
        .map(|i| {
            let angle = TAU * f64::from(i) / f64::from(count.max(1));
            Walker {
                id: PlayerId(u64::from(i) + 1),
                origin: DVec3::new(0.5, WALK_HEIGHT, 0.5),
                heading: DVec3::new(angle.cos(), 0.0, angle.sin()),
                speed,
            }
        })
        .collect()
}

/// Totals over a simulated run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub flushes: u64,
    pub materialized: u64,
    pub evicted: u64,
    pub edits_applied: u64,
    pub edits_lost: u64,
    pub chunks_saved: u64,
}

/// Drives `world` with simulated players for `sim.duration_secs`.
///
/// Players connect before the first step and disconnect after the last one.
pub fn run<S, V>(
    world: &mut World<S, V>,
    sim: &SimulationConfig,
    streaming: &StreamingConfig,
) -> RunSummary
where
    S: ChunkStore,
    V: WorldView,
{
    let walkers = walkers(sim.players, sim.walk_speed);
    let mut tick_timer = IntervalTimer::new(streaming.tick_interval_secs);
    let mut flush_timer = IntervalTimer::new(streaming.flush_interval_secs);
    let mut edit_timer =
        (sim.edit_interval_secs > 0.0).then(|| IntervalTimer::new(sim.edit_interval_secs));
    let mut summary = RunSummary::default();

    for walker in &walkers {
        world.player_connected(&walker.snapshot(0.0));
    }

    let step = sim.step_secs.max(1e-3);
    let mut elapsed = 0.0;
    while elapsed < sim.duration_secs {
        let dt = step.min(sim.duration_secs - elapsed);
        elapsed += dt;
        let snapshots: Vec<PlayerSnapshot> =
            walkers.iter().map(|w| w.snapshot(elapsed)).collect();

        for _ in 0..tick_timer.accumulate(dt) {
            let report = world.tick(&snapshots);
            summary.ticks += 1;
            summary.materialized += u64::from(report.materialized);
            summary.evicted += u64::from(report.evicted);
        }

        if let Some(timer) = edit_timer.as_mut() {
            for _ in 0..timer.accumulate(dt) {
                for snapshot in &snapshots {
                    match world.set_voxel(voxel_at(snapshot.position), BlockId::STONE) {
                        Ok(outcome) if outcome.is_applied() => summary.edits_applied += 1,
                        Ok(_) => summary.edits_lost += 1,
                        Err(e) => {
                            tracing::warn!("Player {} edit rejected: {e}", snapshot.id.0);
                            summary.edits_lost += 1;
                        }
                    }
                }
            }
        }

        for _ in 0..flush_timer.accumulate(dt) {
            summary.flushes += 1;
            summary.chunks_saved += world.flush().persisted as u64;
        }
    }

    for walker in &walkers {
        summary.chunks_saved += world.player_disconnected(walker.id) as u64;
    }

    tracing::info!(
        "Simulated {elapsed:.1}s: {} tick(s), {} chunk(s) materialized, {} evicted, {} edit(s) applied",
        summary.ticks,
        summary.materialized,
        summary.evicted,
        summary.edits_applied
    );
    summary
}
