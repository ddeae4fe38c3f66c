//! Per-frame chunk streaming policy
//!
//! Each update derives the visible chunk set from the camera, restores one
//! bounded step of the nearest visible cached chunk and, when the live voxel
//! budget is under pressure, evicts the farthest hidden chunk.
//!
//! Cache failures never stop streaming. A chunk whose file is corrupt is
//! discarded; a chunk that hits any other I/O error is skipped until the
//! next `reset`.

use std::collections::{BTreeSet, HashSet};

use crate::core::config::StreamingConfig;
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::voxel::grid::ChunkId;
use crate::voxel::world::World;

use super::budget::VoxelBudget;
use super::cache::{RestoreProgress, VoxelCache};

/// What one update did.
#[derive(Clone, Debug, Default)]
pub struct StreamReport {
    /// Chunk ids within view distance
    pub visible: BTreeSet<ChunkId>,
    pub evicted: Option<ChunkId>,
    pub restored: Option<(ChunkId, RestoreProgress)>,
    /// Chunks whose restore or eviction failed this update
    pub failed: Vec<ChunkId>,
}

pub struct ChunkStreamer {
    cache: VoxelCache,
    budget: VoxelBudget,
    view_distance: f32,
    /// Chunks left alone after an I/O error
    skipped: HashSet<ChunkId>,
}

impl ChunkStreamer {
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            cache: VoxelCache::new(config),
            budget: VoxelBudget::new(config.max_live_voxels),
            view_distance: config.view_distance,
            skipped: HashSet::new(),
        }
    }

    pub fn from_parts(cache: VoxelCache, budget: VoxelBudget, view_distance: f32) -> Self {
        Self {
            cache,
            budget,
            view_distance,
            skipped: HashSet::new(),
        }
    }

    pub fn cache(&self) -> &VoxelCache {
        &self.cache
    }

    pub fn budget(&self) -> &VoxelBudget {
        &self.budget
    }

    /// Chunks skipped after an I/O error
    pub fn skipped(&self) -> &HashSet<ChunkId> {
        &self.skipped
    }

    /// Chunk ids within view distance of `camera_pos`
    pub fn visible_chunks(&self, world: &World, camera_pos: Vec3) -> BTreeSet<ChunkId> {
        world.lattice().chunks_within(camera_pos, self.view_distance)
    }

    /// Run one streaming step for a camera at `camera_pos`.
    pub fn update(&mut self, world: &mut World, camera_pos: Vec3) -> StreamReport {
        let visible = self.visible_chunks(world, camera_pos);
        world.set_visible_chunks(&visible);
        self.budget.update(world.voxel_count());

        let mut report = StreamReport {
            visible,
            ..StreamReport::default()
        };

        if self.budget.can_restore() {
            let nearest = report
                .visible
                .iter()
                .copied()
                .filter(|&id| self.cache.is_cached(id) && !self.skipped.contains(&id))
                .min_by(|&a, &b| {
                    let da = world.lattice().chunk_distance(a, camera_pos);
                    let db = world.lattice().chunk_distance(b, camera_pos);
                    da.total_cmp(&db)
                });
            if let Some(id) = nearest {
                match self.cache.restore(world, id) {
                    Ok(progress) => report.restored = Some((id, progress)),
                    Err(e) => self.restore_failed(id, e, &mut report),
                }
            }
        }

        self.budget.update(world.voxel_count());
        if self.budget.should_evict() {
            let farthest = world
                .partition()
                .chunk_ids()
                .filter(|id| {
                    !report.visible.contains(id) && !self.cache.is_cached(*id) && !self.skipped.contains(id)
                })
                .max_by(|&a, &b| {
                    let da = world.lattice().chunk_distance(a, camera_pos);
                    let db = world.lattice().chunk_distance(b, camera_pos);
                    da.total_cmp(&db)
                });
            if let Some(id) = farthest {
                match self.cache.evict(world, id) {
                    Ok(true) => report.evicted = Some(id),
                    Ok(false) => {}
                    Err(e) => {
                        log::error!("evicting chunk {} failed, keeping it live: {}", id, e);
                        self.skipped.insert(id);
                        report.failed.push(id);
                    }
                }
            }
            self.budget.update(world.voxel_count());
        }

        if report.evicted.is_some() || report.restored.is_some() {
            log::debug!(
                "stream: evicted {:?}, restored {:?}, live {} / {} ({:.0}%)",
                report.evicted,
                report.restored,
                self.budget.used(),
                self.budget.budget(),
                self.budget.pressure() * 100.0
            );
        }
        report
    }

    fn restore_failed(&mut self, id: ChunkId, error: Error, report: &mut StreamReport) {
        report.failed.push(id);
        if matches!(error, Error::CorruptCache { .. }) {
            log::error!("chunk {} cache is unusable, discarding it: {}", id, error);
            self.cache.discard(id);
        } else {
            log::error!("restoring chunk {} failed, skipping it: {}", id, error);
            self.skipped.insert(id);
        }
    }

    /// Drop all cached chunks and their files, for a level reload.
    pub fn reset(&mut self) -> Result<()> {
        self.budget.update(0);
        self.skipped.clear();
        self.cache.clear()
    }
}
