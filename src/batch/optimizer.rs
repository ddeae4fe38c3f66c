//! Incremental, double-buffered batch optimizer.
//!
//! The optimizer owns a working generation and advances a cursor over
//! (texture, face bits) pairs, rebuilding a bounded number of batches per
//! [`BatchOptimizer::step`]. After one full cycle it reports
//! [`OptimizerState::FullyOptimized`]; [`BatchOptimizer::swap`] then
//! publishes the working generation for the renderer and seeds the next
//! cycle from it.
//!
//! If the visible chunk set changes mid-cycle, batches already visited keep
//! their old contents until the next cycle reaches them again.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, RwLock};

use crate::core::config::BatchConfig;
use crate::voxel::grid::ChunkId;
use crate::voxel::group::{GroupKey, KeyedVoxel};
use crate::voxel::texture::TextureRegistry;
use crate::voxel::voxel::{TextureId, VoxelRecord};
use crate::voxel::world::World;

use super::cursor::Cursor;
use super::generation::{publish, Batch, BatchReader, BatchSet, LiveSlot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizerState {
    /// Cursor is mid-cycle
    Building,
    /// Cursor wrapped once; waiting for `swap`
    FullyOptimized,
}

pub struct BatchOptimizer {
    textures: Vec<TextureId>,
    pairs_per_step: usize,
    cursor: Cursor,
    state: OptimizerState,
    working: BatchSet,
    /// Keys whose batch changed this cycle
    dirty: HashSet<GroupKey>,
    live: LiveSlot,
    generation: u64,
}

impl BatchOptimizer {
    pub fn new(textures: &TextureRegistry, config: &BatchConfig) -> Self {
        Self {
            textures: textures.textures().to_vec(),
            pairs_per_step: config.pairs_per_step.max(1),
            cursor: Cursor::new(textures.len()),
            state: OptimizerState::Building,
            working: BatchSet::default(),
            dirty: HashSet::new(),
            live: Arc::new(RwLock::new(Arc::new(BatchSet::default()))),
            generation: 0,
        }
    }

    /// Handle for the render side.
    pub fn reader(&self) -> BatchReader {
        BatchReader::new(Arc::clone(&self.live))
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn working(&self) -> &BatchSet {
        &self.working
    }

    pub fn dirty_keys(&self) -> &HashSet<GroupKey> {
        &self.dirty
    }

    /// Published generation number
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advance the cursor by up to `pairs_per_step` pairs.
    ///
    /// `camera_mask` holds the faces that can point at the camera; batches
    /// with none of those faces are dropped and never rebuilt. `can_see`
    /// filters individual voxels. Does nothing once fully optimized.
    pub fn step<F>(
        &mut self,
        world: &World,
        visible: &BTreeSet<ChunkId>,
        camera_mask: u8,
        can_see: F,
    ) -> OptimizerState
    where
        F: Fn(&VoxelRecord) -> bool,
    {
        if self.state == OptimizerState::FullyOptimized {
            return self.state;
        }

        let before = self.working.len();
        self.working.retain(|b| b.key().face_bits & camera_mask != 0);
        if self.working.len() != before {
            log::trace!("pruned {} back-facing batches", before - self.working.len());
        }

        for _ in 0..self.pairs_per_step {
            let (texture_index, face_bits) = self.cursor.current();
            if let Some(&texture) = self.textures.get(texture_index) {
                let key = GroupKey::new(texture, face_bits);
                if face_bits & camera_mask != 0 {
                    self.rebuild(key, world, visible, &can_see);
                } else if self.working.remove(&key).is_some() {
                    self.dirty.insert(key);
                }
            }

            if self.cursor.advance() {
                self.complete_cycle();
                break;
            }
        }
        self.state
    }

    /// Reconcile the working batch for `key` with the visible chunks.
    fn rebuild<F>(&mut self, key: GroupKey, world: &World, visible: &BTreeSet<ChunkId>, can_see: &F)
    where
        F: Fn(&VoxelRecord) -> bool,
    {
        let mut gathered: Vec<KeyedVoxel> = Vec::new();
        for &id in visible {
            let Some(group) = world.partition().find_group(id, &key) else {
                continue;
            };
            gathered.extend(group.voxels().iter().filter(|v| can_see(&v.record)).copied());
        }
        gathered.sort_by_key(|v| v.key);

        let unchanged = match self.working.get(&key) {
            Some(existing) => existing.voxels() == gathered.as_slice(),
            None => gathered.is_empty(),
        };
        if unchanged {
            return;
        }

        log::trace!("batch {} rebuilt with {} voxels", key, gathered.len());
        if gathered.is_empty() {
            self.working.remove(&key);
        } else {
            self.working.upsert(Batch::new(key, gathered));
        }
        self.dirty.insert(key);
    }

    fn complete_cycle(&mut self) {
        self.working.sort();
        self.working.retain(|b| !b.is_empty());
        log::debug!(
            "optimizer cycle complete: {} batches, {} voxels, {} changed",
            self.working.len(),
            self.working.voxel_count(),
            self.dirty.len()
        );
        self.dirty.clear();
        self.state = OptimizerState::FullyOptimized;
    }

    /// Publish a copy of the working generation without ending the cycle.
    pub fn push(&mut self) -> u64 {
        self.generation += 1;
        let mut snapshot = self.working.clone();
        snapshot.set_generation(self.generation);
        publish(&self.live, Arc::new(snapshot));
        self.generation
    }

    /// Seed the working generation from the live one.
    pub fn pull(&mut self) {
        let live = BatchReader::new(Arc::clone(&self.live)).latest();
        self.working = (*live).clone();
        self.working.mark_all_buffered();
        self.dirty.clear();
    }

    /// Publish a finished cycle and start the next one.
    ///
    /// Returns false without doing anything unless fully optimized.
    pub fn swap(&mut self) -> bool {
        if self.state != OptimizerState::FullyOptimized {
            return false;
        }

        self.generation += 1;
        let mut finished = std::mem::take(&mut self.working);
        finished.set_generation(self.generation);
        publish(&self.live, Arc::new(finished));
        self.pull();

        self.cursor.reset();
        self.state = OptimizerState::Building;
        log::debug!("swapped in batch generation {}", self.generation);
        true
    }

    /// Abort any cycle and publish an empty generation. Valid from any state.
    pub fn reset(&mut self) {
        self.working = BatchSet::default();
        self.dirty.clear();
        self.cursor.reset();
        self.state = OptimizerState::Building;
        self.generation += 1;
        let mut empty = BatchSet::default();
        empty.set_generation(self.generation);
        publish(&self.live, Arc::new(empty));
    }

    /// Step until the cycle completes. Mostly useful for tests and tools.
    pub fn run_cycle<F>(
        &mut self,
        world: &World,
        visible: &BTreeSet<ChunkId>,
        camera_mask: u8,
        can_see: F,
    ) -> usize
    where
        F: Fn(&VoxelRecord) -> bool,
    {
        let mut steps = 0;
        while self.state == OptimizerState::Building {
            self.step(world, visible, camera_mask, &can_see);
            steps += 1;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WorldConfig;
    use crate::core::types::{Vec3, Vec4};
    use crate::voxel::voxel::{Face, ALL_FACES};

    fn setup() -> (World, BatchOptimizer) {
        let config = WorldConfig {
            bound: 64,
            max_voxels: 10_000,
            textures: vec!["grass".into(), "stone".into()],
        };
        let world = World::new(&config).unwrap();
        let optimizer = BatchOptimizer::new(world.textures(), &BatchConfig { pairs_per_step: 8 });
        (world, optimizer)
    }

    fn place(world: &mut World, code: &str, x: f32, y: f32, z: f32) {
        let record = VoxelRecord::new(TextureId::new(code).unwrap(), Vec3::new(x, y, z), Vec4::ONE, true);
        assert!(world.add_voxel(record).is_placed());
    }

    fn all_chunks(world: &World) -> BTreeSet<ChunkId> {
        world.partition().chunk_ids().collect()
    }

    #[test]
    fn test_cycle_is_amortized() {
        let (mut world, mut optimizer) = setup();
        place(&mut world, "grass", 0.0, 0.0, 0.0);
        let visible = all_chunks(&world);

        // 2 textures * 63 pairs / 8 per step = 16 steps
        let steps = optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
        assert_eq!(steps, 16);
        assert_eq!(optimizer.state(), OptimizerState::FullyOptimized);
        assert!(optimizer.dirty_keys().is_empty());

        // Nothing is visible to the renderer until swap
        assert!(optimizer.reader().latest().is_empty());
        assert!(optimizer.swap());
        assert!(!optimizer.swap());

        let live = optimizer.reader().latest();
        assert_eq!(live.len(), 1);
        assert_eq!(live.voxel_count(), 1);
        assert!(!live.batches()[0].is_buffered());
        assert_eq!(optimizer.state(), OptimizerState::Building);
    }

    #[test]
    fn test_merges_same_key_across_chunks() {
        let (mut world, mut optimizer) = setup();
        // Isolated voxels in different chunks, all with every face visible
        place(&mut world, "stone", -60.0, 0.0, -60.0);
        place(&mut world, "stone", 60.0, 0.0, 60.0);
        place(&mut world, "stone", 0.0, 0.0, 0.0);
        assert_eq!(world.partition().len(), 3);

        let visible = all_chunks(&world);
        optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
        optimizer.swap();

        let live = optimizer.reader().latest();
        let key = GroupKey::new(TextureId::new("stone").unwrap(), ALL_FACES);
        assert_eq!(live.get(&key).unwrap().len(), 3);
    }

    #[test]
    fn test_visibility_filters() {
        let (mut world, mut optimizer) = setup();
        place(&mut world, "grass", -60.0, 0.0, 0.0);
        place(&mut world, "grass", 60.0, 0.0, 0.0);
        let near = BTreeSet::from([world.chunk_id_of(Vec3::new(60.0, 0.0, 0.0))]);

        optimizer.run_cycle(&world, &near, ALL_FACES, |_| true);
        optimizer.swap();
        assert_eq!(optimizer.reader().latest().voxel_count(), 1);

        // Predicate hides everything
        optimizer.run_cycle(&world, &all_chunks(&world), ALL_FACES, |_| false);
        optimizer.swap();
        assert!(optimizer.reader().latest().is_empty());
    }

    #[test]
    fn test_camera_mask_prunes_back_facing_keys() {
        let (mut world, mut optimizer) = setup();
        place(&mut world, "grass", 0.0, 0.0, 0.0);
        place(&mut world, "grass", 0.0, 2.0, 0.0);
        let visible = all_chunks(&world);

        optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
        optimizer.swap();
        assert_eq!(optimizer.reader().latest().len(), 2);

        // Only the top face can be seen. The lower voxel lost its top face.
        optimizer.run_cycle(&world, &visible, Face::Top.bit(), |_| true);
        optimizer.swap();
        let live = optimizer.reader().latest();
        assert_eq!(live.len(), 1);
        assert_eq!(live.batches()[0].key().face_bits, ALL_FACES - Face::Bottom.bit());
    }

    #[test]
    fn test_removed_voxels_leave_next_generation() {
        let (mut world, mut optimizer) = setup();
        place(&mut world, "grass", 0.0, 0.0, 0.0);
        place(&mut world, "grass", 10.0, 0.0, 0.0);
        let visible = all_chunks(&world);
        optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
        optimizer.swap();
        assert_eq!(optimizer.reader().latest().voxel_count(), 2);

        world.remove_at(Vec3::new(10.0, 0.0, 0.0));
        optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
        optimizer.swap();
        let live = optimizer.reader().latest();
        assert_eq!(live.voxel_count(), 1);
        assert!(!live.batches()[0].is_buffered());
    }

    #[test]
    fn test_unchanged_batches_stay_buffered() {
        let (mut world, mut optimizer) = setup();
        place(&mut world, "grass", 0.0, 0.0, 0.0);
        let visible = all_chunks(&world);
        optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
        optimizer.swap();
        optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
        optimizer.swap();
        assert!(optimizer.reader().latest().batches()[0].is_buffered());
    }

    #[test]
    fn test_push_publishes_mid_cycle() {
        let (mut world, mut optimizer) = setup();
        place(&mut world, "grass", 0.0, 0.0, 0.0);
        let visible = all_chunks(&world);
        while optimizer.working().is_empty() {
            optimizer.step(&world, &visible, ALL_FACES, |_| true);
        }
        assert_eq!(optimizer.state(), OptimizerState::Building);
        let generation = optimizer.push();
        assert_eq!(optimizer.reader().generation(), generation);
        assert_eq!(optimizer.reader().latest().voxel_count(), 1);
    }

    #[test]
    fn test_reset_from_mid_cycle() {
        let (mut world, mut optimizer) = setup();
        place(&mut world, "grass", 0.0, 0.0, 0.0);
        let visible = all_chunks(&world);
        optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
        optimizer.swap();
        optimizer.step(&world, &visible, ALL_FACES, |_| true);

        optimizer.reset();
        assert_eq!(optimizer.state(), OptimizerState::Building);
        assert_eq!(optimizer.cursor().current(), (0, 1));
        assert!(optimizer.working().is_empty());
        assert!(optimizer.reader().latest().is_empty());
    }

    #[test]
    fn test_snapshot_isolation_across_threads() {
        let (mut world, mut optimizer) = setup();
        for i in 0..10 {
            place(&mut world, "stone", i as f32 * 4.0 - 20.0, 0.0, 0.0);
        }
        let visible = all_chunks(&world);
        optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
        optimizer.swap();

        let reader = optimizer.reader();
        let handle = std::thread::spawn(move || {
            let captured = reader.latest();
            let count = captured.voxel_count();
            let generation = captured.generation();
            for _ in 0..2000 {
                assert_eq!(captured.voxel_count(), count);
                assert_eq!(captured.generation(), generation);
                std::thread::yield_now();
            }
            count
        });

        for i in 0..10 {
            place(&mut world, "stone", i as f32 * 4.0 - 20.0, 8.0, 0.0);
            optimizer.run_cycle(&world, &visible, ALL_FACES, |_| true);
            optimizer.swap();
        }

        assert_eq!(handle.join().unwrap(), 10);
        assert_eq!(optimizer.reader().latest().voxel_count(), 20);
    }
}
