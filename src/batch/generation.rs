//! Batch generations and the handle the renderer reads them through.

use std::sync::{Arc, RwLock};

use bytemuck::{Pod, Zeroable};

use crate::voxel::group::{GroupKey, KeyedVoxel};
use crate::voxel::voxel::VoxelRecord;

/// Per-voxel instance data, laid out for direct upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BatchInstance {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl From<&VoxelRecord> for BatchInstance {
    fn from(record: &VoxelRecord) -> Self {
        Self {
            position: record.position.to_array(),
            color: record.color.to_array(),
        }
    }
}

/// Voxels of every visible chunk sharing one group key.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    key: GroupKey,
    voxels: Vec<KeyedVoxel>,
    /// False while the contents differ from what was last handed out
    buffered: bool,
}

impl Batch {
    pub(crate) fn new(key: GroupKey, voxels: Vec<KeyedVoxel>) -> Self {
        Self {
            key,
            voxels,
            buffered: false,
        }
    }

    pub fn key(&self) -> GroupKey {
        self.key
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// True if unchanged since the previous generation
    pub fn is_buffered(&self) -> bool {
        self.buffered
    }

    pub(crate) fn voxels(&self) -> &[KeyedVoxel] {
        &self.voxels
    }

    pub(crate) fn set_buffered(&mut self, buffered: bool) {
        self.buffered = buffered;
    }

    pub fn records(&self) -> impl Iterator<Item = &VoxelRecord> {
        self.voxels.iter().map(|v| &v.record)
    }

    pub fn instances(&self) -> Vec<BatchInstance> {
        self.records().map(BatchInstance::from).collect()
    }
}

/// One generation of batches, sorted by key.
#[derive(Clone, Debug, Default)]
pub struct BatchSet {
    generation: u64,
    batches: Vec<Batch>,
}

impl BatchSet {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn voxel_count(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    pub fn get(&self, key: &GroupKey) -> Option<&Batch> {
        self.batches
            .binary_search_by(|b| b.key.cmp(key))
            .ok()
            .map(|i| &self.batches[i])
    }

    /// Replace or insert the batch for `batch.key`, keeping key order.
    pub(crate) fn upsert(&mut self, batch: Batch) {
        match self.batches.binary_search_by(|b| b.key.cmp(&batch.key)) {
            Ok(i) => self.batches[i] = batch,
            Err(i) => self.batches.insert(i, batch),
        }
    }

    pub(crate) fn remove(&mut self, key: &GroupKey) -> Option<Batch> {
        let i = self.batches.binary_search_by(|b| b.key.cmp(key)).ok()?;
        Some(self.batches.remove(i))
    }

    pub(crate) fn retain<F: FnMut(&Batch) -> bool>(&mut self, f: F) {
        self.batches.retain(f);
    }

    pub(crate) fn sort(&mut self) {
        self.batches.sort_by_key(Batch::key);
    }

    pub(crate) fn mark_all_buffered(&mut self) {
        for batch in &mut self.batches {
            batch.buffered = true;
        }
    }
}

/// Consumer of published generations, typically the GPU upload path.
pub trait BatchSink {
    fn submit(&mut self, batches: &BatchSet);
}

/// Shared slot holding the live generation.
pub(crate) type LiveSlot = Arc<RwLock<Arc<BatchSet>>>;

/// Read handle on the live generation. Cheap to clone and send to a render thread.
///
/// A captured [`Arc<BatchSet>`] never changes; publishing replaces the slot's
/// pointer, so readers see either the old or the new generation in full.
#[derive(Clone)]
pub struct BatchReader {
    live: LiveSlot,
}

impl BatchReader {
    pub(crate) fn new(live: LiveSlot) -> Self {
        Self { live }
    }

    pub fn latest(&self) -> Arc<BatchSet> {
        match self.live.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.latest().generation()
    }

    /// Hand the latest generation to `sink`.
    pub fn submit_to<S: BatchSink + ?Sized>(&self, sink: &mut S) -> u64 {
        let batches = self.latest();
        sink.submit(&batches);
        batches.generation()
    }
}

/// Replace the live generation.
pub(crate) fn publish(live: &LiveSlot, batches: Arc<BatchSet>) {
    match live.write() {
        Ok(mut guard) => *guard = batches,
        Err(poisoned) => *poisoned.into_inner() = batches,
    }
}
