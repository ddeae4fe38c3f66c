//! Disk cache for evicted chunks
//!
//! Eviction writes a chunk's voxels to one file and detaches the chunk from
//! the world. Restoring reads the file back a bounded number of records per
//! call, re-adding each voxel through the normal placement path so face
//! culling is recomputed. A chunk is either live or cached, never both: a
//! record leaves the file view (consumed counters advance) in the same call
//! it re-enters the world.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::config::StreamingConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::grid::ChunkId;
use crate::voxel::world::{Placement, World};

use super::disk_io::{self, HEADER_BYTES, RECORD_BYTES};

/// Bookkeeping for one chunk on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedChunk {
    pub chunk: ChunkId,
    pub voxel_count: usize,
    pub byte_size: u64,
    pub path: PathBuf,
    pub bytes_consumed: u64,
    pub voxels_consumed: usize,
}

impl CachedChunk {
    pub fn remaining(&self) -> usize {
        self.voxel_count - self.voxels_consumed
    }
}

/// Result of one `restore` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreProgress {
    /// More records remain on disk
    Partial { restored: usize, remaining: usize },
    /// Everything read back; descriptor and file are gone
    Complete { restored: usize },
}

impl RestoreProgress {
    pub fn restored(&self) -> usize {
        match *self {
            RestoreProgress::Partial { restored, .. } | RestoreProgress::Complete { restored } => restored,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, RestoreProgress::Complete { .. })
    }
}

/// Evicts chunks to disk and restores them incrementally.
pub struct VoxelCache {
    dir: PathBuf,
    blocks_per_run: usize,
    descriptors: HashMap<ChunkId, CachedChunk>,
}

impl VoxelCache {
    pub fn new(config: &StreamingConfig) -> Self {
        Self::with_dir(config.cache_dir.clone(), config.blocks_per_run)
    }

    pub fn with_dir(dir: impl Into<PathBuf>, blocks_per_run: usize) -> Self {
        Self {
            dir: dir.into(),
            blocks_per_run: blocks_per_run.max(1),
            descriptors: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn blocks_per_run(&self) -> usize {
        self.blocks_per_run
    }

    pub fn is_cached(&self, id: ChunkId) -> bool {
        self.descriptors.contains_key(&id)
    }

    pub fn descriptor(&self, id: ChunkId) -> Option<&CachedChunk> {
        self.descriptors.get(&id)
    }

    pub fn cached_ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.descriptors.keys().copied()
    }

    /// Number of cached chunks
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Voxels still waiting on disk across all chunks
    pub fn cached_voxels(&self) -> usize {
        self.descriptors.values().map(CachedChunk::remaining).sum()
    }

    /// Write chunk `id` to disk and detach it from the world.
    ///
    /// Returns `Ok(false)` if the chunk is already cached or not live. On an
    /// I/O error the chunk stays live and untouched.
    pub fn evict(&mut self, world: &mut World, id: ChunkId) -> Result<bool> {
        if self.is_cached(id) {
            return Ok(false);
        }
        let records = world.voxels_in_chunk(id);
        if records.is_empty() {
            return Ok(false);
        }

        let byte_size = disk_io::write_chunk(&self.dir, id, &records)?;
        world.detach_chunk(id);

        self.descriptors.insert(id, CachedChunk {
            chunk: id,
            voxel_count: records.len(),
            byte_size,
            path: disk_io::chunk_path(&self.dir, id),
            bytes_consumed: 0,
            voxels_consumed: 0,
        });
        log::debug!("evicted chunk {} ({} voxels, {} bytes)", id, records.len(), byte_size);
        Ok(true)
    }

    /// Restore up to `blocks_per_run` records of chunk `id`.
    ///
    /// Also bounded by the world's remaining capacity; a full world stalls
    /// the restore without losing records. A record whose cell was occupied
    /// while the chunk was away is dropped with a warning.
    pub fn restore(&mut self, world: &mut World, id: ChunkId) -> Result<RestoreProgress> {
        let descriptor = self.descriptors.get_mut(&id).ok_or(Error::NotCached(id))?;

        if descriptor.bytes_consumed == 0 {
            let count = disk_io::read_header(&descriptor.path, id)? as usize;
            if count != descriptor.voxel_count {
                return Err(Error::CorruptCache {
                    chunk: id,
                    reason: format!("header holds {} voxels, expected {}", count, descriptor.voxel_count),
                });
            }
            descriptor.bytes_consumed = HEADER_BYTES as u64;
        }

        let batch = descriptor
            .remaining()
            .min(self.blocks_per_run)
            .min(world.remaining_capacity());

        if batch == 0 && descriptor.remaining() > 0 {
            log::warn!("restore of chunk {} stalled: world at capacity", id);
            return Ok(RestoreProgress::Partial { restored: 0, remaining: descriptor.remaining() });
        }

        let records = disk_io::read_records(&descriptor.path, id, descriptor.bytes_consumed, batch)?;

        let mut restored = 0;
        for record in records {
            match world.add_voxel(record) {
                Placement::Placed => restored += 1,
                other => log::warn!("restore of chunk {}: voxel at {} skipped ({:?})", id, record.position, other),
            }
        }
        descriptor.voxels_consumed += batch;
        descriptor.bytes_consumed += (batch * RECORD_BYTES) as u64;

        if descriptor.remaining() > 0 {
            return Ok(RestoreProgress::Partial { restored, remaining: descriptor.remaining() });
        }

        self.forget(id);
        log::debug!("restored chunk {}", id);
        Ok(RestoreProgress::Complete { restored })
    }

    /// Drop chunk `id` from the cache and delete its file, without restoring
    /// what is left. Returns false if the chunk was not cached.
    pub fn discard(&mut self, id: ChunkId) -> bool {
        let Some(descriptor) = self.descriptors.get(&id) else {
            return false;
        };
        if descriptor.remaining() > 0 {
            log::warn!("discarding chunk {}: {} cached voxels dropped", id, descriptor.remaining());
        }
        self.forget(id);
        true
    }

    /// Remove the descriptor, then the file. A file that cannot be deleted
    /// is left behind with a warning; the chunk is no longer cached either way.
    fn forget(&mut self, id: ChunkId) {
        self.descriptors.remove(&id);
        if let Err(e) = disk_io::delete_chunk(&self.dir, id) {
            log::warn!("could not delete cache file for chunk {}: {}", id, e);
        }
    }

    /// Restore chunk `id` completely. Returns the number of calls made.
    pub fn restore_all(&mut self, world: &mut World, id: ChunkId) -> Result<usize> {
        let mut calls = 0;
        loop {
            calls += 1;
            let progress = self.restore(world, id)?;
            if progress.is_complete() {
                return Ok(calls);
            }
            if progress.restored() == 0 && world.remaining_capacity() == 0 {
                return Ok(calls);
            }
        }
    }

    /// Forget every cached chunk and delete the cache directory.
    pub fn clear(&mut self) -> Result<()> {
        self.descriptors.clear();
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}
