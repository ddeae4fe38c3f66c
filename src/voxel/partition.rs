//! Chunk partition - every live chunk keyed by id, with batched group transfers.

use std::collections::BTreeMap;

use crate::core::types::Vec3;
use crate::voxel::chunk::Chunk;
use crate::voxel::grid::ChunkId;
use crate::voxel::group::{Group, GroupKey, KeyedVoxel, VoxelKey};

/// A voxel moving between groups of its chunk after its face bits changed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Migration {
    pub chunk: ChunkId,
    pub key: VoxelKey,
    pub position: Vec3,
    pub from: GroupKey,
    pub to: GroupKey,
}

/// Live chunks. Chunks without groups are never kept.
#[derive(Default)]
pub struct ChunkPartition {
    chunks: BTreeMap<ChunkId, Chunk>,
}

impl ChunkPartition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&id)
    }

    pub fn chunk_mut(&mut self, id: ChunkId) -> Option<&mut Chunk> {
        self.chunks.get_mut(&id)
    }

    pub fn contains(&self, id: ChunkId) -> bool {
        self.chunks.contains_key(&id)
    }

    pub fn chunk_ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.chunks.keys().copied()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut()
    }

    /// Number of live chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.chunks.values().map(Chunk::group_count).sum()
    }

    pub fn find_group(&self, chunk: ChunkId, key: &GroupKey) -> Option<&Group> {
        self.chunks.get(&chunk)?.group(key)
    }

    pub fn find_voxel(
        &self,
        chunk: ChunkId,
        group: &GroupKey,
        key: &VoxelKey,
        position: Vec3,
    ) -> Option<&KeyedVoxel> {
        let group = self.find_group(chunk, group)?;
        group.find(key, position).map(|i| &group.voxels()[i])
    }

    /// Insert into `group` of `chunk`, creating either as needed.
    pub fn insert(&mut self, chunk: ChunkId, group: GroupKey, voxel: KeyedVoxel) {
        self.chunks
            .entry(chunk)
            .or_insert_with(|| Chunk::new(chunk))
            .group_or_insert(group)
            .insert(voxel);
    }

    /// Remove one voxel. Empty groups and chunks left behind are dropped.
    pub fn remove(
        &mut self,
        chunk: ChunkId,
        group: &GroupKey,
        key: &VoxelKey,
        position: Vec3,
    ) -> Option<KeyedVoxel> {
        let owner = self.chunks.get_mut(&chunk)?;
        let removed = owner.group_mut(group)?.remove(key, position)?;

        owner.remove_group_if_empty(group);
        if owner.is_empty() {
            self.chunks.remove(&chunk);
        }
        Some(removed)
    }

    /// Detach a whole chunk.
    pub fn take(&mut self, id: ChunkId) -> Option<Chunk> {
        self.chunks.remove(&id)
    }

    /// Apply a set of migrations, re-sorting each touched chunk's groups once.
    ///
    /// A migration whose source group or voxel is missing is skipped and
    /// logged. Returns the number of voxels moved.
    pub fn transfer(&mut self, migrations: &[Migration]) -> usize {
        let mut by_chunk: BTreeMap<ChunkId, Vec<&Migration>> = BTreeMap::new();
        for m in migrations.iter().filter(|m| m.from != m.to) {
            by_chunk.entry(m.chunk).or_default().push(m);
        }

        let mut moved = 0;
        for (id, moves) in by_chunk {
            let Some(chunk) = self.chunks.get_mut(&id) else {
                log::warn!("transfer: chunk {} not live, skipping {} moves", id, moves.len());
                continue;
            };

            // Groups created by this transfer, merged into the chunk at the end
            let mut fresh: Vec<Group> = Vec::new();

            for m in moves {
                let Some(source) = chunk.group_mut(&m.from) else {
                    log::warn!("transfer: chunk {} has no group {}", id, m.from);
                    continue;
                };
                let Some(voxel) = source.remove(&m.key, m.position) else {
                    log::warn!("transfer: voxel at {} missing from group {}", m.position, m.from);
                    continue;
                };

                match chunk.group_mut(&m.to) {
                    Some(target) => {
                        target.insert(voxel);
                    }
                    None => match fresh.iter_mut().find(|g| g.key() == m.to) {
                        Some(target) => {
                            target.insert(voxel);
                        }
                        None => {
                            let mut group = Group::new(m.to);
                            group.insert(voxel);
                            fresh.push(group);
                        }
                    },
                }
                moved += 1;
            }

            chunk.append_unsorted(fresh);
            chunk.normalize();
            if chunk.is_empty() {
                self.chunks.remove(&id);
            }
        }
        moved
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
