//! Chunk - one grid column's groups, kept sorted by group key.

use crate::voxel::grid::ChunkId;
use crate::voxel::group::{Group, GroupKey};
use crate::voxel::voxel::VoxelRecord;

/// Groups of a single chunk column.
#[derive(Clone, Debug)]
pub struct Chunk {
    id: ChunkId,
    /// Sorted by key, no two groups share a key
    groups: Vec<Group>,
    /// Set when the chunk was in the last visible set handed to the world
    visible: bool,
}

impl Chunk {
    pub fn new(id: ChunkId) -> Self {
        Self {
            id,
            groups: Vec::new(),
            visible: false,
        }
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn voxel_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    /// Binary search for a group by key.
    pub fn find_group(&self, key: &GroupKey) -> Result<usize, usize> {
        self.groups.binary_search_by(|g| g.key().cmp(key))
    }

    pub fn group(&self, key: &GroupKey) -> Option<&Group> {
        self.find_group(key).ok().map(|i| &self.groups[i])
    }

    pub fn group_mut(&mut self, key: &GroupKey) -> Option<&mut Group> {
        self.find_group(key).ok().map(|i| &mut self.groups[i])
    }

    /// Group for `key`, created in sorted position if missing.
    pub fn group_or_insert(&mut self, key: GroupKey) -> &mut Group {
        let at = match self.find_group(&key) {
            Ok(i) => i,
            Err(i) => {
                self.groups.insert(i, Group::new(key));
                i
            }
        };
        &mut self.groups[at]
    }

    /// Drop the group at `key` if it holds no voxels. Returns true if dropped.
    pub fn remove_group_if_empty(&mut self, key: &GroupKey) -> bool {
        match self.find_group(key) {
            Ok(i) if self.groups[i].is_empty() => {
                self.groups.remove(i);
                true
            }
            _ => false,
        }
    }

    /// Append groups without keeping order. Must be followed by [`Chunk::normalize`].
    pub(crate) fn append_unsorted(&mut self, groups: Vec<Group>) {
        self.groups.extend(groups);
    }

    /// Drop empty groups and restore key order in one pass.
    pub(crate) fn normalize(&mut self) {
        self.groups.retain(|g| !g.is_empty());
        self.groups.sort_by_key(Group::key);
    }

    pub fn records(&self) -> impl Iterator<Item = &VoxelRecord> {
        self.groups.iter().flat_map(Group::records)
    }

    pub fn into_groups(self) -> Vec<Group> {
        self.groups
    }
}
