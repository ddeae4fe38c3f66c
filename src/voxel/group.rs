//! Groups - voxels of one chunk sharing a texture and visible-face mask.

use std::cmp::Ordering;
use std::fmt;

use crate::core::types::Vec3;
use crate::voxel::grid::ChunkId;
use crate::voxel::voxel::{TextureId, VoxelRecord};

/// Total order over placed voxels: solidity, texture index, chunk, lattice index.
///
/// Two voxels only compare equal when they share texture, solidity and cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoxelKey {
    pub solid: bool,
    pub texture: u8,
    pub chunk: ChunkId,
    pub lattice: u64,
}

/// A record together with its precomputed order key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyedVoxel {
    pub key: VoxelKey,
    pub record: VoxelRecord,
}

/// Render batching key: texture plus enabled face bits.
///
/// Orders like the composite string `texture + zero-padded face bits`
/// (`grass05` < `grass63` < `stone01`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub texture: TextureId,
    pub face_bits: u8,
}

impl GroupKey {
    pub fn new(texture: TextureId, face_bits: u8) -> Self {
        Self { texture, face_bits }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.texture, self.face_bits)
    }
}

/// Sorted list of voxels sharing a [`GroupKey`].
#[derive(Clone, Debug)]
pub struct Group {
    key: GroupKey,
    voxels: Vec<KeyedVoxel>,
}

impl Group {
    pub fn new(key: GroupKey) -> Self {
        Self {
            key,
            voxels: Vec::new(),
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

    pub fn voxels(&self) -> &[KeyedVoxel] {
        &self.voxels
    }

    pub fn records(&self) -> impl Iterator<Item = &VoxelRecord> {
        self.voxels.iter().map(|v| &v.record)
    }

    /// Insert keeping order. Equal keys go after existing ones.
    pub fn insert(&mut self, voxel: KeyedVoxel) -> usize {
        let at = self.voxels.partition_point(|v| v.key <= voxel.key);
        self.voxels.insert(at, voxel);
        at
    }

    /// Index range of voxels whose key equals `key`.
    fn key_range(&self, key: &VoxelKey) -> std::ops::Range<usize> {
        let first = self.voxels.partition_point(|v| v.key.cmp(key) == Ordering::Less);
        let last = self.voxels.partition_point(|v| v.key.cmp(key) != Ordering::Greater);
        first..last
    }

    /// Index of the first voxel with this key at exactly `position`.
    pub fn find(&self, key: &VoxelKey, position: Vec3) -> Option<usize> {
        self.key_range(key)
            .find(|&i| self.voxels[i].record.position == position)
    }

    /// Indices of every voxel with this key at exactly `position`.
    pub fn find_all(&self, key: &VoxelKey, position: Vec3) -> Vec<usize> {
        self.key_range(key)
            .filter(|&i| self.voxels[i].record.position == position)
            .collect()
    }

    /// Remove the first match for `key` at `position`.
    pub fn remove(&mut self, key: &VoxelKey, position: Vec3) -> Option<KeyedVoxel> {
        let at = self.find(key, position)?;
        Some(self.voxels.remove(at))
    }

    pub fn into_voxels(self) -> Vec<KeyedVoxel> {
        self.voxels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec4;

    fn voxel(lattice: u64, x: f32, color: f32) -> KeyedVoxel {
        let texture = TextureId::new("stone").unwrap();
        KeyedVoxel {
            key: VoxelKey { solid: true, texture: 4, chunk: 0, lattice },
            record: VoxelRecord::new(texture, Vec3::new(x, 0.0, 0.0), Vec4::splat(color), true),
        }
    }

    fn group() -> Group {
        Group::new(GroupKey::new(TextureId::new("stone").unwrap(), 63))
    }

    #[test]
    fn test_key_display_and_order() {
        let grass = TextureId::new("grass").unwrap();
        let stone = TextureId::new("stone").unwrap();
        assert_eq!(GroupKey::new(grass, 5).to_string(), "grass05");
        assert!(GroupKey::new(grass, 5) < GroupKey::new(grass, 63));
        assert!(GroupKey::new(grass, 63) < GroupKey::new(stone, 1));
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut g = group();
        for lattice in [5, 1, 9, 3] {
            g.insert(voxel(lattice, lattice as f32 * 2.0, 1.0));
        }
        let order: Vec<u64> = g.voxels().iter().map(|v| v.key.lattice).collect();
        assert_eq!(order, vec![1, 3, 5, 9]);
    }

    #[test]
    fn test_find_and_remove() {
        let mut g = group();
        for lattice in 0..10 {
            g.insert(voxel(lattice, lattice as f32 * 2.0, 1.0));
        }
        let probe = voxel(4, 8.0, 1.0);
        assert_eq!(g.find(&probe.key, Vec3::new(8.0, 0.0, 0.0)), Some(4));
        assert_eq!(g.find(&probe.key, Vec3::new(6.0, 0.0, 0.0)), None);

        let removed = g.remove(&probe.key, Vec3::new(8.0, 0.0, 0.0)).unwrap();
        assert_eq!(removed.key.lattice, 4);
        assert_eq!(g.len(), 9);
        assert!(g.remove(&probe.key, Vec3::new(8.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_duplicates_first_match_then_all() {
        let mut g = group();
        g.insert(voxel(1, 2.0, 0.1));
        g.insert(voxel(2, 4.0, 0.2));
        g.insert(voxel(2, 4.0, 0.3));
        g.insert(voxel(3, 6.0, 0.4));

        let key = voxel(2, 4.0, 0.0).key;
        let pos = Vec3::new(4.0, 0.0, 0.0);
        assert_eq!(g.find_all(&key, pos), vec![1, 2]);

        // First match is the earliest inserted duplicate
        let first = g.find(&key, pos).unwrap();
        assert_eq!(g.voxels()[first].record.color, Vec4::splat(0.2));

        let removed = g.remove(&key, pos).unwrap();
        assert_eq!(removed.record.color, Vec4::splat(0.2));
        assert_eq!(g.find_all(&key, pos), vec![1]);
    }
}
