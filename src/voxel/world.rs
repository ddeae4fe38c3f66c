//! World - owns the occupancy index and chunk partition and keeps them in step.
//!
//! All voxel edits go through [`World::add_voxel`] and [`World::remove_voxel`].
//! Both run the face update protocol: neighbours of the edited cell whose
//! visible-face mask changed are collected as migrations and moved between
//! groups in a single transfer.

use std::collections::{BTreeSet, HashMap};

use crate::core::config::WorldConfig;
use crate::core::types::{IVec3, Result, Vec3};
use crate::voxel::chunk::Chunk;
use crate::voxel::grid::{ChunkId, Lattice};
use crate::voxel::group::{GroupKey, KeyedVoxel, VoxelKey};
use crate::voxel::occupancy::{OccupancyEntry, OccupancyIndex};
use crate::voxel::partition::{ChunkPartition, Migration};
use crate::voxel::texture::TextureRegistry;
use crate::voxel::voxel::{face_bits_from_neighbors, Face, VoxelRecord};

/// Outcome of placing a voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Placed,
    /// Position lies outside the world domain
    OutOfBounds,
    /// The cell already holds a voxel
    Occupied,
    /// The world holds `max_voxels` voxels already
    AtCapacity,
    /// Texture is not in the registry
    UnknownTexture,
}

impl Placement {
    pub fn is_placed(self) -> bool {
        self == Placement::Placed
    }
}

/// Snapshot of world counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    pub voxels: usize,
    pub solid: usize,
    pub fluid: usize,
    pub chunks: usize,
    pub groups: usize,
}

/// Owned world context, created at level load and reset on reload.
pub struct World {
    lattice: Lattice,
    textures: TextureRegistry,
    max_voxels: usize,
    occupancy: OccupancyIndex,
    partition: ChunkPartition,
    solid_count: usize,
    fluid_count: usize,
}

impl World {
    pub fn new(config: &WorldConfig) -> Result<Self> {
        config.validate()?;
        let lattice = Lattice::new(config.bound);
        Ok(Self {
            lattice,
            textures: TextureRegistry::new(&config.textures)?,
            max_voxels: config.max_voxels,
            occupancy: OccupancyIndex::new(lattice),
            partition: ChunkPartition::new(),
            solid_count: 0,
            fluid_count: 0,
        })
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    pub fn occupancy(&self) -> &OccupancyIndex {
        &self.occupancy
    }

    pub fn partition(&self) -> &ChunkPartition {
        &self.partition
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.partition.chunk(id)
    }

    pub fn voxel_count(&self) -> usize {
        self.solid_count + self.fluid_count
    }

    pub fn max_voxels(&self) -> usize {
        self.max_voxels
    }

    pub fn remaining_capacity(&self) -> usize {
        self.max_voxels.saturating_sub(self.voxel_count())
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            voxels: self.voxel_count(),
            solid: self.solid_count,
            fluid: self.fluid_count,
            chunks: self.partition.len(),
            groups: self.partition.group_count(),
        }
    }

    pub fn chunk_id_of(&self, pos: Vec3) -> ChunkId {
        self.lattice.chunk_id_of(pos)
    }

    fn voxel_key(&self, cell: IVec3, texture_index: u8, solid: bool) -> VoxelKey {
        VoxelKey {
            solid,
            texture: texture_index,
            chunk: self.lattice.chunk_of_cell(cell),
            lattice: self.lattice.linear_index(cell),
        }
    }

    /// Place a voxel, snapping its position to the lattice.
    pub fn add_voxel(&mut self, record: VoxelRecord) -> Placement {
        let Some(texture_index) = self.textures.index_of(record.texture) else {
            return Placement::UnknownTexture;
        };
        let Some(cell) = self.lattice.cell_of(record.position) else {
            return Placement::OutOfBounds;
        };
        if self.occupancy.get_cell(cell).is_some() {
            return Placement::Occupied;
        }
        if self.voxel_count() >= self.max_voxels {
            return Placement::AtCapacity;
        }

        let position = self.lattice.position_of(cell);
        let affected = self.same_class_neighbors(cell, record.solid);
        let Some(bits) = self.occupancy.put(position, record.texture, record.solid) else {
            return Placement::Occupied;
        };

        let key = self.voxel_key(cell, texture_index, record.solid);
        let group = GroupKey::new(record.texture, face_bits_from_neighbors(bits));
        let record = VoxelRecord { position, ..record };
        self.partition.insert(key.chunk, group, KeyedVoxel { key, record });

        if record.solid {
            self.solid_count += 1;
        } else {
            self.fluid_count += 1;
        }

        let migrations = self.collect_migrations(affected);
        self.partition.transfer(&migrations);
        Placement::Placed
    }

    /// Remove the voxel matching `record`'s texture, solidity and cell.
    ///
    /// Returns false if no such voxel is placed.
    pub fn remove_voxel(&mut self, record: &VoxelRecord) -> bool {
        let Some(cell) = self.lattice.cell_of(record.position) else {
            return false;
        };
        match self.occupancy.get_cell(cell) {
            Some(entry) if entry.texture == record.texture && entry.solid == record.solid => {
                self.remove_cell(cell, entry).is_some()
            }
            _ => false,
        }
    }

    /// Remove whatever voxel occupies `pos`.
    pub fn remove_at(&mut self, pos: Vec3) -> Option<VoxelRecord> {
        let cell = self.lattice.cell_of(pos)?;
        let entry = self.occupancy.get_cell(cell)?;
        self.remove_cell(cell, entry)
    }

    fn remove_cell(&mut self, cell: IVec3, entry: OccupancyEntry) -> Option<VoxelRecord> {
        let texture_index = self.textures.index_of(entry.texture)?;
        let position = self.lattice.position_of(cell);
        let key = self.voxel_key(cell, texture_index, entry.solid);
        let group = GroupKey::new(entry.texture, entry.face_bits());

        let removed = self.partition.remove(key.chunk, &group, &key, position);
        if removed.is_none() {
            log::warn!("remove: voxel at {} not found in group {}", position, group);
        }

        let affected = self.same_class_neighbors(cell, entry.solid);
        self.occupancy.take(position);
        if entry.solid {
            self.solid_count -= 1;
        } else {
            self.fluid_count -= 1;
        }

        let migrations = self.collect_migrations(affected);
        self.partition.transfer(&migrations);
        removed.map(|v| v.record)
    }

    /// Look up the placed record at `pos`.
    pub fn voxel_at(&self, pos: Vec3) -> Option<&VoxelRecord> {
        let cell = self.lattice.cell_of(pos)?;
        let entry = self.occupancy.get_cell(cell)?;
        let key = self.voxel_key(cell, self.textures.index_of(entry.texture)?, entry.solid);
        let group = GroupKey::new(entry.texture, entry.face_bits());
        self.partition
            .find_voxel(key.chunk, &group, &key, self.lattice.position_of(cell))
            .map(|v| &v.record)
    }

    pub fn voxels_in_chunk(&self, id: ChunkId) -> Vec<VoxelRecord> {
        self.partition
            .chunk(id)
            .map(|c| c.records().copied().collect())
            .unwrap_or_default()
    }

    /// Remove a whole chunk at once.
    ///
    /// Voxels inside the chunk are not re-culled against each other. Only
    /// same-class neighbours in adjacent chunks are re-keyed, in one transfer.
    pub fn detach_chunk(&mut self, id: ChunkId) -> Option<Vec<VoxelRecord>> {
        let chunk = self.partition.take(id)?;
        let records: Vec<VoxelRecord> = chunk.records().copied().collect();

        let mut affected: HashMap<IVec3, u8> = HashMap::new();
        for record in &records {
            let Some(cell) = self.lattice.cell_of(record.position) else {
                continue;
            };
            for face in [Face::Left, Face::Right, Face::Back, Face::Front] {
                let neighbor = cell + face.cell_offset();
                if self.lattice.chunk_of_cell(neighbor) == id {
                    continue;
                }
                if let Some(entry) = self.occupancy.get_cell(neighbor) {
                    if entry.solid == record.solid {
                        affected.entry(neighbor).or_insert_with(|| entry.face_bits());
                    }
                }
            }
        }

        for record in &records {
            if self.occupancy.remove(record.position) {
                if record.solid {
                    self.solid_count -= 1;
                } else {
                    self.fluid_count -= 1;
                }
            }
        }

        let migrations = self.collect_migrations(affected.into_iter().collect());
        self.partition.transfer(&migrations);
        log::debug!("detached chunk {} with {} voxels", id, records.len());
        Some(records)
    }

    /// Flag chunks in `visible` as visible and every other chunk as hidden.
    pub fn set_visible_chunks(&mut self, visible: &BTreeSet<ChunkId>) {
        for chunk in self.partition.chunks_mut() {
            let id = chunk.id();
            chunk.set_visible(visible.contains(&id));
        }
    }

    /// Drop every voxel, for a level reload.
    pub fn clear(&mut self) {
        self.occupancy.clear();
        self.partition.clear();
        self.solid_count = 0;
        self.fluid_count = 0;
    }

    /// Same-class neighbours of `cell` with their current face bits.
    fn same_class_neighbors(&self, cell: IVec3, solid: bool) -> Vec<(IVec3, u8)> {
        Face::ALL
            .iter()
            .filter_map(|face| {
                let neighbor = cell + face.cell_offset();
                self.occupancy
                    .get_cell(neighbor)
                    .filter(|e| e.solid == solid)
                    .map(|e| (neighbor, e.face_bits()))
            })
            .collect()
    }

    /// Migrations for cells whose face bits differ from `before`.
    fn collect_migrations(&self, before: Vec<(IVec3, u8)>) -> Vec<Migration> {
        let mut migrations = Vec::with_capacity(before.len());
        for (cell, old_bits) in before {
            let Some(entry) = self.occupancy.get_cell(cell) else {
                continue;
            };
            let new_bits = entry.face_bits();
            if new_bits == old_bits {
                continue;
            }
            let Some(texture_index) = self.textures.index_of(entry.texture) else {
                log::warn!("migration: texture {} not registered", entry.texture);
                continue;
            };
            let key = self.voxel_key(cell, texture_index, entry.solid);
            migrations.push(Migration {
                chunk: key.chunk,
                key,
                position: self.lattice.position_of(cell),
                from: GroupKey::new(entry.texture, old_bits),
                to: GroupKey::new(entry.texture, new_bits),
            });
        }
        migrations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec4;
    use crate::voxel::voxel::{TextureId, ALL_FACES};

    fn world() -> World {
        let config = WorldConfig {
            bound: 64,
            max_voxels: 1000,
            ..WorldConfig::default()
        };
        World::new(&config).unwrap()
    }

    fn voxel(code: &str, x: f32, y: f32, z: f32, solid: bool) -> VoxelRecord {
        VoxelRecord::new(TextureId::new(code).unwrap(), Vec3::new(x, y, z), Vec4::ONE, solid)
    }

    /// Every placed voxel is in exactly one group whose face bits match the
    /// occupancy index, and nothing else is grouped.
    fn assert_consistent(world: &World) {
        let mut grouped = 0;
        for chunk in world.partition().chunks() {
            assert!(!chunk.is_empty());
            for group in chunk.groups() {
                assert!(!group.is_empty());
                for v in group.voxels() {
                    let entry = world.occupancy().get(v.record.position).expect("grouped voxel not in occupancy");
                    assert_eq!(entry.texture, v.record.texture);
                    assert_eq!(entry.solid, v.record.solid);
                    assert_eq!(group.key().face_bits, entry.face_bits(), "at {}", v.record.position);
                    assert_eq!(world.chunk_id_of(v.record.position), chunk.id());
                    grouped += 1;
                }
            }
        }
        assert_eq!(grouped, world.occupancy().len());
        assert_eq!(grouped, world.voxel_count());
    }

    fn face_bits_at(world: &World, x: f32, y: f32, z: f32) -> u8 {
        world.occupancy().get(Vec3::new(x, y, z)).unwrap().face_bits()
    }

    #[test]
    fn test_adjacent_grass_scenario() {
        let mut w = world();
        assert!(w.add_voxel(voxel("grass", 0.0, 0.0, 0.0, true)).is_placed());
        assert!(w.add_voxel(voxel("grass", 2.0, 0.0, 0.0, true)).is_placed());

        assert_eq!(face_bits_at(&w, 0.0, 0.0, 0.0), ALL_FACES - Face::Right.bit());
        assert_eq!(face_bits_at(&w, 2.0, 0.0, 0.0), ALL_FACES - Face::Left.bit());

        let id = w.chunk_id_of(Vec3::ZERO);
        let grass = TextureId::new("grass").unwrap();
        let chunk = w.chunk(id).unwrap();
        assert_eq!(chunk.group_count(), 2);
        assert_eq!(chunk.group(&GroupKey::new(grass, ALL_FACES - Face::Right.bit())).unwrap().len(), 1);
        assert_eq!(chunk.group(&GroupKey::new(grass, ALL_FACES - Face::Left.bit())).unwrap().len(), 1);
        assert_consistent(&w);
    }

    #[test]
    fn test_culling_independent_of_insert_order() {
        for flip in [false, true] {
            let mut w = world();
            let (a, b) = (voxel("stone", 0.0, 0.0, 0.0, true), voxel("stone", 0.0, 2.0, 0.0, true));
            if flip {
                w.add_voxel(b);
                w.add_voxel(a);
            } else {
                w.add_voxel(a);
                w.add_voxel(b);
            }
            assert_eq!(face_bits_at(&w, 0.0, 0.0, 0.0), ALL_FACES - Face::Top.bit());
            assert_eq!(face_bits_at(&w, 0.0, 2.0, 0.0), ALL_FACES - Face::Bottom.bit());
            assert_consistent(&w);
        }
    }

    #[test]
    fn test_fluid_does_not_cull_solid() {
        let mut w = world();
        w.add_voxel(voxel("stone", 0.0, 0.0, 0.0, true));
        w.add_voxel(voxel("water", 0.0, 2.0, 0.0, false));
        assert_eq!(face_bits_at(&w, 0.0, 0.0, 0.0), ALL_FACES);
        assert_eq!(face_bits_at(&w, 0.0, 2.0, 0.0), ALL_FACES);
        assert_eq!(w.stats().fluid, 1);
        assert_eq!(w.stats().solid, 1);
        assert_consistent(&w);
    }

    #[test]
    fn test_remove_reenables_neighbor_faces() {
        let mut w = world();
        let center = voxel("stone", 0.0, 0.0, 0.0, true);
        w.add_voxel(center);
        for face in Face::ALL {
            let p = face.normal() * 2.0;
            w.add_voxel(voxel("stone", p.x, p.y, p.z, true));
        }
        assert_eq!(face_bits_at(&w, 0.0, 0.0, 0.0), 0);
        assert_consistent(&w);

        assert!(w.remove_voxel(&center));
        assert!(!w.remove_voxel(&center));
        for face in Face::ALL {
            let p = face.normal() * 2.0;
            assert_eq!(face_bits_at(&w, p.x, p.y, p.z), ALL_FACES);
        }
        assert_consistent(&w);
    }

    #[test]
    fn test_remove_requires_matching_identity() {
        let mut w = world();
        w.add_voxel(voxel("stone", 4.0, 0.0, 0.0, true));
        assert!(!w.remove_voxel(&voxel("grass", 4.0, 0.0, 0.0, true)));
        assert!(!w.remove_voxel(&voxel("stone", 4.0, 0.0, 0.0, false)));
        assert!(w.remove_at(Vec3::new(4.0, 0.0, 0.0)).is_some());
        assert_eq!(w.voxel_count(), 0);
    }

    #[test]
    fn test_empty_containers_removed() {
        let mut w = world();
        let a = voxel("crate", 10.0, 0.0, 10.0, true);
        w.add_voxel(a);
        let id = w.chunk_id_of(a.position);
        assert_eq!(w.chunk(id).unwrap().group_count(), 1);

        w.remove_voxel(&a);
        assert!(w.chunk(id).is_none());
        assert_eq!(w.stats(), WorldStats::default());
    }

    #[test]
    fn test_placement_rejections() {
        let config = WorldConfig {
            bound: 64,
            max_voxels: 2,
            ..WorldConfig::default()
        };
        let mut w = World::new(&config).unwrap();
        assert_eq!(w.add_voxel(voxel("stone", 100.0, 0.0, 0.0, true)), Placement::OutOfBounds);
        assert_eq!(w.add_voxel(voxel("abcde", 0.0, 0.0, 0.0, true)), Placement::UnknownTexture);
        assert_eq!(w.add_voxel(voxel("stone", 0.0, 0.0, 0.0, true)), Placement::Placed);
        assert_eq!(w.add_voxel(voxel("water", 0.0, 0.0, 0.0, false)), Placement::Occupied);
        assert_eq!(w.add_voxel(voxel("stone", 2.0, 0.0, 0.0, true)), Placement::Placed);
        assert_eq!(w.add_voxel(voxel("stone", 4.0, 0.0, 0.0, true)), Placement::AtCapacity);
        assert_eq!(w.voxel_count(), 2);
    }

    #[test]
    fn test_position_snaps_to_lattice() {
        let mut w = world();
        w.add_voxel(voxel("stone", 2.3, -0.4, 3.9, true));
        let placed = w.voxel_at(Vec3::new(2.0, 0.0, 4.0)).unwrap();
        assert_eq!(placed.position, Vec3::new(2.0, 0.0, 4.0));
    }

    #[test]
    fn test_cross_chunk_neighbors_stay_consistent() {
        let mut w = world();
        // Walk along X across several chunk borders
        for i in -20..20 {
            w.add_voxel(voxel("stone", i as f32 * 2.0, 0.0, 0.0, true));
        }
        assert!(w.partition().len() > 1);
        assert_consistent(&w);
        assert_eq!(face_bits_at(&w, 0.0, 0.0, 0.0), ALL_FACES - Face::Left.bit() - Face::Right.bit());

        for i in (-20..20).step_by(3) {
            w.remove_at(Vec3::new(i as f32 * 2.0, 0.0, 0.0));
        }
        assert_consistent(&w);
    }

    #[test]
    fn test_churn_keeps_invariants() {
        let mut w = world();
        let mut seed = 0x2545_f491u32;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };
        for _ in 0..2000 {
            let r = next();
            let x = ((r % 9) as f32 - 4.0) * 2.0 + 24.0;
            let y = (((r >> 4) % 5) as f32) * 2.0;
            let z = (((r >> 8) % 9) as f32 - 4.0) * 2.0;
            let solid = (r >> 12) % 4 != 0;
            let code = if solid { "stone" } else { "water" };
            if (r >> 16) % 3 == 0 {
                w.remove_at(Vec3::new(x, y, z));
            } else {
                w.add_voxel(voxel(code, x, y, z, solid));
            }
        }
        assert_consistent(&w);
    }

    #[test]
    fn test_detach_chunk_rekeys_boundary_neighbors() {
        let mut w = world();
        for i in -20..20 {
            w.add_voxel(voxel("stone", i as f32 * 2.0, 0.0, 0.0, true));
        }
        let id = w.chunk_id_of(Vec3::ZERO);
        let before = w.voxels_in_chunk(id).len();
        let detached = w.detach_chunk(id).unwrap();
        assert_eq!(detached.len(), before);
        assert!(w.chunk(id).is_none());
        assert_eq!(w.voxel_count(), 40 - before);
        assert_consistent(&w);
        assert!(w.detach_chunk(id).is_none());
    }

    #[test]
    fn test_clear() {
        let mut w = world();
        w.add_voxel(voxel("stone", 0.0, 0.0, 0.0, true));
        w.clear();
        assert_eq!(w.stats(), WorldStats::default());
        assert!(w.occupancy().is_empty());
    }
}
