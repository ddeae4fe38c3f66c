//! Occupancy index - positional lookup of placed voxels and their neighbours.
//!
//! Each populated lattice cell holds one [`OccupancyEntry`]. Neighbour bits are
//! kept symmetric: when a cell gains or loses a same-class neighbour on face
//! `j`, the neighbour's opposite face bit changes with it.
//!
//! Storage is sparse (hash map keyed by cell) with a height index mapping each
//! populated Y level to its (X, Z) pairs, so bulk scans only visit populated
//! slices.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::types::{IVec3, Vec3};
use crate::voxel::grid::{ChunkId, Lattice};
use crate::voxel::voxel::{face_bits_from_neighbors, Face, TextureId};

/// Occupancy of one lattice cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OccupancyEntry {
    pub texture: TextureId,
    /// Bit `j` set iff the face-`j` neighbour is occupied by the same class
    pub neighbor_bits: u8,
    pub solid: bool,
}

impl OccupancyEntry {
    /// Faces not covered by a same-class neighbour
    pub fn face_bits(&self) -> u8 {
        face_bits_from_neighbors(self.neighbor_bits)
    }
}

/// Sparse occupancy index over a bounded lattice.
pub struct OccupancyIndex {
    lattice: Lattice,
    cells: HashMap<IVec3, OccupancyEntry>,
    heights: BTreeMap<i32, HashSet<(i32, i32)>>,
}

impl OccupancyIndex {
    pub fn new(lattice: Lattice) -> Self {
        Self {
            lattice,
            cells: HashMap::new(),
            heights: BTreeMap::new(),
        }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Occupy the cell at `pos`.
    ///
    /// Probes the six adjacent cells; every same-class neighbour sets the
    /// matching bit here and the mirrored bit on itself. Returns the neighbour
    /// bits of the new entry, or `None` when `pos` is out of bounds or the
    /// cell is already populated (nothing changes in either case).
    pub fn put(&mut self, pos: Vec3, texture: TextureId, solid: bool) -> Option<u8> {
        let cell = self.lattice.cell_of(pos)?;
        if self.cells.contains_key(&cell) {
            return None;
        }

        let mut bits = 0u8;
        for face in Face::ALL {
            let neighbor_cell = cell + face.cell_offset();
            if let Some(neighbor) = self.cells.get_mut(&neighbor_cell) {
                if neighbor.solid == solid {
                    bits |= face.bit();
                    neighbor.neighbor_bits |= face.opposite().bit();
                }
            }
        }

        self.cells.insert(cell, OccupancyEntry { texture, neighbor_bits: bits, solid });
        self.heights.entry(cell.y).or_default().insert((cell.x, cell.z));
        Some(bits)
    }

    /// Clear the cell at `pos`, returning its entry if there was one.
    ///
    /// Same-class neighbours lose the mirrored bit.
    pub fn take(&mut self, pos: Vec3) -> Option<OccupancyEntry> {
        let cell = self.lattice.cell_of(pos)?;
        let entry = self.cells.remove(&cell)?;

        for face in Face::ALL {
            if entry.neighbor_bits & face.bit() == 0 {
                continue;
            }
            if let Some(neighbor) = self.cells.get_mut(&(cell + face.cell_offset())) {
                neighbor.neighbor_bits &= !face.opposite().bit();
            }
        }

        if let Some(slice) = self.heights.get_mut(&cell.y) {
            slice.remove(&(cell.x, cell.z));
            if slice.is_empty() {
                self.heights.remove(&cell.y);
            }
        }
        Some(entry)
    }

    /// Clear the cell at `pos`. Returns false if it was empty or out of bounds.
    pub fn remove(&mut self, pos: Vec3) -> bool {
        self.take(pos).is_some()
    }

    pub fn get(&self, pos: Vec3) -> Option<OccupancyEntry> {
        let cell = self.lattice.cell_of(pos)?;
        self.cells.get(&cell).copied()
    }

    pub fn get_cell(&self, cell: IVec3) -> Option<OccupancyEntry> {
        self.cells.get(&cell).copied()
    }

    pub fn is_populated(&self, pos: Vec3) -> bool {
        self.get(pos).is_some()
    }

    /// Populated by a voxel of the given class
    pub fn is_populated_with(&self, pos: Vec3, solid: bool) -> bool {
        self.get(pos).is_some_and(|e| e.solid == solid)
    }

    /// Positions of every entry matching `predicate`.
    pub fn populated_locations<F>(&self, predicate: F) -> Vec<Vec3>
    where
        F: Fn(&OccupancyEntry) -> bool,
    {
        self.scan(|_| true, predicate)
    }

    /// Positions inside chunk `chunk` whose entry matches `predicate`.
    pub fn populated_locations_in_chunk<F>(&self, chunk: ChunkId, predicate: F) -> Vec<Vec3>
    where
        F: Fn(&OccupancyEntry) -> bool,
    {
        let lattice = self.lattice;
        self.scan(move |cell| lattice.chunk_of_cell(cell) == chunk, predicate)
    }

    fn scan<C, F>(&self, cell_filter: C, predicate: F) -> Vec<Vec3>
    where
        C: Fn(IVec3) -> bool,
        F: Fn(&OccupancyEntry) -> bool,
    {
        let mut out = Vec::new();
        for (&y, slice) in &self.heights {
            for &(x, z) in slice {
                let cell = IVec3::new(x, y, z);
                if !cell_filter(cell) {
                    continue;
                }
                if let Some(entry) = self.cells.get(&cell) {
                    if predicate(entry) {
                        out.push(self.lattice.position_of(cell));
                    }
                }
            }
        }
        out
    }

    /// Number of populated cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of distinct populated heights
    pub fn height_slices(&self) -> usize {
        self.heights.len()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.heights.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::voxel::ALL_FACES;

    fn index() -> OccupancyIndex {
        OccupancyIndex::new(Lattice::new(64))
    }

    fn tex(code: &str) -> TextureId {
        TextureId::new(code).unwrap()
    }

    #[test]
    fn test_put_sets_symmetric_bits() {
        let mut occ = index();
        let grass = tex("grass");
        assert_eq!(occ.put(Vec3::ZERO, grass, true), Some(0));
        assert_eq!(occ.put(Vec3::new(2.0, 0.0, 0.0), grass, true), Some(Face::Left.bit()));

        let a = occ.get(Vec3::ZERO).unwrap();
        assert_eq!(a.neighbor_bits, Face::Right.bit());
        assert_eq!(a.face_bits(), ALL_FACES & !Face::Right.bit());
    }

    #[test]
    fn test_classes_do_not_cull_each_other() {
        let mut occ = index();
        occ.put(Vec3::ZERO, tex("stone"), true);
        assert_eq!(occ.put(Vec3::new(0.0, 2.0, 0.0), tex("water"), false), Some(0));
        assert_eq!(occ.get(Vec3::ZERO).unwrap().neighbor_bits, 0);
        assert!(occ.is_populated_with(Vec3::new(0.0, 2.0, 0.0), false));
        assert!(!occ.is_populated_with(Vec3::new(0.0, 2.0, 0.0), true));
    }

    #[test]
    fn test_remove_clears_mirrored_bits() {
        let mut occ = index();
        let stone = tex("stone");
        occ.put(Vec3::ZERO, stone, true);
        for face in Face::ALL {
            occ.put(face.normal() * 2.0, stone, true);
        }
        assert_eq!(occ.get(Vec3::ZERO).unwrap().neighbor_bits, ALL_FACES);

        assert!(occ.remove(Vec3::ZERO));
        assert!(!occ.remove(Vec3::ZERO));
        for face in Face::ALL {
            assert_eq!(occ.get(face.normal() * 2.0).unwrap().neighbor_bits, 0);
        }
    }

    #[test]
    fn test_out_of_bounds_is_noop() {
        let mut occ = index();
        assert_eq!(occ.put(Vec3::new(100.0, 0.0, 0.0), tex("stone"), true), None);
        assert!(!occ.remove(Vec3::new(100.0, 0.0, 0.0)));
        assert!(occ.get(Vec3::new(0.0, -100.0, 0.0)).is_none());
        assert!(occ.is_empty());
    }

    #[test]
    fn test_put_on_occupied_cell_is_rejected() {
        let mut occ = index();
        occ.put(Vec3::ZERO, tex("stone"), true);
        assert_eq!(occ.put(Vec3::ZERO, tex("water"), false), None);
        assert_eq!(occ.get(Vec3::ZERO).unwrap().texture, tex("stone"));
    }

    #[test]
    fn test_populated_locations_use_height_index() {
        let lattice = Lattice::new(64);
        let mut occ = OccupancyIndex::new(lattice);
        occ.put(Vec3::new(-60.0, 4.0, -60.0), tex("stone"), true);
        occ.put(Vec3::new(60.0, 4.0, 60.0), tex("water"), false);
        occ.put(Vec3::new(60.0, 8.0, 60.0), tex("stone"), true);
        assert_eq!(occ.height_slices(), 2);

        let solid = occ.populated_locations(|e| e.solid);
        assert_eq!(solid.len(), 2);

        let far_chunk = lattice.chunk_id_of(Vec3::new(60.0, 0.0, 60.0));
        let mut in_chunk = occ.populated_locations_in_chunk(far_chunk, |_| true);
        in_chunk.sort_by(|a, b| a.y.total_cmp(&b.y));
        assert_eq!(in_chunk, vec![Vec3::new(60.0, 4.0, 60.0), Vec3::new(60.0, 8.0, 60.0)]);

        occ.remove(Vec3::new(60.0, 8.0, 60.0));
        assert_eq!(occ.height_slices(), 1);
    }
}
