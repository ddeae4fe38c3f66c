//! Lattice coordinate transform and the fixed chunk grid.
//!
//! Voxels sit on an even-integer lattice covering `[-bound, bound]` on every
//! axis. A position maps to a cell with `idx = round((coord + bound) / 2)`.
//! The XZ plane is split into `GRID_SIZE x GRID_SIZE` chunk columns whose ids
//! fit in a signed byte.

use std::collections::BTreeSet;

use glam::Vec2;

use crate::core::types::{IVec3, Vec3};

/// Chunk id, `row * GRID_SIZE + col - 128`
pub type ChunkId = i8;

/// Chunk columns per axis
pub const GRID_SIZE: i32 = 16;

const ID_OFFSET: i32 = GRID_SIZE * GRID_SIZE / 2;

/// Coordinate transform for a cubic domain of half-extent `bound`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lattice {
    bound: i32,
}

impl Lattice {
    pub fn new(bound: i32) -> Self {
        Self { bound }
    }

    pub fn bound(&self) -> i32 {
        self.bound
    }

    pub fn cells_per_axis(&self) -> i32 {
        self.bound + 1
    }

    /// Cell holding `pos`, or `None` outside the domain.
    pub fn cell_of(&self, pos: Vec3) -> Option<IVec3> {
        let to_cell = |c: f32| ((c + self.bound as f32) / 2.0).round();
        let cell = Vec3::new(to_cell(pos.x), to_cell(pos.y), to_cell(pos.z));
        let max = self.bound as f32;
        if cell.min_element() < 0.0 || cell.max_element() > max || !cell.is_finite() {
            return None;
        }
        Some(cell.as_ivec3())
    }

    pub fn contains_cell(&self, cell: IVec3) -> bool {
        cell.min_element() >= 0 && cell.max_element() <= self.bound
    }

    /// World position of a cell's lattice point.
    pub fn position_of(&self, cell: IVec3) -> Vec3 {
        (cell * 2 - IVec3::splat(self.bound)).as_vec3()
    }

    /// Linear index of a cell, used as the finest component of voxel ordering.
    pub fn linear_index(&self, cell: IVec3) -> u64 {
        let n = self.cells_per_axis() as u64;
        (cell.x as u64 * n + cell.y as u64) * n + cell.z as u64
    }

    fn column_of(&self, cell_coord: i32) -> i32 {
        let clamped = cell_coord.clamp(0, self.bound);
        (clamped * GRID_SIZE / self.cells_per_axis()).min(GRID_SIZE - 1)
    }

    /// Chunk owning a cell. Only X and Z take part.
    pub fn chunk_of_cell(&self, cell: IVec3) -> ChunkId {
        let col = self.column_of(cell.x);
        let row = self.column_of(cell.z);
        (row * GRID_SIZE + col - ID_OFFSET) as ChunkId
    }

    /// Chunk owning a world position. Positions outside the domain clamp to
    /// the edge columns so the function is total.
    pub fn chunk_id_of(&self, pos: Vec3) -> ChunkId {
        let to_cell = |c: f32| ((c + self.bound as f32) / 2.0).round() as i32;
        let cell = IVec3::new(to_cell(pos.x), 0, to_cell(pos.z));
        self.chunk_of_cell(cell)
    }

    /// XZ bounds of a chunk column in world units, voxel extents included.
    pub fn chunk_bounds(&self, id: ChunkId) -> (Vec2, Vec2) {
        let idx = id as i32 + ID_OFFSET;
        let (row, col) = (idx / GRID_SIZE, idx % GRID_SIZE);
        let n = self.cells_per_axis();

        // First cell c with c * GRID_SIZE / n >= k
        let first_cell = |k: i32| (k * n + GRID_SIZE - 1) / GRID_SIZE;
        let span = |k: i32| {
            let lo = first_cell(k);
            let hi = if k == GRID_SIZE - 1 { n } else { first_cell(k + 1) };
            (
                (lo * 2 - self.bound) as f32 - 1.0,
                ((hi - 1) * 2 - self.bound) as f32 + 1.0,
            )
        };

        let (min_x, max_x) = span(col);
        let (min_z, max_z) = span(row);
        (Vec2::new(min_x, min_z), Vec2::new(max_x, max_z))
    }

    /// Chunks whose column comes within `distance` of `center` in the XZ plane.
    pub fn chunks_within(&self, center: Vec3, distance: f32) -> BTreeSet<ChunkId> {
        let c = Vec2::new(center.x, center.z);
        all_chunk_ids()
            .filter(|&id| {
                let (min, max) = self.chunk_bounds(id);
                c.clamp(min, max).distance(c) <= distance
            })
            .collect()
    }

    /// XZ distance from `center` to the nearest point of a chunk column.
    pub fn chunk_distance(&self, id: ChunkId, center: Vec3) -> f32 {
        let c = Vec2::new(center.x, center.z);
        let (min, max) = self.chunk_bounds(id);
        c.clamp(min, max).distance(c)
    }
}

/// Every chunk id of the grid.
pub fn all_chunk_ids() -> impl Iterator<Item = ChunkId> {
    (i8::MIN..=i8::MAX).map(|id| id as ChunkId)
}
