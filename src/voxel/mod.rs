//! Voxel data structures and operations

pub mod voxel;
pub mod grid;
pub mod texture;
pub mod occupancy;
pub mod group;
pub mod chunk;
pub mod partition;
pub mod world;

pub use voxel::{Face, TextureId, VoxelRecord, ALL_FACES};
pub use grid::{ChunkId, Lattice, GRID_SIZE};
pub use texture::TextureRegistry;
pub use occupancy::{OccupancyEntry, OccupancyIndex};
pub use group::{Group, GroupKey, KeyedVoxel, VoxelKey};
pub use chunk::Chunk;
pub use partition::{ChunkPartition, Migration};
pub use world::{Placement, World, WorldStats};
