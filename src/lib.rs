//! Strata - a chunked voxel world store
//!
//! Voxels live on an even-integer lattice and are partitioned into chunk
//! columns and, within a chunk, into groups keyed by texture and visible-face
//! mask. A background optimizer merges groups across visible chunks into
//! draw batches, and far chunks can be evicted to a disk cache and restored
//! incrementally.

pub mod core;
pub mod voxel;
pub mod batch;
pub mod streaming;
pub mod generation;
