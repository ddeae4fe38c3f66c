//! Chunk eviction to disk and incremental restore

pub mod disk_io;
pub mod cache;
pub mod budget;
pub mod streamer;

pub use disk_io::{chunk_file_name, chunk_path, delete_chunk, HEADER_BYTES, RECORD_BYTES};
pub use cache::{CachedChunk, RestoreProgress, VoxelCache};
pub use budget::VoxelBudget;
pub use streamer::{ChunkStreamer, StreamReport};
