//! Error types for the strata world store

use thiserror::Error;

use crate::voxel::grid::ChunkId;

/// Main error type for the crate
///
/// Only failures that leave an operation unable to complete are errors.
/// Routine outcomes such as out-of-bounds edits or a full world are
/// reported through status values instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid texture id: {0:?}")]
    InvalidTexture(String),

    #[error("Corrupt cache file for chunk {chunk}: {reason}")]
    CorruptCache { chunk: ChunkId, reason: String },

    #[error("Chunk {chunk} holds {voxels} voxels, too many to cache")]
    ChunkTooLarge { chunk: ChunkId, voxels: usize },

    #[error("Chunk {0} is not cached")]
    NotCached(ChunkId),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
