//! Procedural world content

pub mod terrain;

pub use terrain::{TerrainFill, TerrainParams};
