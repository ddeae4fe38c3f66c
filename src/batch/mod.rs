//! Batch optimizer - merges same-keyed groups of visible chunks into render
//! batches, double-buffered against the renderer.

pub mod cursor;
pub mod generation;
pub mod optimizer;

pub use cursor::Cursor;
pub use generation::{Batch, BatchInstance, BatchReader, BatchSet, BatchSink};
pub use optimizer::{BatchOptimizer, OptimizerState};
