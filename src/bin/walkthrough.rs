//! Walkthrough - drives a camera across a generated world.
//!
//! Usage: cargo run --release --bin walkthrough -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Engine config JSON (default: built-in defaults)
//!   --seed <SEED>     Terrain seed (default: 12345)
//!   --frames <N>      Frames to simulate (default: 600)
//!
//! Each frame streams chunks around the camera, advances the batch optimizer
//! by one step and, when a cycle completes, publishes the new generation to
//! a sink that only logs what it would upload.

use std::time::Instant;

use strata::batch::{BatchInstance, BatchOptimizer, BatchSet, BatchSink, OptimizerState};
use strata::core::{Camera, EngineConfig, Result, Vec3};
use strata::generation::{TerrainFill, TerrainParams};
use strata::streaming::ChunkStreamer;
use strata::voxel::World;

/// Stands in for the GPU upload path.
#[derive(Default)]
struct LoggingSink {
    uploads: usize,
    bytes: usize,
}

impl BatchSink for LoggingSink {
    fn submit(&mut self, batches: &BatchSet) {
        let bytes: usize = batches
            .batches()
            .iter()
            .filter(|b| !b.is_buffered())
            .map(|b| bytemuck::cast_slice::<BatchInstance, u8>(b.instances().as_slice()).len())
            .sum();
        self.uploads += 1;
        self.bytes += bytes;
        log::info!(
            "generation {}: {} batches, {} voxels, {} bytes re-uploaded",
            batches.generation(),
            batches.len(),
            batches.voxel_count(),
            bytes
        );
    }
}

fn main() {
    strata::core::logging::init();

    if let Err(e) = run() {
        log::error!("walkthrough failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = match parse_arg::<String>(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let seed = parse_arg(&args, "--seed").unwrap_or(12345);
    let frames = parse_arg(&args, "--frames").unwrap_or(600usize);

    let mut world = World::new(&config.world)?;
    let start = Instant::now();
    let terrain = TerrainFill::new(TerrainParams { seed, ..Default::default() });
    terrain.fill(&mut world)?;
    let stats = world.stats();
    log::info!(
        "generated {} voxels ({} solid, {} fluid) in {} chunks, {} groups, {:.2?}",
        stats.voxels,
        stats.solid,
        stats.fluid,
        stats.chunks,
        stats.groups,
        start.elapsed()
    );

    let mut streamer = ChunkStreamer::new(&config.streaming);
    let mut optimizer = BatchOptimizer::new(world.textures(), &config.batching);
    let reader = optimizer.reader();
    let mut sink = LoggingSink::default();

    // Diagonal pass across the world at a fixed height, looking ahead
    let extent = world.lattice().bound() as f32 * 0.9;
    let from = Vec3::new(-extent, 24.0, -extent);
    let to = Vec3::new(extent, 24.0, extent);
    let mut camera = Camera::look_at(from, to, Vec3::Y);
    camera.far = config.streaming.view_distance;

    let start = Instant::now();
    for frame in 0..frames {
        let t = frame as f32 / frames.max(1) as f32;
        camera.position = from.lerp(to, t);

        let report = streamer.update(&mut world, camera.position);
        let mask = camera.facing_mask();
        let state = optimizer.step(&world, &report.visible, mask, |v| camera.can_see_voxel(v));

        if state == OptimizerState::FullyOptimized && optimizer.swap() {
            reader.submit_to(&mut sink);
        }

        if frame % 100 == 0 {
            log::info!(
                "frame {}: camera {}, {} visible chunks, {} live voxels, {} cached chunks",
                frame,
                camera.position,
                report.visible.len(),
                world.voxel_count(),
                streamer.cache().len()
            );
        }
    }

    log::info!(
        "{} frames in {:.2?}: {} generations, {} bytes uploaded, {} voxels still on disk",
        frames,
        start.elapsed(),
        sink.uploads,
        sink.bytes,
        streamer.cache().cached_voxels()
    );

    streamer.reset()?;
    optimizer.reset();
    world.clear();
    Ok(())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}
