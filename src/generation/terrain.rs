//! Noise-based terrain fill
//!
//! Lays one column per lattice (x, z): a grass surface over a few stone
//! layers, with fluid water filling columns whose surface sits under sea
//! level. All voxels go through `World::add_voxel`, so face culling and
//! grouping come out the same as for hand-placed voxels.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{IVec3, Result, Vec3, Vec4};
use crate::voxel::voxel::{TextureId, VoxelRecord};
use crate::voxel::world::{Placement, World};

/// Parameters controlling terrain generation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub seed: u32,
    pub scale: f32,        // Horizontal scale (larger = smoother)
    pub height_scale: f32, // Peak-to-trough height
    pub octaves: u32,      // FBM octaves (detail levels)
    pub persistence: f32,  // FBM persistence (0.5 typical)
    pub lacunarity: f32,   // FBM lacunarity (2.0 typical)
    pub sea_level: f32,    // Columns below this fill with water
    pub depth: u32,        // Stone layers under the surface
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 100.0,
            height_scale: 24.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            sea_level: -4.0,
            depth: 3,
        }
    }
}

const GRASS_COLOR: Vec4 = Vec4::new(0.30, 0.60, 0.20, 1.0);
const STONE_COLOR: Vec4 = Vec4::new(0.50, 0.50, 0.52, 1.0);
const WATER_COLOR: Vec4 = Vec4::new(0.20, 0.40, 0.80, 0.6);

/// Fractal Brownian motion height field that fills a world.
pub struct TerrainFill {
    params: TerrainParams,
    noise: Fbm<Perlin>,
}

impl TerrainFill {
    pub fn new(params: TerrainParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Surface height at world (x, z), in `[-height_scale / 2, height_scale / 2]`
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let nx = (x / self.params.scale) as f64;
        let nz = (z / self.params.scale) as f64;

        // Noise is in [-1, 1]; clamp the occasional overshoot
        let value = self.noise.get([nx, nz]).clamp(-1.0, 1.0);
        (value * self.params.height_scale as f64 * 0.5) as f32
    }

    /// Fill `world`, returning the number of voxels placed.
    ///
    /// Stops early once the world reaches capacity. Fails if the world does
    /// not know the grass, stone and water textures.
    pub fn fill(&self, world: &mut World) -> Result<usize> {
        let grass = self.texture(world, "grass")?;
        let stone = self.texture(world, "stone")?;
        let water = self.texture(world, "water")?;

        let lattice = *world.lattice();
        let bound = lattice.bound() as f32;
        let snap = |y: f32| ((y / 2.0).round() * 2.0).clamp(-bound, bound);
        let sea = snap(self.params.sea_level);

        let mut placed = 0;
        for cx in 0..=lattice.bound() {
            for cz in 0..=lattice.bound() {
                let column = lattice.position_of(IVec3::new(cx, 0, cz));
                let top = snap(self.height_at(column.x, column.z));
                let at = |y: f32| Vec3::new(column.x, y, column.z);

                let mut records = Vec::with_capacity(self.params.depth as usize + 4);
                let surface = if top < sea { stone } else { grass };
                let surface_color = if top < sea { STONE_COLOR } else { GRASS_COLOR };
                records.push(VoxelRecord::new(surface, at(top), surface_color, true));
                for layer in 1..=self.params.depth {
                    let y = top - 2.0 * layer as f32;
                    if y < -bound {
                        break;
                    }
                    records.push(VoxelRecord::new(stone, at(y), STONE_COLOR, true));
                }
                let mut y = top + 2.0;
                while y <= sea {
                    records.push(VoxelRecord::new(water, at(y), WATER_COLOR, false));
                    y += 2.0;
                }

                for record in records {
                    match world.add_voxel(record) {
                        Placement::Placed => placed += 1,
                        Placement::AtCapacity => {
                            log::warn!("terrain fill stopped at capacity after {} voxels", placed);
                            return Ok(placed);
                        }
                        other => log::trace!("terrain voxel at {} not placed: {:?}", record.position, other),
                    }
                }
            }
        }

        log::info!("terrain fill placed {} voxels", placed);
        Ok(placed)
    }

    fn texture(&self, world: &World, code: &str) -> Result<TextureId> {
        let id = TextureId::new(code)?;
        match world.textures().index_of(id) {
            Some(_) => Ok(id),
            None => Err(Error::InvalidTexture(format!("{} is not registered", code))),
        }
    }
}
