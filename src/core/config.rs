//! Engine configuration, loadable from JSON.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::grid::GRID_SIZE;
use crate::voxel::voxel::TextureId;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Full engine configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// World extent, capacity and texture set.
    pub world: WorldConfig,
    /// Batch optimizer pacing.
    pub batching: BatchConfig,
    /// Disk cache and chunk streaming.
    pub streaming: StreamingConfig,
}

impl EngineConfig {
    /// Load a config from a JSON file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check every section for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.world.validate()?;
        self.batching.validate()?;
        self.streaming.validate()
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// World domain and capacity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Half-extent of the cubic domain. Lattice coordinates run over
    /// `[-bound, bound]` in steps of 2, so each axis has `bound + 1` cells.
    pub bound: i32,
    /// Maximum number of live voxels. Placement beyond this is rejected.
    pub max_voxels: usize,
    /// Known 5-character texture codes. Position in the list is the texture index.
    pub textures: Vec<String>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            bound: 256,
            max_voxels: 1_000_000,
            textures: ["crate", "doors", "grass", "reflc", "stone", "water"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl WorldConfig {
    /// Number of lattice cells along each axis.
    pub fn cells_per_axis(&self) -> i32 {
        self.bound + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.bound <= 0 || self.bound % 2 != 0 {
            return Err(Error::Config(format!(
                "world.bound must be a positive even number, got {}",
                self.bound
            )));
        }
        if self.cells_per_axis() < GRID_SIZE {
            return Err(Error::Config(format!(
                "world.bound {} is too small for a {}x{} chunk grid",
                self.bound, GRID_SIZE, GRID_SIZE
            )));
        }
        if self.textures.is_empty() || self.textures.len() > u8::MAX as usize {
            return Err(Error::Config(format!(
                "world.textures must hold 1..=255 entries, got {}",
                self.textures.len()
            )));
        }

        let mut seen = HashSet::new();
        for code in &self.textures {
            let id = TextureId::new(code)?;
            if !seen.insert(id) {
                return Err(Error::Config(format!("duplicate texture {:?}", code)));
            }
        }
        Ok(())
    }
}

/// Batch optimizer pacing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Cursor pairs (texture, face bits) advanced per optimizer step.
    pub pairs_per_step: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { pairs_per_step: 16 }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pairs_per_step == 0 {
            return Err(Error::Config("batching.pairs_per_step must be > 0".into()));
        }
        Ok(())
    }
}

/// Disk cache and streaming policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Directory holding one file per evicted chunk.
    pub cache_dir: PathBuf,
    /// Maximum voxel records restored per `restore` call.
    pub blocks_per_run: usize,
    /// Chunks whose column centre lies farther than this are not visible.
    pub view_distance: f32,
    /// Live voxel count above which the streamer starts evicting.
    pub max_live_voxels: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            blocks_per_run: 256,
            view_distance: 96.0,
            max_live_voxels: 500_000,
        }
    }
}

impl StreamingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.blocks_per_run == 0 {
            return Err(Error::Config("streaming.blocks_per_run must be > 0".into()));
        }
        if !(self.view_distance > 0.0) {
            return Err(Error::Config(format!(
                "streaming.view_distance must be positive, got {}",
                self.view_distance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_odd_bound_rejected() {
        let mut config = EngineConfig::default();
        config.world.bound = 255;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_texture_rejected() {
        let mut config = EngineConfig::default();
        config.world.textures.push("toolong".into());
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.world.textures.push("grass".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/engine.json");

        let mut config = EngineConfig::default();
        config.world.bound = 64;
        config.streaming.blocks_per_run = 8;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.world.bound, 64);
        assert_eq!(loaded.streaming.blocks_per_run, 8);
        assert_eq!(loaded.world.textures, config.world.textures);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "batching": { "pairs_per_step": 3 } }"#).unwrap();
        assert_eq!(config.batching.pairs_per_step, 3);
        assert_eq!(config.world.bound, 256);
    }
}
