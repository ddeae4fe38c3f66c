//! Voxel record, texture codes and face bits

use std::fmt;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result, Vec3, Vec4};

/// Mask with all six faces enabled
pub const ALL_FACES: u8 = 0b11_1111;

/// Length of a texture code in bytes
pub const TEXTURE_ID_LEN: usize = 5;

/// Five character ASCII texture code such as `grass` or `water`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId([u8; TEXTURE_ID_LEN]);

impl TextureId {
    /// Parse a texture code. It must be exactly five printable ASCII bytes.
    pub fn new(code: &str) -> Result<Self> {
        let bytes: [u8; TEXTURE_ID_LEN] = code
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidTexture(code.to_string()))?;
        Self::from_bytes(bytes)
    }

    /// Build from raw bytes, as read from a cache file.
    pub fn from_bytes(bytes: [u8; TEXTURE_ID_LEN]) -> Result<Self> {
        if bytes.iter().all(|b| b.is_ascii_graphic()) {
            Ok(Self(bytes))
        } else {
            Err(Error::InvalidTexture(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    pub fn as_bytes(&self) -> &[u8; TEXTURE_ID_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("?????")
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureId({})", self.as_str())
    }
}

impl std::str::FromStr for TextureId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Voxel face. The discriminant is the face's bit index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
    Back = 4,
    Front = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Left,
        Face::Right,
        Face::Bottom,
        Face::Top,
        Face::Back,
        Face::Front,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Face on the other side of the shared boundary
    pub fn opposite(self) -> Face {
        Face::ALL[self.index() ^ 1]
    }

    /// Offset to the adjacent lattice cell
    pub fn cell_offset(self) -> IVec3 {
        match self {
            Face::Left => IVec3::NEG_X,
            Face::Right => IVec3::X,
            Face::Bottom => IVec3::NEG_Y,
            Face::Top => IVec3::Y,
            Face::Back => IVec3::NEG_Z,
            Face::Front => IVec3::Z,
        }
    }

    /// Outward unit normal
    pub fn normal(self) -> Vec3 {
        self.cell_offset().as_vec3()
    }
}

/// Visible faces for a voxel whose same-class neighbours are `neighbor_bits`
pub fn face_bits_from_neighbors(neighbor_bits: u8) -> u8 {
    !neighbor_bits & ALL_FACES
}

/// A placed voxel.
///
/// Records are only created and destroyed through the world's add/remove
/// path, which keeps the occupancy index in step with them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelRecord {
    pub texture: TextureId,
    /// Even-integer lattice position
    pub position: Vec3,
    /// Linear RGBA
    pub color: Vec4,
    /// Solid voxels and fluid voxels cull against their own class only
    pub solid: bool,
}

impl VoxelRecord {
    pub fn new(texture: TextureId, position: Vec3, color: Vec4, solid: bool) -> Self {
        Self {
            texture,
            position,
            color,
            solid,
        }
    }

    /// Same voxel identity: texture, position and solidity
    pub fn same_identity(&self, other: &VoxelRecord) -> bool {
        self.texture == other.texture && self.position == other.position && self.solid == other.solid
    }
}
