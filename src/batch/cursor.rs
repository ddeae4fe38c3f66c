//! Round-robin cursor over (texture index, face bits) pairs.

use crate::voxel::voxel::ALL_FACES;

/// Walks every texture index against face bits `1..=63`, texture-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    texture: usize,
    face_bits: u8,
    texture_count: usize,
}

impl Cursor {
    pub fn new(texture_count: usize) -> Self {
        Self {
            texture: 0,
            face_bits: 1,
            texture_count,
        }
    }

    /// Current (texture index, face bits)
    pub fn current(&self) -> (usize, u8) {
        (self.texture, self.face_bits)
    }

    /// Pairs in one full cycle
    pub fn cycle_len(&self) -> usize {
        self.texture_count * ALL_FACES as usize
    }

    /// Step to the next pair. Returns true when the cursor wrapped back to
    /// the first pair, i.e. one full cycle finished.
    pub fn advance(&mut self) -> bool {
        if self.face_bits < ALL_FACES {
            self.face_bits += 1;
            return false;
        }
        self.face_bits = 1;
        self.texture += 1;
        if self.texture >= self.texture_count {
            self.texture = 0;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.texture = 0;
        self.face_bits = 1;
    }
}
