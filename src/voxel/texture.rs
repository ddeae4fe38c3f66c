//! Registry of known textures. A texture's index orders voxels and drives
//! the batch optimizer's cursor.

use std::collections::HashMap;

use crate::core::types::Result;
use crate::voxel::voxel::TextureId;

#[derive(Clone, Debug)]
pub struct TextureRegistry {
    textures: Vec<TextureId>,
    index: HashMap<TextureId, u8>,
}

impl TextureRegistry {
    /// Build from texture codes. Config validation guarantees at most 255
    /// unique entries; extras beyond that are ignored.
    pub fn new<S: AsRef<str>>(codes: &[S]) -> Result<Self> {
        let mut textures = Vec::with_capacity(codes.len());
        let mut index = HashMap::with_capacity(codes.len());
        for code in codes.iter().take(u8::MAX as usize) {
            let id = TextureId::new(code.as_ref())?;
            if !index.contains_key(&id) {
                index.insert(id, textures.len() as u8);
                textures.push(id);
            }
        }
        Ok(Self { textures, index })
    }

    pub fn index_of(&self, texture: TextureId) -> Option<u8> {
        self.index.get(&texture).copied()
    }

    pub fn get(&self, index: usize) -> Option<TextureId> {
        self.textures.get(index).copied()
    }

    pub fn textures(&self) -> &[TextureId] {
        &self.textures
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_list_order() {
        let registry = TextureRegistry::new(&["stone", "grass", "stone"]).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.index_of(TextureId::new("grass").unwrap()), Some(1));
        assert_eq!(registry.get(0), Some(TextureId::new("stone").unwrap()));
        assert_eq!(registry.index_of(TextureId::new("water").unwrap()), None);
        assert!(TextureRegistry::new(&["bad"]).is_err());
    }
}
