//! Session texture cache.
//!
//! Decoding TMEM to RGBA8 is the most expensive step of interpretation
//! and real lists rebind the same texture dozens of times per frame. The
//! cache fingerprints the addressed TMEM region together with the tile's
//! decode-relevant fields and reuses the decoded pixels on a hit. The
//! cache lives for one viewer session; remapping segments invalidates
//! nothing because the fingerprint covers content, not addresses.

use std::collections::HashMap;

use viewer_core::logging::{log, LogCategory, LogLevel};
use viewer_core::types::Texture;

use crate::decode::{decode_texture, placeholder_texture, Palette, TextureError};
use crate::tile::{TileDescriptor, FMT_CI};
use crate::tmem::{Tmem, TMEM_SIZE};

/// Content hash of everything that affects a tile's decoded pixels.
/// crc32 collisions would show the wrong texture, which is acceptable for
/// a viewer.
pub fn fingerprint(tmem: &Tmem, tile: &TileDescriptor, palette: Option<&Palette>) -> u32 {
    let mut hasher = crc32fast::Hasher::new();

    let (width, height) = tile.calc_texture_size();
    let base = tile.tmem_addr as usize * 8;
    let stride = (tile.line as usize * 8).max(8);
    let len = (height as usize * stride).min(TMEM_SIZE);
    let mut region = Vec::with_capacity(len);
    for i in 0..len {
        region.push(tmem.read(base + i));
    }
    hasher.update(&region);

    hasher.update(&[tile.format, tile.size, tile.palette, tile.mask_s, tile.mask_t]);
    hasher.update(&width.to_le_bytes());
    hasher.update(&height.to_le_bytes());

    if tile.format == FMT_CI {
        if let Some(palette) = palette {
            for color in &palette.colors {
                hasher.update(color);
            }
        }
    }

    hasher.finalize()
}

/// Decoded textures for one interpretation session, deduplicated by
/// [`fingerprint`]. Handles are indices into the final texture list.
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: Vec<Texture>,
    by_key: HashMap<u32, usize>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Return a handle for the tile's current TMEM content, decoding on a
    /// miss. An unsupported format substitutes the placeholder
    /// checkerboard; a palette-indexed tile with no palette loaded yields
    /// no texture at all, so the caller renders untextured.
    pub fn get_or_decode(
        &mut self,
        tmem: &Tmem,
        tile: &TileDescriptor,
        palette: Option<&Palette>,
    ) -> Option<usize> {
        let key = fingerprint(tmem, tile, palette);
        if let Some(&handle) = self.by_key.get(&key) {
            return Some(handle);
        }

        let (width, height) = tile.calc_texture_size();
        let texture = match decode_texture(tmem, tile, width, height, palette) {
            Ok(texture) => {
                log(LogCategory::Texture, LogLevel::Debug, || {
                    format!(
                        "decoded {}x{} fmt {}/{} as #{}",
                        width,
                        height,
                        tile.format,
                        tile.size,
                        self.textures.len()
                    )
                });
                texture
            }
            Err(TextureError::MissingPalette) => {
                log(LogCategory::Texture, LogLevel::Warn, || {
                    "palette-indexed tile bound with no palette loaded".to_string()
                });
                return None;
            }
            Err(err @ TextureError::UnsupportedFormat { .. }) => {
                log(LogCategory::Stubs, LogLevel::Warn, || {
                    format!("{err}, using placeholder")
                });
                placeholder_texture()
            }
        };

        let handle = self.textures.len();
        self.textures.push(texture);
        self.by_key.insert(key, handle);
        Some(handle)
    }

    /// Drop all cached textures, e.g. between unrelated asset loads.
    pub fn clear(&mut self) {
        self.textures.clear();
        self.by_key.clear();
    }

    pub fn into_textures(self) -> Vec<Texture> {
        self.textures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{FMT_RGBA, SIZE_16B, SIZE_32B};

    fn small_rgba16_tile() -> TileDescriptor {
        TileDescriptor {
            format: FMT_RGBA,
            size: SIZE_16B,
            line: 1,
            lrs: 3 << 2,
            lrt: 3 << 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_cache_hit_on_identical_content() {
        let tmem = Tmem::new();
        let tile = small_rgba16_tile();
        let mut cache = TextureCache::new();
        let a = cache.get_or_decode(&tmem, &tile, None).unwrap();
        let b = cache.get_or_decode(&tmem, &tile, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_miss_on_changed_tmem() {
        let mut tmem = Tmem::new();
        let tile = small_rgba16_tile();
        let mut cache = TextureCache::new();
        let a = cache.get_or_decode(&tmem, &tile, None).unwrap();
        tmem.write(0, 0xFF);
        let b = cache.get_or_decode(&tmem, &tile, None).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_missing_palette_yields_no_texture() {
        use crate::tile::SIZE_8B;
        let tmem = Tmem::new();
        let tile = TileDescriptor {
            format: FMT_CI,
            size: SIZE_8B,
            line: 1,
            mask_s: 2,
            mask_t: 2,
            ..Default::default()
        };
        let mut cache = TextureCache::new();
        assert_eq!(cache.get_or_decode(&tmem, &tile, None), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_empties_cache() {
        let tmem = Tmem::new();
        let tile = small_rgba16_tile();
        let mut cache = TextureCache::new();
        cache.get_or_decode(&tmem, &tile, None).unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        // Re-decoding after clear starts handles over from zero.
        assert_eq!(cache.get_or_decode(&tmem, &tile, None), Some(0));
    }

    #[test]
    fn test_cache_miss_on_different_palette_bank() {
        use crate::tile::SIZE_4B;
        let tmem = Tmem::new();
        let palette = Palette {
            colors: vec![[0u8; 4]; 256],
        };
        let mut tile = TileDescriptor {
            format: FMT_CI,
            size: SIZE_4B,
            line: 1,
            mask_s: 2,
            mask_t: 2,
            ..Default::default()
        };
        let mut cache = TextureCache::new();
        let a = cache.get_or_decode(&tmem, &tile, Some(&palette)).unwrap();
        tile.palette = 3;
        let b = cache.get_or_decode(&tmem, &tile, Some(&palette)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_failure_yields_placeholder() {
        let tmem = Tmem::new();
        let tile = TileDescriptor {
            format: FMT_RGBA,
            size: SIZE_32B,
            line: 1,
            lrs: 3 << 2,
            lrt: 3 << 2,
            ..Default::default()
        };
        let mut cache = TextureCache::new();
        let handle = cache.get_or_decode(&tmem, &tile, None).unwrap();
        let textures = cache.into_textures();
        assert_eq!((textures[handle].width, textures[handle].height), (8, 8));
        assert_eq!(textures[handle].pixel(0, 0), Some([255, 0, 255, 255]));
    }

    #[test]
    fn test_into_textures_preserves_handle_order() {
        let mut tmem = Tmem::new();
        let tile = small_rgba16_tile();
        let mut cache = TextureCache::new();
        let a = cache.get_or_decode(&tmem, &tile, None).unwrap();
        tmem.write(0, 0x12);
        let b = cache.get_or_decode(&tmem, &tile, None).unwrap();
        let textures = cache.into_textures();
        assert_eq!(textures.len(), 2);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }
}
