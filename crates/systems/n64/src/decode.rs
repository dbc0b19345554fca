//! Pixel-format decoding from TMEM to canonical RGBA8.
//!
//! The RDP stores texels in a handful of packed formats; the viewer
//! normalizes all of them to RGBA8 so the renderer never needs to know
//! about N64 formats. Decoders are pure: TMEM bytes + tile addressing in,
//! pixel buffer out.
//!
//! Channel expansion is done by bit replication, not shifting: a 5-bit
//! channel value `c` becomes `(c << 3) | (c >> 2)`, so all-ones maps to
//! 255 exactly. Games tuned their palettes against this hardware behavior
//! and plain shifts visibly darken them.

use thiserror::Error;
use viewer_core::types::Texture;

use crate::tile::{
    TileDescriptor, FMT_CI, FMT_I, FMT_IA, FMT_RGBA, SIZE_16B, SIZE_4B, SIZE_8B,
};
use crate::tmem::Tmem;

/// Recoverable texture-decode failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureError {
    #[error("palette-indexed texture decoded without a loaded palette")]
    MissingPalette,
    #[error("unsupported texture format {format}/{size}")]
    UnsupportedFormat { format: u8, size: u8 },
}

/// A decoded TLUT: up to 256 RGBA8 entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    pub colors: Vec<[u8; 4]>,
}

impl Palette {
    /// Decode packed 5-5-5-1 colors into a palette, replacing nothing —
    /// the caller swaps the whole palette per the LOADTLUT contract.
    pub fn from_rgba16(raw: &[u16]) -> Self {
        Self {
            colors: raw.iter().map(|&c| unpack_rgba16(c)).collect(),
        }
    }

    fn lookup(&self, index: usize) -> [u8; 4] {
        self.colors.get(index).copied().unwrap_or([0, 0, 0, 0])
    }
}

/// Replicate a 5-bit channel into 8 bits.
pub fn expand5(c: u8) -> u8 {
    (c << 3) | (c >> 2)
}

/// Replicate a 4-bit channel into 8 bits.
pub fn expand4(c: u8) -> u8 {
    c * 0x11
}

/// Replicate a 3-bit channel into 8 bits.
pub fn expand3(c: u8) -> u8 {
    (c << 5) | (c << 2) | (c >> 1)
}

/// Unpack one 5-5-5-1 texel to RGBA8.
pub fn unpack_rgba16(texel: u16) -> [u8; 4] {
    let r = expand5(((texel >> 11) & 0x1F) as u8);
    let g = expand5(((texel >> 6) & 0x1F) as u8);
    let b = expand5(((texel >> 1) & 0x1F) as u8);
    let a = if texel & 1 != 0 { 255 } else { 0 };
    [r, g, b, a]
}

/// Decode `width` x `height` texels of the tile's TMEM region to RGBA8.
///
/// Palette-indexed formats need `palette`; its absence is a reported
/// failure (the caller renders untextured). Formats the viewer does not
/// support (RGBA32, YUV) are also reported; the caller substitutes
/// [`placeholder_texture`].
pub fn decode_texture(
    tmem: &Tmem,
    tile: &TileDescriptor,
    width: u32,
    height: u32,
    palette: Option<&Palette>,
) -> Result<Texture, TextureError> {
    let mut out = Texture::new(width, height);
    let base = tile.tmem_addr as usize * 8;
    let stride = tile.line as usize * 8;

    for y in 0..height {
        let row = base + y as usize * stride;
        for x in 0..width {
            let rgba = decode_texel(tmem, tile, row, x as usize, palette)?;
            out.put_pixel(x, y, rgba);
        }
    }
    Ok(out)
}

fn decode_texel(
    tmem: &Tmem,
    tile: &TileDescriptor,
    row: usize,
    x: usize,
    palette: Option<&Palette>,
) -> Result<[u8; 4], TextureError> {
    match (tile.format, tile.size) {
        (FMT_RGBA, SIZE_16B) => Ok(unpack_rgba16(tmem.read_u16(row + x * 2))),

        (FMT_CI, SIZE_4B) => {
            let palette = palette.ok_or(TextureError::MissingPalette)?;
            let nibble = read_nibble(tmem, row, x);
            // 4-bit indices select within one of 16 palette banks.
            Ok(palette.lookup(((tile.palette as usize) << 4) | nibble as usize))
        }
        (FMT_CI, SIZE_8B) => {
            let palette = palette.ok_or(TextureError::MissingPalette)?;
            Ok(palette.lookup(tmem.read(row + x) as usize))
        }

        (FMT_IA, SIZE_4B) => {
            let nibble = read_nibble(tmem, row, x);
            let i = expand3(nibble >> 1);
            let a = if nibble & 1 != 0 { 255 } else { 0 };
            Ok([i, i, i, a])
        }
        (FMT_IA, SIZE_8B) => {
            let byte = tmem.read(row + x);
            let i = expand4(byte >> 4);
            let a = expand4(byte & 0x0F);
            Ok([i, i, i, a])
        }
        (FMT_IA, SIZE_16B) => {
            let texel = tmem.read_u16(row + x * 2);
            let i = (texel >> 8) as u8;
            let a = (texel & 0xFF) as u8;
            Ok([i, i, i, a])
        }

        (FMT_I, SIZE_4B) => {
            let i = expand4(read_nibble(tmem, row, x));
            Ok([i, i, i, i])
        }
        (FMT_I, SIZE_8B) => {
            let i = tmem.read(row + x);
            Ok([i, i, i, i])
        }
        (FMT_I, SIZE_16B) => {
            // No hardware analog; intensity in the high byte, opaque.
            let i = (tmem.read_u16(row + x * 2) >> 8) as u8;
            Ok([i, i, i, 255])
        }

        (format, size) => Err(TextureError::UnsupportedFormat { format, size }),
    }
}

fn read_nibble(tmem: &Tmem, row: usize, x: usize) -> u8 {
    let byte = tmem.read(row + x / 2);
    if x & 1 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

/// Fixed 8x8 magenta/black checkerboard substituted for textures the
/// decoder cannot handle. Deliberately loud so broken assets are obvious
/// in the viewer instead of silently invisible.
pub fn placeholder_texture() -> Texture {
    let mut tex = Texture::new(8, 8);
    for y in 0..8 {
        for x in 0..8 {
            let on = (x / 2 + y / 2) % 2 == 0;
            let rgba = if on { [255, 0, 255, 255] } else { [0, 0, 0, 255] };
            tex.put_pixel(x, y, rgba);
        }
    }
    tex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::SIZE_32B;

    fn rgba16_tile() -> TileDescriptor {
        TileDescriptor {
            format: FMT_RGBA,
            size: SIZE_16B,
            line: 1, // 8 bytes per row = 4 texels
            ..Default::default()
        }
    }

    #[test]
    fn test_expand5_all_bits_set() {
        assert_eq!(expand5(0b11111), 255);
    }

    #[test]
    fn test_expand5_lsb_replication() {
        // red=0b00001 -> 0b00001000 | 0b000 = 8
        assert_eq!(expand5(0b00001), 8);
        assert_eq!(expand5(0b10000), 0b1000_0100);
    }

    #[test]
    fn test_unpack_rgba16_channels() {
        // r=31, g=0, b=0, a=1
        let texel = 0b11111_00000_00000_1;
        assert_eq!(unpack_rgba16(texel), [255, 0, 0, 255]);
        // alpha bit clear
        let texel = 0b00000_11111_00000_0;
        assert_eq!(unpack_rgba16(texel), [0, 255, 0, 0]);
    }

    #[test]
    fn test_decode_rgba16() {
        let mut tmem = Tmem::new();
        // one opaque white texel at the tile base
        tmem.write(0, 0xFF);
        tmem.write(1, 0xFF);
        let tex = decode_texture(&tmem, &rgba16_tile(), 1, 1, None).unwrap();
        assert_eq!(tex.pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_decode_ci8_requires_palette() {
        let tmem = Tmem::new();
        let tile = TileDescriptor {
            format: FMT_CI,
            size: SIZE_8B,
            line: 1,
            ..Default::default()
        };
        assert_eq!(
            decode_texture(&tmem, &tile, 2, 2, None),
            Err(TextureError::MissingPalette)
        );
    }

    #[test]
    fn test_decode_ci8_with_palette() {
        let mut tmem = Tmem::new();
        tmem.write(0, 1);
        let palette = Palette {
            colors: vec![[0, 0, 0, 0], [10, 20, 30, 255]],
        };
        let tile = TileDescriptor {
            format: FMT_CI,
            size: SIZE_8B,
            line: 1,
            ..Default::default()
        };
        let tex = decode_texture(&tmem, &tile, 1, 1, Some(&palette)).unwrap();
        assert_eq!(tex.pixel(0, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn test_decode_ci4_uses_palette_bank() {
        let mut tmem = Tmem::new();
        tmem.write(0, 0x20); // first nibble = index 2, second = 0
        let mut colors = vec![[0u8; 4]; 256];
        colors[0x12] = [1, 2, 3, 255]; // bank 1, index 2
        let palette = Palette { colors };
        let tile = TileDescriptor {
            format: FMT_CI,
            size: SIZE_4B,
            line: 1,
            palette: 1,
            ..Default::default()
        };
        let tex = decode_texture(&tmem, &tile, 1, 1, Some(&palette)).unwrap();
        assert_eq!(tex.pixel(0, 0), Some([1, 2, 3, 255]));
    }

    #[test]
    fn test_decode_ia8() {
        let mut tmem = Tmem::new();
        tmem.write(0, 0xF0); // intensity 15, alpha 0
        let tile = TileDescriptor {
            format: FMT_IA,
            size: SIZE_8B,
            line: 1,
            ..Default::default()
        };
        let tex = decode_texture(&tmem, &tile, 1, 1, None).unwrap();
        assert_eq!(tex.pixel(0, 0), Some([255, 255, 255, 0]));
    }

    #[test]
    fn test_decode_ia4() {
        let mut tmem = Tmem::new();
        tmem.write(0, 0b1111_0000); // texel0: i=0b111, a=1; texel1: 0
        let tile = TileDescriptor {
            format: FMT_IA,
            size: SIZE_4B,
            line: 1,
            ..Default::default()
        };
        let tex = decode_texture(&tmem, &tile, 2, 1, None).unwrap();
        assert_eq!(tex.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(tex.pixel(1, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_decode_i4_nibble_order() {
        let mut tmem = Tmem::new();
        tmem.write(0, 0xA5);
        let tile = TileDescriptor {
            format: FMT_I,
            size: SIZE_4B,
            line: 1,
            ..Default::default()
        };
        let tex = decode_texture(&tmem, &tile, 2, 1, None).unwrap();
        assert_eq!(tex.pixel(0, 0), Some([0xAA; 4]));
        assert_eq!(tex.pixel(1, 0), Some([0x55; 4]));
    }

    #[test]
    fn test_unsupported_format_reports_codes() {
        let tmem = Tmem::new();
        let tile = TileDescriptor {
            format: FMT_RGBA,
            size: SIZE_32B,
            line: 1,
            ..Default::default()
        };
        assert_eq!(
            decode_texture(&tmem, &tile, 1, 1, None),
            Err(TextureError::UnsupportedFormat {
                format: FMT_RGBA,
                size: SIZE_32B
            })
        );
    }

    #[test]
    fn test_placeholder_is_visible() {
        let tex = placeholder_texture();
        assert_eq!((tex.width, tex.height), (8, 8));
        assert_eq!(tex.pixel(0, 0), Some([255, 0, 255, 255]));
        assert_eq!(tex.pixel(2, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_decode_row_stride() {
        // 2x2 RGBA16, line stride = 1 word (8 bytes): second row starts
        // at byte 8 even though the row only holds 4 bytes of texels.
        let mut tmem = Tmem::new();
        tmem.write(8, 0xFF);
        tmem.write(9, 0xFF);
        let tex = decode_texture(&tmem, &rgba16_tile(), 2, 2, None).unwrap();
        assert_eq!(tex.pixel(0, 1), Some([255, 255, 255, 255]));
        assert_eq!(tex.pixel(1, 0), Some([0, 0, 0, 0]));
    }
}
