//! Tile descriptors — the 8 hardware texture-addressing slots.
//!
//! A tile tells the RDP how to interpret a region of TMEM as a texture:
//! pixel format, texel size, line stride, palette bank, and per-axis
//! wrap/clamp/mask/shift. Two separate commands configure a tile and they
//! update disjoint field groups:
//!
//! - SETTILE writes the addressing fields and leaves the source rectangle
//!   alone;
//! - SETTILESIZE writes only the source rectangle (uls/ult/lrs/lrt, in
//!   10.2 fixed-point texel units).
//!
//! Descriptors are therefore merged, never replaced. Assets depend on a
//! rectangle surviving later SETTILE calls.

/// Texture format codes (bits 23-21 of SETTILE/SETTIMG w0).
pub const FMT_RGBA: u8 = 0;
pub const FMT_YUV: u8 = 1;
pub const FMT_CI: u8 = 2;
pub const FMT_IA: u8 = 3;
pub const FMT_I: u8 = 4;

/// Texel size codes (bits 20-19): 4, 8, 16, 32 bits per texel.
pub const SIZE_4B: u8 = 0;
pub const SIZE_8B: u8 = 1;
pub const SIZE_16B: u8 = 2;
pub const SIZE_32B: u8 = 3;

/// Bits per texel for a size code.
pub fn bits_per_texel(size: u8) -> u32 {
    4u32 << (size & 3)
}

/// One of the 8 hardware tile descriptors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileDescriptor {
    // Addressing fields, written by SETTILE
    pub format: u8,
    pub size: u8,
    /// Row stride in 64-bit TMEM words
    pub line: u16,
    /// TMEM base in 64-bit words
    pub tmem_addr: u16,
    /// Palette bank for 4-bit color-index textures
    pub palette: u8,
    pub clamp_s: bool,
    pub mirror_s: bool,
    pub mask_s: u8,
    pub shift_s: u8,
    pub clamp_t: bool,
    pub mirror_t: bool,
    pub mask_t: u8,
    pub shift_t: u8,

    // Source rectangle, written by SETTILESIZE (10.2 fixed point)
    pub uls: u16,
    pub ult: u16,
    pub lrs: u16,
    pub lrt: u16,
}

/// The 8-entry tile table.
#[derive(Debug, Clone, Default)]
pub struct TileTable {
    tiles: [TileDescriptor; 8],
}

impl TileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> &TileDescriptor {
        &self.tiles[index & 7]
    }

    /// Apply a SETTILE command word pair: merge addressing fields into the
    /// selected descriptor, preserving the source rectangle.
    pub fn set_tile(&mut self, w0: u32, w1: u32) {
        let index = ((w1 >> 24) & 0x07) as usize;
        let tile = &mut self.tiles[index];

        tile.format = ((w0 >> 21) & 0x07) as u8;
        tile.size = ((w0 >> 19) & 0x03) as u8;
        tile.line = ((w0 >> 9) & 0x1FF) as u16;
        tile.tmem_addr = (w0 & 0x1FF) as u16;

        tile.palette = ((w1 >> 20) & 0x0F) as u8;
        tile.clamp_t = (w1 >> 19) & 1 != 0;
        tile.mirror_t = (w1 >> 18) & 1 != 0;
        tile.mask_t = ((w1 >> 14) & 0x0F) as u8;
        tile.shift_t = ((w1 >> 10) & 0x0F) as u8;
        tile.clamp_s = (w1 >> 9) & 1 != 0;
        tile.mirror_s = (w1 >> 8) & 1 != 0;
        tile.mask_s = ((w1 >> 4) & 0x0F) as u8;
        tile.shift_s = (w1 & 0x0F) as u8;
    }

    /// Apply a SETTILESIZE command word pair: overwrite only the source
    /// rectangle.
    pub fn set_tile_size(&mut self, w0: u32, w1: u32) {
        let index = ((w1 >> 24) & 0x07) as usize;
        let tile = &mut self.tiles[index];

        tile.uls = ((w0 >> 12) & 0xFFF) as u16;
        tile.ult = (w0 & 0xFFF) as u16;
        tile.lrs = ((w1 >> 12) & 0xFFF) as u16;
        tile.lrt = (w1 & 0xFFF) as u16;
    }
}

impl TileDescriptor {
    /// Width/height implied by the source rectangle (10.2 → texels).
    pub fn rect_size(&self) -> (u32, u32) {
        let w = (self.lrs as u32 >> 2).wrapping_sub(self.uls as u32 >> 2) + 1;
        let h = (self.lrt as u32 >> 2).wrapping_sub(self.ult as u32 >> 2) + 1;
        (w, h)
    }

    /// Maximum texels this tile's format can keep resident in TMEM.
    /// Color-index textures only use the lower 2KB (the upper half holds
    /// the TLUT).
    fn texel_budget(&self) -> u32 {
        let bytes = if self.format == FMT_CI { 2048 } else { 4096 };
        bytes * 8 / bits_per_texel(self.size)
    }

    /// Resolve the effective texture dimensions.
    ///
    /// Hardware infers texture size three different ways and real assets
    /// rely on each of them, in this priority order:
    /// 1. mask bits: a nonzero mask gives a power-of-two dimension
    ///    (1 << mask) per axis, used when the masked area fits the budget;
    /// 2. the declared source rectangle, when its area fits the budget —
    ///    a 1x1 rectangle is indistinguishable from a never-sized tile
    ///    and falls through;
    /// 3. the line stride: width from bytes-per-row, height from whatever
    ///    budget remains.
    pub fn calc_texture_size(&self) -> (u32, u32) {
        let budget = self.texel_budget();
        let (rect_w, rect_h) = self.rect_size();

        if self.mask_s != 0 || self.mask_t != 0 {
            let w = if self.mask_s != 0 {
                1u32 << self.mask_s.min(10)
            } else {
                rect_w
            };
            let h = if self.mask_t != 0 {
                1u32 << self.mask_t.min(10)
            } else {
                rect_h
            };
            if w * h <= budget {
                return (w, h);
            }
        }

        if (rect_w > 1 || rect_h > 1) && rect_w * rect_h <= budget {
            return (rect_w, rect_h);
        }

        let row_bytes = self.line as u32 * 8;
        let w = (row_bytes * 8 / bits_per_texel(self.size)).max(1);
        let h = (budget / w).max(1);
        (w, h)
    }
}
