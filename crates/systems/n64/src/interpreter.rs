//! F3DEX2 display-list interpretation.
//!
//! Commands are 8-byte big-endian word pairs; the high byte of the first
//! word selects the operation. Interpretation walks a list once, applying
//! matrix and texture state as it goes, and emits renderer-ready draw
//! batches. Geometry is transformed at vertex-load time, so batches carry
//! no matrices.
//!
//! Bad addresses are a fact of life in ripped assets: an unresolvable
//! list or vertex pointer stops the affected list quietly rather than
//! failing the whole interpretation. Matrix-stack underflow is the one
//! hard error, because it means the traversal itself has gone wrong and
//! everything after it would be garbage.

use serde::Serialize;
use thiserror::Error;

use viewer_core::logging::{log, LogCategory, LogLevel};
use viewer_core::types::Texture;

use crate::batch::{
    BatchBuilder, DrawBatch, OutVertex, ShadingState, TextureBinding, SCRATCH_SIZE,
};
use crate::combine::{mux_name, CombineMode};
use crate::decode::Palette;
use crate::matrix::{self, Matrix};
use crate::mode::{GeometryMode, OtherMode};
use crate::segment::{read_i16, read_u16, read_u32, read_u8, SegmentTable};
use crate::texture::TextureCache;
use crate::tile::{bits_per_texel, TileTable, SIZE_16B};
use crate::tmem::Tmem;

// F3DEX2 opcodes (high byte of the first command word).
const G_NOOP: u8 = 0x00;
const G_VTX: u8 = 0x01;
const G_TRI1: u8 = 0x05;
const G_TRI2: u8 = 0x06;
const G_TEXTURE: u8 = 0xD7;
const G_POPMTX: u8 = 0xD8;
const G_GEOMETRYMODE: u8 = 0xD9;
const G_MTX: u8 = 0xDA;
const G_DL: u8 = 0xDE;
const G_ENDDL: u8 = 0xDF;
const G_SETOTHERMODE_L: u8 = 0xE2;
const G_SETOTHERMODE_H: u8 = 0xE3;
const G_LOADTLUT: u8 = 0xF0;
const G_SETTILESIZE: u8 = 0xF2;
const G_LOADBLOCK: u8 = 0xF3;
const G_LOADTILE: u8 = 0xF4;
const G_SETTILE: u8 = 0xF5;
const G_SETPRIMCOLOR: u8 = 0xFA;
const G_SETENVCOLOR: u8 = 0xFB;
const G_SETCOMBINE: u8 = 0xFC;
const G_SETTIMG: u8 = 0xFD;

// G_MTX parameter bits. The microcode stores the push bit inverted in the
// command word; [`Interpreter::op_mtx`] undoes that.
pub const MTX_PUSH: u8 = 0x01;
pub const MTX_LOAD: u8 = 0x02;
pub const MTX_PROJECTION: u8 = 0x04;

/// Sub-list nesting cap. Real assets nest two or three deep; the cap
/// exists so cyclic lists terminate.
const MAX_DL_DEPTH: usize = 32;

/// Diagnostic name for an opcode, covering both the implemented set and
/// the common rasterizer commands the viewer deliberately skips.
pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        G_NOOP => "NOOP",
        G_VTX => "VTX",
        0x02 => "MODIFYVTX",
        0x03 => "CULLDL",
        0x04 => "BRANCH_Z",
        G_TRI1 => "TRI1",
        G_TRI2 => "TRI2",
        0x07 => "QUAD",
        G_TEXTURE => "TEXTURE",
        G_POPMTX => "POPMTX",
        G_GEOMETRYMODE => "GEOMETRYMODE",
        G_MTX => "MTX",
        0xDB => "MOVEWORD",
        0xDC => "MOVEMEM",
        G_DL => "DL",
        G_ENDDL => "ENDDL",
        G_SETOTHERMODE_L => "SETOTHERMODE_L",
        G_SETOTHERMODE_H => "SETOTHERMODE_H",
        0xE4 => "TEXRECT",
        0xE5 => "TEXRECTFLIP",
        0xE6 => "RDPLOADSYNC",
        0xE7 => "RDPPIPESYNC",
        0xE8 => "RDPTILESYNC",
        0xE9 => "RDPFULLSYNC",
        0xED => "SETSCISSOR",
        G_LOADTLUT => "LOADTLUT",
        G_SETTILESIZE => "SETTILESIZE",
        G_LOADBLOCK => "LOADBLOCK",
        G_LOADTILE => "LOADTILE",
        G_SETTILE => "SETTILE",
        0xF6 => "FILLRECT",
        0xF7 => "SETFILLCOLOR",
        0xF8 => "SETFOGCOLOR",
        0xF9 => "SETBLENDCOLOR",
        G_SETPRIMCOLOR => "SETPRIMCOLOR",
        G_SETENVCOLOR => "SETENVCOLOR",
        G_SETCOMBINE => "SETCOMBINE",
        G_SETTIMG => "SETTIMG",
        0xFE => "SETZIMG",
        0xFF => "SETCIMG",
        _ => "UNKNOWN",
    }
}

/// Hard interpretation failures. Everything else degrades in place.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretError {
    #[error("matrix stack underflow in POPMTX at {addr:#010X}")]
    MatrixStackUnderflow { addr: u32 },
}

/// Everything the renderer needs from one interpretation pass.
#[derive(Debug, Default, Serialize)]
pub struct DisplayListResult {
    /// Flat triangle-list vertex stream shared by all batches.
    pub vertices: Vec<OutVertex>,
    pub batches: Vec<DrawBatch>,
    /// Decoded RGBA8 textures; batches reference them by index.
    pub textures: Vec<Texture>,
    /// Commands whose opcodes the interpreter does not implement.
    pub skipped_opcodes: u64,
}

impl DisplayListResult {
    /// JSON digest for the viewer's asset-inspection panel.
    pub fn debug_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "vertices": self.vertices.len(),
            "triangles": self.vertices.len() / 3,
            "textures": self.textures.len(),
            "skipped_opcodes": self.skipped_opcodes,
            "batches": self.batches.iter().map(|batch| {
                serde_json::json!({
                    "vertex_start": batch.vertex_start,
                    "vertex_count": batch.vertex_count,
                    "textured": batch.textures[0].is_some(),
                    "two_texture": batch.textures[1].is_some(),
                    "cycle0_color": batch.combine.cycle0.color
                        .iter()
                        .map(|&code| mux_name(code))
                        .collect::<Vec<_>>(),
                })
            }).collect::<Vec<_>>(),
        })
    }
}

/// Interpret the display list at `addr` against the given segment map.
pub fn interpret(
    segments: &SegmentTable,
    addr: u32,
) -> Result<DisplayListResult, InterpretError> {
    let mut interp = Interpreter::new(segments);
    interp.run(addr, 0)?;
    interp.flush_batch();
    Ok(interp.finish())
}

/// One interpretation pass's mutable state.
pub struct Interpreter<'a> {
    segments: &'a SegmentTable,

    // Texture pipeline
    tmem: Tmem,
    tiles: TileTable,
    palette: Option<Palette>,
    cache: TextureCache,
    /// Staged DRAM image for the next load command (SETTIMG).
    timg_addr: u32,
    timg_size: u8,
    timg_width: u32,
    texture_on: bool,
    texture_tile: u8,
    texture_scale: [f32; 2],

    // Geometry pipeline
    scratch: [OutVertex; SCRATCH_SIZE],
    matrix: Matrix,
    matrix_stack: Vec<Matrix>,

    // Shading state
    geometry_mode: GeometryMode,
    other_mode: OtherMode,
    combine: CombineMode,
    prim_color: [f32; 4],
    env_color: [f32; 4],

    builder: BatchBuilder,
    skipped_opcodes: u64,
}

impl<'a> Interpreter<'a> {
    pub fn new(segments: &'a SegmentTable) -> Self {
        Self {
            segments,
            tmem: Tmem::new(),
            tiles: TileTable::new(),
            palette: None,
            cache: TextureCache::new(),
            timg_addr: 0,
            timg_size: SIZE_16B,
            timg_width: 1,
            texture_on: false,
            texture_tile: 0,
            texture_scale: [1.0, 1.0],
            scratch: [OutVertex::default(); SCRATCH_SIZE],
            matrix: matrix::identity(),
            matrix_stack: Vec::new(),
            geometry_mode: GeometryMode::default(),
            other_mode: OtherMode::default(),
            combine: CombineMode::default(),
            prim_color: [1.0; 4],
            env_color: [1.0; 4],
            builder: BatchBuilder::new(),
            skipped_opcodes: 0,
        }
    }

    /// Walk one display list. Recursion happens through G_DL.
    pub fn run(&mut self, addr: u32, depth: usize) -> Result<(), InterpretError> {
        if depth > MAX_DL_DEPTH {
            log(LogCategory::DisplayList, LogLevel::Warn, || {
                format!("sub-list nesting exceeded {MAX_DL_DEPTH} at {addr:#010X}, stopping")
            });
            return Ok(());
        }
        let segments = self.segments;
        let Some((data, base)) = segments.resolve(addr) else {
            log(LogCategory::DisplayList, LogLevel::Debug, || {
                format!("display list address {addr:#010X} did not resolve")
            });
            return Ok(());
        };

        let mut pc = base;
        while pc + 8 <= data.len() {
            let w0 = read_u32(data, pc);
            let w1 = read_u32(data, pc + 4);
            let cmd_addr = (addr & 0xFF00_0000) | (pc as u32 & 0x00FF_FFFF);
            pc += 8;

            match (w0 >> 24) as u8 {
                G_NOOP => {}

                G_VTX => self.op_vtx(w0, w1),
                G_TRI1 => self.triangle(w0),
                G_TRI2 => {
                    self.triangle(w0);
                    self.triangle(w1);
                }

                // Matrix ops never flush: positions are baked into the
                // scratch vertices at VTX time, so pending triangles are
                // unaffected by later matrix changes.
                G_MTX => self.op_mtx(w0, w1),
                G_POPMTX => self.op_popmtx(w1, cmd_addr)?,

                G_DL => {
                    // Push flag zero means call-and-return; otherwise the
                    // jump replaces the rest of this list.
                    if (w0 >> 16) & 0xFF == 0 {
                        self.run(w1, depth + 1)?;
                    } else {
                        return self.run(w1, depth + 1);
                    }
                }
                G_ENDDL => return Ok(()),

                G_GEOMETRYMODE => {
                    self.flush_batch();
                    self.geometry_mode.update(w0, w1);
                }
                G_SETOTHERMODE_L => {
                    self.flush_batch();
                    self.other_mode.set_lo(w0, w1);
                }
                G_SETOTHERMODE_H => {
                    self.flush_batch();
                    self.other_mode.set_hi(w0, w1);
                }
                G_SETCOMBINE => {
                    self.flush_batch();
                    self.combine = CombineMode::from_words(w0, w1);
                }
                G_SETPRIMCOLOR => {
                    self.flush_batch();
                    self.prim_color = unpack_color(w1);
                }
                G_SETENVCOLOR => {
                    self.flush_batch();
                    self.env_color = unpack_color(w1);
                }

                G_TEXTURE => {
                    self.flush_batch();
                    self.texture_tile = ((w0 >> 8) & 0x07) as u8;
                    self.texture_on = (w0 >> 1) & 0x7F != 0;
                    self.texture_scale = [
                        ((w1 >> 16) & 0xFFFF) as f32 / 65536.0,
                        (w1 & 0xFFFF) as f32 / 65536.0,
                    ];
                }
                G_SETTIMG => {
                    self.timg_addr = w1;
                    self.timg_size = ((w0 >> 19) & 0x03) as u8;
                    self.timg_width = (w0 & 0xFFF) + 1;
                }
                G_SETTILE => {
                    self.flush_batch();
                    self.tiles.set_tile(w0, w1);
                }
                G_SETTILESIZE => {
                    self.flush_batch();
                    self.tiles.set_tile_size(w0, w1);
                }
                G_LOADBLOCK => {
                    self.flush_batch();
                    self.op_loadblock(w0, w1);
                }
                G_LOADTILE => {
                    self.flush_batch();
                    self.op_loadtile(w0, w1);
                }
                G_LOADTLUT => {
                    self.flush_batch();
                    self.op_loadtlut(w1);
                }

                opcode => {
                    self.skipped_opcodes += 1;
                    log(LogCategory::Stubs, LogLevel::Debug, || {
                        format!(
                            "skipping {} ({opcode:#04X}) at {cmd_addr:#010X}",
                            opcode_name(opcode)
                        )
                    });
                }
            }
        }
        log(LogCategory::DisplayList, LogLevel::Debug, || {
            format!("display list at {addr:#010X} ran past its buffer")
        });
        Ok(())
    }

    /// Load and transform vertices into the scratch buffer.
    ///
    /// The command encodes the slot *past* the last vertex; the starting
    /// slot is that minus the count.
    fn op_vtx(&mut self, w0: u32, w1: u32) {
        let count = ((w0 >> 12) & 0xFF) as usize;
        let end = ((w0 >> 1) & 0x7F) as usize;
        let Some(start) = end.checked_sub(count) else {
            log(LogCategory::DisplayList, LogLevel::Warn, || {
                format!("VTX with count {count} > end slot {end}")
            });
            return;
        };
        let Some((data, base)) = self.segments.resolve(w1) else {
            log(LogCategory::Memory, LogLevel::Debug, || {
                format!("vertex buffer {w1:#010X} did not resolve")
            });
            return;
        };

        for i in 0..count {
            let slot = start + i;
            if slot >= SCRATCH_SIZE {
                break;
            }
            let rec = base + i * 16;
            let x = read_i16(data, rec) as f32;
            let y = read_i16(data, rec + 2) as f32;
            let z = read_i16(data, rec + 4) as f32;
            // UVs are s10.5 texel coordinates.
            let u = read_i16(data, rec + 8) as f32 / 32.0;
            let v = read_i16(data, rec + 10) as f32 / 32.0;
            self.scratch[slot] = OutVertex {
                pos: matrix::transform_point(&self.matrix, x, y, z),
                uv: [u, v],
                color: [
                    read_u8(data, rec + 12) as f32 / 255.0,
                    read_u8(data, rec + 13) as f32 / 255.0,
                    read_u8(data, rec + 14) as f32 / 255.0,
                    read_u8(data, rec + 15) as f32 / 255.0,
                ],
            };
        }
    }

    /// Emit one triangle from a packed index word (indices are
    /// pre-doubled in the command encoding).
    fn triangle(&mut self, word: u32) {
        let a = (((word >> 16) & 0xFF) >> 1) as usize;
        let b = (((word >> 8) & 0xFF) >> 1) as usize;
        let c = ((word & 0xFF) >> 1) as usize;
        if a >= SCRATCH_SIZE || b >= SCRATCH_SIZE || c >= SCRATCH_SIZE {
            log(LogCategory::DisplayList, LogLevel::Warn, || {
                format!("triangle indices ({a}, {b}, {c}) out of range")
            });
            return;
        }
        self.builder
            .push_triangle([self.scratch[a], self.scratch[b], self.scratch[c]]);
    }

    fn op_mtx(&mut self, w0: u32, w1: u32) {
        // The push bit is stored inverted in the command word.
        let params = (w0 & 0xFF) as u8 ^ MTX_PUSH;
        if params & MTX_PROJECTION != 0 {
            // The viewer supplies its own camera.
            log(LogCategory::DisplayList, LogLevel::Trace, || {
                "ignoring projection matrix".to_string()
            });
            return;
        }
        let Some((data, base)) = self.segments.resolve(w1) else {
            log(LogCategory::Memory, LogLevel::Debug, || {
                format!("matrix address {w1:#010X} did not resolve")
            });
            return;
        };
        let m = matrix::from_fixed(data, base);
        if params & MTX_PUSH != 0 {
            self.matrix_stack.push(self.matrix);
        }
        self.matrix = if params & MTX_LOAD != 0 {
            m
        } else {
            matrix::multiply(&m, &self.matrix)
        };
    }

    // The stack is shared across sub-list calls, so a pop here can undo a
    // push made by the caller. Ripped assets do this and render fine;
    // whether real hardware intends it is unvalidated against traces.
    fn op_popmtx(&mut self, w1: u32, addr: u32) -> Result<(), InterpretError> {
        // w1 counts bytes of matrices, 64 per entry.
        let count = (w1 as usize / 64).max(1);
        for _ in 0..count {
            self.matrix = self
                .matrix_stack
                .pop()
                .ok_or(InterpretError::MatrixStackUnderflow { addr })?;
        }
        Ok(())
    }

    /// Contiguous DMA into TMEM. The source starts `ult` rows of the
    /// staged image (at its declared width) plus `uls` texels in; the
    /// byte count comes from the command's texel count and the load
    /// tile's size-class. The dxt deinterleave factor is ignored;
    /// decoders read TMEM linearly.
    fn op_loadblock(&mut self, w0: u32, w1: u32) {
        let tile = *self.tiles.get(((w1 >> 24) & 0x07) as usize);
        let uls = (((w0 >> 12) & 0xFFF) >> 2) as usize;
        let ult = ((w0 & 0xFFF) >> 2) as usize;
        let texels = ((w1 >> 12) & 0xFFF) as usize + 1;
        let bpt = bits_per_texel(tile.size) as usize;
        let bytes = texels * bpt / 8;

        let Some((data, base)) = self.segments.resolve(self.timg_addr) else {
            log(LogCategory::Memory, LogLevel::Debug, || {
                format!("LOADBLOCK image {:#010X} did not resolve", self.timg_addr)
            });
            return;
        };
        let src = base + (ult * self.timg_width as usize + uls) * bpt / 8;
        let end = (src + bytes).min(data.len());
        if src >= end {
            return;
        }
        self.tmem.load(tile.tmem_addr as usize * 8, &data[src..end]);
        log(LogCategory::Texture, LogLevel::Trace, || {
            format!("LOADBLOCK {} texels -> tmem {:#05X}", texels, tile.tmem_addr as usize * 8)
        });
    }

    /// Rectangular load: copies a sub-rectangle of the staged image row
    /// by row, honoring both the image's row stride and the tile's TMEM
    /// line stride.
    fn op_loadtile(&mut self, w0: u32, w1: u32) {
        let tile = *self.tiles.get(((w1 >> 24) & 0x07) as usize);
        let uls = (((w0 >> 12) & 0xFFF) >> 2) as usize;
        let ult = ((w0 & 0xFFF) >> 2) as usize;
        let lrs = (((w1 >> 12) & 0xFFF) >> 2) as usize;
        let lrt = ((w1 & 0xFFF) >> 2) as usize;
        if lrs < uls || lrt < ult {
            return;
        }
        let width = lrs - uls + 1;
        let height = lrt - ult + 1;
        let bpt = bits_per_texel(self.timg_size) as usize;
        let row_bytes = width * bpt / 8;
        let src_stride = self.timg_width as usize * bpt / 8;
        let dst = tile.tmem_addr as usize * 8;
        let dst_stride = (tile.line as usize * 8).max(row_bytes);

        let Some((data, base)) = self.segments.resolve(self.timg_addr) else {
            log(LogCategory::Memory, LogLevel::Debug, || {
                format!("LOADTILE image {:#010X} did not resolve", self.timg_addr)
            });
            return;
        };
        for y in 0..height {
            let src_row = base + (ult + y) * src_stride + uls * bpt / 8;
            for i in 0..row_bytes {
                self.tmem
                    .write(dst + y * dst_stride + i, read_u8(data, src_row + i));
            }
        }
    }

    /// Replace the active palette from the staged image. The palette is
    /// swapped whole; no partial merges.
    fn op_loadtlut(&mut self, w1: u32) {
        let count = (((w1 >> 14) & 0x3FF) as usize + 1).min(256);
        let Some((data, base)) = self.segments.resolve(self.timg_addr) else {
            log(LogCategory::Memory, LogLevel::Debug, || {
                format!("LOADTLUT image {:#010X} did not resolve", self.timg_addr)
            });
            return;
        };
        let raw: Vec<u16> = (0..count).map(|i| read_u16(data, base + i * 2)).collect();
        self.palette = Some(Palette::from_rgba16(&raw));
    }

    /// Close the pending triangle run into a batch under the current
    /// shading state. Texture decode happens here, so TMEM is sampled
    /// exactly as the pending triangles saw it.
    pub fn flush_batch(&mut self) {
        if self.builder.pending() == 0 {
            return;
        }
        let textures = self.current_bindings();
        let state = ShadingState {
            combine: self.combine,
            geometry_mode: self.geometry_mode,
            other_mode: self.other_mode,
            prim_color: self.prim_color,
            env_color: self.env_color,
            textures,
        };
        self.builder.flush(&state);
        log(LogCategory::Batch, LogLevel::Trace, || {
            "batch flushed".to_string()
        });
    }

    fn current_bindings(&mut self) -> [Option<TextureBinding>; 2] {
        if !self.texture_on {
            return [None, None];
        }
        let first = self.binding_for(self.texture_tile);
        let second = if self.combine.uses_texel1() {
            self.binding_for(self.texture_tile.wrapping_add(1) & 7)
        } else {
            None
        };
        [first, second]
    }

    fn binding_for(&mut self, index: u8) -> Option<TextureBinding> {
        let tile = *self.tiles.get(index as usize);
        let (width, height) = tile.calc_texture_size();
        let handle = self
            .cache
            .get_or_decode(&self.tmem, &tile, self.palette.as_ref())?;
        Some(TextureBinding {
            texture: handle,
            width,
            height,
            clamp_s: tile.clamp_s,
            mirror_s: tile.mirror_s,
            mask_s: tile.mask_s,
            clamp_t: tile.clamp_t,
            mirror_t: tile.mirror_t,
            mask_t: tile.mask_t,
            uls: tile.uls as f32 / 4.0,
            ult: tile.ult as f32 / 4.0,
            scale_s: self.texture_scale[0],
            scale_t: self.texture_scale[1],
        })
    }

    /// Consume the interpreter into the final result.
    pub fn finish(self) -> DisplayListResult {
        let (vertices, batches) = self.builder.finish();
        DisplayListResult {
            vertices,
            batches,
            textures: self.cache.into_textures(),
            skipped_opcodes: self.skipped_opcodes,
        }
    }
}

fn unpack_color(word: u32) -> [f32; 4] {
    [
        ((word >> 24) & 0xFF) as f32 / 255.0,
        ((word >> 16) & 0xFF) as f32 / 255.0,
        ((word >> 8) & 0xFF) as f32 / 255.0,
        (word & 0xFF) as f32 / 255.0,
    ]
}
