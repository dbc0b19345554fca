//! Render-mode state: geometry mode and the two "other mode" words.
//!
//! Both are mutated by partial updates, never whole-word replacement:
//! GEOMETRYMODE carries an AND mask and an OR mask in one command, and
//! SETOTHERMODE_L/H rewrite a bit range described by a shift/length pair.
//! The untouched bits must survive — assets set blend state and depth
//! state through separate commands into the same word.

use serde::Serialize;

/// Geometry-mode flag bits (F3DEX2 positions).
pub const GEOM_ZBUFFER: u32 = 0x0000_0001;
pub const GEOM_SHADE: u32 = 0x0000_0004;
pub const GEOM_CULL_FRONT: u32 = 0x0000_0200;
pub const GEOM_CULL_BACK: u32 = 0x0000_0400;
pub const GEOM_FOG: u32 = 0x0001_0000;
pub const GEOM_LIGHTING: u32 = 0x0002_0000;
pub const GEOM_TEXTURE_GEN: u32 = 0x0004_0000;
pub const GEOM_SHADING_SMOOTH: u32 = 0x0020_0000;

/// Geometry-mode bitmask with the F3DEX2 update rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeometryMode(pub u32);

impl GeometryMode {
    /// Apply a GEOMETRYMODE command: `mode = (mode & w0.low24) | w1`.
    /// The low 24 bits of w0 are the *inverted* clear mask as emitted by
    /// gSPGeometryMode.
    pub fn update(&mut self, w0: u32, w1: u32) {
        self.0 = (self.0 & (w0 & 0x00FF_FFFF)) | w1;
    }

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag != 0
    }
}

/// Cycle type from the other-mode high word (bits 20-21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleType {
    OneCycle,
    TwoCycle,
    Copy,
    Fill,
}

/// The RDP "other mode" low/high words with masked-merge updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OtherMode {
    pub hi: u32,
    pub lo: u32,
}

impl OtherMode {
    /// Masked merge used by both SETOTHERMODE halves. The command encodes
    /// `shift = 32 - sft - len` and a bit count; only the described range
    /// changes. Malformed words can claim a range running past bit 31;
    /// the out-of-range part is clamped off rather than faulting.
    fn merge(word: u32, w0: u32, bits: u32) -> u32 {
        let len = (w0 & 0xFF) + 1;
        let sft = (w0 >> 8) & 0xFF;
        if sft >= 32 {
            return word;
        }
        let len = len.min(32 - sft);
        let shift = 32 - sft - len;
        let mask = if len >= 32 {
            u32::MAX
        } else {
            ((1u32 << len) - 1) << shift
        };
        (word & !mask) | (bits & mask)
    }

    /// SETOTHERMODE_L: blend/alpha/depth state in the low word.
    pub fn set_lo(&mut self, w0: u32, w1: u32) {
        self.lo = Self::merge(self.lo, w0, w1);
    }

    /// SETOTHERMODE_H: cycle type, texture filters etc. in the high word.
    pub fn set_hi(&mut self, w0: u32, w1: u32) {
        self.hi = Self::merge(self.hi, w0, w1);
    }

    pub fn cycle_type(&self) -> CycleType {
        match (self.hi >> 20) & 3 {
            0 => CycleType::OneCycle,
            1 => CycleType::TwoCycle,
            2 => CycleType::Copy,
            _ => CycleType::Fill,
        }
    }

    /// Alpha-compare mode (low word bits 0-1): 0 = none.
    pub fn alpha_compare(&self) -> u32 {
        self.lo & 3
    }

    /// Depth test enabled (Z_CMP, low word bit 4).
    pub fn depth_test(&self) -> bool {
        self.lo & 0x10 != 0
    }

    /// Depth write enabled (Z_UPD, low word bit 5).
    pub fn depth_write(&self) -> bool {
        self.lo & 0x20 != 0
    }

    /// Force-blend bit (low word bit 14).
    pub fn force_blend(&self) -> bool {
        self.lo & 0x4000 != 0
    }
}
