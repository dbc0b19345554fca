//! Color-combiner configuration capture.
//!
//! The combiner computes `(a - b) * c + d` per pixel, once or twice
//! (1-cycle / 2-cycle), independently for color and alpha. A SETCOMBINE
//! command packs eight operand-selector codes per cycle into the two
//! command words at fixed bit offsets. The viewer only captures those
//! codes — the arithmetic happens in the external shader generator — but
//! the code meanings are part of the contract and must match the
//! hardware mux tables exactly.

use serde::Serialize;

/// Color-mux operand codes shared by the a/b/c/d slots. Codes above a
/// slot's range mean ZERO on hardware; the shader generator applies the
/// per-slot cutoff.
pub mod mux {
    pub const COMBINED: u8 = 0;
    pub const TEXEL0: u8 = 1;
    pub const TEXEL1: u8 = 2;
    pub const PRIMITIVE: u8 = 3;
    pub const SHADE: u8 = 4;
    pub const ENVIRONMENT: u8 = 5;
    /// ONE in the a slot, CENTER in the b slot, SCALE in the c slot.
    pub const ONE: u8 = 6;
    /// NOISE in the a slot, K4 in the b slot, COMBINED_ALPHA in c.
    pub const NOISE: u8 = 7;
    pub const ZERO: u8 = 31;
}

/// Human-readable name for a color-mux code (diagnostics only).
pub fn mux_name(code: u8) -> &'static str {
    match code {
        mux::COMBINED => "COMBINED",
        mux::TEXEL0 => "TEXEL0",
        mux::TEXEL1 => "TEXEL1",
        mux::PRIMITIVE => "PRIMITIVE",
        mux::SHADE => "SHADE",
        mux::ENVIRONMENT => "ENVIRONMENT",
        mux::ONE => "ONE",
        mux::NOISE => "NOISE",
        mux::ZERO => "ZERO",
        _ => "ZERO",
    }
}

/// One combiner stage: `(a - b) * c + d` selector codes for color and
/// alpha.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CombineCycle {
    pub color: [u8; 4],
    pub alpha: [u8; 4],
}

/// Immutable snapshot of a SETCOMBINE command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CombineMode {
    pub cycle0: CombineCycle,
    pub cycle1: CombineCycle,
}

impl CombineMode {
    /// Extract the sixteen selector codes from the command word pair.
    /// Bit layout follows the F3DEX2 gsDPSetCombineLERP encoding.
    pub fn from_words(w0: u32, w1: u32) -> Self {
        Self {
            cycle0: CombineCycle {
                color: [
                    ((w0 >> 20) & 0x0F) as u8,
                    ((w1 >> 28) & 0x0F) as u8,
                    ((w0 >> 15) & 0x1F) as u8,
                    ((w1 >> 15) & 0x07) as u8,
                ],
                alpha: [
                    ((w0 >> 12) & 0x07) as u8,
                    ((w1 >> 12) & 0x07) as u8,
                    ((w0 >> 9) & 0x07) as u8,
                    ((w1 >> 9) & 0x07) as u8,
                ],
            },
            cycle1: CombineCycle {
                color: [
                    ((w0 >> 5) & 0x0F) as u8,
                    ((w1 >> 24) & 0x0F) as u8,
                    (w0 & 0x1F) as u8,
                    ((w1 >> 6) & 0x07) as u8,
                ],
                alpha: [
                    ((w1 >> 21) & 0x07) as u8,
                    ((w1 >> 3) & 0x07) as u8,
                    ((w1 >> 18) & 0x07) as u8,
                    (w1 & 0x07) as u8,
                ],
            },
        }
    }

    /// True when either cycle samples the second texture unit.
    pub fn uses_texel1(&self) -> bool {
        let slots = [
            self.cycle0.color,
            self.cycle1.color,
            self.cycle0.alpha,
            self.cycle1.alpha,
        ];
        slots.iter().flatten().any(|&code| code == mux::TEXEL1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Pack selectors the way gsDPSetCombineLERP does, for round-tripping.
    fn pack(c0: [u32; 4], a0: [u32; 4], c1: [u32; 4], a1: [u32; 4]) -> (u32, u32) {
        let w0 = (0xFC << 24)
            | (c0[0] << 20)
            | (c0[2] << 15)
            | (a0[0] << 12)
            | (a0[2] << 9)
            | (c1[0] << 5)
            | c1[2];
        let w1 = (c0[1] << 28)
            | (c1[1] << 24)
            | (a1[0] << 21)
            | (a1[2] << 18)
            | (c0[3] << 15)
            | (a0[1] << 12)
            | (a0[3] << 9)
            | (c1[3] << 6)
            | (a1[1] << 3)
            | a1[3];
        (w0, w1)
    }

    #[test]
    fn test_selector_extraction_roundtrip() {
        let c0 = [1, 2, 3, 4];
        let a0 = [5, 6, 7, 0];
        let c1 = [8, 9, 10, 5];
        let a1 = [1, 2, 3, 4];
        let (w0, w1) = pack(c0, a0, c1, a1);

        let mode = CombineMode::from_words(w0, w1);
        assert_eq!(mode.cycle0.color, [1, 2, 3, 4]);
        assert_eq!(mode.cycle0.alpha, [5, 6, 7, 0]);
        assert_eq!(mode.cycle1.color, [8, 9, 10, 5]);
        assert_eq!(mode.cycle1.alpha, [1, 2, 3, 4]);
    }

    #[test]
    fn test_modulate_shade_decodes() {
        // Classic (TEXEL0 - 0) * SHADE + 0 on both channels of cycle 0.
        let (w0, w1) = pack(
            [mux::TEXEL0 as u32, 31, mux::SHADE as u32, 7],
            [mux::TEXEL0 as u32, 7, mux::SHADE as u32, 7],
            [mux::COMBINED as u32, 31, 7, 7],
            [mux::COMBINED as u32, 7, 7, 7],
        );
        let mode = CombineMode::from_words(w0, w1);
        assert_eq!(mode.cycle0.color[0], mux::TEXEL0);
        assert_eq!(mode.cycle0.color[2], mux::SHADE);
        assert_eq!(mode.cycle1.color[0], mux::COMBINED);
        assert!(!mode.uses_texel1());
    }

    #[test]
    fn test_uses_texel1() {
        let (w0, w1) = pack(
            [mux::TEXEL1 as u32, 31, mux::SHADE as u32, 7],
            [0, 7, 0, 7],
            [0, 31, 0, 7],
            [0, 7, 0, 7],
        );
        assert!(CombineMode::from_words(w0, w1).uses_texel1());
    }

    #[test]
    fn test_mux_names() {
        assert_eq!(mux_name(mux::TEXEL0), "TEXEL0");
        assert_eq!(mux_name(mux::ENVIRONMENT), "ENVIRONMENT");
        assert_eq!(mux_name(23), "ZERO");
    }
}
