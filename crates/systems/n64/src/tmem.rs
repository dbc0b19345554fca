//! TMEM — the RDP's 4KB on-chip texture memory.
//!
//! Every texture the hardware samples must first be DMA'd into this
//! buffer. Addressing is circular: all offsets are masked to the 4096-byte
//! range, so loads that run past the end wrap to the start instead of
//! faulting. Real display lists rely on this.

/// TMEM size in bytes.
pub const TMEM_SIZE: usize = 4096;

const TMEM_MASK: usize = TMEM_SIZE - 1;

/// The 4KB circular texture memory store.
#[derive(Clone)]
pub struct Tmem {
    bytes: [u8; TMEM_SIZE],
}

impl Tmem {
    pub fn new() -> Self {
        Self {
            bytes: [0; TMEM_SIZE],
        }
    }

    pub fn read(&self, offset: usize) -> u8 {
        self.bytes[offset & TMEM_MASK]
    }

    /// Big-endian 16-bit read, each byte masked independently so the pair
    /// can straddle the wrap point.
    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.read(offset), self.read(offset + 1)])
    }

    pub fn write(&mut self, offset: usize, value: u8) {
        self.bytes[offset & TMEM_MASK] = value;
    }

    /// Copy a source slice into TMEM starting at `offset`, wrapping as
    /// needed. The hardware DMA moves 64-bit words, so the copied length
    /// is rounded up to the next multiple of 8 (zero-padded past the end
    /// of the source).
    pub fn load(&mut self, offset: usize, src: &[u8]) {
        let padded = src.len().div_ceil(8) * 8;
        for i in 0..padded {
            let byte = src.get(i).copied().unwrap_or(0);
            self.write(offset + i, byte);
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.bytes.fill(value);
    }
}

impl Default for Tmem {
    fn default() -> Self {
        Self::new()
    }
}
