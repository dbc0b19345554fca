//! Segmented (bank-relative) memory for display-list data.
//!
//! N64 display lists address data through 16 segment slots: the top byte
//! of a virtual address selects the segment, the low 24 bits are the byte
//! offset into whatever buffer is mapped there. The viewer maps loaded ROM
//! banks into these slots before interpretation; resolution is a pure
//! lookup with no state.
//!
//! Buffers are `Arc<[u8]>` so several interpretation passes can share the
//! same read-only banks across threads.

use std::sync::Arc;

use viewer_core::logging::{log, LogCategory, LogLevel};

/// Number of segment slots supported by the microcode.
pub const NUM_SEGMENTS: usize = 16;

/// Read-only map from segment index to backing buffer.
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    segments: [Option<Arc<[u8]>>; NUM_SEGMENTS],
}

impl SegmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a buffer into a segment slot. Out-of-range indices are ignored.
    pub fn set(&mut self, segment: usize, data: Arc<[u8]>) {
        if segment < NUM_SEGMENTS {
            self.segments[segment] = Some(data);
        }
    }

    pub fn clear(&mut self, segment: usize) {
        if segment < NUM_SEGMENTS {
            self.segments[segment] = None;
        }
    }

    /// Resolve a virtual address to (backing buffer, byte offset).
    ///
    /// Fails when the segment is unmapped or the offset lies past the end
    /// of the mapped buffer. Failure is expected for real assets (dangling
    /// pointers in ROM data) and is the caller's cue to stop the current
    /// list, not an error condition.
    pub fn resolve(&self, addr: u32) -> Option<(&[u8], usize)> {
        let segment = (addr >> 24) as usize & 0x0F;
        let offset = (addr & 0x00FF_FFFF) as usize;
        match self.segments[segment] {
            Some(ref data) if offset < data.len() => Some((data, offset)),
            _ => {
                log(LogCategory::Memory, LogLevel::Debug, || {
                    format!("unresolvable address {:#010X} (segment {})", addr, segment)
                });
                None
            }
        }
    }
}

/// Big-endian reads over a resolved buffer. All reads are bounds-checked
/// and return 0 past the end, matching how the hardware DMA pads reads.
pub fn read_u8(data: &[u8], offset: usize) -> u8 {
    data.get(offset).copied().unwrap_or(0)
}

pub fn read_u16(data: &[u8], offset: usize) -> u16 {
    if offset + 1 < data.len() {
        u16::from_be_bytes([data[offset], data[offset + 1]])
    } else {
        0
    }
}

pub fn read_i16(data: &[u8], offset: usize) -> i16 {
    read_u16(data, offset) as i16
}

pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    if offset + 3 < data.len() {
        u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(segment: usize, bytes: Vec<u8>) -> SegmentTable {
        let mut table = SegmentTable::new();
        table.set(segment, Arc::from(bytes.into_boxed_slice()));
        table
    }

    #[test]
    fn test_resolve_mapped_segment() {
        let table = table_with(2, vec![0xAA; 64]);
        let (data, offset) = table.resolve(0x0200_0010).unwrap();
        assert_eq!(offset, 0x10);
        assert_eq!(data[offset], 0xAA);
    }

    #[test]
    fn test_resolve_unmapped_segment() {
        let table = table_with(2, vec![0; 64]);
        assert!(table.resolve(0x0300_0000).is_none());
    }

    #[test]
    fn test_resolve_out_of_range_offset() {
        let table = table_with(0, vec![0; 8]);
        assert!(table.resolve(0x0000_0008).is_none());
        assert!(table.resolve(0x0000_0007).is_some());
    }

    #[test]
    fn test_segment_clear() {
        let mut table = table_with(1, vec![0; 8]);
        assert!(table.resolve(0x0100_0000).is_some());
        table.clear(1);
        assert!(table.resolve(0x0100_0000).is_none());
    }

    #[test]
    fn test_big_endian_reads() {
        let data = [0x12, 0x34, 0x56, 0x78, 0xFF, 0xFE];
        assert_eq!(read_u8(&data, 0), 0x12);
        assert_eq!(read_u16(&data, 0), 0x1234);
        assert_eq!(read_u32(&data, 0), 0x1234_5678);
        assert_eq!(read_i16(&data, 4), -2);
    }

    #[test]
    fn test_reads_past_end_return_zero() {
        let data = [0xFF; 4];
        assert_eq!(read_u8(&data, 4), 0);
        assert_eq!(read_u16(&data, 3), 0);
        assert_eq!(read_u32(&data, 1), 0);
    }
}
