//! Draw-batch assembly.
//!
//! Triangles accumulate into a flat vertex stream; a batch is a
//! contiguous run of that stream drawn under one snapshot of shading
//! state. The interpreter flushes the pending run whenever a command is
//! about to change state that affects rendering, so every batch is
//! self-contained: the renderer can draw batches in order with no command
//! replay.

use serde::Serialize;

use crate::combine::CombineMode;
use crate::mode::{GeometryMode, OtherMode};

/// Vertex slots addressable by triangle commands.
pub const SCRATCH_SIZE: usize = 32;

/// A transformed, renderer-ready vertex. Positions are model-space after
/// the matrix stack; UVs are in texels (the binding's scale still
/// applies); colors are normalized RGBA.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OutVertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// One texture unit's binding for a batch: a handle into the session's
/// decoded-texture list plus the sampling state the shader needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextureBinding {
    /// Index into [`DisplayListResult::textures`](crate::DisplayListResult).
    pub texture: usize,
    pub width: u32,
    pub height: u32,
    pub clamp_s: bool,
    pub mirror_s: bool,
    pub mask_s: u8,
    pub clamp_t: bool,
    pub mirror_t: bool,
    pub mask_t: u8,
    /// Tile origin in texels; vertex UVs are relative to it.
    pub uls: f32,
    pub ult: f32,
    /// Per-axis UV scale from the TEXTURE command (0.16 fraction).
    pub scale_s: f32,
    pub scale_t: f32,
}

/// Shading state captured into a batch at flush time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShadingState {
    pub combine: CombineMode,
    pub geometry_mode: GeometryMode,
    pub other_mode: OtherMode,
    pub prim_color: [f32; 4],
    pub env_color: [f32; 4],
    pub textures: [Option<TextureBinding>; 2],
}

/// A contiguous vertex range drawn under one shading state.
#[derive(Debug, Clone, Serialize)]
pub struct DrawBatch {
    /// First vertex in the shared stream; the range is triangles, so
    /// `vertex_count` is always a multiple of 3.
    pub vertex_start: usize,
    pub vertex_count: usize,
    pub combine: CombineMode,
    pub geometry_mode: GeometryMode,
    pub other_mode: OtherMode,
    pub prim_color: [f32; 4],
    pub env_color: [f32; 4],
    pub textures: [Option<TextureBinding>; 2],
}

/// Accumulates triangles and cuts batches at state-change boundaries.
#[derive(Debug, Default)]
pub struct BatchBuilder {
    vertices: Vec<OutVertex>,
    batches: Vec<DrawBatch>,
    flushed: usize,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_triangle(&mut self, corners: [OutVertex; 3]) {
        self.vertices.extend_from_slice(&corners);
    }

    /// Vertices accumulated since the last flush.
    pub fn pending(&self) -> usize {
        self.vertices.len() - self.flushed
    }

    /// Close the pending vertex range into a batch under `state`. A flush
    /// with nothing pending is a no-op, so callers flush unconditionally
    /// before every state change.
    pub fn flush(&mut self, state: &ShadingState) {
        let pending = self.pending();
        if pending == 0 {
            return;
        }
        self.batches.push(DrawBatch {
            vertex_start: self.flushed,
            vertex_count: pending,
            combine: state.combine,
            geometry_mode: state.geometry_mode,
            other_mode: state.other_mode,
            prim_color: state.prim_color,
            env_color: state.env_color,
            textures: state.textures,
        });
        self.flushed = self.vertices.len();
    }

    /// Tear down into the final vertex stream and batch list. Unflushed
    /// triangles are dropped; the interpreter always flushes before
    /// finishing.
    pub fn finish(self) -> (Vec<OutVertex>, Vec<DrawBatch>) {
        (self.vertices, self.batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> OutVertex {
        OutVertex {
            pos: [x, 0.0, 0.0],
            ..Default::default()
        }
    }

    fn tri(x: f32) -> [OutVertex; 3] {
        [vertex(x), vertex(x + 1.0), vertex(x + 2.0)]
    }

    #[test]
    fn test_flush_covers_range_since_last_flush() {
        let mut builder = BatchBuilder::new();
        let state = ShadingState::default();

        builder.push_triangle(tri(0.0));
        builder.push_triangle(tri(3.0));
        builder.flush(&state);
        builder.push_triangle(tri(6.0));
        builder.flush(&state);

        let (vertices, batches) = builder.finish();
        assert_eq!(vertices.len(), 9);
        assert_eq!(batches.len(), 2);
        assert_eq!((batches[0].vertex_start, batches[0].vertex_count), (0, 6));
        assert_eq!((batches[1].vertex_start, batches[1].vertex_count), (6, 3));
    }

    #[test]
    fn test_empty_flush_emits_nothing() {
        let mut builder = BatchBuilder::new();
        let state = ShadingState::default();
        builder.flush(&state);
        builder.flush(&state);
        let (vertices, batches) = builder.finish();
        assert!(vertices.is_empty());
        assert!(batches.is_empty());
    }

    #[test]
    fn test_batch_captures_state_at_flush() {
        let mut builder = BatchBuilder::new();
        builder.push_triangle(tri(0.0));

        let state = ShadingState {
            prim_color: [1.0, 0.5, 0.25, 1.0],
            ..Default::default()
        };
        builder.flush(&state);

        let (_, batches) = builder.finish();
        assert_eq!(batches[0].prim_color, [1.0, 0.5, 0.25, 1.0]);
    }
}
