//! N64 display-list interpretation for the model viewer.
//!
//! This crate turns F3DEX2 display lists, as found in ROM data mapped
//! into segment banks, into flat draw batches: transformed vertices,
//! decoded RGBA8 textures, and captured shading state. It performs no
//! rendering itself; the output is renderer-agnostic.
//!
//! The pipeline mirrors the hardware's split: the RSP side (segments,
//! matrices, vertices) lives in [`segment`], [`matrix`] and the
//! interpreter's scratch buffer, while the RDP side (TMEM, tiles, texel
//! decoding, the color combiner) lives in [`tmem`], [`tile`], [`decode`]
//! and [`combine`].

pub mod batch;
pub mod combine;
pub mod decode;
pub mod interpreter;
pub mod matrix;
pub mod mode;
pub mod segment;
pub mod texture;
pub mod tile;
pub mod tmem;

pub use batch::{DrawBatch, OutVertex, TextureBinding};
pub use combine::CombineMode;
pub use interpreter::{interpret, DisplayListResult, InterpretError, Interpreter};
pub use segment::SegmentTable;
