//! Versereel Render Engine
//!
//! Turns a selection's render state into a vertical video clip.
//!
//! # Pipeline
//!
//! ```text
//! RenderState ── layout ── FrameRenderer ── frame_%05d.png ──┐
//!                                                            ├── encode (H.264)
//! reader audio ── download ── trim (window) ─────────────────┤
//!                                                            └── mux ── clip.mp4
//! ```

pub mod color;
pub mod compositor;
pub mod export;
pub mod ffmpeg;
pub mod shaping;
pub mod text;

pub use color::parse_color;
pub use compositor::{FrameGeometry, FrameLayout, FrameRenderer, PlacedText};
pub use export::*;
pub use ffmpeg::FfmpegBackend;
pub use text::{FontFace, FontPainter, GlyphPainter};
