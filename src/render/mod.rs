//! Scene rendering module
//!
//! This module contains:
//! - Geometry calculations shared by the item painters
//! - Item and scene painting using tiny-skia
//! - Text rasterization using ab_glyph

pub mod geometry;
pub mod image;
pub mod text;

pub use self::image::{RenderOptions, render_scene};
pub use text::FontBook;
