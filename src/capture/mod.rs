//! Raster input/output boundary
//!
//! This module consolidates:
//! - Base image decoding and PNG writing (image.rs)
//! - The inpainting provider boundary (inpaint.rs)

pub mod image;
pub mod inpaint;
