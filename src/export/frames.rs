//! Frame snapshots and per-frame rendering shared by all export modes

use std::sync::Arc;

use image::RgbaImage;
use image::imageops::{self, FilterType};

use super::before_after::{BeforeAfterLayers, LayerImage};
use crate::domain::Item;
use crate::render::geometry::fit_scale;
use crate::render::image::{draw_image_rect, with_pixmap};
use crate::render::{FontBook, RenderOptions, render_scene};

/// One encoded animation frame
#[derive(Clone, Debug)]
pub struct ExportFrame {
    pub raster: RgbaImage,
    pub delay_ms: u32,
}

/// Immutable copy of everything an export reads from the editor
#[derive(Clone, Debug)]
pub struct ExportSource {
    pub items: Vec<Item>,
    pub composited: Arc<RgbaImage>,
    pub fonts: FontBook,
    pub before_after: BeforeAfterLayers,
    /// Output size after fitting the canvas into the export maximum
    pub target: (u32, u32),
}

impl ExportSource {
    pub fn new(
        items: Vec<Item>,
        composited: Arc<RgbaImage>,
        fonts: FontBook,
        before_after: BeforeAfterLayers,
        max_dimension: u32,
    ) -> Self {
        let target = target_size(composited.dimensions(), max_dimension);
        Self {
            items,
            composited,
            fonts,
            before_after,
            target,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.composited.dimensions()
    }
}

/// Canvas size scaled down so the longest side fits `max_dimension`
pub fn target_size(canvas: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (w, h) = canvas;
    let scale = fit_scale(w, h, max_dimension);
    (
        ((w as f32 * scale).round() as u32).max(1),
        ((h as f32 * scale).round() as u32).max(1),
    )
}

/// What sits under the annotations in a frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Backdrop {
    /// The composited raster as the editor shows it
    Composited,
    /// The composited raster with the before/after layers blended on top
    /// at the given weights
    Layers { before: f32, after: f32 },
}

/// Description of a single frame, rendered later from the source
#[derive(Clone, Debug)]
pub struct FramePlan {
    /// Items to paint, possibly perturbed copies of the scene items
    pub items: Vec<Item>,
    pub show_annotations: bool,
    pub backdrop: Backdrop,
    pub delay_ms: u32,
}

impl FramePlan {
    pub fn new(items: Vec<Item>, delay_ms: u32) -> Self {
        Self {
            items,
            show_annotations: true,
            backdrop: Backdrop::Composited,
            delay_ms,
        }
    }
}

fn draw_layer(canvas: &mut RgbaImage, layer: &LayerImage, weight: f32) {
    let opacity = layer.opacity * weight;
    if opacity <= 0.0 {
        return;
    }
    let Some(r) = layer.visible_rect() else {
        return;
    };
    let cropped;
    let source: &RgbaImage = if layer.crop.is_some() {
        cropped = imageops::crop_imm(
            &*layer.image,
            r.left as u32,
            r.top as u32,
            r.width() as u32,
            r.height() as u32,
        )
        .to_image();
        &cropped
    } else {
        &*layer.image
    };
    with_pixmap(canvas, |pixmap| {
        draw_image_rect(
            pixmap,
            source,
            layer.x,
            layer.y,
            layer.width,
            layer.height,
            opacity,
            tiny_skia::Transform::identity(),
        );
    });
}

/// Render one planned frame at the source's target size
pub fn render_frame(source: &ExportSource, plan: &FramePlan) -> ExportFrame {
    let backdrop = match plan.backdrop {
        Backdrop::Composited => None,
        Backdrop::Layers { before, after } => {
            let mut canvas = source.composited.as_ref().clone();
            if let Some(layer) = &source.before_after.before {
                draw_layer(&mut canvas, layer, before);
            }
            if let Some(layer) = &source.before_after.after {
                draw_layer(&mut canvas, layer, after);
            }
            Some(canvas)
        }
    };
    let backdrop: &RgbaImage = backdrop.as_ref().unwrap_or(&*source.composited);

    let options = if plan.show_annotations {
        RenderOptions::OUTPUT
    } else {
        RenderOptions::BACKDROP
    };
    let mut raster = render_scene(backdrop, &plan.items, &source.fonts, options);

    let (tw, th) = source.target;
    if raster.dimensions() != (tw, th) {
        raster = imageops::resize(&raster, tw, th, FilterType::Triangle);
    }
    ExportFrame {
        raster,
        delay_ms: plan.delay_ms,
    }
}
