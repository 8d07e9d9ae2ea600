//! Composited raster computation
//!
//! The composited raster is the oriented base image with global filters
//! applied and every privacy region merged over it. Nothing here mutates the
//! base raster; when there is nothing to do the base handle is returned as is.

use std::sync::Arc;

use image::RgbaImage;

use super::mask;
use super::stages::{self, FilterConfig};
use crate::domain::{BgTransform, Item, PrivacyEffect};

/// Gaussian sigma for blur regions painted with the given widest brush
pub fn region_blur_sigma(max_brush_width: f32) -> f32 {
    (max_brush_width * 0.5).max(4.0)
}

/// Mosaic block size for regions painted with the given widest brush
pub fn region_mosaic_block(max_brush_width: f32) -> u32 {
    ((max_brush_width * 1.5).round() as u32).max(2)
}

/// Whether any stroke needs the pipeline to run
pub fn has_composited_strokes(items: &[Item]) -> bool {
    items.iter().any(|item| {
        item.privacy_effect()
            .is_some_and(|effect| effect != PrivacyEffect::AiErase)
            && !item.is_degenerate()
    })
}

/// Base raster in display orientation with the global filters applied
pub fn flatten_base(
    base: &Arc<RgbaImage>,
    transform: BgTransform,
    filters: &FilterConfig,
) -> Arc<RgbaImage> {
    if transform.is_identity() && filters.is_identity() {
        return Arc::clone(base);
    }
    let oriented = if transform.is_identity() {
        None
    } else {
        Some(stages::orient(base, transform))
    };
    let source: &RgbaImage = oriented.as_ref().unwrap_or(&**base);
    if filters.is_identity() {
        return Arc::new(source.clone());
    }
    Arc::new(stages::apply_global(source, filters))
}

/// Processed copy of `filtered` used for one privacy family
fn region_variant(filtered: &RgbaImage, effect: PrivacyEffect, max_brush: f32) -> Option<RgbaImage> {
    match effect {
        PrivacyEffect::Grayscale => Some(stages::grayscale(filtered)),
        PrivacyEffect::Blur => Some(stages::blur(filtered, region_blur_sigma(max_brush))),
        PrivacyEffect::Mosaic => Some(stages::mosaic(filtered, region_mosaic_block(max_brush))),
        PrivacyEffect::AiErase => None,
    }
}

/// Compute the composited raster for the current scene state.
///
/// Regions are merged over the globally filtered raster in the order
/// grayscale, blur, mosaic. AI-erase strokes are not composited; they are
/// resolved by the inpainting boundary instead.
pub fn composite(
    base: &Arc<RgbaImage>,
    transform: BgTransform,
    filters: &FilterConfig,
    items: &[Item],
) -> Arc<RgbaImage> {
    let filtered = flatten_base(base, transform, filters);
    if !has_composited_strokes(items) {
        return filtered;
    }

    let (width, height) = filtered.dimensions();
    let mut result = filtered.as_ref().clone();
    for effect in PrivacyEffect::COMPOSITED {
        let strokes: Vec<&Item> = items
            .iter()
            .filter(|item| item.privacy_effect() == Some(effect))
            .collect();
        if strokes.is_empty() {
            continue;
        }
        let coverage = mask::paint_mask(width, height, strokes.iter().copied());
        if !mask::has_coverage(&coverage) {
            continue;
        }
        let max_brush = mask::max_brush_width(strokes.iter().copied());
        if let Some(variant) = region_variant(&filtered, effect, max_brush) {
            log::debug!(
                "Compositing {} {:?} stroke(s), widest brush {}",
                strokes.len(),
                effect,
                max_brush
            );
            mask::composite_masked(&mut result, &variant, &coverage);
        }
    }
    Arc::new(result)
}
