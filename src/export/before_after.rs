//! Before/after cross-dissolve export

use std::f32::consts::PI;
use std::sync::Arc;

use image::RgbaImage;

use super::frames::{Backdrop, ExportSource, FramePlan};
use crate::domain::Rect;
use crate::error::{EditorError, EditorResult};

/// A positioned, optionally cropped sub-image used by the before/after mode
#[derive(Clone, Debug)]
pub struct LayerImage {
    pub image: Arc<RgbaImage>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Region of `image` to show, in image pixels
    pub crop: Option<Rect>,
    pub opacity: f32,
}

impl LayerImage {
    /// Layer at its natural size at the canvas origin
    pub fn natural(image: Arc<RgbaImage>) -> Self {
        let (w, h) = image.dimensions();
        Self {
            image,
            x: 0.0,
            y: 0.0,
            width: w as f32,
            height: h as f32,
            crop: None,
            opacity: 1.0,
        }
    }

    /// Layer stretched over a whole `width` x `height` canvas
    pub fn covering(image: Arc<RgbaImage>, width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            ..Self::natural(image)
        }
    }

    /// Region of the image to draw, clamped to the image.
    /// `None` when the crop misses the image entirely.
    pub fn visible_rect(&self) -> Option<Rect> {
        let (w, h) = self.image.dimensions();
        let full = Rect::from_xywh(0, 0, w as i32, h as i32);
        match self.crop {
            Some(crop) => crop.intersect(full),
            None => Some(full),
        }
    }
}

/// The two layers compared by the before/after export
#[derive(Clone, Debug, Default)]
pub struct BeforeAfterLayers {
    pub before: Option<LayerImage>,
    pub after: Option<LayerImage>,
}

impl BeforeAfterLayers {
    pub fn is_complete(&self) -> bool {
        self.before.is_some() && self.after.is_some()
    }
}

/// Number of frames in each dissolve half
pub fn dissolve_frame_count(seconds: f32) -> usize {
    ((seconds.max(0.0) * 10.0).round() as usize).max(2)
}

/// Linear dissolve positions strictly between 0 and 1.
/// The holds on either side already show the endpoints.
pub fn dissolve_ratios(count: usize) -> Vec<f32> {
    let count = count.max(2);
    let steps = (count + 1) as f32;
    (1..=count).map(|k| k as f32 / steps).collect()
}

/// Eased crossfade weight of the "after" layer
pub fn ease(ratio: f32) -> f32 {
    (1.0 - (PI * ratio.clamp(0.0, 1.0)).cos()) / 2.0
}

fn blend(after: f32) -> Backdrop {
    Backdrop::Layers {
        before: 1.0 - after,
        after,
    }
}

/// Hold-before, dissolve in, hold-after, dissolve out, hold-before
pub fn plan(source: &ExportSource, hold_ms: u32, dissolve_seconds: f32) -> EditorResult<Vec<FramePlan>> {
    if source.before_after.before.is_none() {
        return Err(EditorError::MissingLayer("before"));
    }
    if source.before_after.after.is_none() {
        return Err(EditorError::MissingLayer("after"));
    }

    let count = dissolve_frame_count(dissolve_seconds);
    let ratios = dissolve_ratios(count);
    let dissolve_ms = ((dissolve_seconds.max(0.0) * 1000.0) / count as f32).round() as u32;

    let frame = |after: f32, delay_ms: u32| FramePlan {
        backdrop: blend(after),
        ..FramePlan::new(source.items.clone(), delay_ms)
    };

    let mut plans = Vec::with_capacity(2 * count + 3);
    plans.push(frame(0.0, hold_ms));
    plans.extend(ratios.iter().map(|&r| frame(ease(r), dissolve_ms)));
    plans.push(frame(1.0, hold_ms));
    plans.extend(ratios.iter().rev().map(|&r| frame(ease(r), dissolve_ms)));
    plans.push(frame(0.0, hold_ms));
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FontBook;

    fn source(layers: BeforeAfterLayers) -> ExportSource {
        ExportSource::new(
            Vec::new(),
            Arc::new(RgbaImage::new(30, 20)),
            FontBook::default(),
            layers,
            800,
        )
    }

    fn layer() -> LayerImage {
        LayerImage::natural(Arc::new(RgbaImage::new(10, 10)))
    }

    fn after_weight(plan: &FramePlan) -> f32 {
        match plan.backdrop {
            Backdrop::Layers { after, .. } => after,
            Backdrop::Composited => panic!("before/after frames blend layers"),
        }
    }

    #[test]
    fn frame_count_has_a_floor() {
        assert_eq!(dissolve_frame_count(1.0), 10);
        assert_eq!(dissolve_frame_count(0.14), 2);
        assert_eq!(dissolve_frame_count(0.0), 2);
        assert_eq!(dissolve_frame_count(2.46), 25);
    }

    #[test]
    fn ease_endpoints_and_midpoint() {
        assert!(ease(0.0).abs() < 1e-6);
        assert!((ease(1.0) - 1.0).abs() < 1e-6);
        assert!((ease(0.5) - 0.5).abs() < 1e-6);
        assert!(ease(0.25) < 0.25);
    }

    #[test]
    fn missing_layers_block_export() {
        let err = plan(&source(BeforeAfterLayers::default()), 1000, 1.0).unwrap_err();
        assert!(matches!(err, EditorError::MissingLayer("before")));
        let layers = BeforeAfterLayers {
            before: Some(layer()),
            after: None,
        };
        let err = plan(&source(layers), 1000, 1.0).unwrap_err();
        assert!(matches!(err, EditorError::MissingLayer("after")));
    }

    #[test]
    fn sequence_shape() {
        let layers = BeforeAfterLayers {
            before: Some(layer()),
            after: Some(layer()),
        };
        let plans = plan(&source(layers), 1200, 0.5).unwrap();
        let n = 5;
        assert_eq!(plans.len(), 2 * n + 3);
        assert_eq!(plans[0].delay_ms, 1200);
        assert_eq!(plans[1].delay_ms, 100);
        assert_eq!(after_weight(&plans[0]), 0.0);
        assert_eq!(after_weight(&plans[n + 1]), 1.0);
        assert_eq!(after_weight(&plans[2 * n + 2]), 0.0);

        let dissolve_in: Vec<f32> = plans[1..=n].iter().map(after_weight).collect();
        assert!(dissolve_in.windows(2).all(|w| w[0] < w[1]));
        assert!(dissolve_in[0] > 0.0 && dissolve_in[n - 1] < 1.0);
        let dissolve_out: Vec<f32> = plans[n + 2..2 * n + 2].iter().map(after_weight).collect();
        assert!(dissolve_out.windows(2).all(|w| w[0] > w[1]));
        assert!(dissolve_out[0] < 1.0 && dissolve_out[n - 1] > 0.0);
    }

    #[test]
    fn dissolve_ratios_skip_the_held_endpoints() {
        assert_eq!(dissolve_ratios(4), vec![0.2, 0.4, 0.6, 0.8]);
        assert_eq!(dissolve_ratios(0).len(), 2);
    }

    #[test]
    fn crop_is_clamped_to_image() {
        let mut l = layer();
        assert_eq!(l.visible_rect(), Some(Rect::from_xywh(0, 0, 10, 10)));
        l.crop = Some(Rect::from_xywh(5, 5, 50, 50));
        assert_eq!(l.visible_rect(), Some(Rect::from_xywh(5, 5, 5, 5)));
        l.crop = Some(Rect::from_xywh(20, 20, 5, 5));
        assert_eq!(l.visible_rect(), None);
    }
}
