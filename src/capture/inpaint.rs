//! Inpainting boundary for AI-erase strokes
//!
//! The editor hands the provider the display-oriented base raster together
//! with a coverage mask of the erase strokes and receives a replacement
//! raster of the same size.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use image::{GrayImage, Rgba, RgbaImage};

use crate::error::{EditorError, EditorResult};

/// Input for one inpainting call
#[derive(Clone, Debug)]
pub struct InpaintRequest {
    pub base_image: Arc<RgbaImage>,
    /// Non-zero where pixels must be replaced
    pub mask_image: GrayImage,
}

/// Anything that can fill masked regions of an image
pub trait InpaintProvider: Send + Sync {
    fn inpaint(&self, request: InpaintRequest) -> BoxFuture<'_, EditorResult<RgbaImage>>;
}

/// In-process fill that averages unmasked pixels sampled on growing rings
#[derive(Clone, Debug)]
pub struct LocalFillInpainter {
    /// Largest ring radius searched before giving up on a pixel
    pub max_radius: u32,
    /// Samples taken per ring
    pub samples: u32,
}

impl Default for LocalFillInpainter {
    fn default() -> Self {
        Self {
            max_radius: 64,
            samples: 24,
        }
    }
}

impl LocalFillInpainter {
    fn fill(&self, base: &RgbaImage, mask: &GrayImage) -> EditorResult<RgbaImage> {
        if base.dimensions() != mask.dimensions() {
            return Err(EditorError::inpaint(format!(
                "mask is {:?} but image is {:?}",
                mask.dimensions(),
                base.dimensions()
            )));
        }
        let (width, height) = base.dimensions();
        let mut out = base.clone();
        let mut filled = 0usize;

        for (x, y, coverage) in mask.enumerate_pixels() {
            if coverage[0] == 0 {
                continue;
            }
            if let Some(color) = self.ring_average(base, mask, x, y, width, height) {
                out.put_pixel(x, y, color);
                filled += 1;
            }
        }
        log::debug!("Local fill replaced {} pixel(s)", filled);
        Ok(out)
    }

    fn ring_average(
        &self,
        base: &RgbaImage,
        mask: &GrayImage,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Option<Rgba<u8>> {
        let samples = self.samples.max(4);
        for radius in 1..=self.max_radius.max(1) {
            let mut totals = [0u32; 4];
            let mut count = 0u32;
            for i in 0..samples {
                let angle = std::f32::consts::TAU * i as f32 / samples as f32;
                let sx = x as f32 + angle.cos() * radius as f32;
                let sy = y as f32 + angle.sin() * radius as f32;
                if sx < 0.0 || sy < 0.0 {
                    continue;
                }
                let (sx, sy) = (sx.round() as u32, sy.round() as u32);
                if sx >= width || sy >= height || mask.get_pixel(sx, sy)[0] != 0 {
                    continue;
                }
                for (total, ch) in totals.iter_mut().zip(base.get_pixel(sx, sy).0) {
                    *total += ch as u32;
                }
                count += 1;
            }
            if count > 0 {
                return Some(Rgba(totals.map(|t| (t / count) as u8)));
            }
        }
        None
    }
}

impl InpaintProvider for LocalFillInpainter {
    fn inpaint(&self, request: InpaintRequest) -> BoxFuture<'_, EditorResult<RgbaImage>> {
        async move { self.fill(&request.base_image, &request.mask_image) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fills_masked_pixels_from_surroundings() {
        let mut base = RgbaImage::from_pixel(9, 9, Rgba([50, 100, 150, 255]));
        base.put_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let mut mask = GrayImage::new(9, 9);
        mask.put_pixel(4, 4, image::Luma([255]));

        let out = LocalFillInpainter::default()
            .inpaint(InpaintRequest {
                base_image: Arc::new(base),
                mask_image: mask,
            })
            .await
            .unwrap();
        assert_eq!(*out.get_pixel(4, 4), Rgba([50, 100, 150, 255]));
    }

    #[tokio::test]
    async fn size_mismatch_is_an_error() {
        let result = LocalFillInpainter::default()
            .inpaint(InpaintRequest {
                base_image: Arc::new(RgbaImage::new(4, 4)),
                mask_image: GrayImage::new(3, 3),
            })
            .await;
        assert!(matches!(result, Err(EditorError::Inpaint(_))));
    }
}
