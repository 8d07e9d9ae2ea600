//! Pure raster stages
//!
//! Each stage takes an immutable raster and returns a new one, so the order
//! in which they run is explicit at the call site.

use image::{Rgba, RgbaImage, imageops};
use serde::{Deserialize, Serialize};

use crate::domain::{BgTransform, to_channel};

/// Global filters applied to the whole base raster
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub grayscale: bool,
    pub blur: bool,
    /// Gaussian sigma used when `blur` is set
    pub blur_radius: f32,
    /// Percent, 100 is unchanged
    pub brightness: f32,
    /// Percent, 100 is unchanged
    pub contrast: f32,
    /// Mosaic block size in pixels, 0 is off
    pub mosaic: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            grayscale: false,
            blur: false,
            blur_radius: 4.0,
            brightness: 100.0,
            contrast: 100.0,
            mosaic: 0,
        }
    }
}

impl FilterConfig {
    pub fn is_identity(&self) -> bool {
        !self.grayscale
            && !(self.blur && self.blur_radius > 0.0)
            && (self.brightness - 100.0).abs() < f32::EPSILON
            && (self.contrast - 100.0).abs() < f32::EPSILON
            && self.mosaic < 2
    }
}

/// Gaussian blur with the given sigma
pub fn blur(img: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    imageops::blur(img, sigma)
}

/// Luma conversion with Rec. 709 weights, alpha kept
pub fn grayscale(img: &RgbaImage) -> RgbaImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let [r, g, b, a] = px.0;
        let luma = to_channel(0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32);
        *px = Rgba([luma, luma, luma, a]);
    }
    out
}

/// Brightness scales each channel, contrast stretches around mid-gray
pub fn brightness_contrast(img: &RgbaImage, brightness: f32, contrast: f32) -> RgbaImage {
    let b = brightness.max(0.0) / 100.0;
    let c = contrast.max(0.0) / 100.0;
    let mut out = img.clone();
    for px in out.pixels_mut() {
        for ch in px.0.iter_mut().take(3) {
            let v = *ch as f32 * b;
            *ch = to_channel((v - 128.0) * c + 128.0);
        }
    }
    out
}

/// Replace each `block`-sized cell with its average color
pub fn mosaic(img: &RgbaImage, block: u32) -> RgbaImage {
    let mut out = img.clone();
    let block = block.max(2);
    let (width, height) = img.dimensions();

    let mut block_y = 0;
    while block_y < height {
        let block_end_y = (block_y + block).min(height);

        let mut block_x = 0;
        while block_x < width {
            let block_end_x = (block_x + block).min(width);

            let mut totals = [0u64; 4];
            let mut pixel_count: u64 = 0;
            for py in block_y..block_end_y {
                for px in block_x..block_end_x {
                    let pixel = img.get_pixel(px, py);
                    for (total, ch) in totals.iter_mut().zip(pixel.0) {
                        *total += ch as u64;
                    }
                    pixel_count += 1;
                }
            }

            if pixel_count > 0 {
                let avg_color = Rgba(totals.map(|t| (t / pixel_count) as u8));
                for py in block_y..block_end_y {
                    for px in block_x..block_end_x {
                        out.put_pixel(px, py, avg_color);
                    }
                }
            }

            block_x += block;
        }
        block_y += block;
    }
    out
}

/// Rotate then flip the base raster into display orientation
pub fn orient(img: &RgbaImage, transform: BgTransform) -> RgbaImage {
    let rotated = match transform.rotation {
        90 => imageops::rotate90(img),
        180 => imageops::rotate180(img),
        270 => imageops::rotate270(img),
        _ => img.clone(),
    };
    let mut out = rotated;
    if transform.flip_x {
        imageops::flip_horizontal_in_place(&mut out);
    }
    if transform.flip_y {
        imageops::flip_vertical_in_place(&mut out);
    }
    out
}

/// Run the global stages in order: blur, grayscale, brightness/contrast, mosaic
pub fn apply_global(img: &RgbaImage, config: &FilterConfig) -> RgbaImage {
    let mut out = if config.blur && config.blur_radius > 0.0 {
        blur(img, config.blur_radius)
    } else {
        img.clone()
    };
    if config.grayscale {
        out = grayscale(&out);
    }
    if (config.brightness - 100.0).abs() >= f32::EPSILON
        || (config.contrast - 100.0).abs() >= f32::EPSILON
    {
        out = brightness_contrast(&out, config.brightness, config.contrast);
    }
    if config.mosaic >= 2 {
        out = mosaic(&out, config.mosaic);
    }
    out
}
