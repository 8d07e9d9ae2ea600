//! Animated frame encoders
//!
//! The export engine only knows the [`FrameEncoder`] trait; GIF and APNG
//! implementations are provided here.

use std::borrow::Cow;
use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::frames::ExportFrame;
use crate::error::{EditorError, EditorResult};

/// Shortest frame delay written, in milliseconds
pub const MIN_FRAME_DELAY_MS: u32 = 10;

/// Everything an encoder needs to produce one animation
#[derive(Clone, Debug)]
pub struct EncodeRequest {
    pub width: u32,
    pub height: u32,
    pub looped: bool,
    pub frames: Vec<ExportFrame>,
}

/// External frame encoder boundary
pub trait FrameEncoder: Send + Sync {
    /// Short format name used in logs and file extensions
    fn extension(&self) -> &'static str;

    fn encode(&self, request: EncodeRequest) -> EditorResult<Vec<u8>>;
}

/// Output container format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Gif,
    Apng,
}

impl ExportFormat {
    pub fn encoder(self, gif_colors: u16) -> Box<dyn FrameEncoder> {
        match self {
            ExportFormat::Gif => Box::new(GifEncoder::new(gif_colors)),
            ExportFormat::Apng => Box::new(ApngEncoder),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Gif => "gif",
            ExportFormat::Apng => "png",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Gif => write!(f, "GIF"),
            ExportFormat::Apng => write!(f, "APNG"),
        }
    }
}

fn check_request(request: &EncodeRequest) -> EditorResult<()> {
    if request.frames.is_empty() {
        return Err(EditorError::encoding("no frames to encode"));
    }
    if let Some(bad) = request
        .frames
        .iter()
        .find(|f| f.raster.dimensions() != (request.width, request.height))
    {
        return Err(EditorError::encoding(format!(
            "frame is {:?} but the animation is {}x{}",
            bad.raster.dimensions(),
            request.width,
            request.height
        )));
    }
    Ok(())
}

/// GIF encoder with a NeuQuant palette per frame
#[derive(Clone, Debug)]
pub struct GifEncoder {
    /// Palette size, 2-256
    pub colors: u16,
}

impl GifEncoder {
    pub fn new(colors: u16) -> Self {
        Self {
            colors: colors.clamp(2, 256),
        }
    }
}

impl Default for GifEncoder {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Milliseconds to GIF centiseconds, never zero
pub fn gif_delay(delay_ms: u32) -> u16 {
    (delay_ms.max(MIN_FRAME_DELAY_MS) as f32 / 10.0)
        .round()
        .clamp(1.0, u16::MAX as f32) as u16
}

/// Quantize an RGBA image to indexed color (palette + indices).
/// Returns (flat_palette_rgb: Vec<u8>, indices: Vec<u8>).
/// The palette is in [R,G,B, R,G,B, ...] format as required by the gif crate.
fn quantize_rgba(image: &RgbaImage, max_colors: usize) -> (Vec<u8>, Vec<u8>) {
    let nq = color_quant::NeuQuant::new(10, max_colors, image.as_raw());

    let mut palette = Vec::with_capacity(max_colors * 3);
    for i in 0..max_colors {
        match nq.lookup(i) {
            Some(color) => palette.extend_from_slice(&color[..3]),
            None => palette.extend_from_slice(&[0, 0, 0]),
        }
    }

    let indices = image
        .pixels()
        .map(|p| nq.index_of(&p.0) as u8)
        .collect();

    (palette, indices)
}

impl FrameEncoder for GifEncoder {
    fn extension(&self) -> &'static str {
        "gif"
    }

    fn encode(&self, request: EncodeRequest) -> EditorResult<Vec<u8>> {
        check_request(&request)?;
        if request.width > u16::MAX as u32 || request.height > u16::MAX as u32 {
            return Err(EditorError::encoding(
                "image dimensions exceed GIF maximum (65535x65535)",
            ));
        }
        let (w, h) = (request.width as u16, request.height as u16);
        let colors = self.colors as usize;

        let mut buf = Vec::new();
        {
            let mut encoder =
                gif::Encoder::new(&mut buf, w, h, &[]).map_err(EditorError::encoding)?;
            if request.looped {
                encoder
                    .set_repeat(gif::Repeat::Infinite)
                    .map_err(EditorError::encoding)?;
            }
            for frame in &request.frames {
                let (palette, indexed) = quantize_rgba(&frame.raster, colors);
                let gif_frame = gif::Frame {
                    width: w,
                    height: h,
                    delay: gif_delay(frame.delay_ms),
                    palette: Some(palette),
                    buffer: Cow::Owned(indexed),
                    ..Default::default()
                };
                encoder
                    .write_frame(&gif_frame)
                    .map_err(EditorError::encoding)?;
            }
        }
        log::debug!("Encoded {} GIF frame(s), {} bytes", request.frames.len(), buf.len());
        Ok(buf)
    }
}

/// Animated PNG encoder
#[derive(Clone, Copy, Debug, Default)]
pub struct ApngEncoder;

impl FrameEncoder for ApngEncoder {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn encode(&self, request: EncodeRequest) -> EditorResult<Vec<u8>> {
        check_request(&request)?;
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, request.width, request.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            // 0 plays forever
            let plays = if request.looped { 0 } else { 1 };
            encoder
                .set_animated(request.frames.len() as u32, plays)
                .map_err(EditorError::encoding)?;
            let mut writer = encoder.write_header().map_err(EditorError::encoding)?;
            for frame in &request.frames {
                let delay = frame.delay_ms.clamp(MIN_FRAME_DELAY_MS, u16::MAX as u32) as u16;
                writer
                    .set_frame_delay(delay, 1000)
                    .map_err(EditorError::encoding)?;
                writer
                    .write_image_data(frame.raster.as_raw())
                    .map_err(EditorError::encoding)?;
            }
            writer.finish().map_err(EditorError::encoding)?;
        }
        log::debug!("Encoded {} APNG frame(s), {} bytes", request.frames.len(), buf.len());
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize, delay_ms: u32) -> Vec<ExportFrame> {
        (0..n)
            .map(|i| ExportFrame {
                raster: RgbaImage::from_pixel(8, 6, image::Rgba([i as u8 * 60, 30, 200, 255])),
                delay_ms,
            })
            .collect()
    }

    fn request(n: usize) -> EncodeRequest {
        EncodeRequest {
            width: 8,
            height: 6,
            looped: true,
            frames: frames(n, 120),
        }
    }

    #[test]
    fn delay_conversion() {
        assert_eq!(gif_delay(500), 50);
        assert_eq!(gif_delay(0), 1);
        assert_eq!(gif_delay(104), 10);
    }

    #[test]
    fn gif_round_trips_frame_count_and_delay() {
        let bytes = GifEncoder::default().encode(request(3)).unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(bytes.as_slice()).unwrap();
        let mut count = 0;
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            assert_eq!(frame.delay, 12);
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn apng_has_png_signature() {
        let bytes = ApngEncoder.encode(request(2)).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().animation_control.as_ref().map(|a| a.num_frames), Some(2));
    }

    #[test]
    fn empty_or_mismatched_requests_fail() {
        let mut req = request(0);
        assert!(matches!(
            GifEncoder::default().encode(req.clone()),
            Err(EditorError::EncodingFailure(_))
        ));
        req.frames = frames(1, 100);
        req.width = 9;
        assert!(matches!(
            ApngEncoder.encode(req),
            Err(EditorError::EncodingFailure(_))
        ));
    }
}
