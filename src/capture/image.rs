//! Base raster type and the upload/download byte boundary

use std::io;
use std::sync::Arc;

use image::RgbaImage;

use crate::error::{EditorError, EditorResult};

/// An uploaded photo decoded to RGBA, shared by reference across the editor
#[derive(Clone, Debug)]
pub struct BaseImage {
    pub rgba: Arc<RgbaImage>,
}

impl BaseImage {
    /// Decode uploaded bytes, rejecting empty or unsupported input
    pub fn decode(bytes: &[u8]) -> EditorResult<Self> {
        let rgba = load_base_image(bytes)?;
        log::debug!(
            "BaseImage decoded: {}x{} pixels",
            rgba.width(),
            rgba.height()
        );
        Ok(Self {
            rgba: Arc::new(rgba),
        })
    }

    /// Get the width of the image
    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    /// Get the height of the image
    pub fn height(&self) -> u32 {
        self.rgba.height()
    }
}

/// Decode an uploaded image into RGBA
pub fn load_base_image(bytes: &[u8]) -> EditorResult<RgbaImage> {
    if bytes.is_empty() {
        return Err(EditorError::invalid_input("empty image upload"));
    }
    let format = image::guess_format(bytes)
        .map_err(|_| EditorError::invalid_input("unsupported image type"))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|err| EditorError::invalid_input(format!("could not decode {format:?}: {err}")))?;
    let rgba = decoded.into_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(EditorError::invalid_input("image has no pixels"));
    }
    Ok(rgba)
}

pub fn write_png<W: io::Write>(w: W, image: &RgbaImage) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(w, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())
}

/// Encode an image to PNG bytes in memory
pub fn encode_png(image: &RgbaImage) -> EditorResult<Vec<u8>> {
    let mut buf = Vec::new();
    write_png(&mut buf, image).map_err(EditorError::encoding)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bytes_are_rejected() {
        assert!(matches!(
            load_base_image(&[]),
            Err(EditorError::InvalidInput(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            load_base_image(b"definitely not an image"),
            Err(EditorError::InvalidInput(_))
        ));
    }

    #[test]
    fn png_bytes_decode_back() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let bytes = encode_png(&img).unwrap();
        let base = BaseImage::decode(&bytes).unwrap();
        assert_eq!((base.width(), base.height()), (3, 2));
        assert_eq!(*base.rgba, img);
    }
}
