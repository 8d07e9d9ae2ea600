//! Text item rasterization with ab_glyph

use std::collections::HashMap;
use std::path::Path;

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use tiny_skia::{ColorU8, Pixmap};

use crate::config::{EditorConfig, ShapeColor};
use crate::domain::FontSpec;

/// Family used when a text item names a font that is not loaded
pub const FALLBACK_FAMILY: &str = "sans";

/// Common locations probed for a fallback sans-serif face
const SYSTEM_FALLBACKS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Loaded fonts keyed by family name
#[derive(Clone, Default)]
pub struct FontBook {
    fonts: HashMap<String, FontArc>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("families", &self.fonts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FontBook {
    /// Load the configured font files, probing system paths for a fallback
    pub fn from_config(config: &EditorConfig) -> Self {
        let mut book = Self::default();
        for (family, path) in &config.fonts {
            if let Err(err) = book.load_file(family, path) {
                log::warn!("Could not load font {} from {}: {}", family, path.display(), err);
            }
        }
        if !book.fonts.contains_key(FALLBACK_FAMILY) {
            for path in SYSTEM_FALLBACKS {
                if book.load_file(FALLBACK_FAMILY, Path::new(path)).is_ok() {
                    log::debug!("Using {} as fallback font", path);
                    break;
                }
            }
        }
        book
    }

    pub fn load_file(&mut self, family: &str, path: &Path) -> anyhow::Result<()> {
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)?;
        self.insert(family, font);
        Ok(())
    }

    pub fn insert(&mut self, family: &str, font: FontArc) {
        self.fonts.insert(family.to_ascii_lowercase(), font);
    }

    /// Font for `family`, falling back to the sans face or any loaded font
    pub fn resolve(&self, family: &str) -> Option<&FontArc> {
        self.fonts
            .get(&family.to_ascii_lowercase())
            .or_else(|| self.fonts.get(FALLBACK_FAMILY))
            .or_else(|| self.fonts.values().next())
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Text coverage rendered into a premultiplied pixmap
pub struct RasterizedText {
    pub pixmap: Pixmap,
    /// Offset of the pixmap's top-left corner from the text origin
    pub off_x: i32,
    pub off_y: i32,
}

/// Lay out one line, returning glyph ids with their pen x positions and the line width
fn layout_line(font: &FontArc, line: &str, size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(size);
    let mut glyphs = Vec::with_capacity(line.len());
    let mut cursor_x = 0.0f32;
    let mut prev: Option<GlyphId> = None;
    for ch in line.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = prev {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        prev = Some(glyph_id);
    }
    (glyphs, cursor_x)
}

/// Size of the laid-out text box, origin at the top-left
pub fn measure(font: &FontArc, content: &str, size: f32) -> (f32, f32) {
    let line_height = font.as_scaled(size).height();
    let lines: Vec<&str> = content.split('\n').collect();
    let width = lines
        .iter()
        .map(|line| layout_line(font, line, size).1)
        .fold(0.0, f32::max);
    (width, line_height * lines.len() as f32)
}

/// Rasterize multi-line text with its decorations.
///
/// The origin is the top-left of the first line; the first baseline sits one
/// ascent below it. Returns `None` when the text has no visible pixels.
pub fn rasterize_text(
    font: &FontArc,
    content: &str,
    spec: &FontSpec,
    color: ShapeColor,
) -> Option<RasterizedText> {
    let size = spec.size.max(1.0);
    let scaled = font.as_scaled(size);
    let ascent = scaled.ascent();
    let line_height = scaled.height();

    let lines: Vec<(Vec<(GlyphId, f32)>, f32)> = content
        .split('\n')
        .map(|line| layout_line(font, line, size))
        .collect();
    let (text_w, text_h) = (
        lines.iter().map(|(_, w)| *w).fold(0.0, f32::max),
        line_height * lines.len() as f32,
    );
    if text_w < 0.5 {
        return None;
    }

    // Room for italic shear and bold smear on either side
    let pad = (size * 0.3).ceil();
    let buf_w = (text_w + pad * 2.0).ceil() as u32;
    let buf_h = (text_h + pad * 2.0).ceil() as u32;
    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];

    let mut plot = |x: f32, y: f32, v: f32| {
        let ix = x.round() as i64;
        let iy = y.round() as i64;
        if ix < 0 || iy < 0 || ix >= buf_w as i64 || iy >= buf_h as i64 {
            return;
        }
        let idx = iy as usize * buf_w as usize + ix as usize;
        coverage[idx] = coverage[idx].max(v);
    };

    for (line_idx, (glyphs, line_w)) in lines.iter().enumerate() {
        let baseline = pad + ascent + line_idx as f32 * line_height;
        for &(glyph_id, gx) in glyphs {
            let glyph = glyph_id.with_scale_and_position(size, point(pad + gx, baseline));
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, cov| {
                let mut cx = bounds.min.x + px as f32;
                let cy = bounds.min.y + py as f32;
                if spec.italic {
                    cx += (baseline - cy) * 0.2;
                }
                plot(cx, cy, cov);
                if spec.is_bold() {
                    plot(cx + 1.0, cy, cov);
                }
            });
        }

        let thickness = (size * 0.06).max(1.0);
        let mut decorate = |line_y: f32| {
            let mut y = line_y;
            while y < line_y + thickness {
                let mut x = pad;
                while x < pad + line_w {
                    plot(x, y, 1.0);
                    x += 1.0;
                }
                y += 1.0;
            }
        };
        if spec.underline {
            decorate(baseline + size * 0.1);
        }
        if spec.strikethrough {
            decorate(baseline - ascent * 0.4);
        }
    }

    let mut pixmap = Pixmap::new(buf_w, buf_h)?;
    let [r, g, b, a] = color.to_rgba_u8();
    let mut any = false;
    for (dst, cov) in pixmap.pixels_mut().iter_mut().zip(&coverage) {
        if *cov > 0.001 {
            let alpha = (a as f32 * cov.min(1.0)).round() as u8;
            *dst = ColorU8::from_rgba(r, g, b, alpha).premultiply();
            any = true;
        }
    }
    any.then(|| RasterizedText {
        pixmap,
        off_x: -(pad as i32),
        off_y: -(pad as i32),
    })
}
