//! Coverage masks painted from privacy strokes

use image::{GrayImage, Luma, RgbaImage};
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::domain::{Item, Point, mix_channel};

/// Polyline path through the given canvas points
pub fn polyline_path(points: &[Point]) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x, first.y);
    for p in rest {
        pb.line_to(p.x, p.y);
    }
    pb.finish()
}

/// Widest brush among the strokes, 0 when there are none
pub fn max_brush_width<'a>(strokes: impl IntoIterator<Item = &'a Item>) -> f32 {
    strokes
        .into_iter()
        .filter_map(|item| item.brush().map(|s| s.brush_width))
        .fold(0.0, f32::max)
}

/// Paint a coverage mask for `strokes` on a `width` x `height` canvas.
///
/// Each stroke is drawn with round caps and joins at its brush width; a
/// single-point stroke becomes a filled dot. Items without brush data are
/// ignored, and an empty stroke list yields an all-zero mask.
pub fn paint_mask<'a>(
    width: u32,
    height: u32,
    strokes: impl IntoIterator<Item = &'a Item>,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        return mask;
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = true;

    let mut painted = false;
    for item in strokes {
        let Some(brush) = item.brush() else {
            continue;
        };
        let points = item.absolute_points();
        match points.as_slice() {
            [] => {}
            [single] => {
                if let Some(dot) = PathBuilder::from_circle(single.x, single.y, brush.brush_width / 2.0)
                {
                    pixmap.fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);
                    painted = true;
                }
            }
            _ => {
                if let Some(path) = polyline_path(&points) {
                    let stroke = Stroke {
                        width: brush.brush_width,
                        line_cap: LineCap::Round,
                        line_join: LineJoin::Round,
                        ..Default::default()
                    };
                    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
                    painted = true;
                }
            }
        }
    }

    if painted {
        for (dst, src) in mask.pixels_mut().zip(pixmap.pixels()) {
            *dst = Luma([src.alpha()]);
        }
    }
    mask
}

/// Whether any pixel of the mask has coverage
pub fn has_coverage(mask: &GrayImage) -> bool {
    mask.as_raw().iter().any(|&v| v > 0)
}

/// Blend `variant` over `dst` using the mask value as the blend factor
pub fn composite_masked(dst: &mut RgbaImage, variant: &RgbaImage, mask: &GrayImage) {
    if dst.dimensions() != variant.dimensions() || dst.dimensions() != mask.dimensions() {
        log::warn!(
            "Skipping masked composite: size mismatch {:?} / {:?} / {:?}",
            dst.dimensions(),
            variant.dimensions(),
            mask.dimensions()
        );
        return;
    }
    for ((out, src), coverage) in dst.pixels_mut().zip(variant.pixels()).zip(mask.pixels()) {
        match coverage[0] {
            0 => {}
            255 => *out = *src,
            c => {
                let t = c as f32 / 255.0;
                for i in 0..4 {
                    out[i] = mix_channel(out[i], src[i], t);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemId, ItemKind, PrivacyEffect};

    fn stroke(points: Vec<Point>, width: f32) -> Item {
        let mut item = Item::new(
            ItemId(1),
            Point::new(10.0, 10.0),
            ItemKind::privacy(PrivacyEffect::Blur, width),
        );
        item.brush_mut().unwrap().points = points;
        item
    }

    #[test]
    fn empty_strokes_give_empty_mask() {
        let mask = paint_mask(16, 16, std::iter::empty());
        assert!(!has_coverage(&mask));
        let empty = stroke(Vec::new(), 8.0);
        assert!(!has_coverage(&paint_mask(16, 16, [&empty])));
        let zero = paint_mask(0, 0, [&empty]);
        assert_eq!(zero.dimensions(), (0, 0));
    }

    #[test]
    fn single_point_paints_a_dot() {
        let dot = stroke(vec![Point::ZERO], 8.0);
        let mask = paint_mask(32, 32, [&dot]);
        assert_eq!(mask.get_pixel(10, 10)[0], 255);
        assert_eq!(mask.get_pixel(25, 25)[0], 0);
    }

    #[test]
    fn polyline_respects_origin() {
        let line = stroke(vec![Point::ZERO, Point::new(20.0, 0.0)], 6.0);
        let mask = paint_mask(40, 40, [&line]);
        assert_eq!(mask.get_pixel(20, 10)[0], 255);
        assert_eq!(mask.get_pixel(20, 30)[0], 0);
        assert_eq!(max_brush_width([&line]), 6.0);
    }

    #[test]
    fn composite_uses_coverage() {
        let mut dst = RgbaImage::from_pixel(2, 1, image::Rgba([0, 0, 0, 255]));
        let variant = RgbaImage::from_pixel(2, 1, image::Rgba([200, 200, 200, 255]));
        let mask = GrayImage::from_raw(2, 1, vec![255, 0]).unwrap();
        composite_masked(&mut dst, &variant, &mask);
        assert_eq!(dst.get_pixel(0, 0)[0], 200);
        assert_eq!(dst.get_pixel(1, 0)[0], 0);
    }
}
