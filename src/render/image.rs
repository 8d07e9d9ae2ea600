//! Scene rendering using tiny-skia
//!
//! Items are painted in scene order over the composited raster. Each item is
//! drawn in its own local space (origin at the item's `(x, y)`) and placed
//! with a transform that applies the transient scale and the rotation.

use image::RgbaImage;
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, IntSize, LineCap, LineJoin, Paint, PathBuilder, Pattern,
    Pixmap, PixmapPaint, SpreadMode, Stroke, StrokeDash, Transform,
};

use super::geometry::{arrow, ellipse_from_bounds, shape};
use super::text::{self, FontBook};
use crate::config::ShapeColor;
use crate::domain::{ImageLayer, Item, ItemKind, Point, PrivacyEffect};
use crate::filters::mask::polyline_path;

/// Preview tint for pending AI-erase strokes
const ERASE_OVERLAY: [u8; 4] = [255, 0, 200, 110];

/// What to include when painting a scene
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Paint annotation items (everything but privacy strokes)
    pub show_annotations: bool,
    /// Tint pending AI-erase strokes so the user can see them
    pub show_erase_overlay: bool,
}

impl RenderOptions {
    /// Interactive preview: annotations plus the erase overlay
    pub const PREVIEW: RenderOptions = RenderOptions {
        show_annotations: true,
        show_erase_overlay: true,
    };
    /// Final output: annotations, no editing aids
    pub const OUTPUT: RenderOptions = RenderOptions {
        show_annotations: true,
        show_erase_overlay: false,
    };
    /// Composited raster only
    pub const BACKDROP: RenderOptions = RenderOptions {
        show_annotations: false,
        show_erase_overlay: false,
    };
}

/// Convert straight-alpha RGBA into a premultiplied pixmap
pub fn to_pixmap(img: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(img.width(), img.height())?;
    let mut data = Vec::with_capacity(img.as_raw().len());
    for px in img.pixels() {
        let [r, g, b, a] = px.0;
        let c = ColorU8::from_rgba(r, g, b, a).premultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Pixmap::from_vec(data, size)
}

/// Convert a premultiplied pixmap back to straight-alpha RGBA
pub fn to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    img
}

/// Convert RgbaImage to Pixmap, apply drawing function, and copy back
pub fn with_pixmap(img: &mut RgbaImage, f: impl FnOnce(&mut Pixmap)) {
    let Some(mut pixmap) = to_pixmap(img) else {
        return;
    };

    f(&mut pixmap);

    // Copy back
    *img = to_image(&pixmap);
}

fn solid_paint(color: ShapeColor, opacity: f32) -> Paint<'static> {
    let [r, g, b, a] = color.with_opacity(opacity).to_rgba_u8();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn round_stroke(width: f32) -> Stroke {
    Stroke {
        width: width.max(0.5),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    }
}

/// Build an arrow path as stroked lines (shaft + two angled head lines)
fn build_arrow_path(start: Point, end: Point, head_size: f32) -> Option<tiny_skia::Path> {
    let (head1, head2) = arrow::head_points(start, end, head_size)?;

    let mut pb = PathBuilder::new();

    // Shaft line from start to end
    pb.move_to(start.x, start.y);
    pb.line_to(end.x, end.y);

    // First head line
    pb.move_to(end.x, end.y);
    pb.line_to(head1.x, head1.y);

    // Second head line
    pb.move_to(end.x, end.y);
    pb.line_to(head2.x, head2.y);

    pb.finish()
}

/// Build an ellipse path using cubic bezier curves
fn build_ellipse_path(cx: f32, cy: f32, rx: f32, ry: f32) -> Option<tiny_skia::Path> {
    let kx = rx * shape::BEZIER_K;
    let ky = ry * shape::BEZIER_K;

    let mut pb = PathBuilder::new();

    // Start at top
    pb.move_to(cx, cy - ry);

    // Top to right
    pb.cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);

    // Right to bottom
    pb.cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);

    // Bottom to left
    pb.cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);

    // Left to top
    pb.cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);

    pb.close();
    pb.finish()
}

/// Placement of an item's local space on the canvas
pub fn item_transform(item: &Item) -> Transform {
    let local = Transform::from_translate(item.x, item.y).pre_scale(item.scale, item.scale);
    if item.rotation.abs() < f32::EPSILON {
        return local;
    }
    match item.bounds() {
        Some(b) => {
            let cx = (b.min.x + b.max.x) * 0.5;
            let cy = (b.min.y + b.max.y) * 0.5;
            Transform::from_rotate_at(item.rotation, cx, cy).pre_concat(local)
        }
        None => local,
    }
}

/// Draw `source` stretched into the rectangle `(x, y, width, height)` of local space
#[allow(clippy::too_many_arguments)]
pub fn draw_image_rect(
    pixmap: &mut Pixmap,
    source: &RgbaImage,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    opacity: f32,
    transform: Transform,
) {
    if source.width() == 0 || source.height() == 0 || width <= 0.0 || height <= 0.0 {
        return;
    }
    let Some(src) = to_pixmap(source) else {
        return;
    };
    let paint = PixmapPaint {
        opacity: opacity.clamp(0.0, 1.0),
        quality: FilterQuality::Bilinear,
        ..Default::default()
    };
    let placement = transform
        .pre_translate(x, y)
        .pre_scale(width / source.width() as f32, height / source.height() as f32);
    pixmap.draw_pixmap(0, 0, src.as_ref(), &paint, placement, None);
}

fn draw_image_layer(pixmap: &mut Pixmap, layer: &ImageLayer, opacity: f32, ts: Transform) {
    draw_image_rect(
        pixmap,
        &layer.source,
        0.0,
        0.0,
        layer.width,
        layer.height,
        opacity,
        ts,
    );
}

#[allow(clippy::too_many_arguments)]
fn draw_magnifier(
    pixmap: &mut Pixmap,
    backdrop: &Pixmap,
    item: &Item,
    radius: f32,
    zoom: f32,
    target: Point,
    border: (ShapeColor, f32),
    ts: Transform,
) {
    let Some(lens) = PathBuilder::from_circle(0.0, 0.0, radius.max(1.0)) else {
        return;
    };
    // Lens-local point l shows the backdrop at target + l / zoom
    let focus = item.origin() + target;
    let zoom = zoom.max(0.1);
    let pattern_ts = Transform::from_scale(zoom, zoom).pre_translate(-focus.x, -focus.y);
    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.shader = Pattern::new(
        backdrop.as_ref(),
        SpreadMode::Pad,
        FilterQuality::Bilinear,
        item.opacity.clamp(0.0, 1.0),
        pattern_ts,
    );
    pixmap.fill_path(&lens, &paint, FillRule::Winding, ts, None);

    let (border_color, border_width) = border;
    if border_width > 0.0 {
        pixmap.stroke_path(
            &lens,
            &solid_paint(border_color, item.opacity),
            &round_stroke(border_width),
            ts,
            None,
        );
    }
}

/// Draw a single item onto `pixmap`.
///
/// `backdrop` is the composited raster without annotations; magnifiers
/// sample from it.
pub fn draw_item(
    pixmap: &mut Pixmap,
    backdrop: &Pixmap,
    item: &Item,
    fonts: &FontBook,
    options: RenderOptions,
) {
    let ts = item_transform(item);
    let opacity = item.opacity;
    match &item.kind {
        ItemKind::Arrow {
            points,
            color,
            width,
            head_size,
        } => {
            if let Some(path) = build_arrow_path(points[0], points[1], *head_size) {
                pixmap.stroke_path(
                    &path,
                    &solid_paint(*color, opacity),
                    &round_stroke(*width),
                    ts,
                    None,
                );
            }
        }
        ItemKind::DottedLine {
            points,
            color,
            width,
            dash,
            gap,
            dash_offset,
        } => {
            if let Some(path) = polyline_path(points) {
                let mut stroke = round_stroke(*width);
                stroke.dash = StrokeDash::new(vec![dash.max(0.5), gap.max(0.5)], *dash_offset);
                pixmap.stroke_path(&path, &solid_paint(*color, opacity), &stroke, ts, None);
            }
        }
        ItemKind::FreeLine {
            points,
            color,
            width,
        } => {
            if let Some(path) = polyline_path(points) {
                pixmap.stroke_path(
                    &path,
                    &solid_paint(*color, opacity),
                    &round_stroke(*width),
                    ts,
                    None,
                );
            }
        }
        ItemKind::Ellipse {
            width,
            height,
            color,
            stroke_width,
            fill,
        } => {
            let (cx, cy, rx, ry) = ellipse_from_bounds(0.0, 0.0, *width, *height);
            if let Some(path) = build_ellipse_path(cx, cy, rx, ry) {
                if let Some(fill) = fill {
                    pixmap.fill_path(
                        &path,
                        &solid_paint(*fill, opacity),
                        FillRule::Winding,
                        ts,
                        None,
                    );
                }
                pixmap.stroke_path(
                    &path,
                    &solid_paint(*color, opacity),
                    &round_stroke(*stroke_width),
                    ts,
                    None,
                );
            }
        }
        ItemKind::Text {
            content,
            font,
            fill,
        } => {
            let Some(face) = fonts.resolve(&font.family) else {
                log::debug!("No font loaded for text item {}, skipping", item.id);
                return;
            };
            if let Some(rendered) = text::rasterize_text(face, content, font, *fill) {
                let paint = PixmapPaint {
                    opacity: opacity.clamp(0.0, 1.0),
                    quality: FilterQuality::Bilinear,
                    ..Default::default()
                };
                pixmap.draw_pixmap(
                    rendered.off_x,
                    rendered.off_y,
                    rendered.pixmap.as_ref(),
                    &paint,
                    ts,
                    None,
                );
            }
        }
        ItemKind::LogoImage(layer) | ItemKind::PhotoImage(layer) => {
            draw_image_layer(pixmap, layer, opacity, ts);
        }
        ItemKind::Magnifier {
            radius,
            zoom,
            target,
            border_color,
            border_width,
        } => draw_magnifier(
            pixmap,
            backdrop,
            item,
            *radius,
            *zoom,
            *target,
            (*border_color, *border_width),
            ts,
        ),
        ItemKind::AIEraseStroke(stroke) if options.show_erase_overlay => {
            let [r, g, b, a] = ERASE_OVERLAY;
            let color = ShapeColor::from_rgba8(r, g, b, a);
            match stroke.points.as_slice() {
                [] => {}
                [single] => {
                    if let Some(dot) =
                        PathBuilder::from_circle(single.x, single.y, stroke.brush_width / 2.0)
                    {
                        pixmap.fill_path(&dot, &solid_paint(color, 1.0), FillRule::Winding, ts, None);
                    }
                }
                points => {
                    if let Some(path) = polyline_path(points) {
                        pixmap.stroke_path(
                            &path,
                            &solid_paint(color, 1.0),
                            &round_stroke(stroke.brush_width),
                            ts,
                            None,
                        );
                    }
                }
            }
        }
        // Blur, mosaic and grayscale regions live in the composited raster
        _ => {}
    }
}

/// Paint `items` over `backdrop` and return the flattened result
pub fn render_scene(
    backdrop: &RgbaImage,
    items: &[Item],
    fonts: &FontBook,
    options: RenderOptions,
) -> RgbaImage {
    let visible: Vec<&Item> = items
        .iter()
        .filter(|item| match item.privacy_effect() {
            None => options.show_annotations,
            Some(PrivacyEffect::AiErase) => options.show_erase_overlay,
            Some(_) => false,
        })
        .collect();
    if visible.is_empty() {
        return backdrop.clone();
    }

    let Some(mut pixmap) = to_pixmap(backdrop) else {
        return backdrop.clone();
    };
    let source = pixmap.clone();
    for item in visible {
        draw_item(&mut pixmap, &source, item, fonts, options);
    }
    to_image(&pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::{ItemId, MIN_BRUSH_WIDTH};

    fn gray(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([120, 120, 120, 255]))
    }

    fn arrow_item() -> Item {
        Item::new(
            ItemId(1),
            Point::new(10.0, 20.0),
            ItemKind::Arrow {
                points: [Point::ZERO, Point::new(40.0, 0.0)],
                color: ShapeColor::rgb(1.0, 0.0, 0.0),
                width: 4.0,
                head_size: 10.0,
            },
        )
    }

    #[test]
    fn pixmap_round_trip_keeps_opaque_pixels() {
        let img = RgbaImage::from_fn(4, 4, |x, y| image::Rgba([x as u8 * 40, y as u8 * 40, 7, 255]));
        assert_eq!(to_image(&to_pixmap(&img).unwrap()), img);
    }

    #[test]
    fn arrow_is_drawn_relative_to_origin() {
        let out = render_scene(&gray(80, 60), &[arrow_item()], &FontBook::default(), RenderOptions::OUTPUT);
        let shaft = out.get_pixel(30, 20);
        assert!(shaft[0] > 200 && shaft[1] < 60);
        assert_eq!(*out.get_pixel(30, 50), image::Rgba([120, 120, 120, 255]));
    }

    #[test]
    fn hidden_annotations_leave_backdrop() {
        let backdrop = gray(80, 60);
        let out = render_scene(&backdrop, &[arrow_item()], &FontBook::default(), RenderOptions::BACKDROP);
        assert_eq!(out, backdrop);
    }

    #[test]
    fn erase_overlay_only_in_preview() {
        let mut erase = Item::new(
            ItemId(2),
            Point::new(20.0, 20.0),
            ItemKind::privacy(PrivacyEffect::AiErase, MIN_BRUSH_WIDTH * 3.0),
        );
        erase.brush_mut().unwrap().points.push(Point::ZERO);
        let backdrop = gray(40, 40);
        let fonts = FontBook::default();
        assert_eq!(render_scene(&backdrop, &[erase.clone()], &fonts, RenderOptions::OUTPUT), backdrop);
        let preview = render_scene(&backdrop, &[erase], &fonts, RenderOptions::PREVIEW);
        assert_ne!(*preview.get_pixel(20, 20), image::Rgba([120, 120, 120, 255]));
    }

    #[test]
    fn photo_layer_is_scaled_into_place() {
        let red = Arc::new(RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255])));
        let mut layer = ImageLayer::natural(red);
        layer.width = 20.0;
        layer.height = 10.0;
        let item = Item::new(ItemId(3), Point::new(5.0, 5.0), ItemKind::PhotoImage(layer));
        let out = render_scene(&gray(40, 40), &[item], &FontBook::default(), RenderOptions::OUTPUT);
        assert_eq!(out.get_pixel(15, 10)[0], 255);
        assert_eq!(out.get_pixel(30, 30)[0], 120);
    }

    #[test]
    fn magnifier_samples_backdrop() {
        let mut backdrop = gray(60, 60);
        for y in 0..60 {
            for x in 0..30 {
                backdrop.put_pixel(x, y, image::Rgba([0, 0, 255, 255]));
            }
        }
        // Lens centered on the right half, looking at the blue left half
        let item = Item::new(
            ItemId(4),
            Point::new(45.0, 30.0),
            ItemKind::Magnifier {
                radius: 10.0,
                zoom: 2.0,
                target: Point::new(-35.0, 0.0),
                border_color: ShapeColor::WHITE,
                border_width: 0.0,
            },
        );
        let out = render_scene(&backdrop, &[item], &FontBook::default(), RenderOptions::OUTPUT);
        assert_eq!(out.get_pixel(45, 30)[2], 255);
    }
}
