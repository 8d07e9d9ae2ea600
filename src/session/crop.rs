//! Crop and background transform operations

use std::sync::Arc;

use crate::domain::{Bounds, Family, Item, Rect, RotateDirection};
use crate::error::{EditorError, EditorResult};
use crate::filters::{FilterConfig, pipeline};

use super::history::History;
use super::scene::Scene;

/// Clamp `rect` to a `width` x `height` canvas
pub fn clamp_to_canvas(rect: Rect, width: u32, height: u32) -> Option<Rect> {
    rect.intersect(Rect::from_xywh(0, 0, width as i32, height as i32))
}

/// Offset that brings `bounds` back to touch the canvas when it lies fully outside
fn pull_back_offset(bounds: Bounds, width: f32, height: f32) -> (f32, f32) {
    let dx = if bounds.max.x < 0.0 {
        -bounds.max.x
    } else if bounds.min.x > width {
        width - bounds.min.x
    } else {
        0.0
    };
    let dy = if bounds.max.y < 0.0 {
        -bounds.max.y
    } else if bounds.min.y > height {
        height - bounds.min.y
    } else {
        0.0
    };
    (dx, dy)
}

/// Shift items into the cropped canvas.
///
/// Annotations that end up fully outside are clamped back to the nearest
/// edge; privacy strokes fully outside are dropped because they would mask
/// nothing.
fn remap_items(items: &mut Vec<Item>, rect: Rect) {
    let (dx, dy) = (rect.left as f32, rect.top as f32);
    let (width, height) = (rect.width() as f32, rect.height() as f32);
    items.retain_mut(|item| {
        item.x -= dx;
        item.y -= dy;
        let Some(bounds) = item.bounds() else {
            return true;
        };
        if bounds.overlaps_canvas(width, height) {
            return true;
        }
        match item.family() {
            Family::Privacy => false,
            Family::General => {
                let (px, py) = pull_back_offset(bounds, width, height);
                item.x += px;
                item.y += py;
                true
            }
        }
    });
}

/// Crop the scene to `rect` (canvas coordinates).
///
/// The new base raster is the old one rendered with its orientation and
/// global filters, so those reset afterwards. Privacy regions stay as strokes
/// and keep compositing over the new base. Both histories are cleared.
pub fn apply_crop(
    scene: &mut Scene,
    history: &mut History,
    rect: Rect,
    min_size: u32,
) -> EditorResult<()> {
    let (canvas_w, canvas_h) = scene.display_size();
    let clamped = clamp_to_canvas(rect, canvas_w, canvas_h);
    let (width, height) = clamped
        .map(|r| (r.width() as u32, r.height() as u32))
        .unwrap_or((0, 0));
    let Some(clamped) = clamped.filter(|_| width >= min_size && height >= min_size) else {
        return Err(EditorError::CropTooSmall {
            width,
            height,
            min: min_size,
        });
    };

    let flattened = pipeline::flatten_base(scene.base_raster(), scene.transform(), scene.filters());
    let cropped = image::imageops::crop_imm(
        flattened.as_ref(),
        clamped.left as u32,
        clamped.top as u32,
        width,
        height,
    )
    .to_image();

    scene.set_base_raster(Arc::new(cropped));
    scene.set_filters(FilterConfig::default());
    remap_items(scene.items_mut(), clamped);
    history.clear();

    log::info!(
        "Cropped canvas from {}x{} to {}x{} at ({}, {})",
        canvas_w,
        canvas_h,
        width,
        height,
        clamped.left,
        clamped.top
    );
    Ok(())
}

/// Rotate the background a quarter turn; item coordinates are untouched
pub fn rotate_bg(scene: &mut Scene, direction: RotateDirection) {
    scene.set_transform(scene.transform().rotated(direction));
}

pub fn flip_horizontal(scene: &mut Scene) {
    let mut t = scene.transform();
    t.flip_x = !t.flip_x;
    scene.set_transform(t);
}

pub fn flip_vertical(scene: &mut Scene) {
    let mut t = scene.transform();
    t.flip_y = !t.flip_y;
    scene.set_transform(t);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use image::RgbaImage;

    use crate::config::ShapeColor;
    use crate::domain::{ItemId, ItemKind, Point, PrivacyEffect};

    fn setup() -> (Scene, History) {
        let base = RgbaImage::from_fn(200, 150, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        (
            Scene::new(Arc::new(base)),
            History::new(20, Duration::from_millis(250)),
        )
    }

    fn arrow(at: Point) -> Item {
        Item::new(
            ItemId(0),
            at,
            ItemKind::Arrow {
                points: [Point::ZERO, Point::new(10.0, 0.0)],
                color: ShapeColor::default(),
                width: 2.0,
                head_size: 4.0,
            },
        )
    }

    #[test]
    fn crop_shifts_origins_only() {
        let (mut scene, mut history) = setup();
        let id = scene.add_item(arrow(Point::new(15.0, 15.0)));
        history.push_general(Vec::new());
        apply_crop(&mut scene, &mut history, Rect::from_xywh(10, 10, 100, 80), 20).unwrap();

        let item = scene.item(id).unwrap();
        assert_eq!(item.origin(), Point::new(5.0, 5.0));
        assert_eq!(item.points().unwrap()[1], Point::new(10.0, 0.0));
        assert_eq!(scene.display_size(), (100, 80));
        assert_eq!(*scene.base_raster().get_pixel(0, 0), image::Rgba([10, 10, 0, 255]));
        assert!(!history.can_undo(Family::General));
    }

    #[test]
    fn tiny_crop_is_rejected_without_changes() {
        let (mut scene, mut history) = setup();
        let id = scene.add_item(arrow(Point::new(15.0, 15.0)));
        history.push_general(Vec::new());
        let err = apply_crop(&mut scene, &mut history, Rect::from_xywh(0, 0, 10, 10), 20).unwrap_err();
        assert!(matches!(err, EditorError::CropTooSmall { width: 10, height: 10, min: 20 }));
        assert_eq!(scene.item(id).unwrap().origin(), Point::new(15.0, 15.0));
        assert_eq!(scene.display_size(), (200, 150));
        assert!(history.can_undo(Family::General));
    }

    #[test]
    fn crop_is_clamped_to_canvas_before_measuring() {
        let (mut scene, mut history) = setup();
        let err = apply_crop(&mut scene, &mut history, Rect::from_xywh(190, 0, 100, 100), 20);
        assert!(matches!(err, Err(EditorError::CropTooSmall { width: 10, .. })));
    }

    #[test]
    fn outside_items_are_clamped_and_strokes_dropped() {
        let (mut scene, mut history) = setup();
        let far = scene.add_item(arrow(Point::new(180.0, 140.0)));
        let mut stroke = Item::new(
            ItemId(0),
            Point::new(180.0, 140.0),
            ItemKind::privacy(PrivacyEffect::Blur, 6.0),
        );
        stroke.brush_mut().unwrap().points.push(Point::ZERO);
        scene.add_item(stroke);

        apply_crop(&mut scene, &mut history, Rect::from_xywh(0, 0, 50, 50), 20).unwrap();
        assert_eq!(scene.items().len(), 1);
        let bounds = scene.item(far).unwrap().bounds().unwrap();
        assert!(bounds.overlaps_canvas(50.0, 50.0));
    }

    #[test]
    fn crop_bakes_orientation_and_filters() {
        let (mut scene, mut history) = setup();
        rotate_bg(&mut scene, RotateDirection::Clockwise);
        scene.set_filters(FilterConfig {
            grayscale: true,
            ..Default::default()
        });
        assert_eq!(scene.display_size(), (150, 200));
        apply_crop(&mut scene, &mut history, Rect::from_xywh(0, 0, 150, 100), 20).unwrap();
        assert!(scene.transform().is_identity());
        assert!(scene.filters().is_identity());
        let px = scene.base_raster().get_pixel(5, 5);
        assert_eq!(px[0], px[1]);
    }

    #[test]
    fn flips_toggle() {
        let (mut scene, _) = setup();
        flip_horizontal(&mut scene);
        flip_vertical(&mut scene);
        assert!(scene.transform().flip_x && scene.transform().flip_y);
        flip_horizontal(&mut scene);
        assert!(!scene.transform().flip_x);
    }
}
