//! Drawable scene items
//!
//! Every item has an origin `(x, y)` in base-image coordinates. Point lists
//! stored inside an item are relative to that origin, so moving an item only
//! ever touches `x` and `y`.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::geometry::{Bounds, Point};
use crate::config::ShapeColor;

/// Smallest brush width accepted for privacy strokes
pub const MIN_BRUSH_WIDTH: f32 = 4.0;

/// Gestures shorter than this (in pixels) are dropped at finalisation
pub const MIN_GESTURE_LENGTH: f32 = 2.0;

/// Stable item identifier, unique within a scene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two item families tracked by separate histories
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Annotations: arrows, lines, shapes, text, images, magnifiers
    General,
    /// Privacy strokes: blur, mosaic, grayscale and AI-erase regions
    Privacy,
}

/// Effect a privacy stroke applies to the region it covers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyEffect {
    Grayscale,
    Blur,
    Mosaic,
    AiErase,
}

impl PrivacyEffect {
    /// Effects composited by the filter pipeline, in compositing order
    pub const COMPOSITED: [PrivacyEffect; 3] = [
        PrivacyEffect::Grayscale,
        PrivacyEffect::Blur,
        PrivacyEffect::Mosaic,
    ];
}

/// Font description for text items
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    pub family: String,
    pub size: f32,
    /// CSS-style weight, 400 regular, 700 bold
    pub weight: u16,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "sans".to_string(),
            size: 32.0,
            weight: 400,
            italic: false,
            underline: false,
            strikethrough: false,
        }
    }
}

impl FontSpec {
    pub fn is_bold(&self) -> bool {
        self.weight >= 600
    }
}

/// Raster placed on the canvas at a given size
#[derive(Clone, Debug, PartialEq)]
pub struct ImageLayer {
    pub source: Arc<RgbaImage>,
    pub width: f32,
    pub height: f32,
}

impl ImageLayer {
    /// Layer at the raster's natural size
    pub fn natural(source: Arc<RgbaImage>) -> Self {
        let (width, height) = source.dimensions();
        Self {
            source,
            width: width as f32,
            height: height as f32,
        }
    }
}

/// Freehand brush path used by privacy strokes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BrushStroke {
    pub points: Vec<Point>,
    pub brush_width: f32,
}

impl BrushStroke {
    pub fn new(brush_width: f32) -> Self {
        Self {
            points: Vec::new(),
            brush_width: brush_width.max(MIN_BRUSH_WIDTH),
        }
    }
}

/// Variant-specific item data
#[derive(Clone, Debug, PartialEq)]
pub enum ItemKind {
    Arrow {
        points: [Point; 2],
        color: ShapeColor,
        width: f32,
        head_size: f32,
    },
    DottedLine {
        points: [Point; 2],
        color: ShapeColor,
        width: f32,
        dash: f32,
        gap: f32,
        dash_offset: f32,
    },
    FreeLine {
        points: Vec<Point>,
        color: ShapeColor,
        width: f32,
    },
    /// Ellipse inscribed in the box from the origin to `(width, height)`
    Ellipse {
        width: f32,
        height: f32,
        color: ShapeColor,
        stroke_width: f32,
        fill: Option<ShapeColor>,
    },
    Text {
        content: String,
        font: FontSpec,
        fill: ShapeColor,
    },
    LogoImage(ImageLayer),
    PhotoImage(ImageLayer),
    /// Circular lens centered on the origin showing `target` enlarged
    Magnifier {
        radius: f32,
        zoom: f32,
        target: Point,
        border_color: ShapeColor,
        border_width: f32,
    },
    PrivacyBlurStroke(BrushStroke),
    PrivacyMosaicStroke(BrushStroke),
    GrayscaleStroke(BrushStroke),
    AIEraseStroke(BrushStroke),
}

impl ItemKind {
    /// Empty privacy stroke for the given effect
    pub fn privacy(effect: PrivacyEffect, brush_width: f32) -> Self {
        let stroke = BrushStroke::new(brush_width);
        match effect {
            PrivacyEffect::Blur => Self::PrivacyBlurStroke(stroke),
            PrivacyEffect::Mosaic => Self::PrivacyMosaicStroke(stroke),
            PrivacyEffect::Grayscale => Self::GrayscaleStroke(stroke),
            PrivacyEffect::AiErase => Self::AIEraseStroke(stroke),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Arrow { .. } => "arrow",
            Self::DottedLine { .. } => "dotted line",
            Self::FreeLine { .. } => "free line",
            Self::Ellipse { .. } => "ellipse",
            Self::Text { .. } => "text",
            Self::LogoImage(_) => "logo",
            Self::PhotoImage(_) => "photo",
            Self::Magnifier { .. } => "magnifier",
            Self::PrivacyBlurStroke(_) => "blur stroke",
            Self::PrivacyMosaicStroke(_) => "mosaic stroke",
            Self::GrayscaleStroke(_) => "grayscale stroke",
            Self::AIEraseStroke(_) => "erase stroke",
        }
    }
}

/// A drawable element of the scene
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub x: f32,
    pub y: f32,
    pub opacity: f32,
    /// Rotation in degrees around the item's bounds center
    pub rotation: f32,
    /// Transient render scale, baked into the geometry when a gesture ends
    pub scale: f32,
    pub kind: ItemKind,
}

impl Item {
    pub fn new(id: ItemId, origin: Point, kind: ItemKind) -> Self {
        Self {
            id,
            x: origin.x,
            y: origin.y,
            opacity: 1.0,
            rotation: 0.0,
            scale: 1.0,
            kind,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn family(&self) -> Family {
        if self.privacy_effect().is_some() {
            Family::Privacy
        } else {
            Family::General
        }
    }

    pub fn privacy_effect(&self) -> Option<PrivacyEffect> {
        match &self.kind {
            ItemKind::PrivacyBlurStroke(_) => Some(PrivacyEffect::Blur),
            ItemKind::PrivacyMosaicStroke(_) => Some(PrivacyEffect::Mosaic),
            ItemKind::GrayscaleStroke(_) => Some(PrivacyEffect::Grayscale),
            ItemKind::AIEraseStroke(_) => Some(PrivacyEffect::AiErase),
            _ => None,
        }
    }

    pub fn brush(&self) -> Option<&BrushStroke> {
        match &self.kind {
            ItemKind::PrivacyBlurStroke(s)
            | ItemKind::PrivacyMosaicStroke(s)
            | ItemKind::GrayscaleStroke(s)
            | ItemKind::AIEraseStroke(s) => Some(s),
            _ => None,
        }
    }

    pub fn brush_mut(&mut self) -> Option<&mut BrushStroke> {
        match &mut self.kind {
            ItemKind::PrivacyBlurStroke(s)
            | ItemKind::PrivacyMosaicStroke(s)
            | ItemKind::GrayscaleStroke(s)
            | ItemKind::AIEraseStroke(s) => Some(s),
            _ => None,
        }
    }

    /// Items that support move and resize in the select tool
    pub fn is_transformable(&self) -> bool {
        matches!(
            self.kind,
            ItemKind::Text { .. }
                | ItemKind::LogoImage(_)
                | ItemKind::PhotoImage(_)
                | ItemKind::Magnifier { .. }
        )
    }

    /// Relative points of line-like items, if any
    pub fn points(&self) -> Option<&[Point]> {
        match &self.kind {
            ItemKind::Arrow { points, .. } | ItemKind::DottedLine { points, .. } => Some(points),
            ItemKind::FreeLine { points, .. } => Some(points),
            _ => self.brush().map(|s| s.points.as_slice()),
        }
    }

    /// Points translated into canvas coordinates
    pub fn absolute_points(&self) -> Vec<Point> {
        let origin = self.origin();
        self.points()
            .map(|pts| pts.iter().map(|p| *p + origin).collect())
            .unwrap_or_default()
    }

    /// Whether the finished gesture produced nothing worth keeping
    pub fn is_degenerate(&self) -> bool {
        match &self.kind {
            ItemKind::FreeLine { points, .. } => points.len() < 2,
            ItemKind::Arrow { points, .. } | ItemKind::DottedLine { points, .. } => {
                points[0].distance(points[1]) < MIN_GESTURE_LENGTH
            }
            ItemKind::Ellipse { width, height, .. } => {
                width.abs() < MIN_GESTURE_LENGTH || height.abs() < MIN_GESTURE_LENGTH
            }
            ItemKind::PrivacyBlurStroke(s)
            | ItemKind::PrivacyMosaicStroke(s)
            | ItemKind::GrayscaleStroke(s)
            | ItemKind::AIEraseStroke(s) => s.points.is_empty(),
            _ => false,
        }
    }

    /// Flip negative ellipse extents produced by up/left drags
    pub fn normalize(&mut self) {
        if let ItemKind::Ellipse { width, height, .. } = &mut self.kind {
            if *width < 0.0 {
                self.x += *width;
                *width = -*width;
            }
            if *height < 0.0 {
                self.y += *height;
                *height = -*height;
            }
        }
    }

    /// Size of box-like items before the transient scale is applied
    fn extent(&self) -> Option<(f32, f32)> {
        match &self.kind {
            ItemKind::Ellipse { width, height, .. } => Some((*width, *height)),
            ItemKind::LogoImage(layer) | ItemKind::PhotoImage(layer) => {
                Some((layer.width, layer.height))
            }
            ItemKind::Text { content, font, .. } => Some(estimate_text_extent(content, font.size)),
            _ => None,
        }
    }

    /// Axis-aligned bounds in canvas coordinates, including stroke width
    pub fn bounds(&self) -> Option<Bounds> {
        let origin = self.origin();
        match &self.kind {
            ItemKind::Magnifier {
                radius,
                border_width,
                ..
            } => {
                let r = radius * self.scale + border_width * 0.5;
                Some(Bounds {
                    min: Point::new(origin.x - r, origin.y - r),
                    max: Point::new(origin.x + r, origin.y + r),
                })
            }
            _ => {
                if let Some((w, h)) = self.extent() {
                    return Bounds::from_points([
                        origin,
                        Point::new(origin.x + w * self.scale, origin.y + h * self.scale),
                    ]);
                }
                let pad = match &self.kind {
                    ItemKind::Arrow {
                        width, head_size, ..
                    } => width.max(*head_size) * 0.5,
                    ItemKind::DottedLine { width, .. } | ItemKind::FreeLine { width, .. } => {
                        width * 0.5
                    }
                    _ => self.brush().map(|s| s.brush_width * 0.5).unwrap_or(0.0),
                };
                Bounds::from_points(self.absolute_points()).map(|b| b.expand(pad))
            }
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        self.bounds().is_some_and(|b| b.contains(p))
    }

    /// Bake the transient scale into the item's geometry and reset it to 1
    pub fn bake_scale(&mut self) {
        let s = self.scale;
        if (s - 1.0).abs() < f32::EPSILON {
            self.scale = 1.0;
            return;
        }
        match &mut self.kind {
            ItemKind::LogoImage(layer) | ItemKind::PhotoImage(layer) => {
                layer.width *= s;
                layer.height *= s;
            }
            ItemKind::Text { font, .. } => font.size *= s,
            ItemKind::Magnifier { radius, .. } => *radius *= s,
            ItemKind::Ellipse { width, height, .. } => {
                *width *= s;
                *height *= s;
            }
            ItemKind::Arrow { points, .. } | ItemKind::DottedLine { points, .. } => {
                for p in points.iter_mut() {
                    *p = p.scale(s);
                }
            }
            ItemKind::FreeLine { points, .. }
            | ItemKind::PrivacyBlurStroke(BrushStroke { points, .. })
            | ItemKind::PrivacyMosaicStroke(BrushStroke { points, .. })
            | ItemKind::GrayscaleStroke(BrushStroke { points, .. })
            | ItemKind::AIEraseStroke(BrushStroke { points, .. }) => {
                for p in points.iter_mut() {
                    *p = p.scale(s);
                }
            }
        }
        self.scale = 1.0;
    }
}

/// Rough text box used for hit testing when no font metrics are at hand
pub fn estimate_text_extent(content: &str, size: f32) -> (f32, f32) {
    let lines: Vec<&str> = content.lines().collect();
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let rows = lines.len().max(1);
    (longest as f32 * size * 0.55, rows as f32 * size * 1.25)
}
