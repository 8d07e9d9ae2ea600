//! Editing tools and in-progress gesture state

use serde::{Deserialize, Serialize};

use crate::domain::{Item, ItemId, Point, PrivacyEffect};

/// Radius around a resize handle that still counts as a hit
pub const HANDLE_RADIUS: f32 = 10.0;

/// Smallest scale a resize gesture may reach
pub const MIN_RESIZE_SCALE: f32 = 0.05;

/// The active editing tool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Select,
    DrawArrow,
    DrawDottedLine,
    DrawFreeLine,
    DrawEllipse,
    PlaceText,
    PlaceMagnifier,
    BrushBlur,
    BrushMosaic,
    BrushGrayscale,
    #[serde(rename = "brush_ai_erase")]
    BrushAIErase,
    Crop,
}

impl Tool {
    /// Tools that return to `Select` after one use
    pub fn is_single_shot(self) -> bool {
        matches!(self, Tool::PlaceText | Tool::PlaceMagnifier)
    }

    /// The privacy effect painted by brush tools
    pub fn privacy_effect(self) -> Option<PrivacyEffect> {
        match self {
            Tool::BrushBlur => Some(PrivacyEffect::Blur),
            Tool::BrushMosaic => Some(PrivacyEffect::Mosaic),
            Tool::BrushGrayscale => Some(PrivacyEffect::Grayscale),
            Tool::BrushAIErase => Some(PrivacyEffect::AiErase),
            _ => None,
        }
    }
}

/// State of the pointer gesture currently in progress
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    /// A new item is being drawn
    Drawing { id: ItemId, start: Point },
    /// A selected item follows the pointer
    Moving {
        id: ItemId,
        grab: Point,
        start_origin: Point,
        before: Vec<Item>,
    },
    /// A selected item is scaled about its origin
    Resizing {
        id: ItemId,
        grab: Point,
        before: Vec<Item>,
    },
    /// A crop rectangle is being dragged out
    Cropping { start: Point, current: Point },
}

impl Gesture {
    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }
}

/// Resize handle of a transformable item: the bottom-right corner of its bounds
pub fn resize_handle(item: &Item) -> Option<Point> {
    item.bounds().map(|b| b.max)
}

pub fn hits_resize_handle(item: &Item, p: Point) -> bool {
    item.is_transformable() && resize_handle(item).is_some_and(|h| h.distance(p) <= HANDLE_RADIUS)
}

/// Scale factor for a resize that started at `grab` and is now at `current`,
/// measured from the item's origin
pub fn resize_scale(origin: Point, grab: Point, current: Point) -> f32 {
    let start = grab.distance(origin);
    if start < f32::EPSILON {
        return 1.0;
    }
    (current.distance(origin) / start).max(MIN_RESIZE_SCALE)
}
