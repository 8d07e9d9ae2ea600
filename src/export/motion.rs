//! Procedural motion export
//!
//! Every frame is a perturbed copy of the scene items. Each animated
//! category follows a sinusoid of phase `2π·i/N`; the amplitude is scaled by
//! the motion strength. The scene itself is never touched, so nothing has to
//! be restored afterwards.

use std::collections::BTreeSet;
use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use super::frames::{ExportSource, FramePlan};
use crate::domain::{Item, ItemKind, Point};
use crate::error::{EditorError, EditorResult};
use crate::render::geometry::arrow;

/// Arrow travel along its own direction at strength 1, in pixels
const ARROW_TRAVEL: f32 = 6.0;
/// Free line jitter at strength 1, in pixels
const FREE_LINE_JITTER: f32 = 2.0;
/// Text bob height at strength 1, in pixels
const TEXT_BOB: f32 = 4.0;
/// Relative scale pulse of ellipses and logos at strength 1
const SCALE_PULSE: f32 = 0.06;

/// Item kinds that can be animated
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum MotionCategory {
    Arrow,
    DashedLine,
    FreeLine,
    Text,
    Logo,
    Ellipse,
}

impl MotionCategory {
    pub const ALL: [MotionCategory; 6] = [
        MotionCategory::Arrow,
        MotionCategory::DashedLine,
        MotionCategory::FreeLine,
        MotionCategory::Text,
        MotionCategory::Logo,
        MotionCategory::Ellipse,
    ];

    pub fn of(item: &Item) -> Option<MotionCategory> {
        match item.kind {
            ItemKind::Arrow { .. } => Some(MotionCategory::Arrow),
            ItemKind::DottedLine { .. } => Some(MotionCategory::DashedLine),
            ItemKind::FreeLine { .. } => Some(MotionCategory::FreeLine),
            ItemKind::Text { .. } => Some(MotionCategory::Text),
            ItemKind::LogoImage(_) => Some(MotionCategory::Logo),
            ItemKind::Ellipse { .. } => Some(MotionCategory::Ellipse),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    pub enabled: BTreeSet<MotionCategory>,
    pub strength: f32,
    pub frames: usize,
    pub frame_delay_ms: u32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            enabled: MotionCategory::ALL.into_iter().collect(),
            strength: 1.0,
            frames: 10,
            frame_delay_ms: 100,
        }
    }
}

impl MotionSettings {
    fn animates(&self, item: &Item) -> bool {
        MotionCategory::of(item).is_some_and(|c| self.enabled.contains(&c))
    }
}

/// Scale `item` by `factor` about the center of its bounds
fn pulse_scale(item: &mut Item, factor: f32) {
    let Some(bounds) = item.bounds() else {
        return;
    };
    let center = Point::new(
        (bounds.min.x + bounds.max.x) * 0.5,
        (bounds.min.y + bounds.max.y) * 0.5,
    );
    let offset = center - item.origin();
    item.scale *= factor;
    item.x += offset.x * (1.0 - factor);
    item.y += offset.y * (1.0 - factor);
}

/// Apply the category perturbation for `phase` to a copy of `item`
pub fn perturb(item: &Item, phase: f32, strength: f32) -> Item {
    let mut out = item.clone();
    let wave = phase.sin();
    let base_opacity = item.opacity;
    match &mut out.kind {
        ItemKind::Arrow { points, .. } => {
            if let Some(dir) = arrow::direction(points[0], points[1]) {
                let travel = wave * ARROW_TRAVEL * strength;
                out.x += dir.x * travel;
                out.y += dir.y * travel;
            }
            out.opacity = base_opacity * (0.7 + 0.3 * (0.5 + 0.5 * phase.cos()));
        }
        ItemKind::DottedLine {
            dash,
            gap,
            dash_offset,
            ..
        } => {
            let period = *dash + *gap;
            *dash_offset -= phase / TAU * period * strength;
        }
        ItemKind::FreeLine { .. } => {
            let jitter = FREE_LINE_JITTER * strength;
            out.x += (2.0 * phase).sin() * jitter;
            out.y += (2.0 * phase).cos() * jitter;
            out.opacity = base_opacity * (0.75 + 0.25 * (0.5 + 0.5 * wave));
        }
        ItemKind::Text { .. } => {
            out.y += wave * TEXT_BOB * strength;
            out.opacity = base_opacity * (0.7 + 0.3 * (0.5 + 0.5 * phase.cos()));
        }
        ItemKind::Ellipse { .. } | ItemKind::LogoImage(_) => {
            out.opacity = base_opacity * (0.8 + 0.2 * (0.5 + 0.5 * phase.cos()));
        }
        _ => {}
    }
    if matches!(out.kind, ItemKind::Ellipse { .. } | ItemKind::LogoImage(_)) {
        pulse_scale(&mut out, 1.0 + SCALE_PULSE * strength * wave);
    }
    out.opacity = out.opacity.clamp(0.0, 1.0);
    out
}

/// Plan `settings.frames` perturbed frames
pub fn plan(source: &ExportSource, settings: &MotionSettings) -> EditorResult<Vec<FramePlan>> {
    if !source.items.iter().any(|item| settings.animates(item)) {
        return Err(EditorError::NoMotionTargets);
    }
    let count = settings.frames.max(1);
    let strength = settings.strength.max(0.0);
    let plans = (0..count)
        .map(|i| {
            let phase = TAU * i as f32 / count as f32;
            let items = source
                .items
                .iter()
                .map(|item| {
                    if settings.animates(item) {
                        perturb(item, phase, strength)
                    } else {
                        item.clone()
                    }
                })
                .collect();
            FramePlan::new(items, settings.frame_delay_ms)
        })
        .collect();
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use image::RgbaImage;

    use crate::config::ShapeColor;
    use crate::domain::ItemId;
    use crate::export::before_after::BeforeAfterLayers;
    use crate::render::FontBook;

    fn source(items: Vec<Item>) -> ExportSource {
        ExportSource::new(
            items,
            Arc::new(RgbaImage::new(100, 100)),
            FontBook::default(),
            BeforeAfterLayers::default(),
            800,
        )
    }

    fn arrow() -> Item {
        Item::new(
            ItemId(1),
            Point::new(20.0, 20.0),
            ItemKind::Arrow {
                points: [Point::ZERO, Point::new(30.0, 0.0)],
                color: ShapeColor::default(),
                width: 3.0,
                head_size: 8.0,
            },
        )
    }

    fn ellipse() -> Item {
        Item::new(
            ItemId(2),
            Point::new(10.0, 10.0),
            ItemKind::Ellipse {
                width: 40.0,
                height: 20.0,
                color: ShapeColor::default(),
                stroke_width: 2.0,
                fill: None,
            },
        )
    }

    fn only(category: MotionCategory) -> MotionSettings {
        MotionSettings {
            enabled: [category].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn nothing_enabled_fails() {
        let settings = MotionSettings {
            enabled: BTreeSet::new(),
            ..Default::default()
        };
        let err = plan(&source(vec![arrow()]), &settings).unwrap_err();
        assert!(matches!(err, EditorError::NoMotionTargets));
    }

    #[test]
    fn enabled_category_without_items_fails() {
        let err = plan(&source(vec![arrow()]), &only(MotionCategory::Text)).unwrap_err();
        assert!(matches!(err, EditorError::NoMotionTargets));
    }

    #[test]
    fn one_item_gives_ten_frames() {
        let plans = plan(&source(vec![arrow()]), &only(MotionCategory::Arrow)).unwrap();
        assert_eq!(plans.len(), 10);
        assert!(plans.iter().all(|p| p.delay_ms == 100));
    }

    #[test]
    fn arrow_travels_along_its_direction() {
        let item = arrow();
        let moved = perturb(&item, TAU / 4.0, 1.0);
        assert!((moved.x - (item.x + ARROW_TRAVEL)).abs() < 1e-4);
        assert!((moved.y - item.y).abs() < 1e-4);
        assert_eq!(moved.points(), item.points());
    }

    #[test]
    fn disabled_items_are_copied_untouched() {
        let plans = plan(&source(vec![arrow(), ellipse()]), &only(MotionCategory::Arrow)).unwrap();
        for p in &plans {
            assert_eq!(p.items[1], ellipse());
        }
    }

    #[test]
    fn ellipse_pulses_about_its_center() {
        let item = ellipse();
        let pulsed = perturb(&item, TAU / 4.0, 1.0);
        assert!((pulsed.scale - (1.0 + SCALE_PULSE)).abs() < 1e-5);
        let (a, b) = (item.bounds().unwrap(), pulsed.bounds().unwrap());
        assert!(((a.min.x + a.max.x) - (b.min.x + b.max.x)).abs() < 1e-3);
        assert!(((a.min.y + a.max.y) - (b.min.y + b.max.y)).abs() < 1e-3);
    }

    #[test]
    fn zero_strength_keeps_geometry() {
        let item = arrow();
        let still = perturb(&item, 1.3, 0.0);
        assert_eq!(still.origin(), item.origin());
    }
}
