//! The editor: tool state machine driving the scene, histories and pipeline
//!
//! All mutation flows through here. Pointer events arrive with an explicit
//! `Instant` so that history coalescing and the filter debounce can be driven
//! deterministically; hosts call [`Editor::tick`] to let a pending filter
//! recompute fire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use image::RgbaImage;

use super::crop;
use super::history::History;
use super::scene::{Reorder, Scene};
use super::tools::{Gesture, Tool, hits_resize_handle, resize_scale};
use crate::capture::image::{BaseImage, encode_png};
use crate::capture::inpaint::{InpaintProvider, InpaintRequest};
use crate::config::{EditorConfig, StyleDefaults};
use crate::domain::{
    Family, FontSpec, ImageLayer, Item, ItemId, ItemKind, MIN_BRUSH_WIDTH, Point, PrivacyEffect,
    Rect, RotateDirection,
};
use crate::error::{EditorError, EditorResult};
use crate::export::before_after::{BeforeAfterLayers, LayerImage};
use crate::export::encoder::FrameEncoder;
use crate::export::{self, ExportMode, ExportSettings, ExportSource, ExportStatus};
use crate::filters::{Debouncer, FilterConfig, mask, pipeline};
use crate::render::{FontBook, RenderOptions, render_scene};

/// Free-line and brush points closer than this to the previous one are skipped
const MIN_POINT_SPACING: f32 = 0.5;

pub struct Editor {
    config: EditorConfig,
    scene: Scene,
    history: History,
    tool: Tool,
    gesture: Gesture,
    selection: Option<ItemId>,
    pending_crop: Option<Rect>,
    text_draft: String,
    debouncer: Debouncer,
    composited: Arc<RgbaImage>,
    fonts: FontBook,
    layers: BeforeAfterLayers,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("tool", &self.tool)
            .field("gesture", &self.gesture)
            .field("selection", &self.selection)
            .field("items", &self.scene.items().len())
            .field("canvas", &self.scene.display_size())
            .finish()
    }
}

impl Editor {
    pub fn new(base: RgbaImage, config: EditorConfig) -> Self {
        let fonts = FontBook::from_config(&config);
        let base = Arc::new(base);
        Self {
            history: History::new(
                config.history_cap,
                Duration::from_millis(config.coalesce_window_ms),
            ),
            debouncer: Debouncer::new(Duration::from_millis(config.filter_debounce_ms)),
            scene: Scene::new(Arc::clone(&base)),
            composited: base,
            config,
            tool: Tool::Select,
            gesture: Gesture::Idle,
            selection: None,
            pending_crop: None,
            text_draft: "Text".to_string(),
            fonts,
            layers: BeforeAfterLayers::default(),
        }
    }

    /// Decode uploaded bytes and open them for editing
    pub fn from_bytes(bytes: &[u8], config: EditorConfig) -> EditorResult<Self> {
        let base = BaseImage::decode(bytes)?;
        let rgba = Arc::try_unwrap(base.rgba).unwrap_or_else(|shared| (*shared).clone());
        Ok(Self::new(rgba, config))
    }

    /// Replace the loaded fonts, mostly useful for embedding hosts
    pub fn with_fonts(mut self, fonts: FontBook) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn selection(&self) -> Option<ItemId> {
        self.selection
    }

    pub fn pending_crop(&self) -> Option<Rect> {
        self.pending_crop
    }

    pub fn style(&self) -> &StyleDefaults {
        &self.config.style
    }

    pub fn set_style(&mut self, style: StyleDefaults) {
        self.config.style = style;
    }

    /// Content used by the next `PlaceText` click
    pub fn set_text_draft(&mut self, content: impl Into<String>) {
        self.text_draft = content.into();
    }

    // Filter pipeline

    /// Latest composited raster; may lag behind until the debounce fires
    pub fn composited(&self) -> &Arc<RgbaImage> {
        &self.composited
    }

    pub fn filters_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    fn mark_dirty(&mut self, now: Instant) {
        self.debouncer.schedule(now);
    }

    fn recompute(&mut self) {
        let started = Instant::now();
        self.composited = pipeline::composite(
            self.scene.base_raster(),
            self.scene.transform(),
            self.scene.filters(),
            self.scene.items(),
        );
        log::debug!("Recomputed composited raster in {:?}", started.elapsed());
    }

    /// Let a pending recompute fire. Returns true if it ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.debouncer.poll(now) {
            self.recompute();
            true
        } else {
            false
        }
    }

    /// Recompute immediately, dropping any pending deadline
    pub fn flush_filters(&mut self) {
        self.debouncer.cancel();
        self.recompute();
    }

    pub fn set_filters(&mut self, filters: FilterConfig, now: Instant) {
        self.scene.set_filters(filters);
        self.mark_dirty(now);
    }

    // Tools and gestures

    /// Switch tools, cancelling whatever gesture is in progress
    pub fn set_tool(&mut self, tool: Tool, now: Instant) {
        self.cancel_gesture(now);
        if tool != Tool::Crop {
            self.pending_crop = None;
        }
        self.tool = tool;
    }

    fn cancel_gesture(&mut self, now: Instant) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle | Gesture::Cropping { .. } => {}
            Gesture::Drawing { id, .. } => {
                if let Some(item) = self.scene.remove_item(id) {
                    let family = item.family();
                    self.history.discard_last(family);
                    if family == Family::Privacy {
                        self.mark_dirty(now);
                    }
                }
            }
            Gesture::Moving { before, .. } | Gesture::Resizing { before, .. } => {
                self.scene.replace_family(Family::General, before);
            }
        }
    }

    fn new_item_kind(&self, tool: Tool) -> Option<ItemKind> {
        let style = &self.config.style;
        let kind = match tool {
            Tool::DrawArrow => ItemKind::Arrow {
                points: [Point::ZERO, Point::ZERO],
                color: style.shape_color,
                width: style.stroke_width,
                head_size: style.arrow_head_size,
            },
            Tool::DrawDottedLine => ItemKind::DottedLine {
                points: [Point::ZERO, Point::ZERO],
                color: style.shape_color,
                width: style.stroke_width,
                dash: style.dash,
                gap: style.gap,
                dash_offset: 0.0,
            },
            Tool::DrawFreeLine => ItemKind::FreeLine {
                points: vec![Point::ZERO],
                color: style.shape_color,
                width: style.stroke_width,
            },
            Tool::DrawEllipse => ItemKind::Ellipse {
                width: 0.0,
                height: 0.0,
                color: style.shape_color,
                stroke_width: style.stroke_width,
                fill: None,
            },
            _ => {
                let effect = tool.privacy_effect()?;
                let mut kind = ItemKind::privacy(effect, style.brush_width);
                if let ItemKind::PrivacyBlurStroke(s)
                | ItemKind::PrivacyMosaicStroke(s)
                | ItemKind::GrayscaleStroke(s)
                | ItemKind::AIEraseStroke(s) = &mut kind
                {
                    s.points.push(Point::ZERO);
                }
                kind
            }
        };
        Some(kind)
    }

    fn is_composited_stroke(item: &Item) -> bool {
        item.privacy_effect()
            .is_some_and(|effect| effect != PrivacyEffect::AiErase)
    }

    pub fn on_pointer_down(&mut self, p: Point, now: Instant) {
        if !self.gesture.is_idle() {
            self.finish_gesture(now);
        }
        let tool = self.tool;
        if tool.is_single_shot() {
            self.tool = Tool::Select;
        }
        match tool {
            Tool::Select => self.begin_select(p),
            Tool::PlaceText => {
                let content = self.text_draft.clone();
                self.add_text(content, p);
            }
            Tool::PlaceMagnifier => {
                self.add_magnifier(p);
            }
            Tool::Crop => {
                self.pending_crop = None;
                self.gesture = Gesture::Cropping {
                    start: p,
                    current: p,
                };
            }
            tool => {
                let Some(kind) = self.new_item_kind(tool) else {
                    return;
                };
                let family = if tool.privacy_effect().is_some() {
                    Family::Privacy
                } else {
                    Family::General
                };
                self.history
                    .push(family, super::history::Snapshot::new(self.scene.family(family)));
                let id = self.scene.add_item(Item::new(ItemId(0), p, kind));
                if let Some(item) = self.scene.item(id)
                    && Self::is_composited_stroke(item)
                {
                    self.mark_dirty(now);
                }
                self.gesture = Gesture::Drawing { id, start: p };
            }
        }
    }

    fn begin_select(&mut self, p: Point) {
        if let Some(id) = self.selection
            && let Some(item) = self.scene.item(id)
            && hits_resize_handle(item, p)
        {
            self.gesture = Gesture::Resizing {
                id,
                grab: p,
                before: self.scene.family(Family::General),
            };
            return;
        }
        match self.scene.hit_test(p) {
            Some(id) => {
                self.selection = Some(id);
                if let Some(item) = self.scene.item(id)
                    && item.is_transformable()
                {
                    self.gesture = Gesture::Moving {
                        id,
                        grab: p,
                        start_origin: item.origin(),
                        before: self.scene.family(Family::General),
                    };
                }
            }
            None => self.selection = None,
        }
    }

    pub fn on_pointer_move(&mut self, p: Point, now: Instant) {
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Cropping { current, .. } => *current = p,
            Gesture::Drawing { id, .. } => {
                let id = *id;
                let mut composited = false;
                let _ = self.scene.update_item(id, |item| {
                    let rel = p - item.origin();
                    composited = Self::is_composited_stroke(item);
                    match &mut item.kind {
                        ItemKind::Arrow { points, .. } | ItemKind::DottedLine { points, .. } => {
                            points[1] = rel;
                        }
                        ItemKind::Ellipse { width, height, .. } => {
                            *width = rel.x;
                            *height = rel.y;
                        }
                        ItemKind::FreeLine { points, .. } => push_spaced(points, rel),
                        ItemKind::PrivacyBlurStroke(stroke)
                        | ItemKind::PrivacyMosaicStroke(stroke)
                        | ItemKind::GrayscaleStroke(stroke)
                        | ItemKind::AIEraseStroke(stroke) => push_spaced(&mut stroke.points, rel),
                        _ => {}
                    }
                });
                if composited {
                    self.mark_dirty(now);
                }
            }
            Gesture::Moving {
                id,
                grab,
                start_origin,
                ..
            } => {
                let (id, delta, start) = (*id, p - *grab, *start_origin);
                let _ = self.scene.update_item(id, |item| {
                    item.x = start.x + delta.x;
                    item.y = start.y + delta.y;
                });
            }
            Gesture::Resizing { id, grab, .. } => {
                let (id, grab) = (*id, *grab);
                let _ = self.scene.update_item(id, |item| {
                    item.scale = resize_scale(item.origin(), grab, p);
                });
            }
        }
    }

    pub fn on_pointer_up(&mut self, p: Point, now: Instant) {
        self.on_pointer_move(p, now);
        self.finish_gesture(now);
    }

    /// Pointer left the canvas: finalise with the last known position
    pub fn on_pointer_leave(&mut self, now: Instant) {
        self.finish_gesture(now);
    }

    fn finish_gesture(&mut self, now: Instant) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => {}
            Gesture::Cropping { start, current } => {
                self.pending_crop = Some(Rect::spanning(start, current));
            }
            Gesture::Drawing { id, .. } => {
                let Some(item) = self.scene.item(id) else {
                    return;
                };
                let family = item.family();
                let composited = Self::is_composited_stroke(item);
                if item.is_degenerate() {
                    log::debug!("Dropping degenerate {} {}", item.kind.name(), id);
                    self.scene.remove_item(id);
                    self.history.discard_last(family);
                } else {
                    let _ = self.scene.update_item(id, Item::normalize);
                }
                if composited {
                    self.mark_dirty(now);
                }
            }
            Gesture::Moving {
                id,
                start_origin,
                before,
                ..
            } => {
                if self
                    .scene
                    .item(id)
                    .is_some_and(|item| item.origin() != start_origin)
                {
                    self.history.push_general(before);
                }
            }
            Gesture::Resizing { id, before, .. } => {
                let mut changed = false;
                let _ = self.scene.update_item(id, |item| {
                    changed = (item.scale - 1.0).abs() > f32::EPSILON;
                    item.bake_scale();
                });
                if changed {
                    self.history.push_general(before);
                }
            }
        }
    }

    // Item operations

    fn insert_general(&mut self, origin: Point, kind: ItemKind) -> ItemId {
        self.history.push_general(self.scene.family(Family::General));
        let id = self.scene.add_item(Item::new(ItemId(0), origin, kind));
        self.selection = Some(id);
        id
    }

    /// Place a text item with the current text style
    pub fn add_text(&mut self, content: impl Into<String>, at: Point) -> ItemId {
        let style = &self.config.style;
        let kind = ItemKind::Text {
            content: content.into(),
            font: FontSpec {
                family: style.font_family.clone(),
                size: style.font_size,
                ..Default::default()
            },
            fill: style.text_color,
        };
        self.insert_general(at, kind)
    }

    /// Place a magnifier lens centered at `at`, looking at the point under it
    pub fn add_magnifier(&mut self, at: Point) -> ItemId {
        let style = &self.config.style;
        let kind = ItemKind::Magnifier {
            radius: style.magnifier_radius,
            zoom: style.magnifier_zoom,
            target: Point::ZERO,
            border_color: style.shape_color,
            border_width: style.stroke_width,
        };
        self.insert_general(at, kind)
    }

    /// Place a raster (photo or logo) at its natural size
    pub fn add_image(&mut self, raster: Arc<RgbaImage>, at: Point, logo: bool) -> ItemId {
        let layer = ImageLayer::natural(raster);
        let kind = if logo {
            ItemKind::LogoImage(layer)
        } else {
            ItemKind::PhotoImage(layer)
        };
        self.insert_general(at, kind)
    }

    pub fn select(&mut self, id: Option<ItemId>) -> EditorResult<()> {
        if let Some(id) = id
            && self.scene.item(id).is_none()
        {
            return Err(EditorError::UnknownItem(id));
        }
        self.selection = id;
        Ok(())
    }

    /// Property edit on any item; rapid edits to one item share a snapshot
    pub fn edit_item(
        &mut self,
        id: ItemId,
        patch: impl FnOnce(&mut Item),
        now: Instant,
    ) -> EditorResult<()> {
        let family = self
            .scene
            .item(id)
            .map(Item::family)
            .ok_or(EditorError::UnknownItem(id))?;
        let snapshot = self.scene.family(family);
        self.history.push_coalesced(family, snapshot, id, now);
        self.scene.update_item(id, |item| {
            patch(item);
            if let Some(stroke) = item.brush_mut() {
                stroke.brush_width = stroke.brush_width.max(MIN_BRUSH_WIDTH);
            }
        })?;
        if family == Family::Privacy {
            self.mark_dirty(now);
        }
        Ok(())
    }

    /// Slider-style edit of the selected item
    pub fn edit_selected(&mut self, patch: impl FnOnce(&mut Item), now: Instant) -> EditorResult<()> {
        let id = self
            .selection
            .ok_or_else(|| EditorError::invalid_input("nothing selected"))?;
        self.edit_item(id, patch, now)
    }

    pub fn delete_item(&mut self, id: ItemId, now: Instant) -> Option<Item> {
        let family = self.scene.item(id)?.family();
        self.history
            .push(family, super::history::Snapshot::new(self.scene.family(family)));
        let removed = self.scene.remove_item(id);
        if self.selection == Some(id) {
            self.selection = None;
        }
        if family == Family::Privacy {
            self.mark_dirty(now);
        }
        removed
    }

    pub fn delete_selected(&mut self, now: Instant) -> Option<Item> {
        let id = self.selection?;
        self.delete_item(id, now)
    }

    pub fn reorder_selected(&mut self, op: Reorder) -> bool {
        let Some(id) = self.selection else {
            return false;
        };
        let snapshot = self.scene.family(Family::General);
        if self.scene.reorder(id, op) {
            self.history.push_general(snapshot);
            true
        } else {
            false
        }
    }

    // History

    fn restore(&mut self, family: Family, redo: bool, now: Instant) -> bool {
        self.cancel_gesture(now);
        let current = self.scene.family(family);
        let restored = if redo {
            self.history.redo(family, current)
        } else {
            self.history.undo(family, current)
        };
        let Some(items) = restored else {
            return false;
        };
        self.scene.replace_family(family, items);
        if let Some(id) = self.selection
            && self.scene.item(id).is_none()
        {
            self.selection = None;
        }
        if family == Family::Privacy {
            self.mark_dirty(now);
        }
        true
    }

    pub fn undo_general(&mut self, now: Instant) -> bool {
        self.restore(Family::General, false, now)
    }

    pub fn redo_general(&mut self, now: Instant) -> bool {
        self.restore(Family::General, true, now)
    }

    pub fn undo_privacy(&mut self, now: Instant) -> bool {
        self.restore(Family::Privacy, false, now)
    }

    pub fn redo_privacy(&mut self, now: Instant) -> bool {
        self.restore(Family::Privacy, true, now)
    }

    // Crop and transform

    pub fn apply_crop(&mut self, rect: Rect, now: Instant) -> EditorResult<()> {
        self.cancel_gesture(now);
        crop::apply_crop(
            &mut self.scene,
            &mut self.history,
            rect,
            self.config.min_crop_size,
        )?;
        self.pending_crop = None;
        self.flush_filters();
        Ok(())
    }

    /// Apply the rectangle drawn with the crop tool. Returns false if there is none.
    pub fn apply_pending_crop(&mut self, now: Instant) -> EditorResult<bool> {
        let Some(rect) = self.pending_crop else {
            return Ok(false);
        };
        self.apply_crop(rect, now)?;
        self.tool = Tool::Select;
        Ok(true)
    }

    pub fn rotate_bg(&mut self, direction: RotateDirection, now: Instant) {
        crop::rotate_bg(&mut self.scene, direction);
        self.mark_dirty(now);
    }

    pub fn flip_horizontal(&mut self, now: Instant) {
        crop::flip_horizontal(&mut self.scene);
        self.mark_dirty(now);
    }

    pub fn flip_vertical(&mut self, now: Instant) {
        crop::flip_vertical(&mut self.scene);
        self.mark_dirty(now);
    }

    // Rendering

    /// Interactive view: current composited raster, items and erase overlay
    pub fn render_preview(&self) -> RgbaImage {
        render_scene(
            &self.composited,
            self.scene.items(),
            &self.fonts,
            RenderOptions::PREVIEW,
        )
    }

    /// Final still image with up-to-date filters
    pub fn render_output(&mut self) -> RgbaImage {
        self.flush_filters();
        render_scene(
            &self.composited,
            self.scene.items(),
            &self.fonts,
            RenderOptions::OUTPUT,
        )
    }

    /// Final still image encoded as PNG
    pub fn snapshot_png(&mut self) -> EditorResult<Vec<u8>> {
        let image = self.render_output();
        encode_png(&image)
    }

    // AI erase

    /// Send pending erase strokes to `provider` and adopt the returned raster.
    ///
    /// On any failure the base raster and the strokes are left untouched.
    /// Returns false when there was nothing to erase.
    pub async fn commit_ai_erase(&mut self, provider: &dyn InpaintProvider) -> EditorResult<bool> {
        let strokes: Vec<Item> = self
            .scene
            .items()
            .iter()
            .filter(|item| item.privacy_effect() == Some(PrivacyEffect::AiErase))
            .cloned()
            .collect();
        if strokes.is_empty() {
            return Ok(false);
        }

        let base = pipeline::flatten_base(
            self.scene.base_raster(),
            self.scene.transform(),
            &FilterConfig::default(),
        );
        let (width, height) = base.dimensions();
        let mask_image = mask::paint_mask(width, height, strokes.iter());
        if !mask::has_coverage(&mask_image) {
            return Ok(false);
        }

        log::info!("Inpainting {} erase stroke(s)", strokes.len());
        let request = InpaintRequest {
            base_image: Arc::clone(&base),
            mask_image,
        };
        let replaced = match provider.inpaint(request).await {
            Ok(img) => img,
            Err(err) => {
                log::warn!("Inpainting failed: {}", err);
                return Err(err);
            }
        };
        if replaced.dimensions() != (width, height) {
            return Err(EditorError::inpaint(format!(
                "provider returned {:?}, expected {:?}",
                replaced.dimensions(),
                (width, height)
            )));
        }

        self.cancel_gesture(Instant::now());
        self.scene.set_base_raster(Arc::new(replaced));
        self.scene
            .items_mut()
            .retain(|item| item.privacy_effect() != Some(PrivacyEffect::AiErase));
        self.history.clear_family(Family::Privacy);
        self.flush_filters();
        Ok(true)
    }

    // Export

    pub fn before_after_layers(&self) -> &BeforeAfterLayers {
        &self.layers
    }

    pub fn set_before_layer(&mut self, layer: Option<LayerImage>) {
        self.layers.before = layer;
    }

    pub fn set_after_layer(&mut self, layer: Option<LayerImage>) {
        self.layers.after = layer;
    }

    /// Export settings derived from the editor configuration
    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings::from_config(&self.config)
    }

    /// Freeze the current scene for export
    pub fn export_source(&mut self, max_dimension: u32) -> ExportSource {
        self.flush_filters();
        ExportSource::new(
            self.scene.items().to_vec(),
            Arc::clone(&self.composited),
            self.fonts.clone(),
            self.layers.clone(),
            max_dimension,
        )
    }

    /// Render and encode an animated export. The scene is not modified.
    pub async fn export(
        &mut self,
        mode: ExportMode,
        settings: &ExportSettings,
        encoder: Arc<dyn FrameEncoder>,
        progress: Option<Sender<ExportStatus>>,
    ) -> EditorResult<Vec<u8>> {
        let source = self.export_source(settings.max_dimension);
        export::run_export(source, mode, settings, encoder, progress).await
    }
}

fn push_spaced(points: &mut Vec<Point>, p: Point) {
    if points
        .last()
        .is_none_or(|last| last.distance(p) >= MIN_POINT_SPACING)
    {
        points.push(p);
    }
}
