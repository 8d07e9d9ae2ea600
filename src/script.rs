//! JSON editing scripts replayed against an [`Editor`]
//!
//! A script is a list of actions such as
//! `{"action": "tool", "tool": "draw_arrow"}` or
//! `{"action": "drag", "from": [10, 10], "to": [120, 80]}`.
//! Time only moves forward through `wait`, so debounced work behaves the
//! same on every run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Deserialize;

use dentlens::capture::image::load_base_image;
use dentlens::capture::inpaint::LocalFillInpainter;
use dentlens::domain::{Family, Point, Rect, RotateDirection};
use dentlens::export::LayerImage;
use dentlens::filters::FilterConfig;
use dentlens::session::{Editor, Reorder, Tool};

/// Time between consecutive pointer events of a drag
const DRAG_STEP: Duration = Duration::from_millis(16);

fn default_opacity() -> f32 {
    1.0
}

/// Placement of a before/after layer
#[derive(Debug, Clone, Deserialize)]
pub struct LayerSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Defaults to the canvas size
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub crop: Option<Rect>,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    Tool { tool: Tool },
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up { x: f32, y: f32 },
    Leave,
    /// Pointer down at `from`, a few moves, pointer up at `to`
    Drag {
        from: [f32; 2],
        to: [f32; 2],
        #[serde(default)]
        via: Vec<[f32; 2]>,
    },
    Text { content: String, x: f32, y: f32 },
    Magnifier { x: f32, y: f32 },
    Image {
        path: PathBuf,
        x: f32,
        y: f32,
        #[serde(default)]
        logo: bool,
    },
    Filters { filters: FilterConfig },
    Crop { x: i32, y: i32, width: i32, height: i32 },
    ApplyPendingCrop,
    Rotate { direction: RotateDirection },
    FlipHorizontal,
    FlipVertical,
    Undo { family: Family },
    Redo { family: Family },
    Delete,
    Reorder { op: Reorder },
    Wait { ms: u64 },
    CommitErase,
    BeforeLayer(LayerSpec),
    AfterLayer(LayerSpec),
}

/// Parse a script file
pub fn load(path: &Path) -> Result<Vec<ScriptAction>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read script '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid script '{}'", path.display()))
}

/// Replays actions with a virtual clock; relative paths resolve against `base_dir`
pub struct ScriptRunner {
    now: Instant,
    base_dir: PathBuf,
}

impl ScriptRunner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            now: Instant::now(),
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn read_raster(&self, path: &Path) -> Result<Arc<image::RgbaImage>> {
        let path = self.resolve(path);
        let bytes =
            std::fs::read(&path).with_context(|| format!("could not read '{}'", path.display()))?;
        let raster = load_base_image(&bytes)
            .with_context(|| format!("could not decode '{}'", path.display()))?;
        Ok(Arc::new(raster))
    }

    fn layer(&self, editor: &Editor, spec: &LayerSpec) -> Result<LayerImage> {
        let image = self.read_raster(&spec.path)?;
        let (canvas_w, canvas_h) = editor.scene().display_size();
        Ok(LayerImage {
            image,
            x: spec.x,
            y: spec.y,
            width: spec.width.unwrap_or(canvas_w as f32),
            height: spec.height.unwrap_or(canvas_h as f32),
            crop: spec.crop,
            opacity: spec.opacity.clamp(0.0, 1.0),
        })
    }

    fn step(&mut self, by: Duration) -> Instant {
        self.now += by;
        self.now
    }

    pub async fn run(&mut self, editor: &mut Editor, actions: &[ScriptAction]) -> Result<()> {
        for (index, action) in actions.iter().enumerate() {
            log::debug!("Script action {index}: {action:?}");
            self.apply(editor, action)
                .await
                .with_context(|| format!("script action {} failed", index + 1))?;
            editor.tick(self.now);
        }
        editor.flush_filters();
        Ok(())
    }

    async fn apply(&mut self, editor: &mut Editor, action: &ScriptAction) -> Result<()> {
        let now = self.step(DRAG_STEP);
        match action {
            ScriptAction::Tool { tool } => editor.set_tool(*tool, now),
            ScriptAction::Down { x, y } => editor.on_pointer_down(Point::new(*x, *y), now),
            ScriptAction::Move { x, y } => editor.on_pointer_move(Point::new(*x, *y), now),
            ScriptAction::Up { x, y } => editor.on_pointer_up(Point::new(*x, *y), now),
            ScriptAction::Leave => editor.on_pointer_leave(now),
            ScriptAction::Drag { from, to, via } => {
                let [fx, fy] = *from;
                let [tx, ty] = *to;
                editor.on_pointer_down(Point::new(fx, fy), now);
                for [x, y] in via {
                    let now = self.step(DRAG_STEP);
                    editor.on_pointer_move(Point::new(*x, *y), now);
                }
                let now = self.step(DRAG_STEP);
                editor.on_pointer_move(Point::new(tx, ty), now);
                editor.on_pointer_up(Point::new(tx, ty), now);
            }
            ScriptAction::Text { content, x, y } => {
                editor.add_text(content.clone(), Point::new(*x, *y));
            }
            ScriptAction::Magnifier { x, y } => {
                editor.add_magnifier(Point::new(*x, *y));
            }
            ScriptAction::Image { path, x, y, logo } => {
                let raster = self.read_raster(path)?;
                editor.add_image(raster, Point::new(*x, *y), *logo);
            }
            ScriptAction::Filters { filters } => editor.set_filters(filters.clone(), now),
            ScriptAction::Crop {
                x,
                y,
                width,
                height,
            } => editor.apply_crop(Rect::from_xywh(*x, *y, *width, *height), now)?,
            ScriptAction::ApplyPendingCrop => {
                if !editor.apply_pending_crop(now)? {
                    log::warn!("No crop rectangle drawn; nothing to apply");
                }
            }
            ScriptAction::Rotate { direction } => editor.rotate_bg(*direction, now),
            ScriptAction::FlipHorizontal => editor.flip_horizontal(now),
            ScriptAction::FlipVertical => editor.flip_vertical(now),
            ScriptAction::Undo { family } => {
                let done = match family {
                    Family::General => editor.undo_general(now),
                    Family::Privacy => editor.undo_privacy(now),
                };
                if !done {
                    log::warn!("Nothing to undo");
                }
            }
            ScriptAction::Redo { family } => {
                let done = match family {
                    Family::General => editor.redo_general(now),
                    Family::Privacy => editor.redo_privacy(now),
                };
                if !done {
                    log::warn!("Nothing to redo");
                }
            }
            ScriptAction::Delete => {
                if editor.delete_selected(now).is_none() {
                    log::warn!("Nothing selected to delete");
                }
            }
            ScriptAction::Reorder { op } => {
                editor.reorder_selected(*op);
            }
            ScriptAction::Wait { ms } => {
                self.step(Duration::from_millis(*ms));
            }
            ScriptAction::CommitErase => {
                editor.commit_ai_erase(&LocalFillInpainter::default()).await?;
            }
            ScriptAction::BeforeLayer(spec) => {
                let layer = self.layer(editor, spec)?;
                editor.set_before_layer(Some(layer));
            }
            ScriptAction::AfterLayer(spec) => {
                let layer = self.layer(editor, spec)?;
                editor.set_after_layer(Some(layer));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentlens::config::EditorConfig;
    use dentlens::domain::ItemKind;

    fn editor() -> Editor {
        let base = image::RgbaImage::from_pixel(120, 90, image::Rgba([90, 90, 90, 255]));
        Editor::new(base, EditorConfig::default())
    }

    #[test]
    fn parses_tagged_actions() {
        let json = r#"[
            {"action": "tool", "tool": "draw_arrow"},
            {"action": "drag", "from": [10, 10], "to": [60, 40]},
            {"action": "undo", "family": "general"},
            {"action": "rotate", "direction": "clockwise"},
            {"action": "wait", "ms": 500},
            {"action": "before_layer", "path": "before.png"}
        ]"#;
        let actions: Vec<ScriptAction> = serde_json::from_str(json).unwrap();
        assert_eq!(actions.len(), 6);
        let ScriptAction::BeforeLayer(spec) = &actions[5] else {
            panic!("expected a layer action");
        };
        assert_eq!(spec.opacity, 1.0);
        assert!(spec.width.is_none());
    }

    #[tokio::test]
    async fn drag_draws_an_arrow() {
        let mut editor = editor();
        let actions = vec![
            ScriptAction::Tool {
                tool: Tool::DrawArrow,
            },
            ScriptAction::Drag {
                from: [10.0, 10.0],
                to: [60.0, 40.0],
                via: vec![[30.0, 20.0]],
            },
        ];
        ScriptRunner::new(".").run(&mut editor, &actions).await.unwrap();
        let items = editor.scene().items();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0].kind, ItemKind::Arrow { .. }));
    }

    #[tokio::test]
    async fn failing_action_is_reported_with_its_position() {
        let mut editor = editor();
        let actions = vec![
            ScriptAction::Wait { ms: 10 },
            ScriptAction::Crop {
                x: 0,
                y: 0,
                width: 5,
                height: 5,
            },
        ];
        let err = ScriptRunner::new(".")
            .run(&mut editor, &actions)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("script action 2"));
    }
}
