use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dentlens::config::EditorConfig;
use dentlens::domain::Point;
use dentlens::export::before_after::{dissolve_frame_count, dissolve_ratios, ease};
use dentlens::export::{
    ApngEncoder, ExportMode, ExportSettings, ExportStatus, FrameEncoder, GifEncoder, LayerImage,
    MotionCategory,
};
use dentlens::session::{Editor, Tool};
use dentlens::EditorError;

fn editor() -> Editor {
    let base = image::RgbaImage::from_fn(160, 120, |x, y| {
        image::Rgba([(x % 256) as u8, (y * 2 % 256) as u8, 60, 255])
    });
    Editor::new(base, EditorConfig::default())
}

fn draw(editor: &mut Editor, tool: Tool, from: Point, to: Point) {
    let now = Instant::now();
    editor.set_tool(tool, now);
    editor.on_pointer_down(from, now);
    editor.on_pointer_move(to, now + Duration::from_millis(16));
    editor.on_pointer_up(to, now + Duration::from_millis(32));
}

fn gif_frames(bytes: &[u8]) -> Vec<u16> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(bytes).unwrap();
    let mut delays = Vec::new();
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        delays.push(frame.delay);
    }
    delays
}

fn gif() -> Arc<dyn FrameEncoder> {
    Arc::new(GifEncoder::default())
}

#[tokio::test]
async fn blink_export_has_two_frames_with_configured_delay() {
    let mut editor = editor();
    draw(&mut editor, Tool::DrawArrow, Point::new(10.0, 10.0), Point::new(90.0, 70.0));
    draw(&mut editor, Tool::DrawEllipse, Point::new(40.0, 40.0), Point::new(120.0, 100.0));
    let items_before = editor.scene().items().to_vec();

    let mut settings = editor.export_settings();
    settings.blink_delay_ms = 300;
    let (tx, rx) = crossbeam_channel::unbounded();
    let bytes = editor
        .export(ExportMode::Blink, &settings, gif(), Some(tx))
        .await
        .unwrap();

    assert_eq!(gif_frames(&bytes), vec![30, 30]);
    assert_eq!(editor.scene().items(), items_before.as_slice());
    let statuses: Vec<ExportStatus> = rx.try_iter().collect();
    assert!(matches!(statuses.last(), Some(ExportStatus::Finished { .. })));
}

#[tokio::test]
async fn motion_export_requires_an_enabled_category_with_items() {
    let mut editor = editor();
    draw(&mut editor, Tool::DrawArrow, Point::new(10.0, 10.0), Point::new(90.0, 70.0));

    let mut settings = editor.export_settings();
    settings.motion.enabled = BTreeSet::new();
    let err = editor
        .export(ExportMode::Motion, &settings, gif(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::NoMotionTargets));

    settings.motion.enabled = [MotionCategory::Text].into_iter().collect();
    let err = editor
        .export(ExportMode::Motion, &settings, gif(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::NoMotionTargets));

    settings.motion.enabled = [MotionCategory::Arrow].into_iter().collect();
    let bytes = editor
        .export(ExportMode::Motion, &settings, gif(), None)
        .await
        .unwrap();
    assert_eq!(gif_frames(&bytes).len(), 10);
}

#[tokio::test]
async fn before_after_needs_both_layers() {
    let mut editor = editor();
    let settings = ExportSettings::default();
    let err = editor
        .export(ExportMode::BeforeAfter, &settings, gif(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::MissingLayer(_)));
    assert!(err.is_user_correctable());
}

#[tokio::test]
async fn before_after_apng_sequence_length() {
    let mut editor = editor();
    let dark = Arc::new(image::RgbaImage::from_pixel(16, 12, image::Rgba([0, 0, 0, 255])));
    let light = Arc::new(image::RgbaImage::from_pixel(16, 12, image::Rgba([250, 250, 250, 255])));
    editor.set_before_layer(Some(LayerImage::covering(dark, 160, 120)));
    editor.set_after_layer(Some(LayerImage::covering(light, 160, 120)));

    let mut settings = editor.export_settings();
    settings.dissolve_seconds = 0.4;
    let encoder: Arc<dyn FrameEncoder> = Arc::new(ApngEncoder);
    let bytes = editor
        .export(ExportMode::BeforeAfter, &settings, encoder, None)
        .await
        .unwrap();

    let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
    let reader = decoder.read_info().unwrap();
    let frames = reader.info().animation_control.as_ref().map(|a| a.num_frames);
    assert_eq!(frames, Some(2 * 4 + 3));
}

#[test]
fn dissolve_count_and_ratios() {
    for (seconds, expected) in [(0.0, 2), (0.1, 2), (0.25, 3), (1.0, 10), (1.56, 16)] {
        assert_eq!(dissolve_frame_count(seconds), expected);
    }
    let eased: Vec<f32> = dissolve_ratios(dissolve_frame_count(1.0))
        .into_iter()
        .map(ease)
        .collect();
    assert_eq!(eased.len(), 10);
    assert!(eased[0] > 0.0 && eased[9] < 1.0);
    assert!(eased.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn export_frames_fit_the_maximum_dimension() {
    let mut editor = editor();
    draw(&mut editor, Tool::DrawArrow, Point::new(10.0, 10.0), Point::new(90.0, 70.0));
    let mut settings = editor.export_settings();
    settings.max_dimension = 80;
    let bytes = editor
        .export(ExportMode::Blink, &settings, gif(), None)
        .await
        .unwrap();
    let decoder = gif::DecodeOptions::new().read_info(bytes.as_slice()).unwrap();
    assert_eq!((decoder.width(), decoder.height()), (80, 60));
}
