//! Animated export engine
//!
//! An export snapshots the editor into an [`ExportSource`], plans the frames
//! for the requested mode, renders them one by one and hands the result to a
//! [`FrameEncoder`].

pub mod before_after;
pub mod blink;
pub mod encoder;
pub mod frames;
pub mod motion;

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::error::{EditorError, EditorResult};

pub use before_after::{BeforeAfterLayers, LayerImage};
pub use encoder::{ApngEncoder, EncodeRequest, ExportFormat, FrameEncoder, GifEncoder};
pub use frames::{ExportFrame, ExportSource, FramePlan};
pub use motion::{MotionCategory, MotionSettings};

/// Animation style
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    Blink,
    Motion,
    BeforeAfter,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Blink => write!(f, "blink"),
            ExportMode::Motion => write!(f, "motion"),
            ExportMode::BeforeAfter => write!(f, "before/after"),
        }
    }
}

/// Parameters of all export modes
#[derive(Clone, Debug, PartialEq)]
pub struct ExportSettings {
    pub blink_delay_ms: u32,
    pub motion: MotionSettings,
    pub hold_ms: u32,
    pub dissolve_seconds: f32,
    pub max_dimension: u32,
    pub looped: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

impl ExportSettings {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            blink_delay_ms: config.blink_delay_ms,
            motion: MotionSettings {
                strength: config.motion_strength,
                frames: config.motion_frames as usize,
                frame_delay_ms: config.motion_frame_delay_ms,
                ..Default::default()
            },
            hold_ms: config.before_after_hold_ms,
            dissolve_seconds: config.dissolve_seconds,
            max_dimension: config.export_max_dimension,
            looped: true,
        }
    }
}

/// Progress notifications sent while an export runs
#[derive(Clone, Debug, PartialEq)]
pub enum ExportStatus {
    Planning { mode: ExportMode },
    Rendering { index: usize, total: usize },
    Encoding { frames: usize },
    Finished { bytes: usize },
    Failed { message: String },
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStatus::Planning { mode } => write!(f, "Preparing {mode} export"),
            ExportStatus::Rendering { index, total } => {
                write!(f, "Rendering frame {}/{}", index + 1, total)
            }
            ExportStatus::Encoding { frames } => write!(f, "Encoding {frames} frames"),
            ExportStatus::Finished { bytes } => write!(f, "Export finished ({bytes} bytes)"),
            ExportStatus::Failed { message } => write!(f, "Export failed: {message}"),
        }
    }
}

fn report(progress: &Option<Sender<ExportStatus>>, status: ExportStatus) {
    if let Some(tx) = progress {
        // The receiver may be gone; the export carries on regardless
        let _ = tx.send(status);
    }
}

/// Frame plans for `mode`
pub fn plan(
    source: &ExportSource,
    mode: ExportMode,
    settings: &ExportSettings,
) -> EditorResult<Vec<FramePlan>> {
    match mode {
        ExportMode::Blink => Ok(blink::plan(source, settings.blink_delay_ms)),
        ExportMode::Motion => motion::plan(source, &settings.motion),
        ExportMode::BeforeAfter => {
            before_after::plan(source, settings.hold_ms, settings.dissolve_seconds)
        }
    }
}

async fn render_and_encode(
    source: ExportSource,
    mode: ExportMode,
    settings: &ExportSettings,
    encoder: Arc<dyn FrameEncoder>,
    progress: &Option<Sender<ExportStatus>>,
) -> EditorResult<Vec<u8>> {
    report(progress, ExportStatus::Planning { mode });
    let plans = plan(&source, mode, settings)?;

    let total = plans.len();
    let mut frames = Vec::with_capacity(total);
    for (index, frame_plan) in plans.iter().enumerate() {
        report(progress, ExportStatus::Rendering { index, total });
        frames.push(frames::render_frame(&source, frame_plan));
        tokio::task::yield_now().await;
    }

    report(progress, ExportStatus::Encoding { frames: total });
    let (width, height) = source.target;
    let request = EncodeRequest {
        width,
        height,
        looped: settings.looped,
        frames,
    };
    tokio::task::spawn_blocking(move || encoder.encode(request))
        .await
        .map_err(EditorError::encoding)?
}

/// Run a complete export and return the encoded animation
pub async fn run_export(
    source: ExportSource,
    mode: ExportMode,
    settings: &ExportSettings,
    encoder: Arc<dyn FrameEncoder>,
    progress: Option<Sender<ExportStatus>>,
) -> EditorResult<Vec<u8>> {
    let (width, height) = source.target;
    let format = encoder.extension();
    log::info!("Starting {mode} export at {width}x{height} ({format})");

    match render_and_encode(source, mode, settings, encoder, &progress).await {
        Ok(bytes) => {
            log::info!("Finished {mode} export: {} bytes", bytes.len());
            report(&progress, ExportStatus::Finished { bytes: bytes.len() });
            Ok(bytes)
        }
        Err(err) => {
            log::error!("{mode} export failed: {err}");
            report(
                &progress,
                ExportStatus::Failed {
                    message: err.to_string(),
                },
            );
            Err(err)
        }
    }
}
