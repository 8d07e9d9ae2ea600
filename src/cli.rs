//! Command-line host: replay an editing script and write a PNG or an animation

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use dentlens::config::EditorConfig;
use dentlens::export::{ExportFormat, ExportMode, ExportStatus, FrameEncoder, MotionCategory};
use dentlens::session::Editor;

use crate::script::{self, ScriptRunner};

/// Annotate, mask and animate clinical photos without a GUI.
#[derive(Parser, Debug)]
#[command(name = "dentlens", version, about)]
pub struct CliArgs {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a script and write the flattened result as PNG
    Render {
        image: PathBuf,
        #[arg(short, long, value_name = "SCRIPT.json")]
        script: Option<PathBuf>,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Apply a script and write an animated GIF or APNG
    Export {
        image: PathBuf,
        #[arg(short, long, value_enum)]
        mode: ExportMode,
        #[arg(short, long, value_name = "SCRIPT.json")]
        script: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Gif)]
        format: ExportFormat,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Categories animated in motion mode; all when omitted
        #[arg(long = "animate", value_enum, value_delimiter = ',')]
        animate: Vec<MotionCategory>,
        /// Motion amplitude multiplier
        #[arg(long)]
        strength: Option<f32>,
        /// Play once instead of looping
        #[arg(long)]
        once: bool,
    },
}

/// Default output location: the pictures directory with a timestamped name
fn default_output(prefix: &str, extension: &str) -> PathBuf {
    let mut path = dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."));
    let name = chrono::Local::now()
        .format(&format!("{prefix}_%Y-%m-%d_%H-%M-%S.{extension}"))
        .to_string();
    path.push(name);
    path
}

/// Write through a temp file in the target directory, then rename into place
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("could not create directory '{}'", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("could not create a temp file in '{}'", dir.display()))?;
    tmp.write_all(bytes)?;
    tmp.persist(path)
        .with_context(|| format!("could not write '{}'", path.display()))?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> EditorConfig {
    match path {
        Some(path) => EditorConfig::load_from(path),
        None => EditorConfig::load(),
    }
}

async fn open_editor(
    image: &Path,
    script_path: Option<&Path>,
    config: EditorConfig,
) -> Result<Editor> {
    let bytes =
        std::fs::read(image).with_context(|| format!("could not read '{}'", image.display()))?;
    let mut editor = Editor::from_bytes(&bytes, config)
        .with_context(|| format!("could not open '{}'", image.display()))?;

    if let Some(path) = script_path {
        let actions = script::load(path)?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        ScriptRunner::new(base_dir)
            .run(&mut editor, &actions)
            .await?;
        log::info!("Applied {} script action(s) from {}", actions.len(), path.display());
    }
    Ok(editor)
}

pub async fn run(args: CliArgs) -> Result<()> {
    let config = load_config(args.config.as_deref());
    match args.command {
        Command::Render {
            image,
            script,
            output,
        } => {
            let mut editor = open_editor(&image, script.as_deref(), config).await?;
            let bytes = editor.snapshot_png()?;
            let output = output.unwrap_or_else(|| default_output("dentlens", "png"));
            write_atomic(&output, &bytes)?;
            println!("{}", output.display());
        }
        Command::Export {
            image,
            mode,
            script,
            format,
            output,
            animate,
            strength,
            once,
        } => {
            let gif_colors = config.gif_colors;
            let mut editor = open_editor(&image, script.as_deref(), config).await?;

            let mut settings = editor.export_settings();
            if !animate.is_empty() {
                settings.motion.enabled = animate.into_iter().collect();
            }
            if let Some(strength) = strength {
                settings.motion.strength = strength;
            }
            settings.looped = !once;

            let encoder: Arc<dyn FrameEncoder> = Arc::from(format.encoder(gif_colors));
            let (tx, rx) = crossbeam_channel::unbounded::<ExportStatus>();
            let result = editor.export(mode, &settings, encoder, Some(tx)).await;
            for status in rx.try_iter() {
                log::info!("{status}");
            }
            let bytes = result?;

            let output = output.unwrap_or_else(|| default_output("dentlens", format.extension()));
            write_atomic(&output, &bytes)?;
            println!("{}", output.display());
        }
    }
    Ok(())
}
