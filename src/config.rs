//! Configuration persistence for dentlens settings

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Serializable color representation for config storage and item styles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "default_alpha")]
    pub a: f32,
}

fn default_alpha() -> f32 {
    1.0
}

impl Default for ShapeColor {
    fn default() -> Self {
        // Default red, the usual color for pointing at a lesion
        Self {
            r: 0.9,
            g: 0.1,
            b: 0.1,
            a: 1.0,
        }
    }
}

impl ShapeColor {
    pub const WHITE: ShapeColor = ShapeColor::rgb(1.0, 1.0, 1.0);
    pub const BLACK: ShapeColor = ShapeColor::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Convert to image crate RGBA format (0-255)
    pub fn to_rgba_u8(self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.a.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }

    /// Same color with its alpha multiplied by `opacity`
    pub fn with_opacity(self, opacity: f32) -> Self {
        Self {
            a: (self.a * opacity).clamp(0.0, 1.0),
            ..self
        }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` or `rgba(r, g, b, a)`
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        let (body, has_alpha) = if let Some(rest) = lower.strip_prefix("rgba(") {
            (rest.strip_suffix(')')?, true)
        } else if let Some(rest) = lower.strip_prefix("rgb(") {
            (rest.strip_suffix(')')?, false)
        } else {
            return None;
        };
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != if has_alpha { 4 } else { 3 } {
            return None;
        }
        let channel = |p: &str| p.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0) as u8);
        let a = if has_alpha {
            (parts[3].parse::<f32>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8
        } else {
            255
        };
        Some(Self::from_rgba8(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
            a,
        ))
    }
}

fn parse_hex(hex: &str) -> Option<ShapeColor> {
    let nibble = |c: u8| (c as char).to_digit(16).map(|v| v as u8);
    let bytes = hex.as_bytes();
    match bytes.len() {
        3 => {
            let r = nibble(bytes[0])?;
            let g = nibble(bytes[1])?;
            let b = nibble(bytes[2])?;
            Some(ShapeColor::from_rgba8(r * 17, g * 17, b * 17, 255))
        }
        6 | 8 => {
            let byte = |i: usize| Some(nibble(bytes[i])? * 16 + nibble(bytes[i + 1])?);
            let a = if bytes.len() == 8 { byte(6)? } else { 255 };
            Some(ShapeColor::from_rgba8(byte(0)?, byte(2)?, byte(4)?, a))
        }
        _ => None,
    }
}

/// Default drawing style applied to new items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleDefaults {
    /// Stroke color for arrows, lines and ellipses
    pub shape_color: ShapeColor,
    /// Stroke width for arrows, lines and ellipses
    pub stroke_width: f32,
    /// Arrow head length
    pub arrow_head_size: f32,
    /// Dash length and gap for dotted lines
    pub dash: f32,
    pub gap: f32,
    /// Brush width for privacy strokes
    pub brush_width: f32,
    /// Font family used for new text items
    pub font_family: String,
    pub font_size: f32,
    pub text_color: ShapeColor,
    /// Radius and zoom for new magnifiers
    pub magnifier_radius: f32,
    pub magnifier_zoom: f32,
}

impl Default for StyleDefaults {
    fn default() -> Self {
        Self {
            shape_color: ShapeColor::default(),
            stroke_width: 4.0,
            arrow_head_size: 16.0,
            dash: 10.0,
            gap: 6.0,
            brush_width: 24.0,
            font_family: "sans".to_string(),
            font_size: 32.0,
            text_color: ShapeColor::WHITE,
            magnifier_radius: 80.0,
            magnifier_zoom: 2.0,
        }
    }
}

/// Application configuration persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Style for newly created items
    pub style: StyleDefaults,
    /// Quiet period before the filter pipeline recomputes
    pub filter_debounce_ms: u64,
    /// Maximum snapshots per undo/redo stack
    pub history_cap: usize,
    /// Continuous edits on the same item within this window share one snapshot
    pub coalesce_window_ms: u64,
    /// Smallest crop edge accepted, in pixels
    pub min_crop_size: u32,
    /// Delay of each blink export frame
    pub blink_delay_ms: u32,
    /// Delay of each motion export frame
    pub motion_frame_delay_ms: u32,
    /// Amplitude multiplier for motion export
    pub motion_strength: f32,
    /// Number of frames in a motion export
    pub motion_frames: u32,
    /// Hold duration of the before and after stills
    pub before_after_hold_ms: u32,
    /// Cross-dissolve duration in seconds
    pub dissolve_seconds: f32,
    /// Longest edge of exported frames
    pub export_max_dimension: u32,
    /// Palette size used by the GIF encoder (2-256)
    pub gif_colors: u16,
    /// Font family name to font file, used for text items
    pub fonts: BTreeMap<String, PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            style: StyleDefaults::default(),
            filter_debounce_ms: 180,
            history_cap: 20,
            coalesce_window_ms: 250,
            min_crop_size: 20,
            blink_delay_ms: 500,
            motion_frame_delay_ms: 100,
            motion_strength: 1.0,
            motion_frames: 10,
            before_after_hold_ms: 1200,
            dissolve_seconds: 1.0,
            export_max_dimension: 800,
            gif_colors: 256,
            fonts: BTreeMap::new(),
        }
    }
}

impl EditorConfig {
    /// Directory name under the platform config dir
    pub const ID: &'static str = "dentlens";

    /// Location of the config file, if the platform has a config dir
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::ID).join("config.json"))
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            log::warn!("No config directory available, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("Error parsing config {}, using defaults: {}", path.display(), err);
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                log::warn!("Could not read config {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    /// Save configuration to disk
    pub fn save(&self) {
        match Self::path() {
            Some(path) => {
                if let Err(err) = self.save_to(&path) {
                    log::error!("Failed to save config: {:?}", err);
                }
            }
            None => log::error!("Could not locate config directory for saving"),
        }
    }

    /// Write configuration to a specific file
    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_forms() {
        assert_eq!(
            ShapeColor::parse("#f00").unwrap().to_rgba_u8(),
            [255, 0, 0, 255]
        );
        assert_eq!(
            ShapeColor::parse("#00ff0080").unwrap().to_rgba_u8(),
            [0, 255, 0, 128]
        );
        assert!(ShapeColor::parse("#12345").is_none());
        assert!(ShapeColor::parse("#zzzzzz").is_none());
    }

    #[test]
    fn parse_functional_forms() {
        assert_eq!(
            ShapeColor::parse("rgb(10, 20, 30)").unwrap().to_rgba_u8(),
            [10, 20, 30, 255]
        );
        assert_eq!(
            ShapeColor::parse("RGBA(255,255,255,0.5)").unwrap().to_rgba_u8(),
            [255, 255, 255, 128]
        );
        assert!(ShapeColor::parse("rgb(1,2)").is_none());
        assert!(ShapeColor::parse("blue").is_none());
    }

    #[test]
    fn config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = EditorConfig::default();
        config.blink_delay_ms = 321;
        config.save_to(&path).unwrap();
        assert_eq!(EditorConfig::load_from(&path), config);
    }

    #[test]
    fn broken_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(EditorConfig::load_from(&path), EditorConfig::default());
        assert_eq!(
            EditorConfig::load_from(&dir.path().join("missing.json")),
            EditorConfig::default()
        );
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{"motion_frames": 12}"#).unwrap();
        assert_eq!(config.motion_frames, 12);
        assert_eq!(config.history_cap, 20);
    }
}
