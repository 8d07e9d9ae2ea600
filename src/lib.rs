//! Annotation, privacy masking and animated export engine for clinical photos.
//!
//! The [`Editor`] owns a scene of items over a base raster, keeps separate
//! undo histories for annotations and privacy strokes, recomputes the
//! composited raster after a debounce, crops with item remapping and exports
//! blink, motion and before/after animations.

pub mod capture;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod filters;
pub mod render;
pub mod session;

pub use config::EditorConfig;
pub use error::{EditorError, EditorResult};
pub use session::Editor;
