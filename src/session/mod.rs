//! Editing session: scene, histories, tools, crop and the editor facade

pub mod crop;
pub mod editor;
pub mod history;
pub mod scene;
pub mod tools;

pub use editor::Editor;
pub use history::{History, Snapshot};
pub use scene::{Reorder, Scene};
pub use tools::{Gesture, Tool};
