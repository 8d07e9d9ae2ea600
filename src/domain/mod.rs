//! Pure domain types with minimal dependencies
//!
//! Types here know nothing about rendering, history or export, so every
//! other module can depend on them.

pub mod geometry;
pub mod item;

pub use geometry::*;
pub use item::*;
