//! Raster filters and privacy masking

pub mod debounce;
pub mod mask;
pub mod pipeline;
pub mod stages;

pub use debounce::{DebounceState, Debouncer};
pub use stages::FilterConfig;
