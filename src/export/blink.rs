//! Blink export: the annotation layer toggles on and off

use super::frames::{ExportSource, FramePlan};

/// Two frames, annotations shown then hidden, each held for `delay_ms`
pub fn plan(source: &ExportSource, delay_ms: u32) -> Vec<FramePlan> {
    let shown = FramePlan::new(source.items.clone(), delay_ms);
    let hidden = FramePlan {
        show_annotations: false,
        ..shown.clone()
    };
    vec![shown, hidden]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use image::RgbaImage;

    use crate::export::before_after::BeforeAfterLayers;
    use crate::render::FontBook;

    #[test]
    fn always_two_frames() {
        let source = ExportSource::new(
            Vec::new(),
            Arc::new(RgbaImage::new(4, 4)),
            FontBook::default(),
            BeforeAfterLayers::default(),
            800,
        );
        let plans = plan(&source, 350);
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().all(|p| p.delay_ms == 350));
        assert!(plans[0].show_annotations);
        assert!(!plans[1].show_annotations);
    }
}
