use crate::domain::item::ItemId;

/// Convenience result alias used across the editor engine.
pub type EditorResult<T> = std::result::Result<T, EditorError>;

/// Error taxonomy for editing, cropping and export.
///
/// Degenerate gestures never reach this type: they are pruned where they
/// finalise and only logged.
#[derive(thiserror::Error, Debug)]
pub enum EditorError {
    /// Empty or undecodable upload.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Crop selection below the minimum edge length.
    #[error("crop region {width}x{height} is smaller than the {min}px minimum")]
    CropTooSmall { width: u32, height: u32, min: u32 },

    /// Motion export with no enabled category present in the scene.
    #[error("no motion targets: enable a category that has at least one item")]
    NoMotionTargets,

    /// Before/after export without both layers configured.
    #[error("missing {0} layer")]
    MissingLayer(&'static str),

    /// The external frame encoder failed; message is passed through verbatim.
    #[error("encoding failed: {0}")]
    EncodingFailure(String),

    /// The inpainting provider failed or returned an unusable raster.
    #[error("inpainting failed: {0}")]
    Inpaint(String),

    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl EditorError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn encoding(msg: impl std::fmt::Display) -> Self {
        Self::EncodingFailure(msg.to_string())
    }

    pub fn inpaint(msg: impl Into<String>) -> Self {
        Self::Inpaint(msg.into())
    }

    /// Whether the user can correct the request and retry.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::CropTooSmall { .. } | Self::NoMotionTargets | Self::MissingLayer(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_details() {
        let err = EditorError::CropTooSmall {
            width: 10,
            height: 12,
            min: 20,
        };
        assert_eq!(
            err.to_string(),
            "crop region 10x12 is smaller than the 20px minimum"
        );
        assert!(err.is_user_correctable());
        assert_eq!(
            EditorError::encoding("palette overflow").to_string(),
            "encoding failed: palette overflow"
        );
        assert!(!EditorError::encoding("x").is_user_correctable());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EditorError = io.into();
        assert!(matches!(err, EditorError::Io(_)));
    }
}
