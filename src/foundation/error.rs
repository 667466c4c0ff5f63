/// Convenience result alias used across the crate.
pub type UnderlayResult<T> = Result<T, UnderlayError>;

/// Error taxonomy for the compositing pipeline.
///
/// Render refusals (missing foreground, zero-dimension sources) and encoder
/// failures are distinct variants so callers can tell "this scene cannot be
/// rendered" apart from "the codec failed on a valid scene".
#[derive(thiserror::Error, Debug)]
pub enum UnderlayError {
    /// Invalid input: bad document fields, non-image bytes, out-of-range
    /// export quality.
    #[error("validation error: {0}")]
    Validation(String),

    /// The scene cannot be rendered as requested.
    #[error("render error: {0}")]
    Render(String),

    /// A codec failed while encoding an otherwise valid frame.
    #[error("encode error: {0}")]
    Encode(String),

    /// The segmentation adapter failed.
    #[error("segmentation error: {0}")]
    Segmentation(String),

    /// Wrapped error from a lower-level library at an I/O boundary.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UnderlayError {
    /// Build a [`UnderlayError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`UnderlayError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`UnderlayError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`UnderlayError::Segmentation`].
    pub fn segmentation(msg: impl Into<String>) -> Self {
        Self::Segmentation(msg.into())
    }
}
