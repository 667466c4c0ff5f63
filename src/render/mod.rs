//! Deterministic CPU compositing of backdrop, text layers, and foreground.

pub(crate) mod blur;
pub(crate) mod compositor;

/// A composited frame as RGBA8 pixels.
///
/// Frames come out of the compositor premultiplied; the `premultiplied` flag
/// makes that explicit at API boundaries so encoders know whether to
/// unpremultiply first.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}
