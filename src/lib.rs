//! Underlay composites styled text behind the subject of a photo.
//!
//! Everything is deterministic and CPU-only: decode a background image, split
//! it into background and subject with a [`Segmenter`], stack [`TextLayer`]s
//! between the two, and export the flattened result. The editing API is
//! session-oriented:
//!
//! - Load an image into an [`EditorSession`]
//! - Add, edit, drag and undo/redo text layers
//! - Export with [`EditorSession::render`]
//!
//! The [`Compositor`] underneath is also usable on its own for one-shot
//! composition, which is what the `underlay` binary does.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod drag;
mod export;
mod foundation;
mod history;
mod model;
mod render;
mod segment;
mod session;

pub use crate::foundation::core::{Affine, NormPoint, Point, Rect, Rgba8Premul, SurfaceSize, Vec2};
pub use crate::foundation::error::{UnderlayError, UnderlayResult};

pub use crate::assets::color::ColorSpec;
pub use crate::assets::decode::{DecodedImage, decode_image, sniff_format};
pub use crate::assets::fonts::FontLibrary;
pub use crate::drag::{DragSession, SurfaceBounds};
pub use crate::export::{ExportArtifact, ExportFormat, encode_frame, export_frame};
pub use crate::history::History;
pub use crate::model::{
    Backdrop, CompositeMode, DUPLICATE_NUDGE, Document, GradientDirection, LayerId, LayerIdGen,
    PLACEHOLDER_TEXT, TextLayer, with_layer_position,
};
pub use crate::render::FrameRgba;
pub use crate::render::compositor::{Compositor, Scene};
pub use crate::segment::{CancelToken, Cutout, MaskSegmenter, Segmenter};
pub use crate::session::{EditorSession, SegmentHandle};
