use std::sync::Arc;

use crate::assets::decode::{DecodedImage, decode_image};
use crate::assets::fonts::FontLibrary;
use crate::drag::{DragSession, SurfaceBounds};
use crate::export::{ExportArtifact, ExportFormat, export_frame};
use crate::foundation::core::Point;
use crate::foundation::error::{UnderlayError, UnderlayResult};
use crate::history::History;
use crate::model::{
    Backdrop, CompositeMode, LayerId, LayerIdGen, TextLayer, with_layer_position,
};
use crate::render::compositor::{Compositor, Scene};
use crate::segment::{CancelToken, Cutout};

/// Ticket for one segmentation run.
///
/// Pairs the run with the cancel token that was current when it started;
/// [`EditorSession::commit_cutout`] uses it to tell a live result from a
/// superseded one.
#[derive(Clone, Debug)]
pub struct SegmentHandle {
    token: CancelToken,
}

impl SegmentHandle {
    /// The run's cancellation token, for adapters that poll it.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

struct SourceImagery {
    background: Arc<DecodedImage>,
    foreground: Option<Arc<DecodedImage>>,
}

struct ActiveDrag {
    session: DragSession,
    // Layer list as of pointer-down, so release commits one history step.
    origin: Vec<TextLayer>,
}

/// Single owner of all editing state.
///
/// Everything mutable lives here and changes only through these methods: the
/// layer history, the decoded imagery, the selection, the in-flight drag and
/// the segmentation token. Layer edits commit one history step each; drag
/// moves ride the non-committing present until release. There are no locks;
/// callers running the segmentation adapter elsewhere re-enter through
/// [`commit_cutout`](Self::commit_cutout), which is where staleness is
/// decided.
pub struct EditorSession {
    history: History<Vec<TextLayer>>,
    ids: LayerIdGen,
    selection: Option<LayerId>,
    imagery: Option<SourceImagery>,
    backdrop: Backdrop,
    mode: CompositeMode,
    segment_token: CancelToken,
    drag: Option<ActiveDrag>,
    compositor: Compositor,
}

impl EditorSession {
    /// A session with no image loaded and an empty layer list.
    pub fn new(fonts: FontLibrary) -> Self {
        Self {
            history: History::new(Vec::new()),
            ids: LayerIdGen::default(),
            selection: None,
            imagery: None,
            backdrop: Backdrop::default(),
            mode: CompositeMode::default(),
            segment_token: CancelToken::new(),
            drag: None,
            compositor: Compositor::new(fonts),
        }
    }

    /// Decode `bytes` and make it the session's background image.
    ///
    /// Cancels any in-flight segmentation, drops the previous imagery, resets
    /// history to the empty layer list and clears selection, foreground and
    /// drag state. On a decode failure nothing changes.
    pub fn load_image(&mut self, bytes: &[u8]) -> UnderlayResult<()> {
        let decoded = decode_image(bytes)?;
        self.segment_token.cancel();
        self.segment_token = CancelToken::new();
        self.imagery = Some(SourceImagery {
            background: Arc::new(decoded),
            foreground: None,
        });
        self.history.reset(Vec::new());
        self.selection = None;
        self.drag = None;
        Ok(())
    }

    /// Whether a background image is loaded.
    pub fn has_image(&self) -> bool {
        self.imagery.is_some()
    }

    /// Whether a foreground cutout has been installed.
    pub fn has_foreground(&self) -> bool {
        self.imagery
            .as_ref()
            .is_some_and(|imagery| imagery.foreground.is_some())
    }

    /// Start a segmentation run, superseding any previous one.
    ///
    /// The prior token is cancelled, so a slower earlier run can finish but
    /// will be discarded at commit time.
    pub fn begin_segmentation(&mut self) -> SegmentHandle {
        self.segment_token.cancel();
        self.segment_token = CancelToken::new();
        SegmentHandle {
            token: self.segment_token.clone(),
        }
    }

    /// Install a finished cutout, unless its run has been superseded.
    ///
    /// Returns `Ok(true)` when the result was installed, `Ok(false)` when it
    /// was stale and silently discarded. Both cutout images are decoded
    /// before any state changes, so a bad result never leaves partial
    /// imagery behind.
    pub fn commit_cutout(&mut self, handle: &SegmentHandle, cutout: &Cutout) -> UnderlayResult<bool> {
        if handle.token.is_cancelled() || self.imagery.is_none() {
            return Ok(false);
        }
        let background = decode_image(&cutout.background)?;
        let foreground = decode_image(&cutout.foreground)?;
        self.imagery = Some(SourceImagery {
            background: Arc::new(background),
            foreground: Some(Arc::new(foreground)),
        });
        Ok(true)
    }

    /// Layers in paint order, bottom to top.
    pub fn layers(&self) -> &[TextLayer] {
        self.history.present()
    }

    /// Currently selected layer, if any.
    pub fn selected(&self) -> Option<LayerId> {
        self.selection
    }

    /// Select a layer, or clear the selection with `None`.
    ///
    /// Selecting an id that no longer exists is a no-op.
    pub fn select(&mut self, id: Option<LayerId>) {
        match id {
            Some(id) => {
                if self.layer_exists(id) {
                    self.selection = Some(id);
                }
            }
            None => self.selection = None,
        }
    }

    /// Append a default layer, select it, and commit one history step.
    pub fn add_layer(&mut self) -> LayerId {
        let id = self.ids.next_id();
        let mut layers = self.history.present().clone();
        layers.push(TextLayer::new(id));
        self.history.push(layers);
        self.selection = Some(id);
        id
    }

    /// Edit one layer in place and commit one history step.
    ///
    /// A vanished id is a no-op: no edit, no step.
    pub fn update_layer(&mut self, id: LayerId, edit: impl FnOnce(&mut TextLayer)) {
        let mut layers = self.history.present().clone();
        let Some(layer) = layers.iter_mut().find(|l| l.id == id) else {
            return;
        };
        edit(layer);
        self.history.push(layers);
    }

    /// Remove a layer and commit one history step.
    ///
    /// Clears the selection if it pointed at the removed layer. A vanished
    /// id is a no-op.
    pub fn remove_layer(&mut self, id: LayerId) {
        let mut layers = self.history.present().clone();
        let before = layers.len();
        layers.retain(|l| l.id != id);
        if layers.len() == before {
            return;
        }
        self.history.push(layers);
        if self.selection == Some(id) {
            self.selection = None;
        }
    }

    /// Duplicate a layer to the top of the stack with a nudged position,
    /// select the copy, and commit one history step.
    ///
    /// Returns the copy's id, or `None` when the source id has vanished.
    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        let mut layers = self.history.present().clone();
        let idx = layers.iter().position(|l| l.id == id)?;
        let copy_id = self.ids.next_id();
        let copy = layers[idx].duplicate(copy_id);
        layers.push(copy);
        self.history.push(layers);
        self.selection = Some(copy_id);
        Some(copy_id)
    }

    /// Step back one committed state. Returns whether a step was taken.
    pub fn undo(&mut self) -> bool {
        let stepped = self.history.undo();
        if stepped {
            self.prune_selection();
        }
        stepped
    }

    /// Step forward one undone state. Returns whether a step was taken.
    pub fn redo(&mut self) -> bool {
        let stepped = self.history.redo();
        if stepped {
            self.prune_selection();
        }
        stepped
    }

    /// Whether an undo step is available.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether a redo step is available.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Start dragging a layer from `pointer`, selecting it.
    ///
    /// Returns false (and starts nothing) when the id has vanished.
    pub fn begin_drag(&mut self, id: LayerId, pointer: Point) -> bool {
        let layers = self.history.present();
        let Some(layer) = layers.iter().find(|l| l.id == id) else {
            return false;
        };
        self.selection = Some(id);
        self.drag = Some(ActiveDrag {
            session: DragSession::begin(id, pointer, layer.position),
            origin: layers.clone(),
        });
        true
    }

    /// Move the active drag to `pointer`, measured against `bounds`.
    ///
    /// Updates the present state without committing a history step. If the
    /// dragged layer has vanished the drag is abandoned.
    pub fn drag_to(&mut self, pointer: Point, bounds: SurfaceBounds) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let position = drag.session.position_for(pointer, bounds);
        match with_layer_position(self.history.present(), drag.session.layer(), position) {
            Some(layers) => self.history.set_present(layers),
            None => self.drag = None,
        }
    }

    /// Release the active drag.
    ///
    /// Commits exactly one history step when the pointer moved and the layer
    /// still exists; a motionless drag, or one whose layer was removed
    /// mid-gesture, leaves history untouched.
    pub fn end_drag(&mut self) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        if !drag.session.moved() || !self.layer_exists(drag.session.layer()) {
            return;
        }
        let committed = self.history.present().clone();
        self.history.set_present(drag.origin);
        self.history.push(committed);
    }

    /// Backdrop painted beneath the text layers.
    pub fn backdrop(&self) -> &Backdrop {
        &self.backdrop
    }

    /// Replace the backdrop. Not part of layer history.
    pub fn set_backdrop(&mut self, backdrop: Backdrop) {
        self.backdrop = backdrop;
    }

    /// Current composite mode.
    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    /// Switch the composite mode. Not part of layer history.
    pub fn set_mode(&mut self, mode: CompositeMode) {
        self.mode = mode;
    }

    /// Font library used by the renderer.
    pub fn fonts_mut(&mut self) -> &mut FontLibrary {
        self.compositor.fonts_mut()
    }

    /// Render the present state and encode it for download.
    pub fn render(
        &mut self,
        format: ExportFormat,
        quality: Option<f64>,
    ) -> UnderlayResult<ExportArtifact> {
        let Some(imagery) = self.imagery.as_ref() else {
            return Err(UnderlayError::render("no image loaded"));
        };
        let scene = Scene {
            background: &imagery.background,
            foreground: imagery.foreground.as_deref(),
            backdrop: &self.backdrop,
            layers: self.history.present(),
            mode: self.mode,
        };
        let frame = self.compositor.render(&scene, !format.supports_alpha())?;
        export_frame(&frame, format, quality, self.mode)
    }

    fn layer_exists(&self, id: LayerId) -> bool {
        self.history.present().iter().any(|l| l.id == id)
    }

    fn prune_selection(&mut self) {
        if let Some(id) = self.selection {
            if !self.layer_exists(id) {
                self.selection = None;
            }
        }
    }
}
