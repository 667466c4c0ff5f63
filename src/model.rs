use crate::assets::color::ColorSpec;
use crate::foundation::core::NormPoint;
use crate::foundation::error::{UnderlayError, UnderlayResult};

/// Default text shown when a layer is created, and substituted at render time
/// when a layer's content is empty.
pub const PLACEHOLDER_TEXT: &str = "TEXT";

/// Per-axis position nudge applied when duplicating a layer.
pub const DUPLICATE_NUDGE: f64 = 0.05;

const DEFAULT_FONT_FAMILY: &str = "Inter";
const DEFAULT_FONT_SIZE: f64 = 100.0;
const DEFAULT_FONT_WEIGHT: u16 = 700;

/// Opaque identifier of a text layer.
///
/// Ids are allocated by [`LayerIdGen`], are unique within a session, stay
/// stable for the layer's lifetime and are never reused.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct LayerId(pub u64);

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// Monotonic allocator for [`LayerId`]s, owned by the editing session.
#[derive(Clone, Debug, Default)]
pub struct LayerIdGen {
    next: u64,
}

impl LayerIdGen {
    /// Allocate the next id. Ids start at 1 and never repeat.
    pub fn next_id(&mut self) -> LayerId {
        self.next += 1;
        LayerId(self.next)
    }
}

/// One independently styled text element.
///
/// Pure data: no rasterizer handles live here. Whatever the renderer needs
/// (shaped glyphs, font handles) is rebuilt from these fields on each render.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    /// Unique, stable id.
    pub id: LayerId,
    /// Text content. Empty is valid and renders as [`PLACEHOLDER_TEXT`].
    pub content: String,
    /// Normalized center-anchored position, both axes in `[0,1]`.
    pub position: NormPoint,
    /// Font size in pixels at the output image's native resolution.
    pub font_size: f64,
    /// Font family name; degrades to a sans-serif default when unavailable.
    pub font_family: String,
    /// Font weight, `{100,...,900}` in steps of 100.
    pub font_weight: u16,
    /// Fill color.
    pub color: ColorSpec,
    /// Layer opacity in `[0,1]`.
    pub opacity: f64,
    /// Rotation in degrees about the layer's own center.
    pub rotation: f64,
}

impl TextLayer {
    /// Create a layer with the canonical defaults: `"TEXT"` at the surface
    /// center, 100px Inter at weight 700, amber fill, fully opaque, unrotated.
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            content: PLACEHOLDER_TEXT.to_string(),
            position: NormPoint::center(),
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_weight: DEFAULT_FONT_WEIGHT,
            color: ColorSpec::amber(),
            opacity: 1.0,
            rotation: 0.0,
        }
    }

    /// Copy this layer under a new id, nudging the position by
    /// [`DUPLICATE_NUDGE`] on each axis (independently clamped to `<= 1`) so
    /// the copy never lands exactly on the original.
    pub fn duplicate(&self, new_id: LayerId) -> Self {
        let mut copy = self.clone();
        copy.id = new_id;
        copy.position = NormPoint::new(
            self.position.x + DUPLICATE_NUDGE,
            self.position.y + DUPLICATE_NUDGE,
        )
        .clamp_unit();
        copy
    }

    /// Validate field ranges.
    pub fn validate(&self) -> UnderlayResult<()> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(UnderlayError::validation(format!(
                "layer {}: fontSize must be finite and > 0",
                self.id
            )));
        }
        if !(100..=900).contains(&self.font_weight) || self.font_weight % 100 != 0 {
            return Err(UnderlayError::validation(format!(
                "layer {}: fontWeight must be one of 100..=900 in steps of 100",
                self.id
            )));
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(UnderlayError::validation(format!(
                "layer {}: opacity must be within [0,1]",
                self.id
            )));
        }
        if !self.rotation.is_finite() {
            return Err(UnderlayError::validation(format!(
                "layer {}: rotation must be finite",
                self.id
            )));
        }
        for (axis, v) in [("x", self.position.x), ("y", self.position.y)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(UnderlayError::validation(format!(
                    "layer {}: position.{axis} must be within [0,1]",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// How text layers are stacked against the foreground cutout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompositeMode {
    /// Background, then text, then the foreground cutout on top. Requires a
    /// foreground image; this is the depth-illusion mode.
    #[default]
    TextBehindSubject,
    /// Background, then text on top. No foreground pass.
    TextOverlay,
}

/// Direction of a two-stop linear gradient backdrop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GradientDirection {
    /// First stop at the top edge, second at the bottom.
    TopBottom,
    /// First stop at the left edge, second at the right.
    LeftRight,
    /// First stop at the top-left corner, second at the bottom-right.
    Diagonal,
}

/// What to paint beneath the text layers.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Backdrop {
    /// The background image, drawn 1:1.
    #[default]
    Original,
    /// A flat color fill.
    Solid {
        /// Fill color.
        color: ColorSpec,
    },
    /// A two-stop linear gradient along a fixed direction.
    Gradient {
        /// First stop.
        start: ColorSpec,
        /// Second stop.
        end: ColorSpec,
        /// Gradient axis.
        direction: GradientDirection,
    },
    /// The background image through a Gaussian blur.
    Blur {
        /// Blur radius in pixels; 0 is identity.
        radius_px: u32,
    },
}

/// Interchange document for the CLI: backdrop, composite mode and the ordered
/// layer list. Canvas dimensions always come from the background image, never
/// from the document.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// What to paint beneath the text layers.
    #[serde(default)]
    pub backdrop: Backdrop,
    /// Composite mode.
    #[serde(default)]
    pub mode: CompositeMode,
    /// Text layers in insertion order, which is also their paint order.
    #[serde(default)]
    pub layers: Vec<TextLayer>,
}

impl Document {
    /// Validate all layers and id uniqueness.
    pub fn validate(&self) -> UnderlayResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for layer in &self.layers {
            layer.validate()?;
            if !seen.insert(layer.id) {
                return Err(UnderlayError::validation(format!(
                    "duplicate layer id {}",
                    layer.id
                )));
            }
        }
        Ok(())
    }
}

/// Clone `layers` with only the position of the layer `id` replaced.
///
/// Returns `None` when the id is absent, which callers treat as a benign
/// no-op (the layer was removed mid-interaction).
pub fn with_layer_position(
    layers: &[TextLayer],
    id: LayerId,
    position: NormPoint,
) -> Option<Vec<TextLayer>> {
    let idx = layers.iter().position(|l| l.id == id)?;
    let mut next = layers.to_vec();
    next[idx].position = position.clamp_unit();
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amber_hex(layer: &TextLayer) -> String {
        serde_json::to_value(&layer.color)
            .unwrap()
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn defaults_match_the_canonical_layer() {
        let layer = TextLayer::new(LayerId(1));
        assert_eq!(layer.content, "TEXT");
        assert_eq!(layer.position, NormPoint::center());
        assert_eq!(layer.font_size, 100.0);
        assert_eq!(layer.font_family, "Inter");
        assert_eq!(layer.font_weight, 700);
        assert_eq!(amber_hex(&layer), "#fbbf24");
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.rotation, 0.0);
        assert!(layer.validate().is_ok());
    }

    #[test]
    fn duplicate_gets_new_id_and_clamped_nudge() {
        let mut id_gen = LayerIdGen::default();
        let mut layer = TextLayer::new(id_gen.next_id());
        layer.position = NormPoint::new(0.98, 0.5);

        let copy = layer.duplicate(id_gen.next_id());
        assert_ne!(copy.id, layer.id);
        assert_eq!(copy.position, NormPoint::new(1.0, 0.55));
        // Source layer is untouched.
        assert_eq!(layer.position, NormPoint::new(0.98, 0.5));
    }

    #[test]
    fn id_gen_never_repeats() {
        let mut id_gen = LayerIdGen::default();
        let a = id_gen.next_id();
        let b = id_gen.next_id();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn validate_rejects_out_of_range_fields() {
        let mut layer = TextLayer::new(LayerId(1));
        layer.font_weight = 450;
        assert!(layer.validate().is_err());

        let mut layer = TextLayer::new(LayerId(1));
        layer.font_size = 0.0;
        assert!(layer.validate().is_err());

        let mut layer = TextLayer::new(LayerId(1));
        layer.opacity = 1.5;
        assert!(layer.validate().is_err());

        let mut layer = TextLayer::new(LayerId(1));
        layer.position = NormPoint::new(1.2, 0.5);
        assert!(layer.validate().is_err());
    }

    #[test]
    fn document_rejects_duplicate_ids() {
        let doc = Document {
            layers: vec![TextLayer::new(LayerId(7)), TextLayer::new(LayerId(7))],
            ..Document::default()
        };
        assert!(doc.validate().is_err());
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut id_gen = LayerIdGen::default();
        let doc = Document {
            backdrop: Backdrop::Gradient {
                start: ColorSpec::from_rgba8(10, 20, 30, 255),
                end: ColorSpec::from_rgba8(200, 210, 220, 255),
                direction: GradientDirection::Diagonal,
            },
            mode: CompositeMode::TextOverlay,
            layers: vec![TextLayer::new(id_gen.next_id())],
        };

        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let layer = TextLayer::new(LayerId(3));
        let v = serde_json::to_value(&layer).unwrap();
        assert!(v.get("fontSize").is_some());
        assert!(v.get("fontFamily").is_some());
        assert!(v.get("fontWeight").is_some());
        assert!(v.get("font_size").is_none());

        let v = serde_json::to_value(Backdrop::Blur { radius_px: 6 }).unwrap();
        assert!(v.get("blur").and_then(|b| b.get("radiusPx")).is_some());
    }

    #[test]
    fn with_layer_position_replaces_only_the_target() {
        let mut id_gen = LayerIdGen::default();
        let a = TextLayer::new(id_gen.next_id());
        let b = TextLayer::new(id_gen.next_id());
        let layers = vec![a.clone(), b.clone()];

        let next = with_layer_position(&layers, b.id, NormPoint::new(0.1, 2.0)).unwrap();
        assert_eq!(next[0].position, a.position);
        assert_eq!(next[1].position, NormPoint::new(0.1, 1.0));

        assert!(with_layer_position(&layers, LayerId(999), NormPoint::center()).is_none());
    }
}
