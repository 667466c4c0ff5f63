use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{UnderlayError, UnderlayResult};

/// RGBA8 brush color carried through Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TextBrush {
    /// Red channel.
    pub(crate) r: u8,
    /// Green channel.
    pub(crate) g: u8,
    /// Blue channel.
    pub(crate) b: u8,
    /// Alpha channel.
    pub(crate) a: u8,
}

/// A laid-out text block plus the face it was shaped with.
///
/// The font data holds the exact bytes the shaper resolved, so glyph ids in
/// the layout are valid indices into it.
pub(crate) struct ShapedText {
    /// Positioned glyph runs.
    pub(crate) layout: parley::Layout<TextBrush>,
    /// Face for glyph drawing, same bytes the layout was shaped with.
    pub(crate) font: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for ShapedText {
    // `parley::Layout` has no `Debug` impl, so this cannot be derived.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapedText")
            .field("font", &self.font)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct ResolvedFace {
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

/// Font discovery and text shaping.
///
/// Faces live in a `fontdb` database (system fonts, files, directories, raw
/// bytes). Shaping resolves a requested family/weight against the database,
/// registers the matched face's bytes with Parley once, and lays text out
/// with that face. Resolution falls back from the requested family to
/// sans-serif, then to any loaded face; only an empty database is a hard
/// error.
pub struct FontLibrary {
    db: fontdb::Database,
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    registered: HashMap<fontdb::ID, ResolvedFace>,
}

impl Default for FontLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl FontLibrary {
    /// Create an empty library. Nothing is loaded until one of the `load_*`
    /// methods runs.
    pub fn new() -> Self {
        Self {
            db: fontdb::Database::new(),
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            registered: HashMap::new(),
        }
    }

    /// Load the fonts installed on the host system.
    pub fn load_system_fonts(&mut self) {
        self.db.load_system_fonts();
    }

    /// Load a single font face (or collection) from raw bytes.
    pub fn load_font_data(&mut self, data: Vec<u8>) {
        self.db.load_font_data(data);
    }

    /// Load a font file from disk.
    pub fn load_font_file(&mut self, path: impl AsRef<Path>) -> UnderlayResult<()> {
        let path = path.as_ref();
        self.db
            .load_font_file(path)
            .with_context(|| format!("load font file {}", path.display()))?;
        Ok(())
    }

    /// Recursively load every font found under a directory. Unreadable
    /// entries are skipped.
    pub fn load_fonts_dir(&mut self, path: impl AsRef<Path>) {
        self.db.load_fonts_dir(path);
    }

    /// Whether no faces are loaded at all.
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Number of loaded faces.
    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    /// Sorted, de-duplicated family names of every loaded face.
    pub fn installed_families(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .db
            .faces()
            .filter_map(|face| face.families.first().map(|(name, _)| name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Shape and lay out `text` in the given family/weight at `size_px`,
    /// wrapping lines at `max_width_px`.
    pub(crate) fn shape(
        &mut self,
        text: &str,
        family: &str,
        weight: u16,
        size_px: f32,
        brush: TextBrush,
        max_width_px: f32,
    ) -> UnderlayResult<ShapedText> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(UnderlayError::validation(
                "font size must be finite and > 0",
            ));
        }

        let ResolvedFace { family_name, font } = self.resolve(family, weight)?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(weight as f32),
        ));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(Some(max_width_px));
        layout.align(
            Some(max_width_px),
            parley::Alignment::Start,
            parley::AlignmentOptions::default(),
        );

        Ok(ShapedText { layout, font })
    }

    /// Match family + weight in the database and register the face with
    /// Parley. Registration happens once per face; later hits reuse the
    /// cached family name and font data.
    fn resolve(&mut self, family: &str, weight: u16) -> UnderlayResult<ResolvedFace> {
        let id = self
            .db
            .query(&fontdb::Query {
                families: &[fontdb::Family::Name(family), fontdb::Family::SansSerif],
                weight: fontdb::Weight(weight),
                stretch: fontdb::Stretch::Normal,
                style: fontdb::Style::Normal,
            })
            .or_else(|| self.db.faces().next().map(|face| face.id))
            .ok_or_else(|| UnderlayError::render("no usable font face is loaded"))?;

        if let Some(hit) = self.registered.get(&id) {
            return Ok(hit.clone());
        }

        let (bytes, index) = self
            .db
            .with_face_data(id, |data, index| (data.to_vec(), index))
            .ok_or_else(|| UnderlayError::render("font face data is unavailable"))?;

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| UnderlayError::render("font face could not be registered for shaping"))?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| UnderlayError::render("registered font family has no name"))?
            .to_string();

        let resolved = ResolvedFace {
            family_name,
            font: vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), index),
        };
        self.registered.insert(id, resolved.clone());
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRUSH: TextBrush = TextBrush {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    #[test]
    fn empty_library_refuses_to_shape() {
        let mut fonts = FontLibrary::new();
        let err = fonts
            .shape("hello", "Inter", 700, 100.0, BRUSH, 500.0)
            .unwrap_err();
        assert!(matches!(err, UnderlayError::Render(_)));
        assert!(err.to_string().contains("no usable font"));
    }

    #[test]
    fn invalid_size_is_rejected_before_resolution() {
        let mut fonts = FontLibrary::new();
        let err = fonts
            .shape("hello", "Inter", 700, 0.0, BRUSH, 500.0)
            .unwrap_err();
        assert!(matches!(err, UnderlayError::Validation(_)));
    }

    #[test]
    fn system_fonts_shape_with_fallback_family() {
        let mut fonts = FontLibrary::new();
        fonts.load_system_fonts();
        if fonts.is_empty() {
            eprintln!("no system fonts available; skipping");
            return;
        }

        let shaped = fonts
            .shape(
                "Ag",
                "No Such Family 7f3a",
                700,
                64.0,
                BRUSH,
                1000.0,
            )
            .unwrap();
        assert!(shaped.layout.height() > 0.0);
        assert!(shaped.layout.lines().next().is_some());
    }

    #[test]
    fn repeated_shaping_registers_the_face_once() {
        let mut fonts = FontLibrary::new();
        fonts.load_system_fonts();
        if fonts.is_empty() {
            eprintln!("no system fonts available; skipping");
            return;
        }

        fonts.shape("one", "Inter", 700, 32.0, BRUSH, 400.0).unwrap();
        fonts.shape("two", "Inter", 700, 32.0, BRUSH, 400.0).unwrap();
        assert_eq!(fonts.registered.len(), 1);
    }

    #[test]
    fn installed_families_are_sorted_unique() {
        let fonts = FontLibrary::new();
        assert!(fonts.installed_families().is_empty());

        let mut fonts = FontLibrary::new();
        fonts.load_system_fonts();
        let families = fonts.installed_families();
        let mut sorted = families.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(families, sorted);
    }
}
