use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{UnderlayError, UnderlayResult};

/// Output pair of one segmentation run, as encoded image bytes.
#[derive(Clone, Debug)]
pub struct Cutout {
    /// The full scene, re-encoded.
    pub background: Vec<u8>,
    /// The subject alone, with alpha outside its silhouette.
    pub foreground: Vec<u8>,
}

/// Black-box subject/background separation.
pub trait Segmenter {
    /// Split `image` into a background and a subject cutout.
    ///
    /// Fails with a descriptive error on unsupported input. `progress` is
    /// called zero or more times with non-decreasing fractions in `0..=1`;
    /// a run may complete without progress reaching exactly 1.
    fn segment(&self, image: &[u8], progress: &mut dyn FnMut(f32)) -> UnderlayResult<Cutout>;
}

/// Clonable cancellation flag for an in-flight segmentation run.
///
/// Starting a new run cancels the previous token; results are checked
/// against the token when they are committed, not mid-flight, so a slow
/// superseded run finishes quietly and is then discarded.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag the run as cancelled. Visible through every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Reference segmenter driven by a prerendered coverage mask.
///
/// Stands in for a model-backed adapter: the mask says, per pixel, how much
/// of the input belongs to the subject. Masks with an alpha channel are read
/// through it; opaque masks are read as luminance.
pub struct MaskSegmenter {
    coverage: image::GrayImage,
}

impl MaskSegmenter {
    /// Decode a mask image into per-pixel coverage.
    pub fn from_mask_bytes(mask: &[u8]) -> UnderlayResult<Self> {
        let decoded = image::load_from_memory(mask)
            .map_err(|err| UnderlayError::segmentation(format!("unsupported mask: {err}")))?;
        let coverage = if decoded.color().has_alpha() {
            let rgba = decoded.to_rgba8();
            let (width, height) = rgba.dimensions();
            let alpha: Vec<u8> = rgba.pixels().map(|px| px.0[3]).collect();
            image::GrayImage::from_raw(width, height, alpha)
                .ok_or_else(|| UnderlayError::segmentation("mask alpha channel is malformed"))?
        } else {
            decoded.to_luma8()
        };
        Ok(Self { coverage })
    }
}

impl Segmenter for MaskSegmenter {
    #[tracing::instrument(skip(self, input, progress))]
    fn segment(&self, input: &[u8], progress: &mut dyn FnMut(f32)) -> UnderlayResult<Cutout> {
        let decoded = image::load_from_memory(input)
            .map_err(|err| UnderlayError::segmentation(format!("unsupported input: {err}")))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let (mask_w, mask_h) = self.coverage.dimensions();
        if (width, height) != (mask_w, mask_h) {
            return Err(UnderlayError::segmentation(format!(
                "mask is {mask_w}x{mask_h} but the image is {width}x{height}"
            )));
        }

        let background = encode_png(&rgba)?;
        progress(0.5);

        // Straight alpha: only the alpha channel is scaled, rgb stays put.
        let mut cut = rgba;
        for (x, y, px) in cut.enumerate_pixels_mut() {
            let coverage = self.coverage.get_pixel(x, y).0[0];
            px.0[3] = mul_div255(px.0[3], coverage);
        }
        let foreground = encode_png(&cut)?;
        progress(1.0);

        Ok(Cutout {
            background,
            foreground,
        })
    }
}

fn encode_png(image: &image::RgbaImage) -> UnderlayResult<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .map_err(|err| UnderlayError::segmentation(format!("encode cutout: {err}")))?;
    Ok(bytes.into_inner())
}

fn mul_div255(a: u8, b: u8) -> u8 {
    ((u32::from(a) * u32::from(b) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_rgba(width: u32, height: u32, pixels: &[[u8; 4]]) -> Vec<u8> {
        let raw: Vec<u8> = pixels.iter().flatten().copied().collect();
        let img = image::RgbaImage::from_raw(width, height, raw).unwrap();
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn png_luma(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
        let img = image::GrayImage::from_raw(width, height, pixels.to_vec()).unwrap();
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn luma_mask_carves_the_foreground_alpha() {
        let input = png_rgba(
            2,
            1,
            &[[200, 40, 10, 255], [30, 60, 90, 255]],
        );
        let mask = png_luma(2, 1, &[255, 0]);
        let segmenter = MaskSegmenter::from_mask_bytes(&mask).unwrap();

        let cutout = segmenter.segment(&input, &mut |_| {}).unwrap();

        let bg = image::load_from_memory(&cutout.background).unwrap().to_rgba8();
        assert_eq!(bg.get_pixel(0, 0).0, [200, 40, 10, 255]);
        assert_eq!(bg.get_pixel(1, 0).0, [30, 60, 90, 255]);

        let fg = image::load_from_memory(&cutout.foreground).unwrap().to_rgba8();
        assert_eq!(fg.get_pixel(0, 0).0, [200, 40, 10, 255]);
        assert_eq!(fg.get_pixel(1, 0).0[3], 0);
    }

    #[test]
    fn alpha_mask_is_read_through_its_alpha_channel() {
        let input = png_rgba(1, 2, &[[10, 10, 10, 255], [20, 20, 20, 255]]);
        let mask = png_rgba(1, 2, &[[255, 255, 255, 255], [255, 255, 255, 0]]);
        let segmenter = MaskSegmenter::from_mask_bytes(&mask).unwrap();

        let cutout = segmenter.segment(&input, &mut |_| {}).unwrap();
        let fg = image::load_from_memory(&cutout.foreground).unwrap().to_rgba8();
        assert_eq!(fg.get_pixel(0, 0).0[3], 255);
        assert_eq!(fg.get_pixel(0, 1).0[3], 0);
    }

    #[test]
    fn progress_reports_both_phase_boundaries_in_order() {
        let input = png_rgba(1, 1, &[[1, 2, 3, 255]]);
        let mask = png_luma(1, 1, &[128]);
        let segmenter = MaskSegmenter::from_mask_bytes(&mask).unwrap();

        let mut seen = Vec::new();
        segmenter.segment(&input, &mut |f| seen.push(f)).unwrap();
        assert_eq!(seen, vec![0.5, 1.0]);
    }

    #[test]
    fn non_image_input_is_rejected_descriptively() {
        let mask = png_luma(1, 1, &[255]);
        let segmenter = MaskSegmenter::from_mask_bytes(&mask).unwrap();

        let err = segmenter
            .segment(b"definitely not pixels", &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, UnderlayError::Segmentation(_)), "{err}");
        assert!(err.to_string().contains("unsupported input"));
    }

    #[test]
    fn mask_and_image_dimensions_must_agree() {
        let input = png_rgba(2, 2, &[[0, 0, 0, 255]; 4]);
        let mask = png_luma(1, 1, &[255]);
        let segmenter = MaskSegmenter::from_mask_bytes(&mask).unwrap();

        let err = segmenter.segment(&input, &mut |_| {}).unwrap_err();
        assert!(err.to_string().contains("1x1"));
        assert!(err.to_string().contains("2x2"));
    }

    #[test]
    fn cancellation_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }
}
