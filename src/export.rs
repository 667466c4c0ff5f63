use std::io::Cursor;

use image::ImageEncoder as _;

use crate::foundation::error::{UnderlayError, UnderlayResult};
use crate::model::CompositeMode;
use crate::render::FrameRgba;

/// Raster formats a rendered frame can be encoded to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Lossless, keeps the alpha channel.
    Png,
    /// Lossy, no alpha channel; the frame is flattened onto white first.
    Jpeg,
    /// Lossless WebP; keeps the alpha channel.
    Webp,
}

impl ExportFormat {
    /// MIME type for the encoded bytes.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    /// Whether the encoded file can carry transparency.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    /// Download filename for an export in the given composite mode.
    pub fn suggested_filename(self, mode: CompositeMode) -> String {
        let stem = match mode {
            CompositeMode::TextBehindSubject => "text-behind-object",
            CompositeMode::TextOverlay => "edited-image",
        };
        format!("{stem}.{}", self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = UnderlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(UnderlayError::validation(format!(
                "unknown export format {other:?}; expected png, jpeg, or webp"
            ))),
        }
    }
}

/// One finished export: encoded bytes plus the metadata a download needs.
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    /// Encoded file contents.
    pub bytes: Vec<u8>,
    /// Suggested download filename, e.g. `text-behind-object.png`.
    pub filename: String,
    /// MIME type matching the encoded format.
    pub mime: &'static str,
}

/// Encode a rendered frame and pair it with its download metadata.
pub fn export_frame(
    frame: &FrameRgba,
    format: ExportFormat,
    quality: Option<f64>,
    mode: CompositeMode,
) -> UnderlayResult<ExportArtifact> {
    let bytes = encode_frame(frame, format, quality)?;
    Ok(ExportArtifact {
        bytes,
        filename: format.suggested_filename(mode),
        mime: format.mime(),
    })
}

/// Encode a rendered frame to the requested format, in memory.
///
/// Premultiplied frames are unpremultiplied to straight RGBA first. PNG
/// ignores `quality`; JPEG and WebP require one in (0, 1]. JPEG flattens
/// away the alpha channel, and the WebP encoder here is lossless, so its
/// quality is validated but does not change the bytes. Codec failures
/// surface as encode errors, distinct from render refusals.
pub fn encode_frame(
    frame: &FrameRgba,
    format: ExportFormat,
    quality: Option<f64>,
) -> UnderlayResult<Vec<u8>> {
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.data.len() != expected {
        return Err(UnderlayError::validation(
            "frame pixel buffer does not match its dimensions",
        ));
    }

    let straight = if frame.premultiplied {
        unpremultiply_rgba8(&frame.data)
    } else {
        frame.data.clone()
    };

    let mut output = Cursor::new(Vec::new());
    match format {
        ExportFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new(&mut output);
            encoder
                .write_image(
                    &straight,
                    frame.width,
                    frame.height,
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|err| UnderlayError::encode(format!("png: {err}")))?;
        }
        ExportFormat::Jpeg => {
            let q = jpeg_scale(required_quality(format, quality)?);
            // JPEG carries no alpha channel.
            let rgb = rgba_to_rgb(&straight);
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, q);
            encoder
                .write_image(
                    &rgb,
                    frame.width,
                    frame.height,
                    image::ExtendedColorType::Rgb8,
                )
                .map_err(|err| UnderlayError::encode(format!("jpeg: {err}")))?;
        }
        ExportFormat::Webp => {
            required_quality(format, quality)?;
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut output);
            encoder
                .write_image(
                    &straight,
                    frame.width,
                    frame.height,
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|err| UnderlayError::encode(format!("webp: {err}")))?;
        }
    }
    Ok(output.into_inner())
}

fn required_quality(format: ExportFormat, quality: Option<f64>) -> UnderlayResult<f64> {
    match quality {
        Some(q) if q > 0.0 && q <= 1.0 => Ok(q),
        Some(q) => Err(UnderlayError::validation(format!(
            "{} quality {q} is outside (0, 1]",
            format.extension()
        ))),
        None => Err(UnderlayError::validation(format!(
            "{} export requires a quality in (0, 1]",
            format.extension()
        ))),
    }
}

fn jpeg_scale(quality: f64) -> u8 {
    ((quality * 100.0).round() as u8).clamp(1, 100)
}

fn unpremultiply_rgba8(premul: &[u8]) -> Vec<u8> {
    let mut out = premul.to_vec();
    for px in out.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        for c in px.iter_mut().take(3) {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
    out
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}
