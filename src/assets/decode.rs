use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{UnderlayError, UnderlayResult};

/// A decoded raster image held as premultiplied RGBA8.
///
/// The pixel buffer is shared: the session, the compositor, and an in-flight
/// segmentation all hold the same `Arc` and the buffer is freed once when the
/// last of them drops it.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8, row-major, `width * height * 4` bytes.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Sniff the container format from the leading bytes.
///
/// Runs before any decode work so that arbitrary non-image input is rejected
/// up front with a validation error instead of surfacing as a codec failure
/// mid-pipeline.
pub fn sniff_format(bytes: &[u8]) -> UnderlayResult<image::ImageFormat> {
    image::guess_format(bytes)
        .map_err(|_| UnderlayError::validation("unrecognized input: not a supported image format"))
}

/// Decode image bytes into a [`DecodedImage`].
pub fn decode_image(bytes: &[u8]) -> UnderlayResult<DecodedImage> {
    sniff_format(bytes)?;
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}
