use crate::foundation::error::{UnderlayError, UnderlayResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Normalized position inside the output surface, `[0,1]` per axis.
///
/// `(0,0)` is the top-left corner, `(1,1)` the bottom-right. Positions are
/// anchored at the text's visual center, which decouples layer geometry from
/// the output image's pixel dimensions (known only once the source photo is
/// loaded).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormPoint {
    /// Horizontal fraction of the surface width.
    pub x: f64,
    /// Vertical fraction of the surface height.
    pub y: f64,
}

impl NormPoint {
    /// Construct without clamping.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Surface center.
    pub fn center() -> Self {
        Self { x: 0.5, y: 0.5 }
    }

    /// Clamp both axes into `[0,1]`. Non-finite components clamp to 0.
    pub fn clamp_unit(self) -> Self {
        fn clamp01(v: f64) -> f64 {
            if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
        }
        Self {
            x: clamp01(self.x),
            y: clamp01(self.y),
        }
    }

    /// Map to absolute pixel coordinates on a surface of the given size.
    pub fn to_pixels(self, size: SurfaceSize) -> Point {
        Point::new(
            self.x * f64::from(size.width),
            self.y * f64::from(size.height),
        )
    }
}

/// Output surface dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SurfaceSize {
    /// Create a validated non-zero size.
    pub fn new(width: u32, height: u32) -> UnderlayResult<Self> {
        if width == 0 || height == 0 {
            return Err(UnderlayError::render(
                "surface dimensions must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Opaque white.
    pub fn white() -> Self {
        Self {
            r: 255,
            g: 255,
            b: 255,
            a: 255,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }
}
