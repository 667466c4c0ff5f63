use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::color::ColorSpec;
use crate::assets::decode::DecodedImage;
use crate::assets::fonts::{FontLibrary, TextBrush};
use crate::foundation::core::{Affine, SurfaceSize};
use crate::foundation::error::{UnderlayError, UnderlayResult};
use crate::model::{Backdrop, CompositeMode, GradientDirection, PLACEHOLDER_TEXT, TextLayer};
use crate::render::FrameRgba;
use crate::render::blur::{blur_premul_q16, gaussian_kernel_q16};

/// Borrowed inputs for one composite pass.
///
/// The output surface is always sized to the background's native resolution;
/// nothing here is scaled.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    /// Source image; also the surface size authority.
    pub background: &'a DecodedImage,
    /// Subject cutout with alpha. Required in
    /// [`CompositeMode::TextBehindSubject`], unused otherwise.
    pub foreground: Option<&'a DecodedImage>,
    /// What to paint beneath the text layers.
    pub backdrop: &'a Backdrop,
    /// Text layers in paint order.
    pub layers: &'a [TextLayer],
    /// Stacking mode.
    pub mode: CompositeMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct GradientKey {
    start: [u8; 4],
    end: [u8; 4],
    direction: GradientDirection,
    w: u32,
    h: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct BlurKernelKey {
    radius_px: u32,
    sigma_bits: u32,
}

/// Deterministic CPU renderer: backdrop first, then text layers, then the
/// foreground cutout.
///
/// Owns the reusable raster context plus paint caches (gradient pixmaps,
/// blur kernels, blur scratch). Rendering is a pure function of the scene:
/// identical inputs produce byte-identical premultiplied RGBA output, and
/// layer state is never mutated.
pub struct Compositor {
    fonts: FontLibrary,
    ctx: Option<vello_cpu::RenderContext>,
    gradient_cache: HashMap<GradientKey, vello_cpu::Image>,
    blur_kernel_cache: HashMap<BlurKernelKey, Arc<Vec<u32>>>,
    blur_scratch_a: Vec<u8>,
    blur_scratch_b: Vec<u8>,
}

impl Compositor {
    /// Create a compositor drawing text with faces from `fonts`.
    pub fn new(fonts: FontLibrary) -> Self {
        Self {
            fonts,
            ctx: None,
            gradient_cache: HashMap::new(),
            blur_kernel_cache: HashMap::new(),
            blur_scratch_a: Vec::new(),
            blur_scratch_b: Vec::new(),
        }
    }

    /// The font library, for loading additional faces after construction.
    pub fn fonts_mut(&mut self) -> &mut FontLibrary {
        &mut self.fonts
    }

    /// Composite the scene into a premultiplied RGBA frame.
    ///
    /// `opaque_base` prefills the surface opaque white; callers set it when
    /// the target encoding cannot carry alpha. Refusals are typed render
    /// errors: behind-subject mode without a foreground, a zero-dimension
    /// source, a surface beyond the rasterizer's u16 limit, or no usable
    /// font.
    #[tracing::instrument(skip(self, scene))]
    pub fn render(&mut self, scene: &Scene<'_>, opaque_base: bool) -> UnderlayResult<FrameRgba> {
        let bg = scene.background;
        if bg.width == 0 || bg.height == 0 {
            return Err(UnderlayError::render("background image has a zero dimension"));
        }
        check_buffer(bg, "background")?;

        let foreground = match scene.mode {
            CompositeMode::TextBehindSubject => {
                let fg = scene.foreground.ok_or_else(|| {
                    UnderlayError::render(
                        "text-behind-subject mode requires a foreground cutout",
                    )
                })?;
                if fg.width == 0 || fg.height == 0 {
                    return Err(UnderlayError::render(
                        "foreground image has a zero dimension",
                    ));
                }
                check_buffer(fg, "foreground")?;
                dim_u16(fg.width, "foreground width")?;
                dim_u16(fg.height, "foreground height")?;
                Some(fg)
            }
            CompositeMode::TextOverlay => None,
        };

        let size = SurfaceSize::new(bg.width, bg.height)?;
        let w16 = dim_u16(bg.width, "surface width")?;
        let h16 = dim_u16(bg.height, "surface height")?;

        let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
        self.with_ctx_mut(w16, h16, |this, ctx| {
            if opaque_base {
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    0.0,
                    0.0,
                    f64::from(bg.width),
                    f64::from(bg.height),
                ));
            }

            this.draw_backdrop(ctx, scene.backdrop, bg)?;

            for layer in scene.layers {
                this.draw_text_layer(ctx, layer, size)?;
            }

            if let Some(fg) = foreground {
                // Unscaled at the origin, whatever its dimensions.
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_paint(image_paint(fg.rgba8_premul.as_slice(), fg.width, fg.height)?);
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    0.0,
                    0.0,
                    f64::from(fg.width),
                    f64::from(fg.height),
                ));
            }

            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
            Ok(())
        })?;

        Ok(FrameRgba {
            width: bg.width,
            height: bg.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> UnderlayResult<R>,
    ) -> UnderlayResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }

    fn draw_backdrop(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        backdrop: &Backdrop,
        bg: &DecodedImage,
    ) -> UnderlayResult<()> {
        let (w, h) = (bg.width, bg.height);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        match backdrop {
            Backdrop::Original => {
                ctx.set_paint(image_paint(bg.rgba8_premul.as_slice(), w, h)?);
            }
            Backdrop::Solid { color } => {
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    color.r, color.g, color.b, color.a,
                ));
            }
            Backdrop::Gradient {
                start,
                end,
                direction,
            } => {
                let paint = self.gradient_paint(*start, *end, *direction, w, h)?;
                ctx.set_paint(paint);
            }
            Backdrop::Blur { radius_px } => {
                let paint = self.blurred_background_paint(bg, *radius_px)?;
                ctx.set_paint(paint);
            }
        }
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(w),
            f64::from(h),
        ));
        Ok(())
    }

    /// Draw one text layer centered on its anchor.
    ///
    /// Each wrapped line is centered horizontally on the anchor (offset by
    /// half its advance), the line stack is centered vertically, and rotation
    /// is applied about that shared center.
    fn draw_text_layer(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        layer: &TextLayer,
        size: SurfaceSize,
    ) -> UnderlayResult<()> {
        let content = if layer.content.is_empty() {
            PLACEHOLDER_TEXT
        } else {
            layer.content.as_str()
        };
        let brush = TextBrush {
            r: layer.color.r,
            g: layer.color.g,
            b: layer.color.b,
            a: layer.color.a,
        };
        let wrap_px = (size.width as f32 - 40.0).max(20.0);
        let shaped = self.fonts.shape(
            content,
            &layer.font_family,
            layer.font_weight,
            layer.font_size as f32,
            brush,
            wrap_px,
        )?;

        let block_h = f64::from(shaped.layout.height());
        let anchor = layer.position.to_pixels(size);
        let transform = Affine::translate((anchor.x, anchor.y))
            * Affine::rotate(layer.rotation.to_radians())
            * Affine::translate((0.0, -block_h / 2.0));
        ctx.set_transform(affine_to_cpu(transform));

        let opacity = layer.opacity as f32;
        if opacity < 1.0 {
            ctx.push_opacity_layer(opacity);
        }
        for line in shaped.layout.lines() {
            let mut staged: Vec<(vello_cpu::peniko::Color, f32, Vec<vello_cpu::Glyph>)> =
                Vec::new();
            let mut line_advance = 0.0f32;
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let b = run.style().brush;
                let color = vello_cpu::peniko::Color::from_rgba8(b.r, b.g, b.b, b.a);
                let glyphs: Vec<vello_cpu::Glyph> = run
                    .glyphs()
                    .map(|g| {
                        line_advance += g.advance;
                        vello_cpu::Glyph {
                            id: g.id,
                            x: g.x,
                            y: g.y,
                        }
                    })
                    .collect();
                staged.push((color, run.run().font_size(), glyphs));
            }

            let dx = line_advance * 0.5;
            for (color, font_size, glyphs) in staged {
                ctx.set_paint(color);
                ctx.glyph_run(&shaped.font)
                    .font_size(font_size)
                    .fill_glyphs(glyphs.into_iter().map(|g| vello_cpu::Glyph {
                        x: g.x - dx,
                        ..g
                    }));
            }
        }
        if opacity < 1.0 {
            ctx.pop_layer();
        }
        Ok(())
    }

    fn gradient_paint(
        &mut self,
        start: ColorSpec,
        end: ColorSpec,
        direction: GradientDirection,
        w: u32,
        h: u32,
    ) -> UnderlayResult<vello_cpu::Image> {
        let s = start.to_premul();
        let e = end.to_premul();
        let key = GradientKey {
            start: [s.r, s.g, s.b, s.a],
            end: [e.r, e.g, e.b, e.a],
            direction,
            w,
            h,
        };
        if let Some(img) = self.gradient_cache.get(&key).cloned() {
            return Ok(img);
        }

        let mut bytes = vec![0u8; (w as usize).saturating_mul(h as usize).saturating_mul(4)];
        let w1 = (w.max(1) - 1) as f32;
        let h1 = (h.max(1) - 1) as f32;
        let d1 = w1 + h1;
        for y in 0..h {
            for x in 0..w {
                let t = match direction {
                    GradientDirection::TopBottom => {
                        if h1 <= 0.0 { 0.0 } else { y as f32 / h1 }
                    }
                    GradientDirection::LeftRight => {
                        if w1 <= 0.0 { 0.0 } else { x as f32 / w1 }
                    }
                    GradientDirection::Diagonal => {
                        if d1 <= 0.0 {
                            0.0
                        } else {
                            (x as f32 + y as f32) / d1
                        }
                    }
                };
                let idx = ((y as usize) * (w as usize) + (x as usize)) * 4;
                bytes[idx] = lerp_u8(s.r, e.r, t);
                bytes[idx + 1] = lerp_u8(s.g, e.g, t);
                bytes[idx + 2] = lerp_u8(s.b, e.b, t);
                bytes[idx + 3] = lerp_u8(s.a, e.a, t);
            }
        }

        let img = image_paint(&bytes, w, h)?;
        self.gradient_cache.insert(key, img.clone());
        Ok(img)
    }

    fn blurred_background_paint(
        &mut self,
        bg: &DecodedImage,
        radius_px: u32,
    ) -> UnderlayResult<vello_cpu::Image> {
        if radius_px == 0 {
            return image_paint(bg.rgba8_premul.as_slice(), bg.width, bg.height);
        }

        let sigma = radius_px as f32 / 2.0;
        let key = BlurKernelKey {
            radius_px,
            sigma_bits: sigma.to_bits(),
        };
        let kernel = if let Some(k) = self.blur_kernel_cache.get(&key).cloned() {
            k
        } else {
            let k = Arc::new(gaussian_kernel_q16(radius_px, sigma)?);
            self.blur_kernel_cache.insert(key, k.clone());
            k
        };

        let expected = (bg.width as usize)
            .saturating_mul(bg.height as usize)
            .saturating_mul(4);
        self.blur_scratch_a.resize(expected, 0);
        self.blur_scratch_b.resize(expected, 0);
        blur_premul_q16(
            bg.rgba8_premul.as_slice(),
            &mut self.blur_scratch_b,
            &mut self.blur_scratch_a,
            bg.width,
            bg.height,
            &kernel,
        );
        image_paint(&self.blur_scratch_b, bg.width, bg.height)
    }
}

fn check_buffer(image: &DecodedImage, role: &str) -> UnderlayResult<()> {
    let expected = (image.width as usize)
        .saturating_mul(image.height as usize)
        .saturating_mul(4);
    if image.rgba8_premul.len() != expected {
        return Err(UnderlayError::render(format!(
            "{role} pixel buffer does not match its dimensions"
        )));
    }
    Ok(())
}

fn dim_u16(v: u32, what: &str) -> UnderlayResult<u16> {
    v.try_into().map_err(|_| {
        UnderlayError::render(format!("{what} {v} exceeds the rasterizer limit of 65535"))
    })
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (f32::from(a) + (f32::from(b) - f32::from(a)) * t)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn image_paint(bytes_premul: &[u8], width: u32, height: u32) -> UnderlayResult<vello_cpu::Image> {
    let w: u16 = width
        .try_into()
        .map_err(|_| UnderlayError::render("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| UnderlayError::render("pixmap height exceeds u16"))?;
    if bytes_premul.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(UnderlayError::render("pixmap byte length mismatch"));
    }

    // Pixmap stores PremulRgba8; the bytes are already premultiplied.
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes_premul.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}
