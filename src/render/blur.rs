use crate::foundation::error::{UnderlayError, UnderlayResult};

/// Build a normalized Gaussian kernel in Q16 fixed point.
///
/// Weights sum to exactly 65536; rounding drift is folded into the center
/// tap so a constant image passes through unchanged. Radius 0 yields the
/// identity kernel.
pub(crate) fn gaussian_kernel_q16(radius_px: u32, sigma: f32) -> UnderlayResult<Vec<u32>> {
    if radius_px == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(UnderlayError::validation("blur sigma must be finite and > 0"));
    }

    let r = radius_px as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(UnderlayError::render("gaussian kernel collapsed to zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = (((wf / sum) * 65536.0).round() as i64).clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let corrected = (i64::from(weights[mid]) + delta).clamp(0, 65536);
        weights[mid] = corrected as u32;
    }

    Ok(weights)
}

/// Separable two-pass blur over premultiplied RGBA8.
///
/// `src`, `dst`, and `tmp` must all be `width * height * 4` bytes; edges are
/// clamp-extended. The identity kernel degenerates to a copy.
pub(crate) fn blur_premul_q16(
    src: &[u8],
    dst: &mut [u8],
    tmp: &mut [u8],
    width: u32,
    height: u32,
    kernel_q16: &[u32],
) {
    if kernel_q16.len() == 1 {
        dst.copy_from_slice(src);
        return;
    }

    horizontal_pass(src, tmp, width, height, kernel_q16);
    vertical_pass(tmp, dst, width, height, kernel_q16);
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    (((acc + 32768) >> 16).min(255)) as u8
}
