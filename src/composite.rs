// Composite pass: field state -> displayed RGBA image.
//
// The field's height gradient bends the background lookup (cheap
// refraction) and drives a directional shading term. A pure function of
// its inputs: the caller hands in the field, an optional background and
// the output buffer, nothing else.

use std::path::Path;

use rayon::prelude::*;

use crate::field::{Field, Resolution, SimError};

/// Background color image, stored top-down like the output buffer.
#[derive(Clone)]
pub struct Background {
    resolution: Resolution,
    pixels: Vec<[u8; 4]>,
}

impl Background {
    /// The blue-to-cyan gradient used when no image is supplied.
    pub fn synthesize(resolution: Resolution) -> Result<Self, SimError> {
        let count = resolution.texel_count();
        if count == 0 {
            return Err(SimError::EmptyResolution(resolution));
        }
        let mut pixels: Vec<[u8; 4]> = Vec::new();
        pixels
            .try_reserve_exact(count)
            .map_err(|source| SimError::Allocation {
                width: resolution.width,
                height: resolution.height,
                source,
            })?;

        let w = resolution.width as usize;
        let h = resolution.height as usize;
        for y in 0..h {
            let v = y as f32 / h as f32;
            for x in 0..w {
                let u = x as f32 / w as f32;
                pixels.push([
                    (u * 50.0) as u8,
                    (100.0 + v * 100.0) as u8,
                    (150.0 + u * 50.0) as u8,
                    255,
                ]);
            }
        }
        Ok(Self { resolution, pixels })
    }

    /// Decode an image file and resample it to the field resolution.
    pub fn from_image(path: &Path, resolution: Resolution) -> Result<Self, SimError> {
        if resolution.texel_count() == 0 {
            return Err(SimError::EmptyResolution(resolution));
        }
        let decoded = image::open(path)?.to_rgba8();
        let resized = image::imageops::resize(
            &decoded,
            resolution.width,
            resolution.height,
            image::imageops::FilterType::Triangle,
        );
        let pixels = resized.pixels().map(|p| p.0).collect();
        Ok(Self { resolution, pixels })
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Nearest sample with clamp-to-edge, image coordinates (y-down).
    #[inline]
    fn sample_clamped(&self, x: f32, y: f32) -> [u8; 4] {
        let w = self.resolution.width as i32;
        let h = self.resolution.height as i32;
        let xi = (x as i32).clamp(0, w - 1);
        let yi = (y as i32).clamp(0, h - 1);
        self.pixels[yi as usize * w as usize + xi as usize]
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CompositeParams {
    /// Background lookup offset in pixels per unit of height gradient.
    pub refraction: f32,
    /// Brightness delta per unit of height gradient.
    pub shading: f32,
    /// Color shown where no background image is available.
    pub fallback: [u8; 3],
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self {
            refraction: 10.0,
            shading: 0.25,
            fallback: [10, 24, 46],
        }
    }
}

/// Render `field` over `background` into `out`, an RGBA8 top-down image
/// with rows `bytes_per_row` apart. Output-buffer and resolution mismatches
/// are configuration errors and fail fast.
pub fn render(
    field: &Field,
    background: Option<&Background>,
    out: &mut [u8],
    bytes_per_row: usize,
    params: &CompositeParams,
) -> Result<(), SimError> {
    let w = field.width();
    let h = field.height();

    if bytes_per_row < w * 4 {
        return Err(SimError::OutputTooSmall {
            have: bytes_per_row,
            need: w * 4,
        });
    }
    if out.len() < bytes_per_row * h {
        return Err(SimError::OutputTooSmall {
            have: out.len(),
            need: bytes_per_row * h,
        });
    }
    if let Some(bg) = background {
        if bg.resolution() != field.resolution() {
            return Err(SimError::ResolutionMismatch {
                left: bg.resolution(),
                right: field.resolution(),
            });
        }
    }

    let src = field.texels();
    let fallback = params.fallback;

    out.par_chunks_mut(bytes_per_row)
        .take(h)
        .enumerate()
        .for_each(|(iy, row)| {
            // Output row 0 is the top of the screen; field row 0 is the
            // bottom.
            let fy = h - 1 - iy;
            let ym1 = fy.saturating_sub(1);
            let yp1 = (fy + 1).min(h - 1);
            let base = fy * w;

            for x in 0..w {
                let xm1 = x.saturating_sub(1);
                let xp1 = (x + 1).min(w - 1);

                let gx = src[base + xp1][0] - src[base + xm1][0];
                let gy = src[yp1 * w + x][0] - src[ym1 * w + x][0];

                let [r, g, b] = match background {
                    Some(bg) => {
                        let sx = x as f32 + gx * params.refraction;
                        // Field +y is up, image +y is down.
                        let sy = iy as f32 - gy * params.refraction;
                        let p = bg.sample_clamped(sx, sy);
                        [p[0], p[1], p[2]]
                    }
                    None => fallback,
                };

                let shade = 1.0 + (gx - gy) * params.shading;
                let off = x * 4;
                row[off] = (r as f32 * shade).clamp(0.0, 255.0) as u8;
                row[off + 1] = (g as f32 * shade).clamp(0.0, 255.0) as u8;
                row[off + 2] = (b as f32 * shade).clamp(0.0, 255.0) as u8;
                row[off + 3] = 255;
            }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Resolution;

    fn flat_field(res: Resolution) -> Field {
        Field::zeroed(res).unwrap()
    }

    #[test]
    fn flat_field_without_background_is_uniform_fallback() {
        let res = Resolution::new(16, 16);
        let field = flat_field(res);
        let params = CompositeParams::default();
        let mut out = vec![0u8; 16 * 16 * 4];

        render(&field, None, &mut out, 16 * 4, &params).unwrap();

        let [r, g, b] = params.fallback;
        for px in out.chunks_exact(4) {
            assert_eq!(px, [r, g, b, 255]);
        }
    }

    #[test]
    fn flat_field_passes_background_through() {
        let res = Resolution::new(16, 8);
        let field = flat_field(res);
        let bg = Background::synthesize(res).unwrap();
        let mut out = vec![0u8; 16 * 8 * 4];

        render(&field, Some(&bg), &mut out, 16 * 4, &params_no_shade()).unwrap();

        for (i, px) in out.chunks_exact(4).enumerate() {
            assert_eq!(px, bg.pixels[i]);
        }
    }

    fn params_no_shade() -> CompositeParams {
        CompositeParams {
            shading: 0.0,
            ..CompositeParams::default()
        }
    }

    #[test]
    fn bump_disturbs_the_output() {
        let res = Resolution::new(16, 16);
        let mut field = flat_field(res);
        field.texels_mut()[8 * 16 + 8] = [4.0, 0.0, 0.0, 0.0];

        let params = CompositeParams::default();
        let mut out = vec![0u8; 16 * 16 * 4];
        render(&field, None, &mut out, 16 * 4, &params).unwrap();

        let first = out[..4].to_vec();
        assert!(
            out.chunks_exact(4).any(|px| px != first.as_slice()),
            "bump produced a uniform image"
        );
    }

    #[test]
    fn background_resolution_mismatch_fails_fast() {
        let field = flat_field(Resolution::new(16, 16));
        let bg = Background::synthesize(Resolution::new(8, 8)).unwrap();
        let mut out = vec![0u8; 16 * 16 * 4];

        let err = render(&field, Some(&bg), &mut out, 16 * 4, &CompositeParams::default());
        assert!(matches!(err, Err(SimError::ResolutionMismatch { .. })));
    }

    #[test]
    fn short_output_buffer_fails_fast() {
        let field = flat_field(Resolution::new(16, 16));
        let mut out = vec![0u8; 16 * 4]; // one row only

        let err = render(&field, None, &mut out, 16 * 4, &CompositeParams::default());
        assert!(matches!(err, Err(SimError::OutputTooSmall { .. })));
    }

    #[test]
    fn respects_row_padding() {
        let res = Resolution::new(3, 2);
        let field = flat_field(res);
        let params = CompositeParams::default();
        let bpr = 256; // wgpu-style padded rows
        let mut out = vec![0xAAu8; bpr * 2];

        render(&field, None, &mut out, bpr, &params).unwrap();

        // Pixels written, padding untouched.
        assert_eq!(out[0], params.fallback[0]);
        assert_eq!(out[bpr - 1], 0xAA);
    }
}
